use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use delphos::{
    actors::{AlertHandle, BroadcastHub, PollerHandle},
    api::{ApiConfig, ApiState, spawn_api_server},
    collector::{MetricsSource, SysinfoCollector},
    config::Config,
    evaluator::Evaluator,
    fetch::{Fetcher, ResilientClient, RetryPolicy, ServiceRegistry},
    notify::{DiscordSink, Dispatcher, LogSink},
    util::env_var,
};
use tracing::{info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
#[command(version, about = "Host metrics hub with live streaming and threshold alerts")]
struct Args {
    /// JSON config file, environment variables take precedence
    #[arg(short, long)]
    file: Option<String>,
}

fn init() {
    let level = env_var("LOG_LEVEL")
        .and_then(|level| level.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::DEBUG);

    let filter = filter::Targets::new().with_targets(vec![
        ("delphos", level),
        ("tower_http", LevelFilter::INFO),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = Config::load(args.file.as_deref())?;

    let client = ResilientClient::new(
        ServiceRegistry::from_config(&config.http),
        RetryPolicy {
            max_retries: config.http.max_retries,
            retry_delay: config.retry_delay(),
        },
        config.http_timeout(),
    )
    .context("failed to build HTTP client")?;
    let fetcher: Arc<dyn Fetcher> = Arc::new(client);

    let discord = DiscordSink::new(fetcher, &config.webhook, &config.http.discord_api_base);
    if !discord.is_configured() {
        warn!("WEBHOOK_URL is not set, alerts will only be logged");
    }
    let dispatcher = Dispatcher::new(config.cooldown())
        .with_sink(discord)
        .with_sink(LogSink);

    let hub = BroadcastHub::new(config.subscriber_buffer);
    hub.start()?;

    let alerts = AlertHandle::spawn(Evaluator::new(config.thresholds), Arc::new(dispatcher));
    let source: Arc<dyn MetricsSource> = Arc::new(SysinfoCollector::new());
    let poller = PollerHandle::spawn(
        source.clone(),
        hub.clone(),
        alerts.clone(),
        config.poll_interval(),
    );

    let api_config = ApiConfig {
        bind_addr: config.socket_addr(),
        enable_cors: true,
    };
    let addr = spawn_api_server(api_config, ApiState::new(source, hub.clone())).await?;
    info!("{} running on http://{addr}", config.name);

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutting down");

    poller.shutdown().await?;
    alerts.shutdown().await?;
    hub.stop().await?;

    Ok(())
}
