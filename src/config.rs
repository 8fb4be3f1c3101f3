use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, trace};

use crate::util::{env_var, override_from, parse_var};

/// Configuration values that fail validation.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("poll interval must be positive")]
    InvalidInterval,

    #[error("{name} must be between 1 and 100, got {value}")]
    InvalidThreshold { name: &'static str, value: f64 },

    #[error("http retry delay must be positive")]
    InvalidRetryDelay,

    #[error("http timeout must be positive")]
    InvalidTimeout,

    #[error("subscriber buffer must hold at least one message")]
    InvalidSubscriberBuffer,

    #[error("webhook url must be a path or start with {base}")]
    ForeignWebhookUrl { base: String },
}

/// Alert trigger percentages, immutable for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Thresholds {
    pub cpu_threshold: f64,
    pub memory_threshold: f64,
    pub disk_threshold: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu_threshold: 80.0,
            memory_threshold: 90.0,
            disk_threshold: 90.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Webhook path (or full URL) below the Discord service base; empty disables the sink.
    #[serde(rename = "webhookUrl")]
    pub url: String,

    #[serde(rename = "webhookUsername")]
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    #[serde(rename = "httpMaxRetries")]
    pub max_retries: u32,

    #[serde(rename = "httpRetryDelay")]
    pub retry_delay_ms: u64,

    #[serde(rename = "httpTimeoutSeconds")]
    pub timeout_seconds: u64,

    #[serde(rename = "discordApiBase")]
    pub discord_api_base: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 10_000,
            timeout_seconds: 10,
            discord_api_base: "https://discord.com/api/webhooks".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub name: String,
    pub bind_addr: IpAddr,
    pub port: u16,
    pub poll_interval_seconds: u64,
    #[serde(flatten)]
    pub thresholds: Thresholds,
    #[serde(flatten)]
    pub webhook: WebhookConfig,
    pub cooldown_seconds: u64,
    #[serde(flatten)]
    pub http: HttpConfig,
    /// Per-subscriber queue capacity of the broadcast hub
    pub subscriber_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "Delphos Server API".to_string(),
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            poll_interval_seconds: 5,
            thresholds: Thresholds::default(),
            webhook: WebhookConfig::default(),
            cooldown_seconds: 30,
            http: HttpConfig::default(),
            subscriber_buffer: 16,
        }
    }
}

impl Config {
    /// Build the effective configuration: defaults, then the optional JSON
    /// file, then the process environment.
    pub fn load(file: Option<&str>) -> anyhow::Result<Config> {
        let mut config = match file {
            Some(path) => read_config_file(path)?,
            None => Config::default(),
        };

        config.apply_env(env_var);
        config.validate()?;

        debug!(
            "configuration loaded: {} on {}, interval {}s, thresholds cpu={} memory={} disk={}, cooldown {}s",
            config.name,
            config.socket_addr(),
            config.poll_interval_seconds,
            config.thresholds.cpu_threshold,
            config.thresholds.memory_threshold,
            config.thresholds.disk_threshold,
            config.cooldown_seconds,
        );

        Ok(config)
    }

    /// Apply overrides from an environment lookup function.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup("NAME") {
            self.name = name;
        }

        // accept both "8080" and ":8080"
        if let Some(raw) = lookup("PORT")
            && let Some(port) = parse_var("PORT", raw.trim_start_matches(':'))
        {
            self.port = port;
        }

        override_from(&lookup, "BIND_ADDR", &mut self.bind_addr);
        override_from(&lookup, "INTERVAL", &mut self.poll_interval_seconds);
        override_from(&lookup, "CPU_THRESHOLD", &mut self.thresholds.cpu_threshold);
        override_from(&lookup, "MEMORY_THRESHOLD", &mut self.thresholds.memory_threshold);
        override_from(&lookup, "DISK_THRESHOLD", &mut self.thresholds.disk_threshold);

        if let Some(url) = lookup("WEBHOOK_URL") {
            self.webhook.url = url;
        }
        if let Some(username) = lookup("WEBHOOK_USERNAME") {
            self.webhook.username = username;
        }

        override_from(&lookup, "COOLDOWN_SECONDS", &mut self.cooldown_seconds);
        override_from(&lookup, "HTTP_MAX_RETRIES", &mut self.http.max_retries);
        override_from(&lookup, "HTTP_RETRY_DELAY_MS", &mut self.http.retry_delay_ms);
        override_from(&lookup, "HTTP_TIMEOUT_SECONDS", &mut self.http.timeout_seconds);

        if let Some(base) = lookup("DISCORD_API_BASE") {
            self.http.discord_api_base = base;
        }

        override_from(&lookup, "SUBSCRIBER_BUFFER", &mut self.subscriber_buffer);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_seconds == 0 {
            return Err(ConfigError::InvalidInterval);
        }

        let thresholds = [
            ("cpu threshold", self.thresholds.cpu_threshold),
            ("memory threshold", self.thresholds.memory_threshold),
            ("disk threshold", self.thresholds.disk_threshold),
        ];
        for (name, value) in thresholds {
            if !(1.0..=100.0).contains(&value) {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }

        if self.http.retry_delay_ms == 0 {
            return Err(ConfigError::InvalidRetryDelay);
        }

        if self.http.timeout_seconds == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        if self.subscriber_buffer == 0 {
            return Err(ConfigError::InvalidSubscriberBuffer);
        }

        let url = self.webhook.url.trim();
        let base = self.http.discord_api_base.trim_end_matches('/');
        if url.contains("://") && !url.starts_with(base) {
            return Err(ConfigError::ForeignWebhookUrl {
                base: base.to_string(),
            });
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.http.retry_delay_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_seconds)
    }
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .inspect(|config: &Config| trace!("loaded config file: {}", config.name))
}
