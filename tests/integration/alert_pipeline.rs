//! Snapshot to Discord webhook, end to end

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use delphos::{
    actors::{AlertHandle, BroadcastHub, PollerHandle},
    config::{Thresholds, WebhookConfig},
    evaluator::Evaluator,
    notify::{DiscordSink, Dispatcher, LogSink},
};
use pretty_assertions::assert_eq;
use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::{StaticSource, create_snapshot, create_test_client};

struct Pipeline {
    hub: BroadcastHub,
    alerts: AlertHandle,
    poller: PollerHandle,
}

impl Pipeline {
    async fn shutdown(self) {
        self.poller.shutdown().await.unwrap();
        self.alerts.shutdown().await.unwrap();
        self.hub.stop().await.unwrap();
    }
}

fn start_pipeline(mock_uri: &str, source: Arc<StaticSource>, cooldown: Duration) -> Pipeline {
    let webhook = WebhookConfig {
        url: "/123/token".to_string(),
        username: "delphos".to_string(),
    };
    let sink = DiscordSink::new(Arc::new(create_test_client(mock_uri, 2)), &webhook, mock_uri);
    let dispatcher = Dispatcher::new(cooldown).with_sink(sink).with_sink(LogSink);

    let hub = BroadcastHub::new(8);
    hub.start().unwrap();
    let alerts = AlertHandle::spawn(Evaluator::new(Thresholds::default()), Arc::new(dispatcher));
    let poller = PollerHandle::spawn(source, hub.clone(), alerts.clone(), Duration::from_secs(3600));

    Pipeline { hub, alerts, poller }
}

async fn wait_for_requests(server: &MockServer, count: usize) -> Vec<wiremock::Request> {
    for _ in 0..200 {
        let requests = server.received_requests().await.unwrap();
        if requests.len() >= count {
            return requests;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {count} webhook requests");
}

async fn wait_for_evaluations(alerts: &AlertHandle, count: u64) {
    for _ in 0..200 {
        if alerts.stats().await.unwrap().evaluations >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {count} evaluations");
}

#[tokio::test]
async fn test_cpu_breach_reaches_webhook_once_per_cooldown() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/123/token"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let source = StaticSource::new(create_snapshot(&[70.0, 80.0, 96.0], 20.0, &[("/", 10.0)]));
    let pipeline = start_pipeline(&mock_server.uri(), source, Duration::from_secs(30));

    pipeline.poller.poll_now().await.unwrap();
    pipeline.poller.poll_now().await.unwrap();
    wait_for_evaluations(&pipeline.alerts, 2).await;

    let requests = wait_for_requests(&mock_server, 1).await;
    assert_eq!(requests.len(), 1);

    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["username"], "delphos");
    assert!(body["content"].as_str().unwrap().contains("CPU usage"));

    let stats = pipeline.alerts.stats().await.unwrap();
    assert_eq!(stats.dispatched, 1);
    assert!(stats.suppressed >= 1);

    pipeline.shutdown().await;
}

#[tokio::test]
async fn test_average_equal_to_threshold_sends_nothing() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&mock_server)
        .await;

    let source = StaticSource::new(create_snapshot(&[70.0, 75.0, 95.0], 20.0, &[]));
    let pipeline = start_pipeline(&mock_server.uri(), source, Duration::from_secs(30));

    pipeline.poller.poll_now().await.unwrap();
    wait_for_evaluations(&pipeline.alerts, 1).await;

    assert_eq!(pipeline.alerts.stats().await.unwrap().alerts_raised, 0);

    pipeline.shutdown().await;
}

#[tokio::test]
async fn test_transient_webhook_failures_are_retried() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let source = StaticSource::new(create_snapshot(&[10.0], 20.0, &[("/data", 97.5)]));
    let pipeline = start_pipeline(&mock_server.uri(), source, Duration::ZERO);

    pipeline.poller.poll_now().await.unwrap();

    let requests = wait_for_requests(&mock_server, 3).await;
    let body: Value = serde_json::from_slice(&requests[2].body).unwrap();
    assert!(body["content"].as_str().unwrap().contains("/data"));

    pipeline.shutdown().await;
}

#[tokio::test]
async fn test_failed_collection_skips_alerting() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let source = StaticSource::new(create_snapshot(&[99.0], 99.0, &[]));
    let pipeline = start_pipeline(&mock_server.uri(), source.clone(), Duration::ZERO);
    // let the immediate first tick finish before failing the source
    wait_for_evaluations(&pipeline.alerts, 1).await;
    let before = pipeline.alerts.stats().await.unwrap().evaluations;

    source.fail.store(true, Ordering::SeqCst);
    assert!(pipeline.poller.poll_now().await.is_err());

    assert_eq!(pipeline.alerts.stats().await.unwrap().evaluations, before);

    pipeline.shutdown().await;
}
