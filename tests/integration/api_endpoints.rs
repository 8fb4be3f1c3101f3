//! HTTP surface tests against a server bound to an ephemeral port

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use delphos::{
    Snapshot,
    actors::BroadcastHub,
    api::{ApiConfig, ApiState, HealthResponse, spawn_api_server},
};
use pretty_assertions::assert_eq;
use tokio::time::timeout;

use crate::helpers::{StaticSource, create_snapshot};

async fn start_server(source: Arc<StaticSource>) -> (BroadcastHub, url::Url) {
    let hub = BroadcastHub::new(8);
    hub.start().unwrap();

    let config = ApiConfig {
        bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
        enable_cors: true,
    };
    let addr = spawn_api_server(config, ApiState::new(source, hub.clone()))
        .await
        .unwrap();

    let base = url::Url::parse(&format!("http://{addr}")).unwrap();
    (hub, base)
}

fn endpoint(base: &url::Url, path: &str) -> String {
    base.join(path).unwrap().to_string()
}

async fn wait_for_subscribers(hub: &BroadcastHub, expected: usize) {
    for _ in 0..200 {
        if hub.subscriber_count().await.unwrap() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {expected} subscribers");
}

#[tokio::test]
async fn test_health_reports_subscribers() {
    let (hub, base) = start_server(StaticSource::new(create_snapshot(&[1.0], 1.0, &[]))).await;
    let _subscription = hub.subscribe().await.unwrap();

    let response = reqwest::get(endpoint(&base, "/api/health")).await.unwrap();
    assert!(response.status().is_success());

    let health: HealthResponse = response.json().await.unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.subscribers, 1);
    assert!(chrono::DateTime::parse_from_rfc3339(&health.timestamp).is_ok());

    hub.stop().await.unwrap();
}

#[tokio::test]
async fn test_stats_returns_snapshot() {
    let snapshot = create_snapshot(&[12.5, 30.0], 40.0, &[("/", 55.0)]);
    let (hub, base) = start_server(StaticSource::new(snapshot.clone())).await;

    let response = reqwest::get(endpoint(&base, "/api/stats")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["disk"][0]["usedPercent"], 55.0);
    assert_eq!(body["network"][0]["interfaceName"], "eth0");

    let decoded: Snapshot = serde_json::from_value(body).unwrap();
    assert_eq!(decoded, snapshot);

    hub.stop().await.unwrap();
}

#[tokio::test]
async fn test_stats_collection_failure_is_500() {
    let source = StaticSource::new(create_snapshot(&[1.0], 1.0, &[]));
    source.fail.store(true, Ordering::SeqCst);
    let (hub, base) = start_server(source).await;

    let response = reqwest::get(endpoint(&base, "/api/stats")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);

    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("test failure"));

    hub.stop().await.unwrap();
}

#[tokio::test]
async fn test_sse_stream_frames_and_disconnect() {
    let (hub, base) = start_server(StaticSource::new(create_snapshot(&[1.0], 1.0, &[]))).await;

    let mut response = reqwest::get(endpoint(&base, "/api/stats/sse")).await.unwrap();
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );
    assert_eq!(response.headers()["cache-control"], "no-cache");

    wait_for_subscribers(&hub, 1).await;
    hub.broadcast(r#"{"n":1}"#).await.unwrap();
    hub.broadcast(r#"{"n":2}"#).await.unwrap();

    let mut received = String::new();
    while received.matches("\n\n").count() < 2 {
        let chunk = timeout(Duration::from_secs(2), response.chunk())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        received.push_str(std::str::from_utf8(&chunk).unwrap());
    }
    assert_eq!(received, "data: {\"n\":1}\n\ndata: {\"n\":2}\n\n");

    drop(response);

    // the server notices the closed connection on its next write
    for _ in 0..200 {
        if hub.subscriber_count().await.unwrap() == 0 {
            break;
        }
        hub.broadcast("{}").await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(hub.subscriber_count().await, Ok(0));

    hub.stop().await.unwrap();
}

#[tokio::test]
async fn test_sse_after_hub_stopped_is_unavailable() {
    let (hub, base) = start_server(StaticSource::new(create_snapshot(&[1.0], 1.0, &[]))).await;
    hub.stop().await.unwrap();

    let response = reqwest::get(endpoint(&base, "/api/stats/sse")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);

    let health: HealthResponse = reqwest::get(endpoint(&base, "/api/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health.status, "degraded");
}
