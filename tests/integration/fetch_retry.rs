//! Outbound client used through the `Fetcher` trait object

use std::sync::Arc;
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use delphos::fetch::{DISCORD, FetchError, Fetcher, Request};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::create_test_client;

#[tokio::test]
async fn test_request_described_as_json() {
    let mock_server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/channels/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher: Arc<dyn Fetcher> = Arc::new(create_test_client(&mock_server.uri(), 0));
    let request: Request = serde_json::from_value(json!({
        "service": DISCORD,
        "url": "channels/1",
        "method": "put",
        "body": {"name": "alerts"}
    }))
    .unwrap();

    let response = fetcher.fetch(request).await.unwrap();

    assert!(response.success);
    assert_eq!(response.json::<serde_json::Value>().unwrap(), json!({"ok": true}));
}

#[tokio::test]
async fn test_retries_are_sequential_with_constant_delay() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;

    let fetcher = create_test_client(&mock_server.uri(), 2);

    let started = Instant::now();
    let response = fetcher.post(DISCORD, "/hook", None, None).await.unwrap();

    // two retries, each preceded by the 20ms delay
    assert!(started.elapsed() >= Duration::from_millis(40));
    assert_eq!(response.attempts, 3);
    assert_eq!(response.code, Some(500));
    assert!(!response.success);
}

#[tokio::test]
async fn test_validation_failures_make_no_network_calls() {
    let mock_server = MockServer::start().await;
    let fetcher = create_test_client(&mock_server.uri(), 3);

    assert_matches!(
        fetcher.get("SLACK", "/x", None).await,
        Err(FetchError::UnknownService(_))
    );
    assert_matches!(
        fetcher.post(DISCORD, " \t ", None, None).await,
        Err(FetchError::EmptyPath)
    );
    assert_matches!(
        fetcher
            .fetch(Request::new(DISCORD, "/x", "DELETE".parse().unwrap()).body(json!({"a": 1})))
            .await,
        Err(FetchError::BodyNotAllowed(_))
    );
    assert_matches!(
        "CONNECT".parse::<delphos::fetch::Method>(),
        Err(FetchError::UnknownMethod(_))
    );

    assert!(mock_server.received_requests().await.unwrap().is_empty());
}
