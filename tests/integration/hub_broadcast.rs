//! Broadcast hub behaviour under concurrent clients

use std::collections::HashSet;
use std::time::Duration;

use delphos::actors::{BroadcastHub, HubError};
use futures::StreamExt;
use pretty_assertions::assert_eq;
use tokio::time::timeout;

#[tokio::test]
async fn test_concurrent_subscribers_receive_every_message_in_order() {
    let hub = BroadcastHub::new(64);
    hub.start().unwrap();

    let mut readers = Vec::new();
    for _ in 0..10 {
        let subscription = hub.subscribe().await.unwrap();
        readers.push(tokio::spawn(async move {
            subscription
                .take(20)
                .map(|message| message.to_string())
                .collect::<Vec<_>>()
                .await
        }));
    }

    for i in 0..20 {
        hub.broadcast(format!("{i}")).await.unwrap();
    }

    let expected: Vec<String> = (0..20).map(|i| i.to_string()).collect();
    for reader in readers {
        let received = timeout(Duration::from_secs(2), reader)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, expected);
    }

    hub.stop().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_subscribe_and_broadcast() {
    let hub = BroadcastHub::new(64);
    hub.start().unwrap();

    let mut tasks = Vec::new();
    for n in 0..8 {
        let hub = hub.clone();
        tasks.push(tokio::spawn(async move {
            let mut subscription = hub.subscribe().await.unwrap();
            let marker = format!("marker-{n}");
            hub.broadcast(marker.clone()).await.unwrap();

            // our own marker is always delivered, whatever other tasks broadcast
            let mut seen = HashSet::new();
            while let Ok(Some(message)) =
                timeout(Duration::from_secs(2), subscription.recv()).await
            {
                seen.insert(message.to_string());
                if seen.contains(&marker) {
                    break;
                }
            }
            seen.contains(&marker)
        }));
    }

    for task in tasks {
        assert!(task.await.unwrap());
    }

    hub.stop().await.unwrap();
}

#[tokio::test]
async fn test_disconnected_clients_are_removed() {
    let hub = BroadcastHub::new(8);
    hub.start().unwrap();

    let subscriptions: Vec<_> = futures::future::join_all((0..5).map(|_| hub.subscribe()))
        .await
        .into_iter()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(hub.subscriber_count().await, Ok(5));

    drop(subscriptions);
    assert_eq!(hub.subscriber_count().await, Ok(0));

    hub.stop().await.unwrap();
    assert_eq!(hub.subscriber_count().await, Err(HubError::Stopped));
}
