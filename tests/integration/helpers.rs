//! Helper functions for integration tests

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use delphos::{
    CpuInfo, DiskInfo, HostInfo, MemoryInfo, NetworkInfo, Snapshot,
    collector::{CollectionError, MetricsSource},
    fetch::{DISCORD, ResilientClient, RetryPolicy, ServiceRegistry},
};

pub fn create_snapshot(cores: &[f64], memory_used_percent: f64, disks: &[(&str, f64)]) -> Snapshot {
    Snapshot {
        host: HostInfo {
            hostname: "test-host".to_string(),
            os: "TestOS 1.0".to_string(),
            uptime: 42,
        },
        memory: MemoryInfo {
            total: 16384.0,
            used: 16384.0 * memory_used_percent / 100.0,
            free: 16384.0 * (100.0 - memory_used_percent) / 100.0,
            swap_total: 2048.0,
            swap_used: 0.0,
            swap_free: 2048.0,
        },
        cpu: cores
            .iter()
            .map(|usage| CpuInfo {
                usage: *usage,
                model: "Test CPU".to_string(),
                cores: cores.len() as u32,
            })
            .collect(),
        disk: disks
            .iter()
            .map(|(mountpoint, used_percent)| DiskInfo {
                mountpoint: mountpoint.to_string(),
                fs_type: "ext4".to_string(),
                total: 1_000_000.0,
                used: 10_000.0 * used_percent,
                free: 1_000_000.0 - 10_000.0 * used_percent,
                used_percent: *used_percent,
            })
            .collect(),
        network: vec![NetworkInfo {
            interface_name: "eth0".to_string(),
            total_bytes_sent: 1024,
            total_bytes_recv: 2048,
        }],
    }
}

/// Client whose DISCORD service points at a mock server
pub fn create_test_client(mock_uri: &str, max_retries: u32) -> ResilientClient {
    ResilientClient::new(
        ServiceRegistry::new().with_service(DISCORD, mock_uri),
        RetryPolicy {
            max_retries,
            retry_delay: Duration::from_millis(20),
        },
        Duration::from_secs(5),
    )
    .unwrap()
}

/// Metrics source returning a fixed snapshot, or failing on demand
pub struct StaticSource {
    pub snapshot: Snapshot,
    pub fail: AtomicBool,
}

impl StaticSource {
    pub fn new(snapshot: Snapshot) -> Arc<Self> {
        Arc::new(Self {
            snapshot,
            fail: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl MetricsSource for StaticSource {
    async fn collect(&self) -> Result<Snapshot, CollectionError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CollectionError::Unavailable("test failure".to_string()));
        }
        Ok(self.snapshot.clone())
    }
}
