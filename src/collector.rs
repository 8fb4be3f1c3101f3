//! Host metric collection

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sysinfo::{Disks, Networks, System};
use thiserror::Error;
use tracing::{instrument, trace};

use crate::{CpuInfo, DiskInfo, HostInfo, MemoryInfo, NetworkInfo, Snapshot};

const MIB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("metrics task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("system handle poisoned by an earlier panic")]
    Poisoned,

    #[error("metrics source unavailable: {0}")]
    Unavailable(String),
}

/// Produces complete snapshots; a failed collection yields no snapshot at all
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn collect(&self) -> Result<Snapshot, CollectionError>;
}

/// [`MetricsSource`] reading the local host through `sysinfo`
#[derive(Debug, Clone)]
pub struct SysinfoCollector {
    system: Arc<Mutex<System>>,
}

impl Default for SysinfoCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoCollector {
    pub fn new() -> Self {
        Self {
            system: Arc::new(Mutex::new(System::new_all())),
        }
    }
}

#[async_trait]
impl MetricsSource for SysinfoCollector {
    #[instrument(skip(self))]
    async fn collect(&self) -> Result<Snapshot, CollectionError> {
        let system = self.system.clone();
        let snapshot = tokio::task::spawn_blocking(move || -> Result<Snapshot, CollectionError> {
            let mut sys = system.lock().map_err(|_| CollectionError::Poisoned)?;
            check_complete(sample(&mut sys))
        })
        .await??;

        trace!(
            cores = snapshot.cpu.len(),
            disks = snapshot.disk.len(),
            interfaces = snapshot.network.len(),
            "collected snapshot"
        );

        Ok(snapshot)
    }
}

/// Rejects readings that lack CPU or memory data.
fn check_complete(snapshot: Snapshot) -> Result<Snapshot, CollectionError> {
    if snapshot.cpu.is_empty() {
        return Err(CollectionError::Unavailable("no cpu reported".to_string()));
    }
    if snapshot.memory.total <= 0.0 {
        return Err(CollectionError::Unavailable("no memory reported".to_string()));
    }
    Ok(snapshot)
}

fn sample(sys: &mut System) -> Snapshot {
    // cpu usage is the delta between two refreshes
    sys.refresh_cpu_usage();
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu_usage();
    sys.refresh_memory();

    let physical_cores = System::physical_core_count().unwrap_or(sys.cpus().len()) as u32;

    let cpu = sys
        .cpus()
        .iter()
        .map(|cpu| CpuInfo {
            usage: f64::from(cpu.cpu_usage()),
            model: cpu.brand().to_string(),
            cores: physical_cores,
        })
        .collect();

    let total = sys.total_memory() as f64;
    let used = sys.used_memory() as f64;
    let memory = MemoryInfo {
        total: total / MIB,
        used: used / MIB,
        free: (total - used).max(0.0) / MIB,
        swap_total: sys.total_swap() as f64 / MIB,
        swap_used: sys.used_swap() as f64 / MIB,
        swap_free: sys.free_swap() as f64 / MIB,
    };

    let disks = Disks::new_with_refreshed_list();
    let disk = disks
        .list()
        .iter()
        .map(|disk| {
            let total = disk.total_space() as f64;
            let free = disk.available_space() as f64;
            let used = (total - free).max(0.0);
            DiskInfo {
                mountpoint: disk.mount_point().to_string_lossy().into_owned(),
                fs_type: disk.file_system().to_string_lossy().into_owned(),
                total,
                used,
                free,
                used_percent: if total > 0.0 { used / total * 100.0 } else { 0.0 },
            }
        })
        .collect();

    let networks = Networks::new_with_refreshed_list();
    let mut network: Vec<NetworkInfo> = networks
        .list()
        .iter()
        .map(|(name, data)| NetworkInfo {
            interface_name: name.clone(),
            total_bytes_sent: data.total_transmitted(),
            total_bytes_recv: data.total_received(),
        })
        .collect();
    network.sort_by(|a, b| a.interface_name.cmp(&b.interface_name));

    Snapshot {
        host: HostInfo {
            hostname: System::host_name().unwrap_or_else(|| "unknown".to_string()),
            os: System::long_os_version()
                .or_else(System::name)
                .unwrap_or_else(|| std::env::consts::OS.to_string()),
            uptime: System::uptime(),
        },
        memory,
        cpu,
        disk,
        network,
    }
}
