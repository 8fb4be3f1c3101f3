pub mod actors;
pub mod api;
pub mod collector;
pub mod config;
pub mod evaluator;
pub mod fetch;
pub mod notify;
pub mod util;

use serde::{Deserialize, Serialize};

/// One consolidated reading of the host.
///
/// Produced once per poll tick and never mutated afterwards; consumers receive
/// clones (or its serialized JSON form).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub host: HostInfo,
    pub memory: MemoryInfo,
    /// One entry per logical core, in the order reported by the OS.
    pub cpu: Vec<CpuInfo>,
    /// One entry per mounted partition.
    pub disk: Vec<DiskInfo>,
    /// One entry per network interface.
    pub network: Vec<NetworkInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostInfo {
    pub hostname: String,
    pub os: String,
    /// Seconds since boot
    pub uptime: u64,
}

/// Memory statistics in MiB.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryInfo {
    pub total: f64,
    pub used: f64,
    pub free: f64,
    pub swap_total: f64,
    pub swap_used: f64,
    pub swap_free: f64,
}

impl MemoryInfo {
    /// Used memory as a percentage of total, `None` when the total is unknown.
    pub fn used_percent(&self) -> Option<f64> {
        if self.total > 0.0 {
            Some(self.used / self.total * 100.0)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuInfo {
    /// Usage in percent
    pub usage: f64,
    pub model: String,
    pub cores: u32,
}

/// Disk partition statistics, sizes in bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskInfo {
    pub mountpoint: String,
    #[serde(rename = "type")]
    pub fs_type: String,
    pub total: f64,
    pub used: f64,
    pub free: f64,
    pub used_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    pub interface_name: String,
    pub total_bytes_sent: u64,
    pub total_bytes_recv: u64,
}

impl Snapshot {
    /// Arithmetic mean of all per-core usage values, `None` without cores.
    pub fn average_cpu_usage(&self) -> Option<f64> {
        if self.cpu.is_empty() {
            return None;
        }

        let sum = self.cpu.iter().map(|cpu| cpu.usage).sum::<f64>();
        Some(sum / self.cpu.len() as f64)
    }
}
