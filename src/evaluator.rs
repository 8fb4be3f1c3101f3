use std::fmt;

use tracing::{debug, instrument, trace};

use crate::Snapshot;
use crate::config::Thresholds;

#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Cpu,
    Memory,
    Disk { mountpoint: String },
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Cpu => f.write_str("CPU"),
            Resource::Memory => f.write_str("memory"),
            Resource::Disk { mountpoint } => write!(f, "disk {mountpoint}"),
        }
    }
}

/// A resource whose usage is strictly above its threshold
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub resource: Resource,
    pub value: f64,
    pub threshold: f64,
}

impl Alert {
    pub fn message(&self, hostname: &str) -> String {
        match &self.resource {
            Resource::Cpu => format!(
                "⚠️ [{hostname}] CPU usage is at {:.1}% (threshold {:.0}%)",
                self.value, self.threshold
            ),
            Resource::Memory => format!(
                "⚠️ [{hostname}] Memory usage is at {:.1}% (threshold {:.0}%)",
                self.value, self.threshold
            ),
            Resource::Disk { mountpoint } => format!(
                "💾 [{hostname}] Disk usage on {mountpoint} is at {:.1}% (threshold {:.0}%)",
                self.value, self.threshold
            ),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Evaluator {
    thresholds: Thresholds,
}

impl Evaluator {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// At most one alert per resource; equality with the threshold never
    /// triggers. Missing categories are skipped.
    #[instrument(skip_all, fields(host = %snapshot.host.hostname))]
    pub fn evaluate(&self, snapshot: &Snapshot) -> Vec<Alert> {
        let mut alerts = Vec::new();

        match snapshot.average_cpu_usage() {
            Some(usage) => {
                trace!(usage, threshold = self.thresholds.cpu_threshold, "cpu");
                if usage > self.thresholds.cpu_threshold {
                    alerts.push(Alert {
                        resource: Resource::Cpu,
                        value: usage,
                        threshold: self.thresholds.cpu_threshold,
                    });
                }
            }
            None => debug!("no cpu cores reported, skipping cpu evaluation"),
        }

        match snapshot.memory.used_percent() {
            Some(usage) => {
                trace!(usage, threshold = self.thresholds.memory_threshold, "memory");
                if usage > self.thresholds.memory_threshold {
                    alerts.push(Alert {
                        resource: Resource::Memory,
                        value: usage,
                        threshold: self.thresholds.memory_threshold,
                    });
                }
            }
            None => debug!("total memory is zero, skipping memory evaluation"),
        }

        if snapshot.disk.is_empty() {
            debug!("no disk partitions reported, skipping disk evaluation");
        }

        alerts.extend(
            snapshot
                .disk
                .iter()
                .filter(|disk| disk.used_percent > self.thresholds.disk_threshold)
                .map(|disk| Alert {
                    resource: Resource::Disk {
                        mountpoint: disk.mountpoint.clone(),
                    },
                    value: disk.used_percent,
                    threshold: self.thresholds.disk_threshold,
                }),
        );

        if !alerts.is_empty() {
            debug!(count = alerts.len(), "thresholds exceeded");
        }

        alerts
    }
}
