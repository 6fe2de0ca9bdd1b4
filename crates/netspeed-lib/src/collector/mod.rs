//! Network counter collection
//!
//! This module reads cumulative per-interface byte counters and system
//! uptime, tracks them across ticks, and drives the periodic sampling loop.
//! Raw sources sit behind traits so hosts and tests can substitute them.

mod net_dev;
mod tracker;
mod uptime;
mod r#loop;

#[cfg(test)]
mod tests;

pub use net_dev::{parse_net_dev, ProcNetDev};
pub use r#loop::{MonitorBuilder, MonitorCommand, MonitorHandle, SamplingLoop, TickTimer};
pub use tracker::{CounterTracker, TrackerState, STALE_GRACE_READS};
pub use uptime::{
    boot_epoch, current_boot_epoch, detect_boot_reset, parse_uptime, ProcUptime,
    BOOT_EPOCH_TOLERANCE_SECS,
};

use anyhow::Result;

pub use async_trait::async_trait;

/// Source of the raw per-interface counter report
#[async_trait]
pub trait CounterSource: Send + Sync {
    /// Read the full report text
    async fn read_report(&self) -> Result<String>;
}

/// Source of the seconds elapsed since boot
#[async_trait]
pub trait UptimeSource: Send + Sync {
    async fn uptime_secs(&self) -> Result<f64>;
}
