//! Boot epoch detection
//!
//! The boot epoch identifies the current boot session. Counters restart at
//! zero on reboot, so a changed epoch means a persisted usage baseline no
//! longer applies.

use super::UptimeSource;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tokio::fs;

/// Allowed drift between two epochs computed in the same boot session
///
/// Uptime is whole-second granular while the wall clock is not.
pub const BOOT_EPOCH_TOLERANCE_SECS: i64 = 2;

/// Uptime source backed by procfs
pub struct ProcUptime {
    path: PathBuf,
}

impl ProcUptime {
    pub fn new() -> Self {
        Self::with_path("/proc/uptime")
    }

    /// Read from a custom path (for testing)
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for ProcUptime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UptimeSource for ProcUptime {
    async fn uptime_secs(&self) -> Result<f64> {
        let content = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        parse_uptime(&content)
    }
}

/// Parse the seconds-since-boot value from the first token
pub fn parse_uptime(content: &str) -> Result<f64> {
    let first = content
        .split_whitespace()
        .next()
        .context("Uptime report is empty")?;
    let secs: f64 = first
        .parse()
        .with_context(|| format!("Failed to parse uptime value {:?}", first))?;
    if !secs.is_finite() || secs < 0.0 {
        anyhow::bail!("Uptime value out of range: {}", secs);
    }
    Ok(secs)
}

/// Boot epoch in whole seconds for a wall-clock instant and an uptime
pub fn boot_epoch(now: DateTime<Utc>, uptime_secs: f64) -> i64 {
    let now_secs = now.timestamp_millis() as f64 / 1000.0;
    (now_secs - uptime_secs).round() as i64
}

/// Boot epoch computed from the current wall clock
pub async fn current_boot_epoch(source: &dyn UptimeSource) -> Result<i64> {
    let uptime = source.uptime_secs().await?;
    Ok(boot_epoch(Utc::now(), uptime))
}

/// Whether the counters were reset since `last_known` was recorded
///
/// An unset (or non-positive) stored epoch never counts as a reset.
pub fn detect_boot_reset(last_known: Option<i64>, current: i64) -> bool {
    match last_known {
        Some(last) if last > 0 => (last - current).abs() > BOOT_EPOCH_TOLERANCE_SECS,
        _ => false,
    }
}
