//! Observability infrastructure for the throughput monitor
//!
//! Provides:
//! - Prometheus metrics (current speeds, usage, tick and failure counters)
//! - Textfile export for node-exporter style collectors
//! - Structured lifecycle logging with tracing

use crate::models::AggregateMetrics;
use anyhow::{Context, Result};
use prometheus::{
    register_gauge, register_int_counter, register_int_gauge, Encoder, Gauge, IntCounter,
    IntGauge, TextEncoder,
};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<NetSpeedMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct NetSpeedMetricsInner {
    speed_down_bytes: Gauge,
    speed_up_bytes: Gauge,
    speed_total_bytes: Gauge,
    usage_total_bytes: Gauge,
    tracked_interfaces: IntGauge,
    ticks: IntCounter,
    source_read_failures: IntCounter,
    boot_resets: IntCounter,
    usage_resets: IntCounter,
}

impl NetSpeedMetricsInner {
    fn new() -> Self {
        Self {
            speed_down_bytes: register_gauge!(
                "netspeed_speed_down_bytes_per_second",
                "Download rate over the last sampling interval"
            )
            .expect("Failed to register speed_down_bytes"),

            speed_up_bytes: register_gauge!(
                "netspeed_speed_up_bytes_per_second",
                "Upload rate over the last sampling interval"
            )
            .expect("Failed to register speed_up_bytes"),

            speed_total_bytes: register_gauge!(
                "netspeed_speed_total_bytes_per_second",
                "Combined rate over the last sampling interval"
            )
            .expect("Failed to register speed_total_bytes"),

            usage_total_bytes: register_gauge!(
                "netspeed_usage_total_bytes",
                "Bytes transferred since the usage baseline"
            )
            .expect("Failed to register usage_total_bytes"),

            tracked_interfaces: register_int_gauge!(
                "netspeed_tracked_interfaces",
                "Number of interfaces in the tracked set"
            )
            .expect("Failed to register tracked_interfaces"),

            ticks: register_int_counter!(
                "netspeed_ticks_total",
                "Total number of sampling ticks"
            )
            .expect("Failed to register ticks"),

            source_read_failures: register_int_counter!(
                "netspeed_source_read_failures_total",
                "Ticks where the counter source could not be read or parsed"
            )
            .expect("Failed to register source_read_failures"),

            boot_resets: register_int_counter!(
                "netspeed_boot_resets_total",
                "Starts where a reboot invalidated the persisted baseline"
            )
            .expect("Failed to register boot_resets"),

            usage_resets: register_int_counter!(
                "netspeed_usage_resets_total",
                "Explicit usage counter resets"
            )
            .expect("Failed to register usage_resets"),
        }
    }
}

/// Monitor metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct NetSpeedMetrics {
    _private: (),
}

impl Default for NetSpeedMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl NetSpeedMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(NetSpeedMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &NetSpeedMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Record the outcome of one tick
    pub fn record_tick(&self, metrics: &AggregateMetrics) {
        let inner = self.inner();
        inner.ticks.inc();
        inner.speed_down_bytes.set(metrics.speed_down);
        inner.speed_up_bytes.set(metrics.speed_up);
        inner.speed_total_bytes.set(metrics.speed_total);
        inner.usage_total_bytes.set(metrics.usage_total);
    }

    pub fn set_tracked_interfaces(&self, count: i64) {
        self.inner().tracked_interfaces.set(count);
    }

    pub fn inc_source_read_failures(&self) {
        self.inner().source_read_failures.inc();
    }

    pub fn inc_boot_resets(&self) {
        self.inner().boot_resets.inc();
    }

    pub fn inc_usage_resets(&self) {
        self.inner().usage_resets.inc();
    }

    /// Render all registered metrics in the text exposition format
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = prometheus::gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .context("Failed to encode metrics")?;
        String::from_utf8(buffer).context("Metrics output is not valid UTF-8")
    }

    /// Write the exposition text to `path`, replacing it atomically
    pub fn export_textfile(&self, path: &Path) -> Result<()> {
        let body = self.render()?;
        let tmp_path = path.with_extension("prom.tmp");
        std::fs::write(&tmp_path, body)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to move metrics into {}", path.display()))?;
        Ok(())
    }
}

/// Structured logger for monitor lifecycle events
#[derive(Clone)]
pub struct StructuredLogger {
    host: String,
}

impl StructuredLogger {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    /// Log monitor start
    pub fn log_started(&self, interfaces: &[String], interval_secs: u64, boot_reset: bool) {
        info!(
            event = "monitor_started",
            host = %self.host,
            interfaces = ?interfaces,
            interval_secs = interval_secs,
            boot_reset = boot_reset,
            "Throughput monitor started"
        );
    }

    /// Log a reboot that invalidated the persisted baseline
    pub fn log_boot_reset(&self, last_boot_time: i64, current_boot_time: i64) {
        warn!(
            event = "boot_reset_detected",
            host = %self.host,
            last_boot_time = last_boot_time,
            current_boot_time = current_boot_time,
            "Counters reset since last run, usage baseline cleared"
        );
    }

    /// Log an explicit usage reset
    pub fn log_usage_reset(&self, initial_received: u64, initial_transmitted: u64) {
        info!(
            event = "usage_reset",
            host = %self.host,
            initial_received = initial_received,
            initial_transmitted = initial_transmitted,
            "Usage counter reset"
        );
    }

    /// Log an applied settings change
    pub fn log_settings_change(&self, key: &str) {
        info!(
            event = "settings_changed",
            host = %self.host,
            key = %key,
            "Settings changed"
        );
    }

    /// Log a rejected settings change
    pub fn log_settings_rejected(&self, key: &str, reason: &str) {
        warn!(
            event = "settings_rejected",
            host = %self.host,
            key = %key,
            reason = %reason,
            "Settings change rejected, keeping previous snapshot"
        );
    }

    /// Log monitor stop
    pub fn log_stopped(&self, initial_received: u64, initial_transmitted: u64, persisted: bool) {
        info!(
            event = "monitor_stopped",
            host = %self.host,
            initial_received = initial_received,
            initial_transmitted = initial_transmitted,
            persisted = persisted,
            "Throughput monitor stopped"
        );
    }
}
