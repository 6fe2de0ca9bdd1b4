//! Core data models for the throughput monitor

use serde::{Deserialize, Serialize};
use std::fmt;

/// Counter state for a single network interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceSample {
    pub name: String,
    pub total_received: u64,
    pub total_transmitted: u64,
    pub last_received: u64,
    pub last_transmitted: u64,
    pub initial_received: u64,
    pub initial_transmitted: u64,
    /// Consecutive successful reads in which the interface was absent
    pub missed_reads: u32,
}

impl InterfaceSample {
    /// Create a sample for an interface seen for the first time
    pub fn new(name: impl Into<String>, received: u64, transmitted: u64) -> Self {
        Self {
            name: name.into(),
            total_received: received,
            total_transmitted: transmitted,
            last_received: received,
            last_transmitted: transmitted,
            initial_received: received,
            initial_transmitted: transmitted,
            missed_reads: 0,
        }
    }

    /// Record a fresh counter reading
    pub fn observe(&mut self, received: u64, transmitted: u64) {
        self.last_received = self.total_received;
        self.last_transmitted = self.total_transmitted;
        self.total_received = received;
        self.total_transmitted = transmitted;
        self.missed_reads = 0;
    }

    /// Bytes received between the two most recent reads
    pub fn just_received(&self) -> u64 {
        self.total_received.saturating_sub(self.last_received)
    }

    /// Bytes transmitted between the two most recent reads
    pub fn just_transmitted(&self) -> u64 {
        self.total_transmitted.saturating_sub(self.last_transmitted)
    }
}

/// Raw counters for one interface as reported by the counter source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceCounters {
    pub name: String,
    pub received: u64,
    pub transmitted: u64,
}

/// Derived metrics for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    /// Bytes per second received over the last interval
    pub speed_down: f64,
    /// Bytes per second transmitted over the last interval
    pub speed_up: f64,
    pub speed_total: f64,
    /// Bytes since the usage baseline
    pub usage_total: f64,
}

impl AggregateMetrics {
    /// Value of a single metric
    pub fn get(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::SpeedDown => self.speed_down,
            MetricKind::SpeedUp => self.speed_up,
            MetricKind::SpeedTotal => self.speed_total,
            MetricKind::UsageTotal => self.usage_total,
        }
    }
}

/// Usage baseline the cumulative total is measured against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Baseline {
    pub initial_received: u64,
    pub initial_transmitted: u64,
}

/// Values carried between runs by an external store
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PersistedState {
    pub initial_receive_count: u64,
    pub initial_transmit_count: u64,
    /// Boot epoch in whole seconds, 0 when unknown
    pub last_boot_time: i64,
}

impl PersistedState {
    pub fn new(baseline: Baseline, boot_epoch: Option<i64>) -> Self {
        Self {
            initial_receive_count: baseline.initial_received,
            initial_transmit_count: baseline.initial_transmitted,
            last_boot_time: boot_epoch.unwrap_or(0),
        }
    }

    pub fn baseline(&self) -> Baseline {
        Baseline {
            initial_received: self.initial_receive_count,
            initial_transmitted: self.initial_transmit_count,
        }
    }

    /// Stored boot epoch, if one was ever recorded
    pub fn boot_epoch(&self) -> Option<i64> {
        (self.last_boot_time > 0).then_some(self.last_boot_time)
    }
}

/// The four displayed metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    SpeedDown,
    SpeedUp,
    SpeedTotal,
    UsageTotal,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::SpeedDown,
        MetricKind::SpeedUp,
        MetricKind::SpeedTotal,
        MetricKind::UsageTotal,
    ];

    /// Decoration shown when custom decorations are disabled
    pub fn default_decoration(&self) -> &'static str {
        match self {
            MetricKind::SpeedDown => "↓",
            MetricKind::SpeedUp => "↑",
            MetricKind::SpeedTotal => "⇵",
            MetricKind::UsageTotal => "Σ",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::SpeedDown => "down",
            MetricKind::SpeedUp => "up",
            MetricKind::SpeedTotal => "total",
            MetricKind::UsageTotal => "usage",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
