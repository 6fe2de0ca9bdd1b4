//! Counter tracking across ticks
//!
//! Keeps previous-sample state per interface and in aggregate, and derives
//! interval speeds and cumulative usage from it.

use super::{parse_net_dev, CounterSource};
use crate::error::NetSpeedError;
use crate::models::{AggregateMetrics, Baseline, InterfaceCounters, InterfaceSample};
use crate::observability::NetSpeedMetrics;
use crate::settings::Settings;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Successful reads an interface may be absent from before it is pruned
pub const STALE_GRACE_READS: u32 = 1;

/// Lifecycle state of the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Stopped,
    Running,
}

/// Tracks cumulative counters for the configured interface set
pub struct CounterTracker {
    source: Arc<dyn CounterSource>,
    state: TrackerState,
    interfaces: BTreeMap<String, InterfaceSample>,
    total_received: u64,
    total_transmitted: u64,
    initial_received: u64,
    initial_transmitted: u64,
    metrics: NetSpeedMetrics,
}

impl CounterTracker {
    pub fn new(source: Arc<dyn CounterSource>) -> Self {
        Self {
            source,
            state: TrackerState::Stopped,
            interfaces: BTreeMap::new(),
            total_received: 0,
            total_transmitted: 0,
            initial_received: 0,
            initial_transmitted: 0,
            metrics: NetSpeedMetrics::new(),
        }
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    /// Aggregate totals from the most recent tick
    pub fn totals(&self) -> (u64, u64) {
        (self.total_received, self.total_transmitted)
    }

    pub fn baseline(&self) -> Baseline {
        Baseline {
            initial_received: self.initial_received,
            initial_transmitted: self.initial_transmitted,
        }
    }

    /// Per-interface state, ordered by name
    pub fn interfaces(&self) -> impl Iterator<Item = &InterfaceSample> {
        self.interfaces.values()
    }

    pub fn interface(&self, name: &str) -> Option<&InterfaceSample> {
        self.interfaces.get(name)
    }

    /// Read the counter source and sum the tracked interfaces
    ///
    /// An unreadable or unparseable report yields the previous totals, so
    /// the tick that follows shows no traffic instead of failing.
    pub async fn sample(&mut self, tracked: &[String]) -> (u64, u64) {
        let report = match self.source.read_report().await {
            Ok(report) => report,
            Err(e) => {
                self.metrics.inc_source_read_failures();
                debug!(error = %e, "Counter source unreadable, keeping previous totals");
                return (self.total_received, self.total_transmitted);
            }
        };

        let counters = parse_net_dev(&report);
        if counters.is_empty() {
            self.metrics.inc_source_read_failures();
            debug!("Counter report contained no interfaces, keeping previous totals");
            return (self.total_received, self.total_transmitted);
        }

        self.refresh_interfaces(&counters);

        let mut received = 0u64;
        let mut transmitted = 0u64;
        for counter in counters
            .iter()
            .filter(|c| tracked.iter().any(|name| name == &c.name))
        {
            received = received.saturating_add(counter.received);
            transmitted = transmitted.saturating_add(counter.transmitted);
        }

        (received, transmitted)
    }

    /// Update per-interface samples and prune interfaces that went away
    fn refresh_interfaces(&mut self, counters: &[InterfaceCounters]) {
        for sample in self.interfaces.values_mut() {
            sample.missed_reads += 1;
        }

        for counter in counters {
            self.interfaces
                .entry(counter.name.clone())
                .and_modify(|s| s.observe(counter.received, counter.transmitted))
                .or_insert_with(|| {
                    debug!(interface = %counter.name, "Tracking new interface");
                    InterfaceSample::new(&counter.name, counter.received, counter.transmitted)
                });
        }

        self.interfaces.retain(|name, sample| {
            let keep = sample.missed_reads <= STALE_GRACE_READS;
            if !keep {
                debug!(interface = %name, "Pruning vanished interface");
            }
            keep
        });
    }

    /// Transition Stopped -> Running
    ///
    /// Seeds the totals with a first sample. The usage baseline is zero after
    /// a boot reset, the current totals when nothing was persisted, and the
    /// persisted values otherwise.
    pub async fn start(
        &mut self,
        tracked: &[String],
        persisted: Option<Baseline>,
        boot_reset: bool,
    ) -> Result<Baseline, NetSpeedError> {
        if self.state == TrackerState::Running {
            return Err(NetSpeedError::AlreadyRunning);
        }

        let (received, transmitted) = self.sample(tracked).await;
        self.total_received = received;
        self.total_transmitted = transmitted;

        let baseline = if boot_reset {
            for sample in self.interfaces.values_mut() {
                sample.initial_received = 0;
                sample.initial_transmitted = 0;
            }
            Baseline::default()
        } else {
            persisted.unwrap_or(Baseline {
                initial_received: received,
                initial_transmitted: transmitted,
            })
        };

        self.initial_received = baseline.initial_received;
        self.initial_transmitted = baseline.initial_transmitted;
        self.state = TrackerState::Running;

        Ok(baseline)
    }

    /// Sample once and derive speeds and usage for the elapsed interval
    ///
    /// A change of the tracked set between ticks makes the aggregate jump;
    /// the baseline is deliberately left alone.
    pub async fn tick(&mut self, settings: &Settings) -> Result<AggregateMetrics, NetSpeedError> {
        if self.state != TrackerState::Running {
            return Err(NetSpeedError::NotRunning);
        }

        let (received, transmitted) = self.sample(&settings.interfaces).await;

        let just_received = received as i128 - self.total_received as i128;
        let just_transmitted = transmitted as i128 - self.total_transmitted as i128;
        if just_received < 0 || just_transmitted < 0 {
            warn!(
                just_received = just_received as i64,
                just_transmitted = just_transmitted as i64,
                "Aggregate counters went backwards"
            );
        }

        self.total_received = received;
        self.total_transmitted = transmitted;

        let interval_secs = settings.update_interval.max(1) as f64;
        let speed_down = just_received as f64 / interval_secs;
        let speed_up = just_transmitted as f64 / interval_secs;
        let usage_total = (received as i128 - self.initial_received as i128)
            + (transmitted as i128 - self.initial_transmitted as i128);

        Ok(AggregateMetrics {
            speed_down,
            speed_up,
            speed_total: speed_down + speed_up,
            usage_total: usage_total as f64,
        })
    }

    /// Restart usage accounting from the current totals
    pub fn reset_usage_counter(&mut self) {
        self.initial_received = self.total_received;
        self.initial_transmitted = self.total_transmitted;
        for sample in self.interfaces.values_mut() {
            sample.initial_received = sample.total_received;
            sample.initial_transmitted = sample.total_transmitted;
        }
    }

    /// Transition Running -> Stopped, returning the baseline to persist
    pub fn stop(&mut self) -> Result<Baseline, NetSpeedError> {
        if self.state != TrackerState::Running {
            return Err(NetSpeedError::NotRunning);
        }
        self.state = TrackerState::Stopped;
        self.interfaces.clear();
        Ok(self.baseline())
    }
}
