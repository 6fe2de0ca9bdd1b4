//! Sampling loop
//!
//! A single task owns the tracker, the settings snapshot, the tick timer and
//! the label sink. Control commands arrive over a channel and are applied
//! between ticks, never during one.

use super::{
    current_boot_epoch, detect_boot_reset, CounterSource, CounterTracker, ProcNetDev, ProcUptime,
    UptimeSource,
};
use crate::display::{apply_layout, render, render_usage_reset, LabelSink};
use crate::error::NetSpeedError;
use crate::models::{AggregateMetrics, PersistedState};
use crate::observability::{NetSpeedMetrics, StructuredLogger};
use crate::settings::{Settings, SettingsChange};
use crate::store::{BaselineStore, MemoryStore};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Control messages for a running loop
#[derive(Debug, Clone)]
pub enum MonitorCommand {
    /// Restart usage accounting from the current totals
    ResetUsage,
    /// Apply a single settings change
    Apply(SettingsChange),
    /// Replace the whole settings snapshot
    Replace(Settings),
    Stop,
}

/// Cancellable repeating timer
///
/// Re-arming replaces the underlying interval, so a stale schedule can never
/// fire alongside the new one.
pub struct TickTimer {
    interval: Option<Interval>,
}

impl TickTimer {
    pub fn new() -> Self {
        Self { interval: None }
    }

    /// Schedule ticks every `period`, the first one at `start`
    pub fn arm(&mut self, start: Instant, period: Duration) {
        let mut interval = interval_at(start, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
    }

    pub fn cancel(&mut self) {
        self.interval = None;
    }

    pub fn is_armed(&self) -> bool {
        self.interval.is_some()
    }

    pub fn period(&self) -> Option<Duration> {
        self.interval.as_ref().map(|i| i.period())
    }

    /// Wait for the next tick; never completes while cancelled
    pub async fn tick(&mut self) -> Instant {
        match self.interval.as_mut() {
            Some(interval) => interval.tick().await,
            None => std::future::pending().await,
        }
    }
}

impl Default for TickTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Periodic sampling loop
pub struct SamplingLoop {
    tracker: CounterTracker,
    uptime: Arc<dyn UptimeSource>,
    store: Arc<dyn BaselineStore>,
    sink: Box<dyn LabelSink>,
    settings: Arc<Settings>,
    timer: TickTimer,
    last_tick: Option<Instant>,
    last_metrics: Option<AggregateMetrics>,
    boot_epoch: Option<i64>,
    /// Start-up epoch could not be read and `boot_epoch` is the persisted one
    boot_epoch_unverified: bool,
    metrics_textfile: Option<PathBuf>,
    metrics: NetSpeedMetrics,
    logger: StructuredLogger,
    commands: mpsc::Receiver<MonitorCommand>,
    published: watch::Sender<AggregateMetrics>,
}

impl SamplingLoop {
    /// Current settings snapshot
    pub fn settings(&self) -> Arc<Settings> {
        Arc::clone(&self.settings)
    }

    /// Receiver for the metrics of every completed tick
    pub fn subscribe(&self) -> watch::Receiver<AggregateMetrics> {
        self.published.subscribe()
    }

    /// Spawn the loop onto the current runtime
    pub fn spawn(self, commands: mpsc::Sender<MonitorCommand>) -> MonitorHandle {
        let metrics = self.subscribe();
        let task = tokio::spawn(self.run());
        MonitorHandle {
            commands,
            metrics,
            task,
        }
    }

    /// Start tracking, tick until stopped, then persist the baseline
    pub async fn run(mut self) -> Result<PersistedState> {
        self.start().await?;

        loop {
            tokio::select! {
                at = self.timer.tick() => {
                    self.on_tick(at).await;
                }
                command = self.commands.recv() => match command {
                    Some(MonitorCommand::ResetUsage) => self.reset_usage(),
                    Some(MonitorCommand::Apply(change)) => self.apply_change(change),
                    Some(MonitorCommand::Replace(next)) => self.replace_settings(next),
                    Some(MonitorCommand::Stop) | None => break,
                },
            }
        }

        self.shutdown().await
    }

    async fn start(&mut self) -> Result<()> {
        let persisted = match self.store.load() {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "Failed to load persisted baseline, starting fresh");
                None
            }
        };

        let last_boot = persisted.and_then(|p| p.boot_epoch());
        self.boot_epoch = match current_boot_epoch(self.uptime.as_ref()).await {
            Ok(epoch) => Some(epoch),
            Err(e) => {
                // Without a current epoch the restored baseline stays tied to its own boot
                warn!(error = %e, "Failed to determine boot epoch, keeping persisted value");
                self.boot_epoch_unverified = last_boot.is_some();
                last_boot
            }
        };

        let boot_reset = match (last_boot, self.boot_epoch) {
            (Some(last), Some(current)) if detect_boot_reset(Some(last), current) => {
                self.metrics.inc_boot_resets();
                self.logger.log_boot_reset(last, current);
                true
            }
            _ => false,
        };

        let settings = Arc::clone(&self.settings);
        let baseline = self
            .tracker
            .start(
                &settings.interfaces,
                persisted.map(|p| p.baseline()),
                boot_reset,
            )
            .await?;
        debug!(
            initial_received = baseline.initial_received,
            initial_transmitted = baseline.initial_transmitted,
            "Usage baseline established"
        );

        apply_layout(self.sink.as_mut(), &settings);
        self.metrics
            .set_tracked_interfaces(settings.interfaces.len() as i64);
        self.logger
            .log_started(&settings.interfaces, settings.update_interval, boot_reset);

        // First tick fires immediately
        self.timer.arm(Instant::now(), settings.interval());
        Ok(())
    }

    async fn on_tick(&mut self, at: Instant) {
        self.last_tick = Some(at);
        let settings = Arc::clone(&self.settings);

        let metrics = match self.tracker.tick(&settings).await {
            Ok(metrics) => metrics,
            Err(e) => {
                warn!(error = %e, "Tick skipped");
                return;
            }
        };

        render(self.sink.as_mut(), &settings, &metrics);
        self.last_metrics = Some(metrics);
        self.metrics.record_tick(&metrics);
        self.published.send_replace(metrics);

        if let Some(path) = &self.metrics_textfile {
            if let Err(e) = self.metrics.export_textfile(path) {
                warn!(error = %e, "Failed to export metrics textfile");
            }
        }
    }

    fn reset_usage(&mut self) {
        self.tracker.reset_usage_counter();
        if let Some(metrics) = self.last_metrics.as_mut() {
            metrics.usage_total = 0.0;
        }
        render_usage_reset(self.sink.as_mut(), &self.settings);

        let baseline = self.tracker.baseline();
        self.metrics.inc_usage_resets();
        self.logger
            .log_usage_reset(baseline.initial_received, baseline.initial_transmitted);
    }

    fn apply_change(&mut self, change: SettingsChange) {
        let key = change.key();
        match self.settings.apply(change.clone()) {
            Ok(next) => {
                self.settings = Arc::new(next);
                self.on_settings_changed(&change);
                self.logger.log_settings_change(key);
            }
            Err(e) => self.logger.log_settings_rejected(key, &e.to_string()),
        }
    }

    fn replace_settings(&mut self, next: Settings) {
        if let Err(e) = next.validate() {
            self.logger.log_settings_rejected("*", &e.to_string());
            return;
        }

        let changes = self.settings.diff(&next);
        self.settings = Arc::new(next);
        for change in &changes {
            self.on_settings_changed(change);
            self.logger.log_settings_change(change.key());
        }
    }

    /// React to a change already present in the current snapshot
    fn on_settings_changed(&mut self, change: &SettingsChange) {
        match change {
            SettingsChange::Interfaces(interfaces) => {
                self.metrics.set_tracked_interfaces(interfaces.len() as i64);
            }
            SettingsChange::UpdateInterval(_) => self.rearm(),
            SettingsChange::DecimalPlace(_)
            | SettingsChange::UseCustomDecorations(_)
            | SettingsChange::CustomDecoration(_, _) => self.rerender(),
            SettingsChange::DisplayVertical(vertical) => {
                self.sink.set_vertical(*vertical);
                self.sink.flush();
            }
            SettingsChange::Visibility(kind, visible) => {
                self.sink.set_visible(*kind, *visible);
                if *visible {
                    self.rerender();
                } else {
                    self.sink.flush();
                }
            }
        }
    }

    /// Replace the timer so the next tick lands one new period after the last
    fn rearm(&mut self) {
        let period = self.settings.interval();
        let start = match self.last_tick {
            Some(last) => last + period,
            None => Instant::now() + period,
        };

        self.timer.cancel();
        self.timer.arm(start, period);
        info!(interval_secs = period.as_secs(), "Sampling interval changed");
    }

    fn rerender(&mut self) {
        if let Some(metrics) = self.last_metrics {
            render(self.sink.as_mut(), &self.settings, &metrics);
        }
    }

    async fn shutdown(mut self) -> Result<PersistedState> {
        // No tick may fire once tracker state is released
        self.timer.cancel();

        let baseline = self.tracker.stop()?;
        let boot_epoch = if self.boot_epoch_unverified {
            self.boot_epoch
        } else {
            match current_boot_epoch(self.uptime.as_ref()).await {
                Ok(epoch) => Some(epoch),
                Err(e) => {
                    warn!(error = %e, "Failed to refresh boot epoch, keeping start-up value");
                    self.boot_epoch
                }
            }
        };

        let state = PersistedState::new(baseline, boot_epoch);
        let persisted = match self.store.save(&state) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to persist usage baseline");
                false
            }
        };

        self.logger.log_stopped(
            baseline.initial_received,
            baseline.initial_transmitted,
            persisted,
        );
        Ok(state)
    }
}

/// Handle to a spawned sampling loop
pub struct MonitorHandle {
    commands: mpsc::Sender<MonitorCommand>,
    metrics: watch::Receiver<AggregateMetrics>,
    task: JoinHandle<Result<PersistedState>>,
}

impl MonitorHandle {
    /// Receiver for the metrics of every completed tick
    pub fn metrics(&self) -> watch::Receiver<AggregateMetrics> {
        self.metrics.clone()
    }

    /// Secondary-button action: restart usage accounting
    pub async fn reset_usage(&self) -> Result<()> {
        self.send(MonitorCommand::ResetUsage).await
    }

    pub async fn apply(&self, change: SettingsChange) -> Result<()> {
        self.send(MonitorCommand::Apply(change)).await
    }

    pub async fn replace_settings(&self, settings: Settings) -> Result<()> {
        self.send(MonitorCommand::Replace(settings)).await
    }

    /// Stop the loop and wait for it to persist its baseline
    pub async fn stop(self) -> Result<PersistedState> {
        // The loop may already have exited; the join result tells why
        let _ = self.commands.send(MonitorCommand::Stop).await;
        self.task.await.context("Sampling loop task failed")?
    }

    async fn send(&self, command: MonitorCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| NetSpeedError::LoopClosed.into())
    }
}

/// Builder for creating and starting the sampling loop
pub struct MonitorBuilder {
    counter_source: Option<Arc<dyn CounterSource>>,
    uptime_source: Option<Arc<dyn UptimeSource>>,
    store: Option<Arc<dyn BaselineStore>>,
    sink: Option<Box<dyn LabelSink>>,
    settings: Settings,
    host: String,
    metrics_textfile: Option<PathBuf>,
    command_buffer: usize,
}

impl MonitorBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            counter_source: None,
            uptime_source: None,
            store: None,
            sink: None,
            settings: Settings::default(),
            host: "localhost".to_string(),
            metrics_textfile: None,
            command_buffer: 32,
        }
    }

    /// Set the counter source (default: /proc/net/dev)
    pub fn counter_source(mut self, source: Arc<dyn CounterSource>) -> Self {
        self.counter_source = Some(source);
        self
    }

    /// Set the uptime source (default: /proc/uptime)
    pub fn uptime_source(mut self, source: Arc<dyn UptimeSource>) -> Self {
        self.uptime_source = Some(source);
        self
    }

    /// Set the baseline store (default: in memory)
    pub fn store(mut self, store: Arc<dyn BaselineStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the label sink
    pub fn sink(mut self, sink: impl LabelSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Set the initial settings snapshot
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Set the host name used in structured logs
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Export Prometheus metrics to this file after every tick
    pub fn metrics_textfile(mut self, path: impl Into<PathBuf>) -> Self {
        self.metrics_textfile = Some(path.into());
        self
    }

    /// Build the loop and the sender that controls it
    pub fn build(self) -> Result<(SamplingLoop, mpsc::Sender<MonitorCommand>)> {
        let sink = self
            .sink
            .ok_or_else(|| anyhow::anyhow!("Label sink is required"))?;
        self.settings.validate()?;

        let counter_source = self
            .counter_source
            .unwrap_or_else(|| Arc::new(ProcNetDev::new()));
        let uptime = self
            .uptime_source
            .unwrap_or_else(|| Arc::new(ProcUptime::new()));
        let store = self.store.unwrap_or_else(|| Arc::new(MemoryStore::new()));

        let (commands_tx, commands_rx) = mpsc::channel(self.command_buffer);
        let (published, _) = watch::channel(AggregateMetrics::default());

        let sampling_loop = SamplingLoop {
            tracker: CounterTracker::new(counter_source),
            uptime,
            store,
            sink,
            settings: Arc::new(self.settings),
            timer: TickTimer::new(),
            last_tick: None,
            last_metrics: None,
            boot_epoch: None,
            boot_epoch_unverified: false,
            metrics_textfile: self.metrics_textfile,
            metrics: NetSpeedMetrics::new(),
            logger: StructuredLogger::new(self.host),
            commands: commands_rx,
            published,
        };

        Ok((sampling_loop, commands_tx))
    }

    /// Build the loop and spawn it onto the current runtime
    pub fn spawn(self) -> Result<MonitorHandle> {
        let (sampling_loop, commands) = self.build()?;
        Ok(sampling_loop.spawn(commands))
    }
}

impl Default for MonitorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
