//! Integration tests for counter collection
//!
//! These tests use mock procfs files and in-memory sources to exercise the
//! tracker and the sampling loop without real network traffic.

#[cfg(test)]
mod mock_procfs_tests {
    use crate::collector::{
        current_boot_epoch, CounterSource, CounterTracker, ProcNetDev, ProcUptime,
    };
    use crate::settings::Settings;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::fs;

    /// Helper to write a mock /proc/net/dev
    async fn write_net_dev(temp_dir: &TempDir, eth0: (u64, u64)) -> PathBuf {
        let path = temp_dir.path().join("net_dev");
        let content = format!(
            "Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo:   48213     512    0    0    0     0          0         0    48213     512    0    0    0     0       0          0
  eth0: {}    8123    0    0    0     0          0        12  {}    6011    0    0    0     0       0          0
",
            eth0.0, eth0.1
        );
        fs::write(&path, content).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_proc_net_dev_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_net_dev(&temp_dir, (1000, 500)).await;

        let source = ProcNetDev::with_path(&path);
        let report = source.read_report().await.unwrap();
        assert!(report.contains("eth0"));
    }

    #[tokio::test]
    async fn test_proc_net_dev_missing_file() {
        let source = ProcNetDev::with_path("/nonexistent/net/dev");
        assert!(source.read_report().await.is_err());
    }

    #[tokio::test]
    async fn test_tracker_over_mock_procfs() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_net_dev(&temp_dir, (1000, 500)).await;
        let settings = Settings {
            interfaces: vec!["eth0".to_string()],
            ..Settings::default()
        };

        let mut tracker = CounterTracker::new(Arc::new(ProcNetDev::with_path(&path)));
        tracker
            .start(&settings.interfaces, None, false)
            .await
            .unwrap();

        write_net_dev(&temp_dir, (2000, 1500)).await;
        let metrics = tracker.tick(&settings).await.unwrap();
        assert_eq!(metrics.speed_down, 1000.0);
        assert_eq!(metrics.speed_up, 1000.0);
        assert_eq!(tracker.interfaces().count(), 2);

        // Source disappears: zero delta, totals kept
        fs::remove_file(&path).await.unwrap();
        let metrics = tracker.tick(&settings).await.unwrap();
        assert_eq!(metrics.speed_total, 0.0);
        assert_eq!(tracker.totals(), (2000, 1500));
    }

    #[tokio::test]
    async fn test_boot_epoch_from_mock_uptime() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("uptime");
        fs::write(&path, "3600.25 7000.10\n").await.unwrap();

        let epoch = current_boot_epoch(&ProcUptime::with_path(&path))
            .await
            .unwrap();
        let expected = chrono::Utc::now().timestamp() - 3600;
        assert!((epoch - expected).abs() <= 2);
    }
}

#[cfg(test)]
mod sampling_loop_tests {
    use crate::collector::{boot_epoch, CounterSource, MonitorBuilder, UptimeSource};
    use crate::display::MemorySink;
    use crate::models::{MetricKind, PersistedState};
    use crate::settings::{Settings, SettingsChange};
    use crate::store::{BaselineStore, MemoryStore};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::Instant;

    const UPTIME_SECS: f64 = 5000.0;

    /// Counter source reporting a single eth0 line that tests can update
    struct MockCounters {
        eth0: Mutex<(u64, u64)>,
    }

    impl MockCounters {
        fn new(rx: u64, tx: u64) -> Arc<Self> {
            Arc::new(Self {
                eth0: Mutex::new((rx, tx)),
            })
        }

        fn set(&self, rx: u64, tx: u64) {
            *self.eth0.lock().unwrap() = (rx, tx);
        }
    }

    #[async_trait]
    impl CounterSource for MockCounters {
        async fn read_report(&self) -> Result<String> {
            let (rx, tx) = *self.eth0.lock().unwrap();
            Ok(format!(
                "header\nheader\n  eth0: {} 0 0 0 0 0 0 0 {} 0 0 0 0 0 0 0\n",
                rx, tx
            ))
        }
    }

    struct MockUptime;

    #[async_trait]
    impl UptimeSource for MockUptime {
        async fn uptime_secs(&self) -> Result<f64> {
            Ok(UPTIME_SECS)
        }
    }

    /// Uptime source whose first read fails
    struct FlakyUptime {
        reads: AtomicUsize,
    }

    #[async_trait]
    impl UptimeSource for FlakyUptime {
        async fn uptime_secs(&self) -> Result<f64> {
            if self.reads.fetch_add(1, Ordering::SeqCst) == 0 {
                anyhow::bail!("uptime unavailable");
            }
            Ok(UPTIME_SECS)
        }
    }

    fn eth0_settings() -> Settings {
        Settings {
            interfaces: vec!["eth0".to_string()],
            show_speed_down: true,
            show_speed_up: true,
            show_speed_total: true,
            show_usage_total: true,
            ..Settings::default()
        }
    }

    fn builder(
        counters: &Arc<MockCounters>,
        store: &Arc<MemoryStore>,
        sink: &MemorySink,
    ) -> MonitorBuilder {
        MonitorBuilder::new()
            .counter_source(counters.clone())
            .uptime_source(Arc::new(MockUptime))
            .store(store.clone())
            .sink(sink.clone())
            .settings(eth0_settings())
            .host("test-host")
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_end_to_end() {
        let counters = MockCounters::new(1000, 500);
        let store = Arc::new(MemoryStore::new());
        let sink = MemorySink::new();

        let handle = builder(&counters, &store, &sink).spawn().unwrap();
        let mut metrics = handle.metrics();

        // Immediate first tick after start
        metrics.changed().await.unwrap();
        assert_eq!(sink.text(MetricKind::SpeedDown).as_deref(), Some("0B↓"));
        assert!(sink.is_visible(MetricKind::UsageTotal));

        counters.set(2000, 1500);
        metrics.changed().await.unwrap();

        assert_eq!(sink.text(MetricKind::SpeedDown).as_deref(), Some("1K↓"));
        assert_eq!(sink.text(MetricKind::SpeedUp).as_deref(), Some("1K↑"));
        assert_eq!(sink.text(MetricKind::SpeedTotal).as_deref(), Some("2K⇵"));
        assert_eq!(sink.text(MetricKind::UsageTotal).as_deref(), Some("2KΣ"));

        let state = handle.stop().await.unwrap();
        assert_eq!(state.initial_receive_count, 1000);
        assert_eq!(state.initial_transmit_count, 500);
        assert_eq!(store.snapshot(), Some(state));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_reset_usage() {
        let counters = MockCounters::new(1000, 500);
        let store = Arc::new(MemoryStore::new());
        let sink = MemorySink::new();

        let handle = builder(&counters, &store, &sink).spawn().unwrap();
        let mut metrics = handle.metrics();
        metrics.changed().await.unwrap();

        counters.set(6000, 2500);
        metrics.changed().await.unwrap();
        assert_eq!(sink.text(MetricKind::UsageTotal).as_deref(), Some("7KΣ"));

        handle.reset_usage().await.unwrap();
        counters.set(6300, 2700);
        metrics.changed().await.unwrap();

        assert_eq!(metrics.borrow().usage_total, 500.0);
        assert_eq!(sink.text(MetricKind::UsageTotal).as_deref(), Some("500BΣ"));

        let state = handle.stop().await.unwrap();
        assert_eq!(state.initial_receive_count, 6000);
        assert_eq!(state.initial_transmit_count, 2500);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_interval_change_rearms_timer() {
        let counters = MockCounters::new(0, 0);
        let store = Arc::new(MemoryStore::new());
        let sink = MemorySink::new();

        let handle = builder(&counters, &store, &sink).spawn().unwrap();
        let mut metrics = handle.metrics();
        metrics.changed().await.unwrap();
        metrics.changed().await.unwrap();
        let before = Instant::now();

        handle
            .apply(SettingsChange::UpdateInterval(5))
            .await
            .unwrap();
        counters.set(5000, 0);
        metrics.changed().await.unwrap();
        let elapsed = Instant::now() - before;

        assert!(elapsed >= Duration::from_secs(5), "ticked after {elapsed:?}");
        assert!(elapsed < Duration::from_secs(6), "ticked after {elapsed:?}");
        // Speed is measured over the new interval
        assert_eq!(metrics.borrow().speed_down, 1000.0);

        handle.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_rejects_invalid_change() {
        let counters = MockCounters::new(0, 0);
        let store = Arc::new(MemoryStore::new());
        let sink = MemorySink::new();

        let handle = builder(&counters, &store, &sink).spawn().unwrap();
        let mut metrics = handle.metrics();
        metrics.changed().await.unwrap();
        let before = Instant::now();

        handle
            .apply(SettingsChange::UpdateInterval(0))
            .await
            .unwrap();
        metrics.changed().await.unwrap();

        // Still on the original one second schedule
        let elapsed = Instant::now() - before;
        assert!(elapsed >= Duration::from_secs(1), "ticked after {elapsed:?}");
        assert!(elapsed < Duration::from_secs(2), "ticked after {elapsed:?}");
        assert_eq!(handle.metrics().borrow().speed_down, 0.0);
        handle.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_settings_change_updates_sink() {
        let counters = MockCounters::new(0, 0);
        let store = Arc::new(MemoryStore::new());
        let sink = MemorySink::new();

        let handle = builder(&counters, &store, &sink).spawn().unwrap();
        let mut metrics = handle.metrics();
        metrics.changed().await.unwrap();

        handle
            .apply(SettingsChange::Visibility(MetricKind::SpeedUp, false))
            .await
            .unwrap();
        handle
            .apply(SettingsChange::CustomDecoration(
                MetricKind::SpeedDown,
                " down".to_string(),
            ))
            .await
            .unwrap();
        handle
            .apply(SettingsChange::UseCustomDecorations(true))
            .await
            .unwrap();
        handle
            .replace_settings(Settings {
                display_vertical: true,
                use_custom_decorations: true,
                custom_speed_down_decoration: " down".to_string(),
                show_speed_up: false,
                ..eth0_settings()
            })
            .await
            .unwrap();

        counters.set(1000, 1000);
        metrics.changed().await.unwrap();

        assert!(!sink.is_visible(MetricKind::SpeedUp));
        assert!(sink.is_vertical());
        assert_eq!(sink.text(MetricKind::SpeedDown).as_deref(), Some("1K down"));
        assert_eq!(sink.text(MetricKind::SpeedUp).as_deref(), Some("0B↑"));

        handle.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_boot_reset_clears_baseline() {
        let counters = MockCounters::new(10_000, 5_000);
        let store = Arc::new(MemoryStore::with_state(PersistedState {
            initial_receive_count: 4_000_000,
            initial_transmit_count: 1_000_000,
            last_boot_time: 1_000_000,
        }));
        let sink = MemorySink::new();

        let handle = builder(&counters, &store, &sink).spawn().unwrap();
        let mut metrics = handle.metrics();
        metrics.changed().await.unwrap();

        assert_eq!(metrics.borrow().usage_total, 15_000.0);

        let state = handle.stop().await.unwrap();
        assert_eq!(state.initial_receive_count, 0);
        assert_eq!(state.initial_transmit_count, 0);
        assert_ne!(state.last_boot_time, 1_000_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_same_boot_restores_baseline() {
        let counters = MockCounters::new(10_000, 5_000);
        let persisted = PersistedState {
            initial_receive_count: 4_000,
            initial_transmit_count: 1_000,
            last_boot_time: boot_epoch(chrono::Utc::now(), UPTIME_SECS),
        };
        let store = Arc::new(MemoryStore::with_state(persisted));
        let sink = MemorySink::new();

        let handle = builder(&counters, &store, &sink).spawn().unwrap();
        let mut metrics = handle.metrics();
        metrics.changed().await.unwrap();

        assert_eq!(metrics.borrow().usage_total, 6_000.0 + 4_000.0);

        let state = handle.stop().await.unwrap();
        assert_eq!(state.initial_receive_count, 4_000);
        assert_eq!(state.initial_transmit_count, 1_000);

        // Second cycle in the same boot keeps the baseline
        let handle = builder(&counters, &store, &sink).spawn().unwrap();
        let restored = handle.stop().await.unwrap();
        assert_eq!(restored.initial_receive_count, 4_000);
        assert_eq!(store.load().unwrap(), Some(restored));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_boot_epoch_keeps_persisted_epoch() {
        let counters = MockCounters::new(100, 100);
        let store = Arc::new(MemoryStore::with_state(PersistedState {
            initial_receive_count: 5_000_000,
            initial_transmit_count: 5_000_000,
            last_boot_time: 1_000_000,
        }));
        let sink = MemorySink::new();
        let uptime = Arc::new(FlakyUptime {
            reads: AtomicUsize::new(0),
        });

        let handle = builder(&counters, &store, &sink)
            .uptime_source(uptime.clone())
            .spawn()
            .unwrap();
        let mut metrics = handle.metrics();
        metrics.changed().await.unwrap();

        // Without a boot epoch the previous baseline is restored as is
        let state = handle.stop().await.unwrap();
        assert_eq!(state.initial_receive_count, 5_000_000);
        assert_eq!(state.last_boot_time, 1_000_000);

        // Next start reads the epoch and sees the reboot
        let handle = builder(&counters, &store, &sink)
            .uptime_source(uptime)
            .spawn()
            .unwrap();
        let mut metrics = handle.metrics();
        metrics.changed().await.unwrap();
        assert_eq!(metrics.borrow().usage_total, 200.0);

        let state = handle.stop().await.unwrap();
        assert_eq!(state.initial_receive_count, 0);
        assert_eq!(state.initial_transmit_count, 0);
        assert_ne!(state.last_boot_time, 1_000_000);
    }
}
