//! Label output
//!
//! The monitor pushes formatted text to four independent labels through a
//! [`LabelSink`]. Drawing those labels is up to the host.

use crate::format::MetricFormatter;
use crate::models::{AggregateMetrics, MetricKind};
use crate::settings::Settings;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Output surface for the four metric labels
pub trait LabelSink: Send {
    fn set_text(&mut self, kind: MetricKind, text: &str);

    fn set_visible(&mut self, kind: MetricKind, visible: bool);

    fn set_vertical(&mut self, _vertical: bool) {}

    /// Called once after a batch of updates
    fn flush(&mut self) {}
}

/// Push visibility and orientation for a settings snapshot
pub fn apply_layout(sink: &mut dyn LabelSink, settings: &Settings) {
    for kind in MetricKind::ALL {
        sink.set_visible(kind, settings.is_visible(kind));
    }
    sink.set_vertical(settings.display_vertical);
    sink.flush();
}

/// Format visible metrics and push them to the sink
///
/// Hidden labels are not updated.
pub fn render(sink: &mut dyn LabelSink, settings: &Settings, metrics: &AggregateMetrics) {
    let formatter = MetricFormatter::new(settings.decimal_place);
    for kind in MetricKind::ALL {
        if settings.is_visible(kind) {
            let text = formatter.format_with(metrics.get(kind), settings.decoration(kind));
            sink.set_text(kind, &text);
        }
    }
    sink.flush();
}

/// Show the zeroed usage label right after a reset
pub fn render_usage_reset(sink: &mut dyn LabelSink, settings: &Settings) {
    if settings.is_visible(MetricKind::UsageTotal) {
        let formatter = MetricFormatter::new(settings.decimal_place);
        let text = formatter.format_with(0.0, settings.decoration(MetricKind::UsageTotal));
        sink.set_text(MetricKind::UsageTotal, &text);
        sink.flush();
    }
}

#[derive(Debug, Default)]
struct LabelState {
    texts: HashMap<MetricKind, String>,
    visible: HashMap<MetricKind, bool>,
    vertical: bool,
    flushes: usize,
}

/// Sink that records label state in memory
///
/// Clones share state, so a host can keep one clone for reading while the
/// sampling loop owns another.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    state: Arc<Mutex<LabelState>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut LabelState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    pub fn text(&self, kind: MetricKind) -> Option<String> {
        self.with_state(|s| s.texts.get(&kind).cloned())
    }

    pub fn is_visible(&self, kind: MetricKind) -> bool {
        self.with_state(|s| s.visible.get(&kind).copied().unwrap_or(false))
    }

    pub fn is_vertical(&self) -> bool {
        self.with_state(|s| s.vertical)
    }

    /// Number of completed update batches
    pub fn flushes(&self) -> usize {
        self.with_state(|s| s.flushes)
    }
}

impl LabelSink for MemorySink {
    fn set_text(&mut self, kind: MetricKind, text: &str) {
        self.with_state(|s| s.texts.insert(kind, text.to_string()));
    }

    fn set_visible(&mut self, kind: MetricKind, visible: bool) {
        self.with_state(|s| s.visible.insert(kind, visible));
    }

    fn set_vertical(&mut self, vertical: bool) {
        self.with_state(|s| s.vertical = vertical);
    }

    fn flush(&mut self) {
        self.with_state(|s| s.flushes += 1);
    }
}
