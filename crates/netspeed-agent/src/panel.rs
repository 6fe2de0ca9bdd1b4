//! Terminal label panel

use netspeed_lib::{LabelSink, MetricKind};
use std::collections::HashMap;
use std::io::{self, Stdout, Write};

/// Prints the visible labels as one status line per flush
pub struct TerminalPanel<W: Write + Send = Stdout> {
    out: W,
    texts: HashMap<MetricKind, String>,
    visible: HashMap<MetricKind, bool>,
    vertical: bool,
}

impl TerminalPanel<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TerminalPanel<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            texts: HashMap::new(),
            visible: HashMap::new(),
            vertical: false,
        }
    }

    /// Current panel contents, labels in display order
    pub fn line(&self) -> String {
        let separator = if self.vertical { "\n" } else { "  " };
        MetricKind::ALL
            .into_iter()
            .filter(|kind| self.visible.get(kind).copied().unwrap_or(false))
            .filter_map(|kind| self.texts.get(&kind).map(String::as_str))
            .collect::<Vec<_>>()
            .join(separator)
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> LabelSink for TerminalPanel<W> {
    fn set_text(&mut self, kind: MetricKind, text: &str) {
        self.texts.insert(kind, text.to_string());
    }

    fn set_visible(&mut self, kind: MetricKind, visible: bool) {
        self.visible.insert(kind, visible);
    }

    fn set_vertical(&mut self, vertical: bool) {
        self.vertical = vertical;
    }

    fn flush(&mut self) {
        let line = self.line();
        if line.is_empty() {
            return;
        }
        // A closed stdout is not worth stopping the monitor for
        let _ = writeln!(self.out, "{}", line).and_then(|_| self.out.flush());
    }
}
