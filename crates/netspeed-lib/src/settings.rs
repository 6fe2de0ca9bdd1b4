//! Settings snapshot and change events
//!
//! Settings are an immutable snapshot. A change notification never mutates
//! the snapshot in place: `Settings::apply` produces a new validated
//! snapshot which replaces the old one between ticks.

use crate::error::NetSpeedError;
use crate::models::MetricKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default sampling interval in seconds
pub const DEFAULT_UPDATE_INTERVAL: u64 = 1;

/// Default number of decimal places for fractional values
pub const DEFAULT_DECIMAL_PLACE: usize = 2;

/// Largest accepted decimal place count
pub const MAX_DECIMAL_PLACE: usize = 9;

/// Complete monitor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Settings {
    /// Tracked interface names, matched exactly
    pub interfaces: Vec<String>,
    /// Seconds between ticks
    pub update_interval: u64,
    pub decimal_place: usize,
    pub display_vertical: bool,
    pub show_speed_down: bool,
    pub show_speed_up: bool,
    pub show_speed_total: bool,
    pub show_usage_total: bool,
    pub use_custom_decorations: bool,
    pub custom_speed_down_decoration: String,
    pub custom_speed_up_decoration: String,
    pub custom_speed_total_decoration: String,
    pub custom_usage_total_decoration: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interfaces: Vec::new(),
            update_interval: DEFAULT_UPDATE_INTERVAL,
            decimal_place: DEFAULT_DECIMAL_PLACE,
            display_vertical: false,
            show_speed_down: true,
            show_speed_up: true,
            show_speed_total: false,
            show_usage_total: false,
            use_custom_decorations: false,
            custom_speed_down_decoration: MetricKind::SpeedDown.default_decoration().to_string(),
            custom_speed_up_decoration: MetricKind::SpeedUp.default_decoration().to_string(),
            custom_speed_total_decoration: MetricKind::SpeedTotal
                .default_decoration()
                .to_string(),
            custom_usage_total_decoration: MetricKind::UsageTotal
                .default_decoration()
                .to_string(),
        }
    }
}

/// A single settings change notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsChange {
    Interfaces(Vec<String>),
    UpdateInterval(u64),
    DecimalPlace(usize),
    DisplayVertical(bool),
    Visibility(MetricKind, bool),
    UseCustomDecorations(bool),
    CustomDecoration(MetricKind, String),
}

impl SettingsChange {
    /// Settings key this change targets
    pub fn key(&self) -> &'static str {
        match self {
            SettingsChange::Interfaces(_) => "interfaces",
            SettingsChange::UpdateInterval(_) => "update-interval",
            SettingsChange::DecimalPlace(_) => "decimal-place",
            SettingsChange::DisplayVertical(_) => "display-vertical",
            SettingsChange::Visibility(kind, _) => match kind {
                MetricKind::SpeedDown => "show-speed-down",
                MetricKind::SpeedUp => "show-speed-up",
                MetricKind::SpeedTotal => "show-speed-total",
                MetricKind::UsageTotal => "show-usage-total",
            },
            SettingsChange::UseCustomDecorations(_) => "use-custom-decorations",
            SettingsChange::CustomDecoration(kind, _) => match kind {
                MetricKind::SpeedDown => "custom-speed-down-decoration",
                MetricKind::SpeedUp => "custom-speed-up-decoration",
                MetricKind::SpeedTotal => "custom-speed-total-decoration",
                MetricKind::UsageTotal => "custom-usage-total-decoration",
            },
        }
    }
}

impl Settings {
    /// Check value ranges
    pub fn validate(&self) -> Result<(), NetSpeedError> {
        if self.update_interval == 0 {
            return Err(NetSpeedError::InvalidSetting {
                key: "update-interval",
                reason: "must be at least 1 second".to_string(),
            });
        }
        if self.decimal_place > MAX_DECIMAL_PLACE {
            return Err(NetSpeedError::InvalidSetting {
                key: "decimal-place",
                reason: format!("must be at most {}", MAX_DECIMAL_PLACE),
            });
        }
        Ok(())
    }

    /// Produce a new snapshot with a change applied
    pub fn apply(&self, change: SettingsChange) -> Result<Settings, NetSpeedError> {
        let mut next = self.clone();
        match change {
            SettingsChange::Interfaces(interfaces) => next.interfaces = interfaces,
            SettingsChange::UpdateInterval(secs) => next.update_interval = secs,
            SettingsChange::DecimalPlace(places) => next.decimal_place = places,
            SettingsChange::DisplayVertical(vertical) => next.display_vertical = vertical,
            SettingsChange::Visibility(kind, visible) => *next.visible_mut(kind) = visible,
            SettingsChange::UseCustomDecorations(enabled) => next.use_custom_decorations = enabled,
            SettingsChange::CustomDecoration(kind, text) => *next.custom_decoration_mut(kind) = text,
        }
        next.validate()?;
        Ok(next)
    }

    /// Changes that turn `self` into `next`
    pub fn diff(&self, next: &Settings) -> Vec<SettingsChange> {
        let mut changes = Vec::new();

        if self.interfaces != next.interfaces {
            changes.push(SettingsChange::Interfaces(next.interfaces.clone()));
        }
        if self.update_interval != next.update_interval {
            changes.push(SettingsChange::UpdateInterval(next.update_interval));
        }
        if self.decimal_place != next.decimal_place {
            changes.push(SettingsChange::DecimalPlace(next.decimal_place));
        }
        if self.display_vertical != next.display_vertical {
            changes.push(SettingsChange::DisplayVertical(next.display_vertical));
        }
        for kind in MetricKind::ALL {
            if self.is_visible(kind) != next.is_visible(kind) {
                changes.push(SettingsChange::Visibility(kind, next.is_visible(kind)));
            }
        }
        if self.use_custom_decorations != next.use_custom_decorations {
            changes.push(SettingsChange::UseCustomDecorations(
                next.use_custom_decorations,
            ));
        }
        for kind in MetricKind::ALL {
            if self.custom_decoration(kind) != next.custom_decoration(kind) {
                changes.push(SettingsChange::CustomDecoration(
                    kind,
                    next.custom_decoration(kind).to_string(),
                ));
            }
        }

        changes
    }

    /// Sampling interval as a duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.update_interval)
    }

    pub fn is_visible(&self, kind: MetricKind) -> bool {
        match kind {
            MetricKind::SpeedDown => self.show_speed_down,
            MetricKind::SpeedUp => self.show_speed_up,
            MetricKind::SpeedTotal => self.show_speed_total,
            MetricKind::UsageTotal => self.show_usage_total,
        }
    }

    /// Decoration currently in effect for a metric
    pub fn decoration(&self, kind: MetricKind) -> &str {
        if self.use_custom_decorations {
            self.custom_decoration(kind)
        } else {
            kind.default_decoration()
        }
    }

    fn custom_decoration(&self, kind: MetricKind) -> &str {
        match kind {
            MetricKind::SpeedDown => &self.custom_speed_down_decoration,
            MetricKind::SpeedUp => &self.custom_speed_up_decoration,
            MetricKind::SpeedTotal => &self.custom_speed_total_decoration,
            MetricKind::UsageTotal => &self.custom_usage_total_decoration,
        }
    }

    fn visible_mut(&mut self, kind: MetricKind) -> &mut bool {
        match kind {
            MetricKind::SpeedDown => &mut self.show_speed_down,
            MetricKind::SpeedUp => &mut self.show_speed_up,
            MetricKind::SpeedTotal => &mut self.show_speed_total,
            MetricKind::UsageTotal => &mut self.show_usage_total,
        }
    }

    fn custom_decoration_mut(&mut self, kind: MetricKind) -> &mut String {
        match kind {
            MetricKind::SpeedDown => &mut self.custom_speed_down_decoration,
            MetricKind::SpeedUp => &mut self.custom_speed_up_decoration,
            MetricKind::SpeedTotal => &mut self.custom_speed_total_decoration,
            MetricKind::UsageTotal => &mut self.custom_usage_total_decoration,
        }
    }
}
