//! Network throughput monitor library
//!
//! This crate provides the core functionality for:
//! - Reading per-interface byte counters and system uptime
//! - Tracking counters across ticks and detecting reboots
//! - Formatting speeds and usage into compact labels
//! - Driving the periodic sampling loop
//! - Observability and baseline persistence

pub mod collector;
pub mod display;
pub mod error;
pub mod format;
pub mod models;
pub mod observability;
pub mod settings;
pub mod store;

pub use display::{LabelSink, MemorySink};
pub use error::NetSpeedError;
pub use format::{MetricFormatter, FORMAT_ERROR_MARKER};
pub use models::*;
pub use observability::{NetSpeedMetrics, StructuredLogger};
pub use settings::{Settings, SettingsChange};
pub use store::{BaselineStore, JsonFileStore, MemoryStore};
