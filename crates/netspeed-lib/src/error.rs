//! Domain errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetSpeedError {
    /// A tick or stop was requested while the tracker is stopped
    #[error("counter tracker is not running")]
    NotRunning,

    /// A start was requested while the tracker is already running
    #[error("counter tracker is already running")]
    AlreadyRunning,

    #[error("invalid value for setting `{key}`: {reason}")]
    InvalidSetting { key: &'static str, reason: String },

    /// The sampling loop has already exited
    #[error("sampling loop has shut down")]
    LoopClosed,
}
