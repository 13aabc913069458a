use thiserror::Error;

use crate::device::DeviceStatus;
use crate::diagnostics::FailureKind;
use crate::limits::Metric;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid limit for {metric}: min {min} > max {max}")]
    InvalidLimit { metric: Metric, min: f64, max: f64 },

    #[error("Invalid precision for {metric}: {decimals} decimals exceeds {max}")]
    InvalidPrecision { metric: Metric, decimals: u32, max: u32 },

    #[error("Non-finite limit for {0}")]
    NonFiniteLimit(Metric),

    #[error("Invalid distribution parameters for {metric}: {reason}")]
    Distribution { metric: Metric, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Cannot {op} a device in state {from}")]
    InvalidTransition { from: DeviceStatus, op: &'static str },

    #[error("No target server bound for device ID '{0}'")]
    Unbound(u32),

    #[error("Device loop must be started inside a Tokio runtime")]
    NoRuntime,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Classifies a per-tick failure for diagnostics.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Error::Http(_) | Error::Transport(_) | Error::Json(_) | Error::Io(_) => {
                FailureKind::Transport
            }
            _ => FailureKind::Configuration,
        }
    }
}
