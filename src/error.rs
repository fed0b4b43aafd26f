//! Error types for configuration and input validation.
//!
//! Detection itself never fails: short or degenerate input produces an empty
//! result. Errors are only raised when a caller hands the engine a tuning that
//! cannot work, or asks for strict validation of raw streams.

use thiserror::Error;

/// Errors raised by the segment engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SegmentError {
    /// A configuration value is outside its usable range.
    #[error("invalid config field `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// An optional channel is longer than the coordinate stream.
    #[error("channel `{channel}` has {actual} samples but only {expected} coordinates")]
    MismatchedStreams {
        channel: &'static str,
        expected: usize,
        actual: usize,
    },
}

impl SegmentError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        SegmentError::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SegmentError>;
