//! Error type shared by every fallible operation in the crate.

use thiserror::Error;

/// Result alias used throughout `roomflake`.
pub type Result<T> = std::result::Result<T, FlakeError>;

/// Failures reported by construction, generation and encoding.
///
/// Nothing is retried or logged internally: each error is handed straight
/// back to the caller of the failing operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlakeError {
    /// A node code or initial sequence does not fit its bit field.
    ///
    /// Raised only at construction (or when encoding hand-built parts),
    /// never while generating.
    #[error("{field} {value} is out of range (max {max})")]
    InvalidConfiguration {
        field: &'static str,
        value: u64,
        max: u64,
    },

    /// The clock reads earlier than the last issued timestamp.
    ///
    /// The generator state is untouched, so the caller may retry once the
    /// clock has caught up.
    #[error("clock moved backwards: last issued at {last_ms} ms, now {now_ms} ms")]
    ClockRegression { last_ms: u64, now_ms: u64 },

    /// The elapsed time since the epoch does not fit the timestamp field.
    ///
    /// Also returned for clock readings earlier than the epoch itself.
    #[error("timestamp {now_ms} ms cannot be encoded against epoch {epoch_ms} ms")]
    TimestampOverflow { now_ms: u64, epoch_ms: u64 },
}
