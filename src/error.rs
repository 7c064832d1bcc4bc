//! Error types for the presence tracker.

use chrono::{DateTime, Utc};

/// Top-level error type for the presence tracking system.
#[derive(Debug, thiserror::Error)]
pub enum VigilError {
    /// Group or user listing failed; the whole refresh cycle is skipped and
    /// retried on a later tick.
    #[error("upstream fetch failed: {0}")]
    TransientFetch(String),

    /// A single presence lookup failed; only that user is skipped.
    #[error("presence lookup failed for {user_id}: {reason}")]
    TransientLookup {
        /// User whose lookup failed.
        user_id: String,
        /// Upstream-reported cause.
        reason: String,
    },

    /// A group query named a handle the directory does not currently know.
    #[error("unknown group: {handle}")]
    UnknownGroup {
        /// The unrecognized handle, exactly as requested.
        handle: String,
    },

    /// The stored snapshot exists but cannot be decoded. Surfaced to the
    /// operator rather than discarded: silently dropping history could mask
    /// a real problem.
    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    /// An observation timestamp would make an interval end before it starts.
    /// Indicates a caller bug or a backward clock; never auto-corrected.
    #[error("clock invariant violated for {user_id}: interval starts {start} but observed {at}")]
    ClockInvariantViolation {
        /// User whose interval would be inverted.
        user_id: String,
        /// Start of the interval being extended.
        start: DateTime<Utc>,
        /// The offending observation timestamp.
        at: DateTime<Utc>,
    },

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Snapshot encoding error.
    #[error("snapshot encoding error: {0}")]
    Serialize(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, VigilError>;
