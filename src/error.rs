// Error taxonomy shared by every component.
//
// Each failure class maps to one variant: I/O, malformed patch data,
// out-of-range control entries, suffix-array allocation, backend
// failures, unknown backends, and API misuse. Nothing in the library
// aborts the process; the CLI decides how to report.

use std::io;

/// Errors produced while diffing, writing, reading, or applying a patch.
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// Open/read/write/close failure on the underlying file or sink.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed patch: bad magic, negative or overflowing length fields,
    /// truncated or under-consumed streams.
    #[error("corrupt patch: {0}")]
    Format(String),

    /// A control entry references the old buffer outside its bounds, or
    /// the output would exceed the declared new size.
    #[error("out of range: {0}")]
    Range(String),

    /// Suffix-array construction could not allocate its index.
    #[error("allocation failed: {0}")]
    Allocation(String),

    /// A compression backend reported a failure.
    #[error("compression error: {0}")]
    Compression(String),

    /// The requested backend or format combination is not available.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// A component was driven out of order (e.g. written after close).
    #[error("invalid state: {0}")]
    State(String),
}

impl PatchError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub(crate) fn range(msg: impl Into<String>) -> Self {
        Self::Range(msg.into())
    }

    pub(crate) fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = PatchError> = std::result::Result<T, E>;
