//! # Core Error Types
//!
//! Recoverable failures of the sync layer. Broken sync invariants (a snapshot
//! read past its end, a stale frame block) are not listed here: they panic.

use thiserror::Error;

/// Errors that can occur in the sync layer.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The core thread has shut down and no longer accepts work.
    #[error("core thread is not running")]
    CoreThreadStopped,

    /// The core thread panicked while processing work.
    #[error("core thread panicked")]
    CoreThreadPanicked,
}

/// Result type for sync layer operations.
pub type CoreResult<T> = Result<T, CoreError>;
