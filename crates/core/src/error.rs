//! Error types for bouncer construction

use thiserror::Error;

/// Errors raised while configuring a bouncer.
///
/// Runtime misuse (double cancel, stale split, bounce on an empty chain)
/// is never an error: those calls are silent no-ops returning `false`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Configuration error.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No timer host was supplied and none could be created.
    #[error("No timer host available: {0}")]
    NoTimerHost(String),
}

/// Result type for bouncer operations
pub type Result<T> = std::result::Result<T, Error>;
