// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
///
/// Commands whose preconditions are unmet are not errors; they come back as
/// `CommandOutcome::NoOp` (a rejected name or roster included). Everything
/// here means the command had no effect.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Stale snapshot: write was based on version {expected}, store is at {actual}")]
    StaleSnapshot { expected: u64, actual: u64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
