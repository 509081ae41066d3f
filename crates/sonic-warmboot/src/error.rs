//! Crate-level error type.

use thiserror::Error;

use crate::hw::HwError;
use crate::orchestrator::WarmBootState;
use crate::snapshot::LoadError;

/// Result type for warm boot operations.
pub type Result<T> = std::result::Result<T, WarmBootError>;

/// Errors surfaced by warm boot operations.
#[derive(Debug, Error)]
pub enum WarmBootError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("hardware error: {0}")]
    Hardware(#[from] HwError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid warm boot transition {from} -> {to}")]
    InvalidTransition {
        from: WarmBootState,
        to: WarmBootState,
    },
}
