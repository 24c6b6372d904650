//! Application error type.

use thiserror::Error;

/// Errors surfaced by the study application.
#[derive(Debug, Error)]
pub enum StudyError {
    /// Query composition or execution failed.
    #[error(transparent)]
    Query(#[from] ormq::Error),

    /// The reference store failed outside of a query (open, insert, flush).
    #[error(transparent)]
    Store(#[from] ormq_core::Error),

    /// JSON output could not be rendered.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias for the study application.
pub type Result<T> = std::result::Result<T, StudyError>;
