//! Builder error types.

use ormq_proto::Fingerprint;
use thiserror::Error;

/// Builder errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The query was assembled in an invalid order or shape.
    #[error("composition error: {0}")]
    Composition(String),

    /// A subquery reuses an alias already bound by an enclosing query.
    #[error("alias `{alias}` is already bound by an enclosing query")]
    AmbiguousAlias { alias: String },

    /// Projected items do not fit the target record type.
    #[error("binding error: {0}")]
    Binding(String),

    /// A tuple was asked for an item it does not project.
    #[error("projection mismatch: {0}")]
    ProjectionMismatch(String),

    /// A single-result fetch matched more than one row.
    #[error("expected at most one row, got {rows}")]
    NonUniqueResult { rows: usize },

    /// The store rejected the statement.
    #[error("store error for statement {fingerprint}: {source}")]
    Store {
        fingerprint: Fingerprint,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A row value does not convert to the requested type.
    #[error("decode error: {0}")]
    Decode(String),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ormq_proto::Error),
}

impl Error {
    pub(crate) fn composition(message: impl Into<String>) -> Self {
        Error::Composition(message.into())
    }

    pub(crate) fn binding(message: impl Into<String>) -> Self {
        Error::Binding(message.into())
    }
}
