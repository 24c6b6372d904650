//! Core error types.

use thiserror::Error;

/// Errors raised by the reference store.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ormq_proto::Error),

    /// Entity is not registered in the catalog.
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    /// Field is not declared on the entity.
    #[error("unknown field {entity}.{field}")]
    UnknownField { entity: String, field: String },

    /// Alias is not bound in any enclosing scope.
    #[error("unknown alias: {0}")]
    UnknownAlias(String),

    /// Relation is not declared on the entity.
    #[error("unknown relation {entity}.{relation}")]
    UnknownRelation { entity: String, relation: String },

    /// A value does not fit the slot or operator it is used with.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// The descriptor is structurally invalid.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// A configured query budget was exceeded.
    #[error("query budget exceeded: {limit} limit is {max}")]
    BudgetExceeded { limit: &'static str, max: usize },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// A scalar subquery produced more than one row.
    #[error("scalar subquery returned {rows} rows")]
    SubqueryCardinality { rows: usize },
}
