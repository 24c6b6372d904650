//! ORMQ query IR.
//!
//! This crate defines the untyped, serializable form of queries and
//! mutations, the raw rows a store returns, and the [`RelationalStore`]
//! contract that connects the typed builder to a store.
//!
//! # Modules
//!
//! - [`value`] - Runtime values and scalar type tags
//! - [`expr`] - Expression and predicate trees
//! - [`query`] - Query descriptors, joins, ordering, paging, projections
//! - [`mutation`] - Bulk update and delete descriptors
//! - [`result`] - Result rows and entity records
//! - [`store`] - The store contract
//! - [`fingerprint`] - Structural descriptor hashes
//! - [`error`] - Protocol error types
//!
//! # Serialization
//!
//! All IR types derive serde. [`Value`] additionally derives rkyv so stores
//! can persist rows with zero-copy access:
//!
//! ```ignore
//! use ormq_proto::Value;
//!
//! let value = Value::String("hello".into());
//! let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(&value).unwrap();
//! let back: Value = rkyv::from_bytes::<Value, rkyv::rancor::Error>(&bytes).unwrap();
//! ```

pub mod error;
pub mod expr;
pub mod fingerprint;
pub mod mutation;
pub mod query;
pub mod result;
pub mod store;
pub mod value;

pub use error::Error;

// Re-export commonly used types at crate root
pub use expr::{
    AggregateFunction, ArithOp, CaseBranch, CaseCondition, CaseExpr, CompareOp, Expr, Function,
    InSet, PredicateExpr, escape_like,
};
pub use fingerprint::Fingerprint;
pub use mutation::{Assignment, MutationDescriptor, MutationKind};
pub use query::{
    JoinKind, JoinSpec, NullOrdering, OrderDirection, OrderSpec, Pagination, Projection,
    QueryDescriptor, RecordBinding, RelationRef, SelectItem, Shape, Source,
};
pub use result::{Datum, EntityRecord, FetchedRelation, Row};
pub use store::RelationalStore;
pub use value::{Value, ValueType};
