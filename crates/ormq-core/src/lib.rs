//! ORMQ Core - reference relational store.
//!
//! This crate evaluates [`ormq_proto`] descriptors against in-process
//! tables so the typed builder can run end to end without an external
//! database.
//!
//! # Modules
//!
//! - [`catalog`] - Entity, field and relation definitions
//! - [`storage`] - Table storage backends (memory and sled) and table locks
//! - [`query`] - Descriptor evaluation: joins, filters, grouping, ordering
//! - [`mutation`] - Bulk update and delete
//! - [`config`] - Database configuration and query budgets
//!
//! # Example
//!
//! ```ignore
//! use ormq_core::{Catalog, Database, EntityDef, FieldDef};
//! use ormq_proto::{RelationalStore, Value, ValueType};
//!
//! let catalog = Catalog::new().with_entity(
//!     EntityDef::new("Team", "id")
//!         .with_field(FieldDef::new("id", ValueType::Int64))
//!         .with_field(FieldDef::new("name", ValueType::String)),
//! )?;
//! let db = Database::in_memory(catalog);
//! db.insert("Team", vec![("name".into(), Value::from("teamA"))])?;
//! ```

pub mod catalog;
pub mod config;
pub mod database;
pub mod error;
pub mod mutation;
pub mod query;
pub mod storage;

pub use catalog::{Cardinality, Catalog, EntityDef, FieldDef, RelationDef};
pub use config::{BackendConfig, DatabaseConfig, QueryBudget};
pub use database::Database;
pub use error::Error;
pub use mutation::MutationExecutor;
pub use query::{Evaluator, JoinStrategy};
pub use storage::{MemoryStorage, Record, SledStorage, StorageBackend, StorageConfig};

/// Re-export protocol types.
pub use ormq_proto as proto;
