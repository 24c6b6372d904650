//! ORMQ - typed query builder.
//!
//! Queries are composed from typed paths, predicates and projections into
//! an [`ormq_proto::QueryDescriptor`], run by any
//! [`ormq_proto::RelationalStore`], and decoded back into Rust values.
//!
//! # Modules
//!
//! - [`path`] - Typed entity, field and relation references
//! - [`expression`] - Comparisons, functions, aggregates and CASE
//! - [`predicate`] - Predicate composition and optional filters
//! - [`projection`] - Scalar, tuple, entity and record projections
//! - [`query`] - The query composer and subqueries
//! - [`mutation`] - Bulk update and delete
//! - [`executor`] - Fetching results and paging
//!
//! # Example
//!
//! ```ignore
//! use ormq::prelude::*;
//!
//! let factory = QueryFactory::new(&db);
//! let m = QMember::new("m");
//! let page = factory
//!     .select_from(&m)
//!     .where_(all_of([
//!         Predicate::when_not_empty(cond.username, |u| m.username.eq(u)),
//!         Predicate::when(cond.age_goe, |a| m.age.goe(a)),
//!     ]))
//!     .order_by(m.username.desc())
//!     .offset(1)
//!     .limit(2)
//!     .fetch_page()?;
//! ```

pub mod error;
pub mod executor;
pub mod expression;
pub mod factory;
pub mod mutation;
pub mod path;
pub mod predicate;
pub mod projection;
pub mod query;
mod validate;
pub mod value;

pub use error::Error;
pub use executor::{Executor, QueryResults};
pub use expression::{
    CaseBuilder, Expression, Expressions, InOperand, NumericExpr, Operand, OrderSpecifier,
    StringExpr, TypedExpr,
};
pub use factory::QueryFactory;
pub use mutation::{DeleteClause, UpdateClause};
pub use path::{EntityPath, EntityRef, Path, RelationPath};
pub use predicate::{all_of, any_of, BooleanBuilder, IntoFilter, OptionalPredicate, Predicate};
pub use projection::{
    Association, Column, Entity, Projections, QueryProjection, RecordType, Selectable, Selection,
    Tuple,
};
pub use query::{ComposedQuery, Query, SubQuery};
pub use value::{FromValue, Numeric, SqlType};

/// Re-export protocol types.
pub use ormq_proto as proto;

/// Traits and constructors needed to write queries.
pub mod prelude {
    pub use crate::expression::{CaseBuilder, Expressions, NumericExpr, StringExpr, TypedExpr};
    pub use crate::path::{EntityPath, EntityRef, Path, RelationPath};
    pub use crate::predicate::{all_of, any_of, BooleanBuilder, OptionalPredicate, Predicate};
    pub use crate::projection::{Projections, Selection};
    pub use crate::query::SubQuery;
    pub use crate::{Error, QueryFactory};
}
