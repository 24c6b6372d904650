//! Query evaluation for the reference store.
//!
//! The evaluator runs every stage in memory over table snapshots:
//! - [`JoinStrategy`] picks nested-loop or hash joins per join
//! - LIKE matching lives in [`like_match`]
//! - grouping, aggregates and ordering follow SQL semantics, with NULL as the
//!   smallest value unless a placement is requested

mod aggregate;
mod eval;
mod executor;
mod filter;
mod join;
mod key;
mod scope;

pub use executor::Evaluator;
pub use filter::like_match;
pub use join::JoinStrategy;
pub use key::ValueKey;

pub(crate) use scope::{Env, Scope};
