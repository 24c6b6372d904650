//! Schema catalog: entities, fields and relations.

mod catalog;
mod entity;
mod field;
mod relation;

pub use catalog::Catalog;
pub use entity::EntityDef;
pub use field::FieldDef;
pub use relation::{Cardinality, RelationDef};
