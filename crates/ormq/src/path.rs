//! Typed references to entities, fields and relations.
//!
//! A path is bound to a query alias. Two paths over the same entity with
//! different aliases refer to different rows, which is how self-joins and
//! subqueries over the same table are written.

use std::fmt;
use std::marker::PhantomData;

use ormq_proto::{Expr, RelationRef, Source};

use crate::expression::TypedExpr;
use crate::projection::Entity;
use crate::value::SqlType;

/// A typed column of an aliased entity.
pub struct Path<T> {
    alias: String,
    field: String,
    _type: PhantomData<fn() -> T>,
}

impl<T> Path<T> {
    /// Create a path to `alias.field`.
    pub fn new(alias: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            field: field.into(),
            _type: PhantomData,
        }
    }

    /// The alias of the owning entity.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// The field name.
    pub fn field(&self) -> &str {
        &self.field
    }
}

impl<T> Clone for Path<T> {
    fn clone(&self) -> Self {
        Self::new(self.alias.clone(), self.field.clone())
    }
}

impl<T> fmt::Debug for Path<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({}.{})", self.alias, self.field)
    }
}

impl<T: SqlType> TypedExpr for Path<T> {
    type Value = T;

    fn to_expr(&self) -> Expr {
        Expr::column(&self.alias, &self.field)
    }
}

/// An entity bound to a query alias.
pub struct EntityPath<E> {
    alias: String,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> EntityPath<E> {
    /// Bind the entity to `alias`.
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            _entity: PhantomData,
        }
    }

    /// The alias.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// A typed field of this entity.
    pub fn field<T>(&self, name: impl Into<String>) -> Path<T> {
        Path::new(self.alias.clone(), name)
    }

    /// A declared relation from this entity to `T`.
    pub fn relation<T: Entity>(&self, name: impl Into<String>) -> RelationPath<E, T> {
        RelationPath {
            from_alias: self.alias.clone(),
            name: name.into(),
            _types: PhantomData,
        }
    }

    /// The FROM/JOIN source for this alias.
    pub fn source(&self) -> Source {
        Source::new(E::NAME, self.alias.clone())
    }
}

impl<E> Clone for EntityPath<E> {
    fn clone(&self) -> Self {
        Self {
            alias: self.alias.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> fmt::Debug for EntityPath<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityPath({} {})", E::NAME, self.alias)
    }
}

/// A declared association from `E` to `T`, such as `member.team`.
pub struct RelationPath<E, T> {
    from_alias: String,
    name: String,
    _types: PhantomData<fn() -> (E, T)>,
}

impl<E, T> RelationPath<E, T> {
    /// The relation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn relation_ref(&self) -> RelationRef {
        RelationRef {
            from_alias: self.from_alias.clone(),
            name: self.name.clone(),
        }
    }
}

impl<E, T> Clone for RelationPath<E, T> {
    fn clone(&self) -> Self {
        Self {
            from_alias: self.from_alias.clone(),
            name: self.name.clone(),
            _types: PhantomData,
        }
    }
}

impl<E, T> fmt::Debug for RelationPath<E, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RelationPath({}.{})", self.from_alias, self.name)
    }
}

/// Anything that names an aliased entity: an [`EntityPath`] or a generated
/// reference struct holding one.
pub trait EntityRef {
    type Entity: Entity;

    fn entity_path(&self) -> &EntityPath<Self::Entity>;
}

impl<E: Entity> EntityRef for EntityPath<E> {
    type Entity = E;

    fn entity_path(&self) -> &EntityPath<E> {
        self
    }
}
