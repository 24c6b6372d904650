//! Catalog manager for entity and relation metadata.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{EntityDef, RelationDef};
use crate::error::Error;

/// Registry of entities and the relations between them.
#[derive(Debug, Default)]
pub struct Catalog {
    entities: RwLock<HashMap<String, Arc<EntityDef>>>,
    relations: RwLock<HashMap<(String, String), RelationDef>>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Catalog::register_entity`].
    pub fn with_entity(self, entity: EntityDef) -> Result<Self, Error> {
        self.register_entity(entity)?;
        Ok(self)
    }

    /// Builder form of [`Catalog::register_relation`].
    pub fn with_relation(self, relation: RelationDef) -> Result<Self, Error> {
        self.register_relation(relation)?;
        Ok(self)
    }

    /// Register an entity. Replaces any previous definition with the same name.
    pub fn register_entity(&self, entity: EntityDef) -> Result<(), Error> {
        if entity.get_identity_field().is_none() {
            return Err(Error::UnknownField {
                entity: entity.name.clone(),
                field: entity.identity_field.clone(),
            });
        }
        self.entities
            .write()
            .insert(entity.name.clone(), Arc::new(entity));
        Ok(())
    }

    /// Register a relation. Both ends and their fields must already exist.
    pub fn register_relation(&self, relation: RelationDef) -> Result<(), Error> {
        let from = self.get_entity(&relation.from_entity)?;
        let to = self.get_entity(&relation.to_entity)?;
        for (entity, field) in [(&from, &relation.from_field), (&to, &relation.to_field)] {
            if entity.get_field(field).is_none() {
                return Err(Error::UnknownField {
                    entity: entity.name.clone(),
                    field: field.clone(),
                });
            }
        }
        self.relations.write().insert(
            (relation.from_entity.clone(), relation.name.clone()),
            relation,
        );
        Ok(())
    }

    /// Get an entity definition by name.
    pub fn get_entity(&self, name: &str) -> Result<Arc<EntityDef>, Error> {
        self.entities
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownEntity(name.to_string()))
    }

    /// Get a relation owned by `entity`.
    pub fn get_relation(&self, entity: &str, name: &str) -> Result<RelationDef, Error> {
        self.relations
            .read()
            .get(&(entity.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| Error::UnknownRelation {
                entity: entity.to_string(),
                relation: name.to_string(),
            })
    }

    /// List all entity names, sorted.
    pub fn list_entities(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entities.read().keys().cloned().collect();
        names.sort();
        names
    }
}
