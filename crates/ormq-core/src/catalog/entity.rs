//! Entity definitions.

use super::field::FieldDef;

/// An entity definition (table schema).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDef {
    /// Entity name (unique within the catalog).
    pub name: String,
    /// Name of the identity field. Identity values are `Int64`.
    pub identity_field: String,
    /// Field definitions in storage order.
    pub fields: Vec<FieldDef>,
}

impl EntityDef {
    /// Create a new entity definition.
    pub fn new(name: impl Into<String>, identity_field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identity_field: identity_field.into(),
            fields: Vec::new(),
        }
    }

    /// Add a field to the entity.
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Add multiple fields.
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = FieldDef>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Get a field by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Get the identity field definition.
    pub fn get_identity_field(&self) -> Option<&FieldDef> {
        self.get_field(&self.identity_field)
    }

    /// Whether `name` is the identity field.
    pub fn is_identity(&self, name: &str) -> bool {
        self.identity_field == name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ormq_proto::ValueType;

    fn member() -> EntityDef {
        EntityDef::new("Member", "id")
            .with_field(FieldDef::new("id", ValueType::Int64))
            .with_field(FieldDef::optional("username", ValueType::String))
            .with_field(FieldDef::new("age", ValueType::Int32))
    }

    #[test]
    fn test_entity_builder() {
        let entity = member();
        assert_eq!(entity.name, "Member");
        assert_eq!(entity.identity_field, "id");
        assert_eq!(entity.fields.len(), 3);
    }

    #[test]
    fn test_get_field() {
        let entity = member();
        assert!(entity.get_field("age").is_some());
        assert!(entity.get_field("nonexistent").is_none());
        assert!(entity.get_identity_field().is_some());
        assert!(entity.is_identity("id"));
    }
}
