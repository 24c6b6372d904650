//! Field definitions for entities.

use ormq_proto::{Value, ValueType};

use crate::error::Error;

/// A field definition within an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Scalar type of stored values.
    pub value_type: ValueType,
    /// Whether NULL may be stored.
    pub nullable: bool,
}

impl FieldDef {
    /// Create a new required field.
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            nullable: false,
        }
    }

    /// Create an optional field.
    pub fn optional(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            nullable: true,
        }
    }

    /// Check a value against this field and widen it to the field's type.
    pub fn coerce(&self, value: Value) -> Result<Value, Error> {
        let Some(actual) = value.value_type() else {
            return if self.nullable {
                Ok(Value::Null)
            } else {
                Err(Error::TypeMismatch(format!(
                    "field {} is not nullable",
                    self.name
                )))
            };
        };

        if !self.value_type.accepts(actual) {
            return Err(Error::TypeMismatch(format!(
                "field {} expects {}, got {}",
                self.name, self.value_type, actual
            )));
        }

        Ok(match (self.value_type, value) {
            (ValueType::Int64, Value::Int32(v)) => Value::Int64(v as i64),
            (ValueType::Float64, Value::Int32(v)) => Value::Float64(v as f64),
            (ValueType::Float64, Value::Int64(v)) => Value::Float64(v as f64),
            (_, v) => v,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_def_builder() {
        let field = FieldDef::new("username", ValueType::String);
        assert_eq!(field.name, "username");
        assert!(!field.nullable);

        let field = FieldDef::optional("team_id", ValueType::Int64);
        assert!(field.nullable);
    }

    #[test]
    fn test_coerce_widens_integers() {
        let field = FieldDef::new("id", ValueType::Int64);
        assert_eq!(field.coerce(Value::Int32(7)).unwrap(), Value::Int64(7));
    }

    #[test]
    fn test_coerce_rejects_null_on_required() {
        let field = FieldDef::new("age", ValueType::Int32);
        assert!(matches!(
            field.coerce(Value::Null),
            Err(Error::TypeMismatch(_))
        ));
        let field = FieldDef::optional("age", ValueType::Int32);
        assert_eq!(field.coerce(Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn test_coerce_rejects_wrong_type() {
        let field = FieldDef::new("age", ValueType::Int32);
        assert!(field.coerce(Value::String("ten".into())).is_err());
        assert!(field.coerce(Value::Int64(10)).is_err());
    }
}
