//! Relation definitions between entities.

/// Cardinality of a relation as seen from its owning entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Foreign key on the owning entity (`member.team`).
    ManyToOne,
    /// Foreign key on the target entity (`team.members`).
    OneToMany,
}

/// A navigable relation from one entity to another.
///
/// A join through the relation matches rows where the owner's `from_field`
/// equals the target's `to_field`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDef {
    /// Relation name, unique per owning entity.
    pub name: String,
    /// Owning entity name.
    pub from_entity: String,
    /// Field on the owning entity.
    pub from_field: String,
    /// Target entity name.
    pub to_entity: String,
    /// Field on the target entity.
    pub to_field: String,
    /// Relation cardinality.
    pub cardinality: Cardinality,
}

impl RelationDef {
    /// Create a many-to-one relation (foreign key on the owner).
    pub fn many_to_one(
        name: impl Into<String>,
        from_entity: impl Into<String>,
        from_field: impl Into<String>,
        to_entity: impl Into<String>,
        to_field: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            from_entity: from_entity.into(),
            from_field: from_field.into(),
            to_entity: to_entity.into(),
            to_field: to_field.into(),
            cardinality: Cardinality::ManyToOne,
        }
    }

    /// Create a one-to-many relation (foreign key on the target).
    pub fn one_to_many(
        name: impl Into<String>,
        from_entity: impl Into<String>,
        from_field: impl Into<String>,
        to_entity: impl Into<String>,
        to_field: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            from_entity: from_entity.into(),
            from_field: from_field.into(),
            to_entity: to_entity.into(),
            to_field: to_field.into(),
            cardinality: Cardinality::OneToMany,
        }
    }

    /// Get the inverse relation (swapping from/to).
    pub fn inverse(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            from_entity: self.to_entity.clone(),
            from_field: self.to_field.clone(),
            to_entity: self.from_entity.clone(),
            to_field: self.from_field.clone(),
            cardinality: match self.cardinality {
                Cardinality::ManyToOne => Cardinality::OneToMany,
                Cardinality::OneToMany => Cardinality::ManyToOne,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_many_to_one_relation() {
        let rel = RelationDef::many_to_one("team", "Member", "team_id", "Team", "id");
        assert_eq!(rel.cardinality, Cardinality::ManyToOne);
        assert_eq!(rel.from_entity, "Member");
        assert_eq!(rel.to_entity, "Team");
    }

    #[test]
    fn test_inverse_relation() {
        let rel = RelationDef::many_to_one("team", "Member", "team_id", "Team", "id");
        let inverse = rel.inverse("members");

        assert_eq!(inverse.from_entity, "Team");
        assert_eq!(inverse.from_field, "id");
        assert_eq!(inverse.to_entity, "Member");
        assert_eq!(inverse.to_field, "team_id");
        assert_eq!(inverse.cardinality, Cardinality::OneToMany);
    }
}
