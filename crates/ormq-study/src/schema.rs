//! Catalog for the Member/Team schema.

use ormq_core::{Catalog, EntityDef, Error, FieldDef, RelationDef};
use ormq_proto::ValueType;

/// Entity name of teams.
pub const TEAM: &str = "Team";

/// Entity name of members.
pub const MEMBER: &str = "Member";

/// Build the catalog: `Team(id, name)` and `Member(id, username, age,
/// team_id)`, with `Member.team` and its inverse `Team.members`.
pub fn catalog() -> Result<Catalog, Error> {
    let team_relation = RelationDef::many_to_one("team", MEMBER, "team_id", TEAM, "id");
    let members_relation = team_relation.inverse("members");

    Catalog::new()
        .with_entity(
            EntityDef::new(TEAM, "id")
                .with_field(FieldDef::new("id", ValueType::Int64))
                .with_field(FieldDef::new("name", ValueType::String)),
        )?
        .with_entity(
            EntityDef::new(MEMBER, "id").with_fields([
                FieldDef::new("id", ValueType::Int64),
                FieldDef::optional("username", ValueType::String),
                FieldDef::new("age", ValueType::Int32),
                FieldDef::optional("team_id", ValueType::Int64),
            ]),
        )?
        .with_relation(team_relation)?
        .with_relation(members_relation)
}
