//! Member/Team entities and their field-reference structs.

use ormq::projection::field;
use ormq::proto::EntityRecord;
use ormq::{Association, Entity, EntityPath, EntityRef, Error, Path, RelationPath};
use serde::Serialize;

use crate::schema::{MEMBER, TEAM};

/// A team.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
}

impl Entity for Team {
    const NAME: &'static str = TEAM;

    fn from_record(record: &EntityRecord) -> Result<Self, Error> {
        Ok(Self {
            id: field(record, "id")?,
            name: field(record, "name")?,
        })
    }
}

/// A member, optionally belonging to a team.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub id: i64,
    pub username: Option<String>,
    pub age: i32,
    pub team: Association<Team>,
}

impl Member {
    /// The team name if the team was fetched with the member.
    pub fn team_name(&self) -> Option<&str> {
        self.team.get().map(|team| team.name.as_str())
    }
}

impl Entity for Member {
    const NAME: &'static str = MEMBER;

    fn from_record(record: &EntityRecord) -> Result<Self, Error> {
        Ok(Self {
            id: field(record, "id")?,
            username: field(record, "username")?,
            age: field(record, "age")?,
            team: Association::decode(record, "team", "team_id")?,
        })
    }
}

/// Field references of [`Team`] under one alias.
#[derive(Debug, Clone)]
pub struct QTeam {
    entity: EntityPath<Team>,
    pub id: Path<i64>,
    pub name: Path<String>,
    pub members: RelationPath<Team, Member>,
}

impl QTeam {
    pub fn new(alias: &str) -> Self {
        let entity = EntityPath::new(alias);
        Self {
            id: entity.field("id"),
            name: entity.field("name"),
            members: entity.relation("members"),
            entity,
        }
    }

    /// The default `team` alias.
    pub fn team() -> Self {
        Self::new("team")
    }
}

impl EntityRef for QTeam {
    type Entity = Team;

    fn entity_path(&self) -> &EntityPath<Team> {
        &self.entity
    }
}

/// Field references of [`Member`] under one alias.
#[derive(Debug, Clone)]
pub struct QMember {
    entity: EntityPath<Member>,
    pub id: Path<i64>,
    pub username: Path<String>,
    pub age: Path<i32>,
    pub team: RelationPath<Member, Team>,
}

impl QMember {
    pub fn new(alias: &str) -> Self {
        let entity = EntityPath::new(alias);
        Self {
            id: entity.field("id"),
            username: entity.field("username"),
            age: entity.field("age"),
            team: entity.relation("team"),
            entity,
        }
    }

    /// The default `member` alias.
    pub fn member() -> Self {
        Self::new("member")
    }
}

impl EntityRef for QMember {
    type Entity = Member;

    fn entity_path(&self) -> &EntityPath<Member> {
        &self.entity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ormq::proto::{Expr, Value};
    use ormq::TypedExpr;

    #[test]
    fn test_aliases_share_columns() {
        let m1 = QMember::member();
        let m2 = QMember::new("m2");
        assert_eq!(m1.age.to_expr(), Expr::column("member", "age"));
        assert_eq!(m2.age.to_expr(), Expr::column("m2", "age"));
        assert_eq!(m1.team.name(), "team");
    }

    #[test]
    fn test_member_decodes_unloaded_team() {
        let record = EntityRecord::new(
            MEMBER,
            Value::Int64(1),
            vec![
                ("id".into(), Value::Int64(1)),
                ("username".into(), Value::from("member1")),
                ("age".into(), Value::Int32(10)),
                ("team_id".into(), Value::Int64(7)),
            ],
        );

        let member = Member::from_record(&record).unwrap();
        assert_eq!(member.username.as_deref(), Some("member1"));
        assert_eq!(
            member.team,
            Association::Unloaded {
                key: Some(Value::Int64(7))
            }
        );
        assert_eq!(member.team_name(), None);
    }
}
