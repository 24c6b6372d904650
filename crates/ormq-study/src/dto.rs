//! Result shapes the repository and CLI project into.

use ormq::proto::{Value, ValueType};
use ormq::{Column, Error, FromValue, QueryProjection, RecordType, Selectable, Tuple};
use serde::{Deserialize, Serialize};

use crate::domain::{QMember, QTeam};

/// Username and age, bound by property, field or constructor.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemberDto {
    pub username: Option<String>,
    pub age: i32,
}

impl MemberDto {
    pub fn new(username: impl Into<String>, age: i32) -> Self {
        Self {
            username: Some(username.into()),
            age,
        }
    }
}

impl RecordType for MemberDto {
    const NAME: &'static str = "MemberDto";
    const PROPERTIES: &'static [(&'static str, ValueType)] =
        &[("username", ValueType::String), ("age", ValueType::Int32)];
    const CONSTRUCTOR: Option<&'static [ValueType]> =
        Some(&[ValueType::String, ValueType::Int32]);

    fn set_property(&mut self, name: &str, value: &Value) -> Result<(), Error> {
        match name {
            "username" => self.username = FromValue::from_value(value)?,
            "age" => self.age = FromValue::from_value(value)?,
            other => return Err(Error::Binding(format!("MemberDto has no property `{other}`"))),
        }
        Ok(())
    }

    fn construct(values: &[Value]) -> Result<Self, Error> {
        match values {
            [username, age] => Ok(Self {
                username: FromValue::from_value(username)?,
                age: FromValue::from_value(age)?,
            }),
            _ => Err(Error::Binding(format!(
                "MemberDto takes 2 arguments, got {}",
                values.len()
            ))),
        }
    }
}

/// A DTO whose slot names differ from the entity's field names, so
/// projections must label `username` as `name`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserDto {
    pub name: Option<String>,
    pub age: i32,
}

impl RecordType for UserDto {
    const NAME: &'static str = "UserDto";
    const PROPERTIES: &'static [(&'static str, ValueType)] =
        &[("name", ValueType::String), ("age", ValueType::Int32)];

    fn set_property(&mut self, name: &str, value: &Value) -> Result<(), Error> {
        match name {
            "name" => self.name = FromValue::from_value(value)?,
            "age" => self.age = FromValue::from_value(value)?,
            other => return Err(Error::Binding(format!("UserDto has no property `{other}`"))),
        }
        Ok(())
    }
}

/// One member joined with its (optional) team.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberTeamDto {
    pub member_id: i64,
    pub username: Option<String>,
    pub age: i32,
    pub team_id: Option<i64>,
    pub team_name: Option<String>,
}

/// Hand-written projection producing [`MemberTeamDto`] from a member and a
/// left-joined team.
#[derive(Debug, Clone)]
pub struct QMemberTeamDto {
    member: QMember,
    team: QTeam,
}

impl QMemberTeamDto {
    pub fn new(member: &QMember, team: &QTeam) -> Self {
        Self {
            member: member.clone(),
            team: team.clone(),
        }
    }
}

impl QueryProjection for QMemberTeamDto {
    type Output = MemberTeamDto;

    fn columns(&self) -> Vec<Column> {
        vec![
            self.member.id.column(),
            self.member.username.column(),
            self.member.age.column(),
            self.team.id.column(),
            self.team.name.column(),
        ]
    }

    fn construct(&self, tuple: &Tuple) -> Result<MemberTeamDto, Error> {
        Ok(MemberTeamDto {
            member_id: tuple
                .get(&self.member.id)?
                .ok_or_else(|| Error::Decode("member id is null".into()))?,
            username: tuple.get(&self.member.username)?,
            age: tuple.get(&self.member.age)?.unwrap_or_default(),
            team_id: tuple.get(&self.team.id)?,
            team_name: tuple.get(&self.team.name)?,
        })
    }
}

/// Average member age of one team.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamAge {
    pub team_name: String,
    pub average_age: f64,
}

/// Optional filters of a member search. Absent or blank fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberSearchCondition {
    pub username: Option<String>,
    pub team_name: Option<String>,
    pub age_goe: Option<i32>,
    pub age_loe: Option<i32>,
}

impl MemberSearchCondition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_team_name(mut self, team_name: impl Into<String>) -> Self {
        self.team_name = Some(team_name.into());
        self
    }

    pub fn with_age_goe(mut self, age: i32) -> Self {
        self.age_goe = Some(age);
        self
    }

    pub fn with_age_loe(mut self, age: i32) -> Self {
        self.age_loe = Some(age);
        self
    }
}
