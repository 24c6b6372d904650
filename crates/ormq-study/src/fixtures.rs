//! Walkthrough data set.

use ormq_core::Database;
use ormq_proto::Value;
use tracing::info;

use crate::error::Result;
use crate::schema::{MEMBER, TEAM};

/// Teams and their members: `teamA` holds member1 (10) and member2 (20),
/// `teamB` holds member3 (30) and member4 (40).
pub const FIXTURE: &[(&str, &[(&str, i32)])] = &[
    ("teamA", &[("member1", 10), ("member2", 20)]),
    ("teamB", &[("member3", 30), ("member4", 40)]),
];

/// Insert the fixture data set.
pub fn seed(db: &Database) -> Result<()> {
    for (team_name, members) in FIXTURE {
        let team = insert_team(db, team_name)?;
        for (username, age) in *members {
            insert_member(db, Some(*username), *age, Some(&team))?;
        }
    }
    info!(teams = FIXTURE.len(), "fixtures loaded");
    Ok(())
}

/// Insert a team and return its key.
pub fn insert_team(db: &Database, name: &str) -> Result<Value> {
    Ok(db.insert(TEAM, vec![("name".into(), Value::from(name))])?)
}

/// Insert a member and return its key.
pub fn insert_member(
    db: &Database,
    username: Option<&str>,
    age: i32,
    team: Option<&Value>,
) -> Result<Value> {
    Ok(db.insert(
        MEMBER,
        vec![
            ("username".into(), Value::from(username)),
            ("age".into(), Value::from(age)),
            ("team_id".into(), team.cloned().unwrap_or(Value::Null)),
        ],
    )?)
}
