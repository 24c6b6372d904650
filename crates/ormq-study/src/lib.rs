//! Member/Team walkthrough of the `ormq` typed query builder.
//!
//! The crate defines the tutorial entities and their field-reference
//! structs, a handful of DTOs, a [`MemberRepository`] built on the query
//! factory, and the `ormq-study` command-line application that runs it all
//! against the reference store.

pub mod app;
pub mod config;
pub mod domain;
pub mod dto;
pub mod error;
pub mod fixtures;
pub mod formatter;
pub mod repository;
pub mod schema;

pub use app::App;
pub use config::{Args, Command, StudyConfig};
pub use domain::{Member, QMember, QTeam, Team};
pub use dto::{MemberDto, MemberSearchCondition, MemberTeamDto, QMemberTeamDto, TeamAge, UserDto};
pub use error::{Result, StudyError};
pub use formatter::OutputFormat;
pub use repository::MemberRepository;
