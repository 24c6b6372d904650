//! Command dispatch over an opened store.

use ormq_core::Database;
use tracing::info;

use crate::config::{Command, StudyConfig};
use crate::error::Result;
use crate::fixtures;
use crate::formatter::{create_formatter, Formatter};
use crate::repository::MemberRepository;
use crate::schema;

/// An opened walkthrough database and its output formatter.
pub struct App {
    db: Database,
    formatter: Box<dyn Formatter>,
}

impl App {
    /// Open the configured store, loading the fixtures into an empty one.
    pub fn open(config: &StudyConfig) -> Result<Self> {
        let db = Database::open(schema::catalog()?, config.database_config())?;
        if MemberRepository::new(&db).count()? == 0 {
            fixtures::seed(&db)?;
            db.flush()?;
        }
        info!(
            data_path = ?config.data_path,
            format = %config.format,
            "study database ready"
        );
        Ok(Self {
            db,
            formatter: create_formatter(config.format),
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn repository(&self) -> MemberRepository<'_, Database> {
        MemberRepository::new(&self.db)
    }

    /// Run one command and render its output.
    pub fn run(&self, command: &Command) -> Result<String> {
        let repository = self.repository();
        match command {
            Command::Members => {
                let members = repository.search(&Default::default())?;
                self.formatter.format_members(&members)
            }
            Command::Search { .. } => {
                let condition = command.search_condition().unwrap_or_default();
                let members = repository.search(&condition)?;
                self.formatter.format_members(&members)
            }
            Command::Page { offset, limit } => {
                let page = repository.search_page(&Default::default(), *offset, *limit)?;
                self.formatter.format_page(&page)
            }
            Command::Stats => {
                let ages = repository.team_ages()?;
                self.formatter.format_team_ages(&ages)
            }
            Command::BumpAges { by, below } => {
                let affected = repository.bump_ages(*by, *below)?;
                self.db.flush()?;
                self.formatter.format_affected(affected)
            }
        }
    }
}
