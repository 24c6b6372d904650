//! Command-line arguments and application configuration.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ormq_core::{DatabaseConfig, QueryBudget, StorageConfig};

use crate::dto::MemberSearchCondition;
use crate::formatter::OutputFormat;

/// Default page size of the `page` command.
pub const DEFAULT_PAGE_LIMIT: i64 = 2;

/// Study application configuration.
#[derive(Debug, Clone, Default)]
pub struct StudyConfig {
    /// Sled directory. `None` keeps everything in memory.
    pub data_path: Option<PathBuf>,

    /// Output format.
    pub format: OutputFormat,

    /// Query limits.
    pub budget: QueryBudget,
}

impl StudyConfig {
    /// In-memory configuration with table output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist tables under `path`.
    pub fn with_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = Some(path.into());
        self
    }

    /// Set the output format.
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the query budget.
    pub fn with_budget(mut self, budget: QueryBudget) -> Self {
        self.budget = budget;
        self
    }

    /// The store configuration this maps to.
    pub fn database_config(&self) -> DatabaseConfig {
        let config = match &self.data_path {
            Some(path) => DatabaseConfig::sled(StorageConfig::new(path)),
            None => DatabaseConfig::memory(),
        };
        config.with_budget(self.budget)
    }
}

/// Walk through the typed query builder over the Member/Team fixtures.
#[derive(Parser, Debug)]
#[command(name = "ormq-study")]
#[command(version, about = "Typed query builder walkthrough")]
pub struct Args {
    /// Sled data directory (in-memory when omitted).
    #[arg(short = 'd', long)]
    pub data_path: Option<PathBuf>,

    /// Output format.
    #[arg(long, default_value = "table", value_enum)]
    pub format: OutputFormat,

    /// Maximum rows a query may return.
    #[arg(long)]
    pub max_result_rows: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

/// Walkthrough commands.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List members with their teams.
    Members,

    /// Search members by optional conditions.
    Search {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        team: Option<String>,
        #[arg(long)]
        age_goe: Option<i32>,
        #[arg(long)]
        age_loe: Option<i32>,
    },

    /// Show one page of members.
    Page {
        #[arg(long, default_value_t = 0)]
        offset: i64,
        #[arg(long, default_value_t = DEFAULT_PAGE_LIMIT)]
        limit: i64,
    },

    /// Average member age per team.
    Stats,

    /// Add to member ages in bulk.
    BumpAges {
        /// Amount to add.
        #[arg(long, default_value_t = 1)]
        by: i32,
        /// Only members younger than this.
        #[arg(long)]
        below: Option<i32>,
    },
}

impl Command {
    /// The search condition of a `search` command.
    pub fn search_condition(&self) -> Option<MemberSearchCondition> {
        match self {
            Command::Search {
                username,
                team,
                age_goe,
                age_loe,
            } => Some(MemberSearchCondition {
                username: username.clone(),
                team_name: team.clone(),
                age_goe: *age_goe,
                age_loe: *age_loe,
            }),
            _ => None,
        }
    }
}

impl Args {
    /// Split the arguments into configuration and the command to run.
    pub fn into_config(self) -> (StudyConfig, Command) {
        let mut budget = QueryBudget::default();
        if let Some(max) = self.max_result_rows {
            budget = budget.with_max_result_rows(max);
        }

        let config = StudyConfig {
            data_path: self.data_path,
            format: self.format,
            budget,
        };
        (config, self.command)
    }
}
