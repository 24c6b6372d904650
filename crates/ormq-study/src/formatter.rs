//! Output formatters for command results.

use clap::ValueEnum;
use comfy_table::{Cell, Table};
use ormq::QueryResults;
use serde_json::json;

use crate::dto::{MemberTeamDto, TeamAge};
use crate::error::Result;

/// Output format for results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    #[default]
    Table,
    /// JSON format
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Renders command results.
pub trait Formatter {
    fn format_members(&self, members: &[MemberTeamDto]) -> Result<String>;

    fn format_page(&self, page: &QueryResults<MemberTeamDto>) -> Result<String>;

    fn format_team_ages(&self, ages: &[TeamAge]) -> Result<String>;

    fn format_affected(&self, affected: u64) -> Result<String>;
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Table => Box::new(TableFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// Table formatter using comfy-table.
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn format_members(&self, members: &[MemberTeamDto]) -> Result<String> {
        if members.is_empty() {
            return Ok("No results".to_string());
        }
        Ok(member_table(members).to_string())
    }

    fn format_page(&self, page: &QueryResults<MemberTeamDto>) -> Result<String> {
        let limit = page
            .limit()
            .map_or_else(|| "all".to_string(), |limit| limit.to_string());
        let mut output = self.format_members(page.results())?;
        output.push_str(&format!(
            "\n{} of {} row(s), offset {}, limit {}",
            page.results().len(),
            page.total(),
            page.offset(),
            limit
        ));
        Ok(output)
    }

    fn format_team_ages(&self, ages: &[TeamAge]) -> Result<String> {
        let mut table = Table::new();
        table.set_header(vec!["team", "average age"]);
        for age in ages {
            table.add_row(vec![
                Cell::new(&age.team_name),
                Cell::new(format!("{:.1}", age.average_age)),
            ]);
        }
        Ok(table.to_string())
    }

    fn format_affected(&self, affected: u64) -> Result<String> {
        Ok(format!("{} row(s) affected", affected))
    }
}

fn member_table(members: &[MemberTeamDto]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["id", "username", "age", "team"]);
    for member in members {
        table.add_row(vec![
            Cell::new(member.member_id),
            Cell::new(member.username.as_deref().unwrap_or("null")),
            Cell::new(member.age),
            Cell::new(member.team_name.as_deref().unwrap_or("null")),
        ]);
    }
    table
}

/// JSON formatter.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_members(&self, members: &[MemberTeamDto]) -> Result<String> {
        Ok(serde_json::to_string_pretty(members)?)
    }

    fn format_page(&self, page: &QueryResults<MemberTeamDto>) -> Result<String> {
        let value = json!({
            "results": page.results(),
            "total": page.total(),
            "offset": page.offset(),
            "limit": page.limit(),
        });
        Ok(serde_json::to_string_pretty(&value)?)
    }

    fn format_team_ages(&self, ages: &[TeamAge]) -> Result<String> {
        Ok(serde_json::to_string_pretty(ages)?)
    }

    fn format_affected(&self, affected: u64) -> Result<String> {
        Ok(json!({ "affected": affected }).to_string())
    }
}
