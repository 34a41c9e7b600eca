//! Progress and status output.

use std::collections::HashMap;
use std::fmt::{self, Write as _};

use colored::*;
use serde::Serialize;

use crate::engine::RunSummary;
use crate::ledger::LedgerEntry;
use crate::source::{Direction, MigrationUnit};

/// Receives progress events while the engine runs.
pub trait Report {
    fn nothing_to_do(&mut self, direction: Direction);
    fn starting(&mut self, direction: Direction, count: usize);
    fn unit_started(&mut self, unit: &MigrationUnit, direction: Direction);
    fn unit_finished(&mut self, unit: &MigrationUnit, direction: Direction);
    fn finished(&mut self, summary: &RunSummary);
}

/// Prints progress to stdout.
#[derive(Debug, Default)]
pub struct ConsoleReport;

impl Report for ConsoleReport {
    fn nothing_to_do(&mut self, direction: Direction) {
        let what = match direction {
            Direction::Up => "Nothing to run",
            Direction::Down => "Nothing to rollback",
        };
        println!("{} {}", "✓".green(), what);
    }

    fn starting(&mut self, direction: Direction, count: usize) {
        let verb = match direction {
            Direction::Up => "Running",
            Direction::Down => "Rolling back",
        };
        println!();
        println!("{}", format!("{verb} {count} migration(s)...").cyan().bold());
    }

    fn unit_started(&mut self, unit: &MigrationUnit, _direction: Direction) {
        println!("  {}", unit.filename.yellow());
    }

    fn unit_finished(&mut self, _unit: &MigrationUnit, _direction: Direction) {
        println!("  {}", "✓".green());
    }

    fn finished(&mut self, _summary: &RunSummary) {
        println!();
        println!("{}", "✓ Done".green().bold());
        println!();
    }
}

/// Discards all progress events.
#[derive(Debug, Default)]
pub struct Quiet;

impl Report for Quiet {
    fn nothing_to_do(&mut self, _direction: Direction) {}
    fn starting(&mut self, _direction: Direction, _count: usize) {}
    fn unit_started(&mut self, _unit: &MigrationUnit, _direction: Direction) {}
    fn unit_finished(&mut self, _unit: &MigrationUnit, _direction: Direction) {}
    fn finished(&mut self, _summary: &RunSummary) {}
}

/// State of one migration as seen by `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum UnitState {
    Applied { applied_at: Option<String> },
    Pending,
    /// In the ledger, but the file is gone.
    Orphaned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRow {
    pub id: i64,
    pub filename: String,
    #[serde(flatten)]
    pub state: UnitState,
}

/// Applied vs pending migrations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub rows: Vec<StatusRow>,
    /// Number of ledger entries.
    pub applied: usize,
    /// Number of files not in the ledger.
    pub pending: usize,
}

impl StatusReport {
    /// Join the files on disk with the ledger rows.
    pub fn build(units: &[MigrationUnit], entries: &[LedgerEntry]) -> Self {
        let by_id: HashMap<i64, &LedgerEntry> = entries.iter().map(|e| (e.id, e)).collect();

        let mut rows: Vec<StatusRow> = units
            .iter()
            .map(|unit| StatusRow {
                id: unit.id,
                filename: unit.filename.clone(),
                state: match by_id.get(&unit.id) {
                    Some(entry) => UnitState::Applied {
                        applied_at: entry.applied_at.clone(),
                    },
                    None => UnitState::Pending,
                },
            })
            .collect();

        for entry in entries {
            if units.iter().all(|u| u.id != entry.id) {
                tracing::warn!(id = entry.id, "ledger entry has no migration file");
                rows.push(StatusRow {
                    id: entry.id,
                    filename: entry.filename.clone().unwrap_or_default(),
                    state: UnitState::Orphaned,
                });
            }
        }
        rows.sort_by_key(|r| r.id);

        let pending = rows.iter().filter(|r| r.state == UnitState::Pending).count();
        Self {
            rows,
            applied: entries.len(),
            pending,
        }
    }
}

/// How `status` is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Table,
    Json,
}

/// Render a status report for display.
pub fn render_status(report: &StatusReport, format: Format) -> String {
    match format {
        Format::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
        Format::Table => render_table(report).unwrap_or_default(),
    }
}

fn render_table(report: &StatusReport) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out, "\n{}\n", "Migrations".cyan().bold())?;

    if report.rows.is_empty() {
        writeln!(out, "{}", "No migrations found".dimmed())?;
        return Ok(out);
    }

    for row in &report.rows {
        let written = match &row.state {
            UnitState::Applied { applied_at } => writeln!(
                out,
                "{} {} {}",
                "✓".green(),
                row.filename,
                applied_at.as_deref().unwrap_or_default().dimmed()
            ),
            UnitState::Pending => writeln!(out, "{} {}", "○".dimmed(), row.filename),
            UnitState::Orphaned => writeln!(
                out,
                "{} {} {}",
                "✗".red(),
                if row.filename.is_empty() {
                    format!("#{}", row.id)
                } else {
                    row.filename.clone()
                },
                "(file missing)".red()
            ),
        };
        written?;
    }

    writeln!(out, "\nApplied: {}", report.applied.to_string().green())?;
    writeln!(out, "Pending: {}", report.pending.to_string().yellow())?;
    Ok(out)
}
