//! Migration execution engine.
//!
//! Computes the delta between the files on disk and the ledger, then
//! applies or reverts it one migration at a time. Each migration runs in
//! its own transaction together with its ledger update, and the first
//! failure stops the run. Whatever committed before the failure stays
//! committed, so re-running after a fix picks up where it stopped.

use std::collections::HashSet;
use std::path::Path;

use sqlx::{AnyConnection, Connection, Executor};

use crate::error::{MigrateError, MigrateResult};
use crate::ledger;
use crate::report::{Report, StatusReport};
use crate::session::Session;
use crate::source::{self, Direction, MigrationUnit};

/// Outcome of a successful `up` or `down` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub direction: Direction,
    /// Ids committed by this run, in execution order.
    pub completed: Vec<i64>,
}

impl RunSummary {
    fn new(direction: Direction) -> Self {
        Self {
            direction,
            completed: Vec::new(),
        }
    }
}

/// Units whose id is not in the ledger, ascending.
pub fn pending<'a>(units: &'a [MigrationUnit], applied: &[i64]) -> Vec<&'a MigrationUnit> {
    let applied: HashSet<i64> = applied.iter().copied().collect();
    let mut pending: Vec<_> = units.iter().filter(|u| !applied.contains(&u.id)).collect();
    pending.sort_by_key(|u| u.id);
    pending
}

/// The last `steps` applied ids, most recent first.
pub fn rollback_ids(applied: &[i64], steps: usize) -> Vec<i64> {
    let mut sorted = applied.to_vec();
    sorted.sort_unstable();
    let start = sorted.len().saturating_sub(steps);
    sorted[start..].iter().rev().copied().collect()
}

/// Apply every pending migration in `dir`, ascending by id.
pub async fn up(
    session: &mut Session,
    dir: &Path,
    report: &mut dyn Report,
) -> MigrateResult<RunSummary> {
    let units = source::list_units(dir)?;
    let applied = ledger::list_applied(session.connection()).await?;
    let pending = pending(&units, &applied);

    tracing::debug!(
        discovered = units.len(),
        applied = applied.len(),
        pending = pending.len(),
        "computed delta"
    );

    let mut summary = RunSummary::new(Direction::Up);
    if pending.is_empty() {
        report.nothing_to_do(Direction::Up);
        return Ok(summary);
    }

    report.starting(Direction::Up, pending.len());
    for unit in pending {
        run_unit(session.connection(), unit, Direction::Up, report).await?;
        summary.completed.push(unit.id);
    }

    report.finished(&summary);
    Ok(summary)
}

/// Revert the last `steps` applied migrations, most recent first.
pub async fn down(
    session: &mut Session,
    dir: &Path,
    steps: usize,
    report: &mut dyn Report,
) -> MigrateResult<RunSummary> {
    if steps == 0 {
        return Err(MigrateError::Config("Invalid step count".to_string()));
    }

    let applied = ledger::list_applied(session.connection()).await?;
    let mut summary = RunSummary::new(Direction::Down);
    if applied.is_empty() {
        report.nothing_to_do(Direction::Down);
        return Ok(summary);
    }

    let units = source::list_units(dir)?;
    let to_undo = rollback_ids(&applied, steps);

    tracing::debug!(applied = applied.len(), ?to_undo, "computed rollback set");

    report.starting(Direction::Down, to_undo.len());
    for id in to_undo {
        let unit = units
            .iter()
            .find(|u| u.id == id)
            .ok_or(MigrateError::NotFound(id))?;
        run_unit(session.connection(), unit, Direction::Down, report).await?;
        summary.completed.push(id);
    }

    report.finished(&summary);
    Ok(summary)
}

/// Applied/pending state of every migration. Read-only.
pub async fn status(session: &mut Session, dir: &Path) -> MigrateResult<StatusReport> {
    let units = source::list_units(dir)?;
    let entries = ledger::list_entries(session.connection()).await?;
    Ok(StatusReport::build(&units, &entries))
}

/// Run one migration in its own transaction.
async fn run_unit(
    conn: &mut AnyConnection,
    unit: &MigrationUnit,
    direction: Direction,
    report: &mut dyn Report,
) -> MigrateResult<()> {
    if unit.script(direction).is_empty() {
        return Err(MigrateError::content(&unit.filename, direction));
    }

    let mut tx = conn
        .begin()
        .await
        .map_err(|e| MigrateError::execution(&unit.filename, e))?;
    report.unit_started(unit, direction);

    let outcome = execute_unit(&mut tx, unit, direction).await;
    if let Err(e) = outcome {
        tracing::debug!(id = unit.id, error = %e, "rolling back");
        if let Err(rollback) = tx.rollback().await {
            tracing::warn!(id = unit.id, error = %rollback, "rollback failed");
        }
        return Err(MigrateError::execution(&unit.filename, e));
    }

    tx.commit()
        .await
        .map_err(|e| MigrateError::execution(&unit.filename, e))?;

    tracing::info!(id = unit.id, filename = %unit.filename, %direction, "committed");
    report.unit_finished(unit, direction);
    Ok(())
}

/// Script plus ledger update, inside the caller's transaction.
async fn execute_unit(
    conn: &mut AnyConnection,
    unit: &MigrationUnit,
    direction: Direction,
) -> Result<(), sqlx::Error> {
    (&mut *conn).execute(unit.script(direction)).await?;
    match direction {
        Direction::Up => ledger::record_applied(conn, unit.id, &unit.filename).await,
        Direction::Down => ledger::record_reverted(conn, unit.id).await,
    }
}
