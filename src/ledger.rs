//! Applied-state ledger.
//!
//! One row per applied migration in the `migrations` table. The ledger is
//! the only record of what has run; nothing is inferred from the files.

use serde::Serialize;
use sqlx::{AnyConnection, Row};

use crate::error::{MigrateError, MigrateResult};

/// Name of the ledger table.
pub const LEDGER_TABLE: &str = "migrations";

/// DDL for the ledger. `CURRENT_TIMESTAMP` works on every supported backend.
pub const LEDGER_DDL: &str = "CREATE TABLE IF NOT EXISTS migrations (
    id BIGINT PRIMARY KEY,
    filename TEXT,
    ran_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)";

/// A ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub filename: Option<String>,
    pub applied_at: Option<String>,
}

/// Create the ledger table if it doesn't exist.
pub async fn ensure_schema(conn: &mut AnyConnection) -> MigrateResult<()> {
    sqlx::query(LEDGER_DDL)
        .execute(&mut *conn)
        .await
        .map_err(MigrateError::Transport)?;
    Ok(())
}

/// Ids of all applied migrations, ascending.
pub async fn list_applied(conn: &mut AnyConnection) -> MigrateResult<Vec<i64>> {
    let rows = sqlx::query("SELECT id FROM migrations ORDER BY id")
        .fetch_all(&mut *conn)
        .await
        .map_err(MigrateError::Transport)?;

    rows.iter()
        .map(|row| row.try_get::<i64, _>("id").map_err(MigrateError::Transport))
        .collect()
}

/// Full ledger rows, ascending by id.
pub async fn list_entries(conn: &mut AnyConnection) -> MigrateResult<Vec<LedgerEntry>> {
    let rows = sqlx::query(
        "SELECT id, filename, CAST(ran_at AS TEXT) AS ran_at FROM migrations ORDER BY id",
    )
    .fetch_all(&mut *conn)
    .await
    .map_err(MigrateError::Transport)?;

    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        entries.push(LedgerEntry {
            id: row.try_get("id").map_err(MigrateError::Transport)?,
            filename: row.try_get("filename").map_err(MigrateError::Transport)?,
            applied_at: row.try_get("ran_at").map_err(MigrateError::Transport)?,
        });
    }
    Ok(entries)
}

/// Insert the ledger row for an applied migration.
///
/// Must run on the connection of the migration's own transaction.
pub async fn record_applied(
    conn: &mut AnyConnection,
    id: i64,
    filename: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO migrations (id, filename) VALUES ($1, $2)")
        .bind(id)
        .bind(filename)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Delete the ledger row of a reverted migration.
///
/// Must run on the connection of the migration's own transaction.
pub async fn record_reverted(conn: &mut AnyConnection, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM migrations WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
