//! # Schema Migrations
//!
//! ```text
//! migrations/sqlite/
//! ├── 001_ledger_schema.sql        accounts, journals, party ledger,
//! │                                till sessions, sales, stock movements
//! └── 002_seed_root_accounts.sql   headers 1..5 (Assets .. Expenses)
//! ```
//!
//! Applied files are frozen; schema changes go in the next numbered file.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

static LEDGER_SCHEMA: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Brings the schema to the latest version. Safe to call on every start.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    let pending = pending_versions(pool).await?;
    if pending.is_empty() {
        debug!("Ledger schema up to date");
        return Ok(());
    }

    info!(?pending, "Applying ledger migrations");
    LEDGER_SCHEMA.run(pool).await?;
    Ok(())
}

/// Versions embedded in the binary but not yet recorded in the database.
pub async fn pending_versions(pool: &SqlitePool) -> DbResult<Vec<i64>> {
    let has_table: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations')",
    )
    .fetch_one(pool)
    .await?;

    let applied: Vec<i64> = if has_table {
        sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?
    } else {
        Vec::new()
    };

    Ok(LEDGER_SCHEMA
        .iter()
        .map(|m| m.version)
        .filter(|v| !applied.contains(v))
        .collect())
}
