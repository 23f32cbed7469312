//! # Party Repository
//!
//! Party ledger entries and balance snapshots.
//!
//! Writes only happen inside a journal commit (see `store.rs`); this
//! repository exposes reads on the pool and write helpers that take the
//! transaction's connection.
//!
//! ## Balance Upsert
//! ```text
//! INSERT INTO party_balances (party_id, scope, ...) VALUES (...)
//! ON CONFLICT (party_id, scope) DO UPDATE
//!     SET balance = balance + excluded.balance
//!
//! One statement: get-or-create and add the delta cannot interleave with a
//! concurrent commit for the same key.
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use tally_core::party::{scope_key, PartyBalance, PartyLedgerEntry};
use tally_core::Money;

/// Repository for party sub-ledger operations.
#[derive(Debug, Clone)]
pub struct PartyRepository {
    pool: SqlitePool,
}

impl PartyRepository {
    /// Creates a new PartyRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PartyRepository { pool }
    }

    /// Balance snapshot for (party, scope).
    pub async fn balance(&self, party_id: &str, outlet_id: Option<&str>) -> DbResult<Option<PartyBalance>> {
        let balance = sqlx::query_as::<_, PartyBalance>(
            r#"
            SELECT party_id, outlet_id, balance, as_of_utc
            FROM party_balances
            WHERE party_id = ?1 AND scope = ?2
            "#,
        )
        .bind(party_id)
        .bind(scope_key(outlet_id))
        .fetch_optional(&self.pool)
        .await?;

        Ok(balance)
    }

    /// Every snapshot in a scope, by party.
    pub async fn balances(&self, outlet_id: Option<&str>) -> DbResult<Vec<PartyBalance>> {
        let balances = sqlx::query_as::<_, PartyBalance>(
            r#"
            SELECT party_id, outlet_id, balance, as_of_utc
            FROM party_balances
            WHERE scope = ?1
            ORDER BY party_id
            "#,
        )
        .bind(scope_key(outlet_id))
        .fetch_all(&self.pool)
        .await?;

        Ok(balances)
    }

    /// Entries for (party, scope), oldest first.
    pub async fn entries(&self, party_id: &str, outlet_id: Option<&str>) -> DbResult<Vec<PartyLedgerEntry>> {
        let entries = sqlx::query_as::<_, PartyLedgerEntry>(
            r#"
            SELECT
                id, transaction_id, party_id, outlet_id, ts_utc,
                doc_type, doc_id, debit, credit, description
            FROM party_ledger_entries
            WHERE party_id = ?1 AND IFNULL(outlet_id, '') = ?2
            ORDER BY ts_utc, rowid
            "#,
        )
        .bind(party_id)
        .bind(scope_key(outlet_id))
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Balance recomputed from entries; must equal the snapshot.
    pub async fn replayed_balance(&self, party_id: &str, outlet_id: Option<&str>) -> DbResult<Money> {
        let net: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(debit), 0) - COALESCE(SUM(credit), 0)
            FROM party_ledger_entries
            WHERE party_id = ?1 AND IFNULL(outlet_id, '') = ?2
            "#,
        )
        .bind(party_id)
        .bind(scope_key(outlet_id))
        .fetch_one(&self.pool)
        .await?;

        Ok(Money::from_cents(net))
    }

    // =========================================================================
    // Transaction-scoped helpers
    // =========================================================================

    pub(crate) async fn insert_entry(conn: &mut SqliteConnection, entry: &PartyLedgerEntry) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO party_ledger_entries (
                id, transaction_id, party_id, outlet_id, ts_utc,
                doc_type, doc_id, debit, credit, description
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.transaction_id)
        .bind(&entry.party_id)
        .bind(&entry.outlet_id)
        .bind(entry.ts_utc)
        .bind(entry.doc_type)
        .bind(&entry.doc_id)
        .bind(entry.debit)
        .bind(entry.credit)
        .bind(&entry.description)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Adds `delta` to the (party, scope) snapshot, creating it if needed.
    pub(crate) async fn apply_delta(
        conn: &mut SqliteConnection,
        party_id: &str,
        outlet_id: Option<&str>,
        delta: Money,
        written_at: DateTime<Utc>,
    ) -> DbResult<()> {
        debug!(party_id = %party_id, outlet_id = ?outlet_id, delta = %delta, "Applying party balance delta");

        sqlx::query(
            r#"
            INSERT INTO party_balances (party_id, scope, outlet_id, balance, as_of_utc)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (party_id, scope) DO UPDATE
                SET balance = balance + excluded.balance,
                    as_of_utc = excluded.as_of_utc
            "#,
        )
        .bind(party_id)
        .bind(scope_key(outlet_id))
        .bind(outlet_id)
        .bind(delta)
        .bind(written_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}
