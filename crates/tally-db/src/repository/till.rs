//! # Till Session Repository
//!
//! ## Session Exclusivity
//! ```text
//! CREATE UNIQUE INDEX idx_till_sessions_one_open
//!     ON till_sessions (outlet_id, counter_id) WHERE close_ts IS NULL;
//!
//! open #1 (OUT1, C1) ──► inserted
//! open #2 (OUT1, C1) ──► UNIQUE constraint failed → UniqueViolation
//! close #1           ──► close_ts set, index slot freed
//! open #3 (OUT1, C1) ──► inserted
//! ```

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use tally_core::TillSession;

/// Repository for till sessions.
#[derive(Debug, Clone)]
pub struct TillSessionRepository {
    pool: SqlitePool,
}

impl TillSessionRepository {
    /// Creates a new TillSessionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TillSessionRepository { pool }
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<TillSession>> {
        let session = sqlx::query_as::<_, TillSession>(
            r#"
            SELECT
                id, outlet_id, counter_id, open_ts, close_ts, opening_float,
                declared_cash, over_short, opened_by, closed_by, close_transaction_id
            FROM till_sessions
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    /// The open session for a counter, if any.
    pub async fn open_for(&self, outlet_id: &str, counter_id: &str) -> DbResult<Option<TillSession>> {
        let session = sqlx::query_as::<_, TillSession>(
            r#"
            SELECT
                id, outlet_id, counter_id, open_ts, close_ts, opening_float,
                declared_cash, over_short, opened_by, closed_by, close_transaction_id
            FROM till_sessions
            WHERE outlet_id = ?1 AND counter_id = ?2 AND close_ts IS NULL
            "#,
        )
        .bind(outlet_id)
        .bind(counter_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    /// Inserts a new open session.
    ///
    /// ## Errors
    /// `UniqueViolation` when the counter already has an open session.
    pub async fn insert(&self, session: &TillSession) -> DbResult<()> {
        debug!(
            id = %session.id,
            outlet_id = %session.outlet_id,
            counter_id = %session.counter_id,
            "Inserting till session"
        );

        sqlx::query(
            r#"
            INSERT INTO till_sessions (
                id, outlet_id, counter_id, open_ts, close_ts, opening_float,
                declared_cash, over_short, opened_by, closed_by, close_transaction_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&session.id)
        .bind(&session.outlet_id)
        .bind(&session.counter_id)
        .bind(session.open_ts)
        .bind(session.close_ts)
        .bind(session.opening_float)
        .bind(session.declared_cash)
        .bind(session.over_short)
        .bind(&session.opened_by)
        .bind(&session.closed_by)
        .bind(&session.close_transaction_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Sessions of a counter, newest first.
    pub async fn history(&self, outlet_id: &str, counter_id: &str) -> DbResult<Vec<TillSession>> {
        let sessions = sqlx::query_as::<_, TillSession>(
            r#"
            SELECT
                id, outlet_id, counter_id, open_ts, close_ts, opening_float,
                declared_cash, over_short, opened_by, closed_by, close_transaction_id
            FROM till_sessions
            WHERE outlet_id = ?1 AND counter_id = ?2
            ORDER BY open_ts DESC
            "#,
        )
        .bind(outlet_id)
        .bind(counter_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(sessions)
    }

    // =========================================================================
    // Transaction-scoped helpers
    // =========================================================================

    /// Writes the terminal close fields.
    ///
    /// ## Returns
    /// `false` if the session was not open (closed concurrently or unknown).
    pub(crate) async fn is_open_in(conn: &mut SqliteConnection, session_id: &str) -> DbResult<bool> {
        let open: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM till_sessions WHERE id = ?1 AND close_ts IS NULL)",
        )
        .bind(session_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(open)
    }

    pub(crate) async fn close_in(conn: &mut SqliteConnection, closing: &TillSession) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE till_sessions
            SET close_ts = ?2,
                declared_cash = ?3,
                over_short = ?4,
                closed_by = ?5,
                close_transaction_id = ?6
            WHERE id = ?1 AND close_ts IS NULL
            "#,
        )
        .bind(&closing.id)
        .bind(closing.close_ts)
        .bind(closing.declared_cash)
        .bind(closing.over_short)
        .bind(&closing.closed_by)
        .bind(&closing.close_transaction_id)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
