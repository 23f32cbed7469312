//! # Journal Repository
//!
//! Ledger transactions, their lines and the statement reads over them.
//!
//! ## Ordering
//! Every line read is ordered by `(t.ts_utc, l.seq)`. `seq` is the
//! `AUTOINCREMENT` key of `ledger_lines`, so two journals posted in the
//! same instant still have a stable order.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use std::ops::Bound;
use tracing::debug;

use crate::error::DbResult;
use tally_core::posting::JournalLine;
use tally_core::statement::{AccountTotals, PostedLine};
use tally_core::{Journal, LedgerLine, LedgerTransaction, Money, RefType};

/// Statement row as stored; `ref_type` is parsed leniently afterwards.
#[derive(Debug, FromRow)]
struct PostedLineRow {
    seq: i64,
    transaction_id: String,
    ts_utc: DateTime<Utc>,
    ref_type: String,
    ref_id: String,
    memo: String,
    line_memo: Option<String>,
    debit: Money,
    credit: Money,
}

impl From<PostedLineRow> for PostedLine {
    fn from(row: PostedLineRow) -> Self {
        PostedLine {
            seq: row.seq,
            transaction_id: row.transaction_id,
            ts_utc: row.ts_utc,
            ref_type: row.ref_type.parse().ok(),
            ref_id: row.ref_id,
            memo: row.memo,
            line_memo: row.line_memo,
            debit: row.debit,
            credit: row.credit,
        }
    }
}

/// `AND t.ts_utc <op> ?N` for an upper bound, plus the value to bind.
fn upper_bound_clause(until: Bound<DateTime<Utc>>, param: usize) -> (String, Option<DateTime<Utc>>) {
    match until {
        Bound::Included(t) => (format!("AND t.ts_utc <= ?{}", param), Some(t)),
        Bound::Excluded(t) => (format!("AND t.ts_utc < ?{}", param), Some(t)),
        Bound::Unbounded => (String::new(), None),
    }
}

/// Repository for ledger journals.
#[derive(Debug, Clone)]
pub struct JournalRepository {
    pool: SqlitePool,
}

impl JournalRepository {
    /// Creates a new JournalRepository.
    pub fn new(pool: SqlitePool) -> Self {
        JournalRepository { pool }
    }

    /// Gets a journal with its lines.
    pub async fn get(&self, id: &str) -> DbResult<Option<Journal>> {
        let transaction = sqlx::query_as::<_, LedgerTransaction>(
            r#"
            SELECT id, ts_utc, outlet_id, ref_type, ref_id, memo, created_by, created_at
            FROM ledger_transactions
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match transaction {
            Some(transaction) => {
                let lines = self.lines(&transaction.id).await?;
                Ok(Some(Journal { transaction, lines }))
            }
            None => Ok(None),
        }
    }

    /// All journals posted for a document, oldest first.
    pub async fn for_ref(&self, ref_type: RefType, ref_id: &str) -> DbResult<Vec<Journal>> {
        let transactions = sqlx::query_as::<_, LedgerTransaction>(
            r#"
            SELECT id, ts_utc, outlet_id, ref_type, ref_id, memo, created_by, created_at
            FROM ledger_transactions
            WHERE ref_type = ?1 AND ref_id = ?2
            ORDER BY ts_utc, created_at
            "#,
        )
        .bind(ref_type)
        .bind(ref_id)
        .fetch_all(&self.pool)
        .await?;

        let mut journals = Vec::with_capacity(transactions.len());
        for transaction in transactions {
            let lines = self.lines(&transaction.id).await?;
            journals.push(Journal { transaction, lines });
        }
        Ok(journals)
    }

    /// Lines of one journal in insertion order.
    pub async fn lines(&self, transaction_id: &str) -> DbResult<Vec<LedgerLine>> {
        let lines = sqlx::query_as::<_, LedgerLine>(
            r#"
            SELECT seq, transaction_id, account_id, debit, credit, party_id, line_memo
            FROM ledger_lines
            WHERE transaction_id = ?1
            ORDER BY seq
            "#,
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    /// Number of stored journals.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ledger_transactions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // =========================================================================
    // Statement reads
    // =========================================================================

    /// Σ(debit − credit) for an account up to a bound, opening excluded.
    pub async fn account_net(&self, account_id: &str, until: Bound<DateTime<Utc>>) -> DbResult<Money> {
        let (clause, value) = upper_bound_clause(until, 2);
        let sql = format!(
            r#"
            SELECT COALESCE(SUM(l.debit), 0) - COALESCE(SUM(l.credit), 0)
            FROM ledger_lines l
            JOIN ledger_transactions t ON t.id = l.transaction_id
            WHERE l.account_id = ?1 {}
            "#,
            clause
        );

        let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(account_id);
        if let Some(value) = value {
            query = query.bind(value);
        }
        let net = query.fetch_one(&self.pool).await?;

        Ok(Money::from_cents(net))
    }

    /// Lines for an account with `from <= ts_utc < to`, in statement order.
    pub async fn account_lines(
        &self,
        account_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<PostedLine>> {
        debug!(account_id = %account_id, %from, %to, "Fetching statement lines");

        let rows = sqlx::query_as::<_, PostedLineRow>(
            r#"
            SELECT
                l.seq, l.transaction_id, t.ts_utc, t.ref_type, t.ref_id, t.memo,
                l.line_memo, l.debit, l.credit
            FROM ledger_lines l
            JOIN ledger_transactions t ON t.id = l.transaction_id
            WHERE l.account_id = ?1 AND t.ts_utc >= ?2 AND t.ts_utc < ?3
            ORDER BY t.ts_utc, l.seq
            "#,
        )
        .bind(account_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(PostedLine::from).collect())
    }

    /// Per-account totals for every posting account up to a bound.
    pub async fn account_totals(&self, until: Bound<DateTime<Utc>>) -> DbResult<Vec<AccountTotals>> {
        let (clause, value) = upper_bound_clause(until, 1);
        let sql = format!(
            r#"
            SELECT
                a.id AS account_id, a.code, a.name, a.account_type, a.outlet_id,
                a.opening_debit, a.opening_credit,
                COALESCE(SUM(x.debit), 0) AS total_debit,
                COALESCE(SUM(x.credit), 0) AS total_credit
            FROM accounts a
            LEFT JOIN (
                SELECT l.account_id, l.debit, l.credit
                FROM ledger_lines l
                JOIN ledger_transactions t ON t.id = l.transaction_id
                WHERE 1 = 1 {}
            ) x ON x.account_id = a.id
            WHERE a.is_header = 0
            GROUP BY a.id
            ORDER BY a.code, IFNULL(a.outlet_id, '')
            "#,
            clause
        );

        let mut query = sqlx::query_as::<_, AccountTotals>(&sql);
        if let Some(value) = value {
            query = query.bind(value);
        }
        let totals = query.fetch_all(&self.pool).await?;

        Ok(totals)
    }

    // =========================================================================
    // Transaction-scoped helpers
    // =========================================================================

    pub(crate) async fn ref_exists(
        conn: &mut SqliteConnection,
        ref_type: RefType,
        ref_id: &str,
    ) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM ledger_transactions WHERE ref_type = ?1 AND ref_id = ?2",
        )
        .bind(ref_type)
        .bind(ref_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(count > 0)
    }

    pub(crate) async fn insert_transaction(
        conn: &mut SqliteConnection,
        transaction: &LedgerTransaction,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ledger_transactions (
                id, ts_utc, outlet_id, ref_type, ref_id, memo, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&transaction.id)
        .bind(transaction.ts_utc)
        .bind(&transaction.outlet_id)
        .bind(transaction.ref_type)
        .bind(&transaction.ref_id)
        .bind(&transaction.memo)
        .bind(&transaction.created_by)
        .bind(transaction.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Inserts a line and returns its insertion sequence.
    pub(crate) async fn insert_line(
        conn: &mut SqliteConnection,
        transaction_id: &str,
        line: &JournalLine,
    ) -> DbResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO ledger_lines (
                transaction_id, account_id, debit, credit, party_id, line_memo
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(transaction_id)
        .bind(&line.account_id)
        .bind(line.debit)
        .bind(line.credit)
        .bind(&line.party_id)
        .bind(&line.memo)
        .execute(&mut *conn)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// (Σdebit, Σcredit) of a journal as written.
    pub(crate) async fn transaction_sums(
        conn: &mut SqliteConnection,
        transaction_id: &str,
    ) -> DbResult<(Money, Money)> {
        let (debit, credit): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(debit), 0), COALESCE(SUM(credit), 0)
            FROM ledger_lines
            WHERE transaction_id = ?1
            "#,
        )
        .bind(transaction_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok((Money::from_cents(debit), Money::from_cents(credit)))
    }
}
