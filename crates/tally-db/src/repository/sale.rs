//! # Sale Repository
//!
//! Sales as written by the checkout. The ledger only reads them (till
//! totals); the write methods exist so the checkout and tests can record
//! sales, revisions and voids against the same schema.
//!
//! ## Revision Chain
//! ```text
//! record_revision(S1, S2):
//!   INSERT S2
//!   UPDATE S1 SET revised_to_sale_id = S2 WHERE revised_to_sale_id IS NULL
//!   (both in one transaction; a second revision of S1 fails)
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::pool::begin_immediate;
use tally_core::document::Sale;

/// Repository for sale rows.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(
            r#"
            SELECT
                id, outlet_id, counter_id, customer_id,
                total, tax_total, cash_amount, card_amount,
                is_return, status, voided_at, revised_to_sale_id,
                till_session_id, created_at
            FROM sales
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Inserts a sale row.
    pub async fn insert(&self, sale: &Sale) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        Self::insert_in(&mut conn, sale).await
    }

    /// Every sale row linked to a till session, oldest first.
    ///
    /// Revised and voided rows are included; the till math filters them.
    pub async fn for_session(&self, session_id: &str) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(
            r#"
            SELECT
                id, outlet_id, counter_id, customer_id,
                total, tax_total, cash_amount, card_amount,
                is_return, status, voided_at, revised_to_sale_id,
                till_session_id, created_at
            FROM sales
            WHERE till_session_id = ?1
            ORDER BY created_at, rowid
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Records `amended` as the revision of `previous_id`.
    ///
    /// ## Errors
    /// `NotFound` when `previous_id` is unknown or already revised.
    pub async fn record_revision(&self, previous_id: &str, amended: &Sale) -> DbResult<()> {
        debug!(previous = %previous_id, amended = %amended.id, "Recording sale revision");

        let mut tx = begin_immediate(&self.pool).await?;
        Self::insert_in(&mut *tx, amended).await?;

        let result = sqlx::query(
            r#"
            UPDATE sales
            SET revised_to_sale_id = ?2
            WHERE id = ?1 AND revised_to_sale_id IS NULL
            "#,
        )
        .bind(previous_id)
        .bind(&amended.id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", previous_id));
        }

        tx.commit().await?;
        Ok(())
    }

    /// Marks a sale voided.
    pub async fn void(&self, id: &str, at: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query("UPDATE sales SET voided_at = ?2 WHERE id = ?1 AND voided_at IS NULL")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_in(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sales (
                id, outlet_id, counter_id, customer_id,
                total, tax_total, cash_amount, card_amount,
                is_return, status, voided_at, revised_to_sale_id,
                till_session_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.outlet_id)
        .bind(&sale.counter_id)
        .bind(&sale.customer_id)
        .bind(sale.total)
        .bind(sale.tax_total)
        .bind(sale.cash_amount)
        .bind(sale.card_amount)
        .bind(sale.is_return)
        .bind(sale.status)
        .bind(sale.voided_at)
        .bind(&sale.revised_to_sale_id)
        .bind(&sale.till_session_id)
        .bind(sale.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use tally_core::document::SaleStatus;
    use tally_core::{Money, TillSession};

    fn sale(id: &str, session_id: &str, total: i64, cash: i64) -> Sale {
        Sale {
            id: id.into(),
            outlet_id: "OUT1".into(),
            counter_id: "C1".into(),
            customer_id: None,
            total: Money::from_cents(total),
            tax_total: Money::zero(),
            cash_amount: Money::from_cents(cash),
            card_amount: Money::zero(),
            is_return: false,
            status: SaleStatus::Final,
            voided_at: None,
            revised_to_sale_id: None,
            till_session_id: Some(session_id.into()),
            created_at: Utc::now(),
        }
    }

    async fn setup() -> (Database, TillSession) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let session = TillSession::open("OUT1", "C1", Money::zero(), "u1", Utc::now());
        db.tills().insert(&session).await.unwrap();
        (db, session)
    }

    #[tokio::test]
    async fn test_revision_links_previous_row() {
        let (db, session) = setup().await;
        let repo = db.sales();

        repo.insert(&sale("S1", &session.id, 10_000, 10_000)).await.unwrap();
        repo.record_revision("S1", &sale("S2", &session.id, 11_000, 1_000))
            .await
            .unwrap();

        let s1 = repo.get("S1").await.unwrap().unwrap();
        assert_eq!(s1.revised_to_sale_id.as_deref(), Some("S2"));
        assert!(!s1.is_latest());

        let rows = repo.for_session(&session.id).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_second_revision_of_same_row_is_rejected() {
        let (db, session) = setup().await;
        let repo = db.sales();

        repo.insert(&sale("S1", &session.id, 10_000, 10_000)).await.unwrap();
        repo.record_revision("S1", &sale("S2", &session.id, 11_000, 1_000))
            .await
            .unwrap();

        let err = repo
            .record_revision("S1", &sale("S3", &session.id, 12_000, 1_000))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
        // the failed revision left nothing behind
        assert!(repo.get("S3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_void() {
        let (db, session) = setup().await;
        let repo = db.sales();

        repo.insert(&sale("S1", &session.id, 500, 500)).await.unwrap();
        assert!(repo.void("S1", Utc::now()).await.unwrap());
        assert!(!repo.void("S1", Utc::now()).await.unwrap());
        assert!(!repo.get("S1").await.unwrap().unwrap().is_effective());
    }
}
