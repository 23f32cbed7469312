//! # Stock Movement Repository
//!
//! Read side of the inventory collaborator: the posting engine values
//! COGS from the movements tagged with a sale's reference.

use sqlx::SqlitePool;

use crate::error::DbResult;
use tally_core::document::StockMovement;
use tally_core::RefType;

#[derive(Debug, Clone)]
pub struct StockMovementRepository {
    pool: SqlitePool,
}

impl StockMovementRepository {
    /// Creates a new StockMovementRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StockMovementRepository { pool }
    }

    pub async fn insert(&self, movement: &StockMovement) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_movements (id, product_id, ref_type, ref_id, quantity, unit_cost)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.product_id)
        .bind(movement.ref_type)
        .bind(&movement.ref_id)
        .bind(movement.quantity)
        .bind(movement.unit_cost)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Movements caused by one document.
    pub async fn by_ref(&self, ref_type: RefType, ref_id: &str) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, product_id, ref_type, ref_id, quantity, unit_cost
            FROM stock_movements
            WHERE ref_type = ?1 AND ref_id = ?2
            ORDER BY rowid
            "#,
        )
        .bind(ref_type)
        .bind(ref_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }
}
