//! # Account Repository
//!
//! Chart of accounts storage.
//!
//! ## Scoped Codes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  code        outlet_id   scope key                                      │
//! │  ─────────   ─────────   ─────────                                      │
//! │  1           NULL        ''          root header                        │
//! │  111         NULL        ''          cash header                        │
//! │  11102-OUT1  OUT1        'OUT1'      outlet till                        │
//! │  11102-OUT1  NULL        ''          allowed: different scope           │
//! │                                                                         │
//! │  UNIQUE (code, IFNULL(outlet_id, '')) is the authoritative guard;      │
//! │  a losing concurrent insert gets UniqueViolation, never a duplicate.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use tally_core::party::scope_key;
use tally_core::Account;

/// Repository for chart of accounts operations.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    pool: SqlitePool,
}

impl AccountRepository {
    /// Creates a new AccountRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AccountRepository { pool }
    }

    /// Gets an account by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Account>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_in(&mut conn, id).await
    }

    /// Gets an account by code within a scope (`None` = company).
    pub async fn get_by_code(&self, code: &str, outlet_id: Option<&str>) -> DbResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT
                id, code, name, account_type, normal_side,
                is_header, allow_posting, is_system,
                parent_id, outlet_id, opening_debit, opening_credit,
                is_active, created_at
            FROM accounts
            WHERE code = ?1 AND IFNULL(outlet_id, '') = ?2
            "#,
        )
        .bind(code)
        .bind(scope_key(outlet_id))
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// Inserts an account.
    ///
    /// ## Errors
    /// `UniqueViolation` when the code is already used in the scope.
    pub async fn insert(&self, account: &Account) -> DbResult<()> {
        debug!(code = %account.code, outlet_id = ?account.outlet_id, "Inserting account");

        sqlx::query(
            r#"
            INSERT INTO accounts (
                id, code, name, account_type, normal_side,
                is_header, allow_posting, is_system,
                parent_id, outlet_id, opening_debit, opening_credit,
                is_active, created_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8,
                ?9, ?10, ?11, ?12,
                ?13, ?14
            )
            "#,
        )
        .bind(&account.id)
        .bind(&account.code)
        .bind(&account.name)
        .bind(account.account_type)
        .bind(account.normal_side)
        .bind(account.is_header)
        .bind(account.allow_posting)
        .bind(account.is_system)
        .bind(&account.parent_id)
        .bind(&account.outlet_id)
        .bind(account.opening_debit)
        .bind(account.opening_credit)
        .bind(account.is_active)
        .bind(account.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Forces header flags back on.
    ///
    /// ## Returns
    /// `true` if the row had drifted and was rewritten.
    pub async fn normalize_header(&self, id: &str) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET is_header = 1, allow_posting = 0, is_system = 1
            WHERE id = ?1 AND (is_header = 0 OR allow_posting = 1 OR is_system = 0)
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Activates or deactivates an account.
    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<bool> {
        let result = sqlx::query("UPDATE accounts SET is_active = ?2 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists the whole chart ordered by code, company scope first.
    pub async fn list(&self) -> DbResult<Vec<Account>> {
        let accounts = sqlx::query_as::<_, Account>(
            r#"
            SELECT
                id, code, name, account_type, normal_side,
                is_header, allow_posting, is_system,
                parent_id, outlet_id, opening_debit, opening_credit,
                is_active, created_at
            FROM accounts
            ORDER BY code, IFNULL(outlet_id, '')
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(accounts)
    }

    /// Counts accounts with a code in a scope (0 or 1 by the schema).
    pub async fn count_by_code(&self, code: &str, outlet_id: Option<&str>) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM accounts WHERE code = ?1 AND IFNULL(outlet_id, '') = ?2",
        )
        .bind(code)
        .bind(scope_key(outlet_id))
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    // =========================================================================
    // Transaction-scoped helpers
    // =========================================================================

    pub(crate) async fn fetch_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT
                id, code, name, account_type, normal_side,
                is_header, allow_posting, is_system,
                parent_id, outlet_id, opening_debit, opening_credit,
                is_active, created_at
            FROM accounts
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Utc;
    use tally_core::AccountType;

    async fn repo() -> AccountRepository {
        Database::new(DbConfig::in_memory()).await.unwrap().accounts()
    }

    #[tokio::test]
    async fn test_roots_are_seeded_headers() {
        let repo = repo().await;
        let assets = repo.get_by_code("1", None).await.unwrap().unwrap();
        assert!(assets.is_header);
        assert!(!assets.allow_posting);
        assert_eq!(assets.account_type, AccountType::Asset);
    }

    #[tokio::test]
    async fn test_code_is_unique_per_scope() {
        let repo = repo().await;
        let now = Utc::now();

        let outlet = Account::leaf("11102-OUT1", "Till", AccountType::Asset, None, Some("OUT1".into()), now);
        repo.insert(&outlet).await.unwrap();

        let company = Account::leaf("11102-OUT1", "Till", AccountType::Asset, None, None, now);
        repo.insert(&company).await.unwrap();

        let clash = Account::leaf("11102-OUT1", "Till", AccountType::Asset, None, Some("OUT1".into()), now);
        let err = repo.insert(&clash).await.unwrap_err();
        assert!(err.is_unique_violation(), "{:?}", err);

        assert_eq!(repo.count_by_code("11102-OUT1", Some("OUT1")).await.unwrap(), 1);
        let found = repo.get_by_code("11102-OUT1", Some("OUT1")).await.unwrap().unwrap();
        assert_eq!(found.id, outlet.id);
    }

    #[tokio::test]
    async fn test_normalize_header_only_touches_drifted_rows() {
        let repo = repo().await;
        let now = Utc::now();
        let mut drifted = Account::leaf("111", "Cash", AccountType::Asset, None, None, now);
        drifted.is_system = false;
        repo.insert(&drifted).await.unwrap();

        assert!(repo.normalize_header(&drifted.id).await.unwrap());
        assert!(!repo.normalize_header(&drifted.id).await.unwrap());

        let healed = repo.get_by_id(&drifted.id).await.unwrap().unwrap();
        assert!(healed.is_header);
        assert!(!healed.allow_posting);
        assert!(healed.is_system);
    }

    #[tokio::test]
    async fn test_header_cannot_allow_posting() {
        let repo = repo().await;
        let mut bad = Account::header("999", "Bad", AccountType::Asset, None, Utc::now());
        bad.allow_posting = true;
        assert!(repo.insert(&bad).await.is_err());
    }
}
