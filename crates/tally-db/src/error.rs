//! # Storage Errors
//!
//! `DbError` is what repositories return. At the `LedgerStore` boundary it is
//! folded into `LedgerError`:
//!
//! ```text
//! sqlx::Error ──► DbError ──► LedgerError
//!                 UniqueViolation    → Conflict          (re-read, retry)
//!                 NotFound("Account")→ AccountNotFound
//!                 anything else      → Storage
//! ```
//!
//! Constraint failures are classified by `sqlx`'s `ErrorKind`, not by the
//! message text, so expression indexes (`IFNULL(outlet_id, '')`) and partial
//! indexes (one open till per counter) land in the same bucket as plain keys.

use sqlx::error::ErrorKind;
use tally_core::LedgerError;
use thiserror::Error;

/// SQLite primary result code for a locked database file.
const SQLITE_BUSY: &str = "5";

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A unique key or index rejected the row.
    #[error("{constraint} is already taken")]
    UniqueViolation { constraint: String },

    #[error("Dangling reference: {0}")]
    ForeignKeyViolation(String),

    /// The file stayed locked past the busy timeout.
    #[error("Database busy: {0}")]
    Busy(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("No free connection in the pool")]
    PoolExhausted,
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(constraint: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            constraint: constraint.into(),
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DbError::UniqueViolation { .. })
    }

    fn from_database(err: &dyn sqlx::error::DatabaseError) -> Self {
        let message = err.message().to_string();
        match err.kind() {
            ErrorKind::UniqueViolation => {
                // "UNIQUE constraint failed: accounts.code" or "... index 'idx_x'"
                let constraint = message
                    .rsplit(": ")
                    .next()
                    .filter(|s| !s.is_empty())
                    .unwrap_or("key")
                    .to_string();
                DbError::UniqueViolation { constraint }
            }
            ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation(message),
            _ if err.code().as_deref() == Some(SQLITE_BUSY) => DbError::Busy(message),
            _ => DbError::QueryFailed(message),
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(ref db_err) => DbError::from_database(db_err.as_ref()),
            sqlx::Error::RowNotFound => DbError::not_found("Row", "query returned nothing"),
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool closed".to_string()),
            other => DbError::QueryFailed(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<DbError> for LedgerError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::UniqueViolation { .. } => LedgerError::Conflict(err.to_string()),
            DbError::NotFound { ref entity, ref id } if entity == "Account" => {
                LedgerError::AccountNotFound(id.clone())
            }
            other => LedgerError::Storage(other.to_string()),
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;
