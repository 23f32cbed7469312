//! # tally-db: SQLite Storage for the Tally Ledger
//!
//! Owns the schema, the migrations and every SQL statement. Services in
//! `tally-ledger` never see SQL: they talk to [`SqliteLedgerStore`]
//! through the `tally_core::LedgerStore` trait.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  PostingEngine::post_sale(...)                                          │
//! │       │  store.commit_journal(&journal, &options)                      │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     tally-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐   │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │   │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │   │   │
//! │  │   │               │    │ AccountRepo   │    │              │   │   │
//! │  │   │ SqlitePool    │◄───│ JournalRepo   │    │ 001_ledger_  │   │   │
//! │  │   │ WAL, FKs on   │    │ PartyRepo     │    │   schema.sql │   │   │
//! │  │   │               │    │ TillRepo ...  │    │ 002_seed_... │   │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘   │   │
//! │  │            ▲                                                    │   │
//! │  │            └──── SqliteLedgerStore (store.rs)                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (tally.db)                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types and their `LedgerError` mapping
//! - [`repository`] - Repository implementations
//! - [`store`] - `LedgerStore` implementation with atomic commits
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/tally.db")).await?;
//! let store = db.ledger_store();
//! let chart = store.list_accounts().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use store::SqliteLedgerStore;

// Repository re-exports for convenience
pub use repository::account::AccountRepository;
pub use repository::journal::JournalRepository;
pub use repository::party::PartyRepository;
pub use repository::sale::SaleRepository;
pub use repository::stock::StockMovementRepository;
pub use repository::till::TillSessionRepository;
