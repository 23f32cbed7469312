//! # Repository Module
//!
//! Database repository implementations for the Tally ledger.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  SqliteLedgerStore (store.rs)                                          │
//! │       │                                                                 │
//! │       │  db.accounts().get_by_code("11102-OUT1", Some("OUT1"))         │
//! │       ▼                                                                 │
//! │  AccountRepository / JournalRepository / PartyRepository / ...         │
//! │  ├── reads on the pool         (&self)                                 │
//! │  └── writes inside a commit    (pub(crate) fn(&mut SqliteConnection))  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`AccountRepository`](account::AccountRepository) - Chart of accounts
//! - [`JournalRepository`](journal::JournalRepository) - Journals, lines, statement reads
//! - [`PartyRepository`](party::PartyRepository) - Party entries and balance snapshots
//! - [`TillSessionRepository`](till::TillSessionRepository) - Till sessions
//! - [`SaleRepository`](sale::SaleRepository) - Checkout sales (read by till close)
//! - [`StockMovementRepository`](stock::StockMovementRepository) - Inventory movements (read by COGS)

pub mod account;
pub mod journal;
pub mod party;
pub mod sale;
pub mod stock;
pub mod till;
