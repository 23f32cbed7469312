//! # tally-core: Pure Ledger Logic for Tally
//!
//! The double-entry core of the point-of-sale back office. Everything here
//! is deterministic: documents in, balanced journals and report values out.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Tally Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │       Collaborators (checkout, purchasing, payroll, reports)    │   │
//! │  │       Sale, Purchase, Voucher, PayrollRun, StockMovement        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │    tally-ledger: ChartResolver, PostingEngine,                  │   │
//! │  │                  StatementEngine, TillManager                   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐  ┌─────────┐  ┌──────────┐  ┌──────────┐         │   │
//! │  │   │  money  │  │  chart  │  │ posting  │  │   till   │         │   │
//! │  │   │  kind   │  │  types  │  │  party   │  │statement │         │   │
//! │  │   └─────────┘  └─────────┘  └──────────┘  └──────────┘         │   │
//! │  │                                                                 │   │
//! │  │   store::LedgerStore  ◄── the only way out to storage          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ impl                                   │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                tally-db (SQLite via sqlx)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Integer cents, the only amount type
//! - [`kind`] - `RefType` / `DocType` closed vocabularies
//! - [`types`] - Accounts, journals, till sessions
//! - [`document`] - Collaborator documents consumed read-only
//! - [`chart`] - Fixed account code scheme and roles
//! - [`posting`] - Document → journal derivations, `BalancedJournal`
//! - [`party`] - Customer / supplier sub-ledger math
//! - [`statement`] - Statements, cash book, trial balance
//! - [`till`] - Till totals, close figures, Z-report
//! - [`context`] - Explicit acting user / location / clock
//! - [`store`] - `LedgerStore` port
//! - [`validation`], [`error`]
//!
//! ## Example
//!
//! ```rust
//! use chrono::Utc;
//! use tally_core::document::Purchase;
//! use tally_core::money::Money;
//! use tally_core::posting::purchase_journal;
//!
//! let purchase = Purchase {
//!     id: "P-1".into(),
//!     outlet_id: Some("OUT1".into()),
//!     supplier_id: Some("SUP1".into()),
//!     grand_total: Money::from_cents(11_500),
//!     tax: Money::from_cents(1_500),
//!     cash_paid: Money::from_cents(5_000),
//! };
//!
//! let draft = purchase_journal(&purchase, Utc::now());
//! let (debit, credit) = draft.totals();
//! assert_eq!(debit, credit);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod chart;
pub mod context;
pub mod document;
pub mod error;
pub mod kind;
pub mod money;
pub mod party;
pub mod posting;
pub mod statement;
pub mod store;
pub mod till;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use chart::{AccountRole, SystemAccount};
pub use context::LedgerContext;
pub use error::{LedgerError, LedgerResult, ValidationError};
pub use kind::{DocType, RefType};
pub use money::Money;
pub use posting::{AccountRef, BalancedJournal, JournalDraft, JournalHeader, JournalLine};
pub use store::{CommitOptions, LedgerStore};
pub use types::*;
