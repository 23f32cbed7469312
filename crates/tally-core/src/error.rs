//! # Error Types
//!
//! Domain error types for the ledger core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  ├── LedgerError      - Posting, chart, till and storage failures      │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  tally-db errors (separate crate)                                      │
//! │  └── DbError          - sqlx failures, converted into LedgerError      │
//! │                                                                         │
//! │  Flow: ValidationError → LedgerError ← DbError                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Fatal vs Recoverable
//! - Fatal: the document (or the chart) is wrong and retrying cannot help.
//!   `UnbalancedJournal`, `AccountNotFound`, `AccountNotPostable`.
//! - Recoverable: the user can act on the message (till already open,
//!   nothing to close, re-enter the declared amount) or the operation can be
//!   retried as a whole (`Conflict`).

use thiserror::Error;

use crate::kind::RefType;
use crate::money::Money;

// =============================================================================
// Ledger Error
// =============================================================================

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Σdebit and Σcredit of a journal differ.
    ///
    /// Aborts the whole posting; nothing of the journal is committed.
    #[error("Unbalanced journal: debit {debit} != credit {credit}")]
    UnbalancedJournal { debit: Money, credit: Money },

    /// An expected account (or root header) does not exist.
    ///
    /// ## When This Occurs
    /// - Asset root `1` missing when resolving supplier advances
    /// - A voucher line references an unknown account id
    /// - Chart was edited manually or never migrated
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// The account exists but is a header or inactive.
    #[error("Account {code} does not accept postings")]
    AccountNotPostable { code: String },

    /// A till session is already open for this outlet/counter.
    #[error("Till already open for outlet {outlet_id} counter {counter_id} (session {session_id})")]
    DuplicateTillOpen {
        outlet_id: String,
        counter_id: String,
        session_id: String,
    },

    /// Close requested while no session is open.
    #[error("No open till for outlet {outlet_id} counter {counter_id}")]
    NoOpenTill { outlet_id: String, counter_id: String },

    /// Declared cash rejected at till close.
    #[error("Invalid declared amount: {reason}")]
    InvalidDeclaredAmount { reason: String },

    #[error("Journal has no lines")]
    EmptyJournal,

    /// A journal for this document already exists.
    #[error("{ref_type} {ref_id} is already posted")]
    DuplicatePosting { ref_type: RefType, ref_id: String },

    #[error("Journal not found: {0}")]
    JournalNotFound(String),

    /// A storage uniqueness guard fired (concurrent create).
    #[error("Storage conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl LedgerError {
    /// Whether the caller can act on the error without fixing data.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            LedgerError::DuplicateTillOpen { .. }
                | LedgerError::NoOpenTill { .. }
                | LedgerError::InvalidDeclaredAmount { .. }
                | LedgerError::DuplicatePosting { .. }
                | LedgerError::Conflict(_)
                | LedgerError::Validation(_)
        )
    }

    pub fn storage(message: impl Into<String>) -> Self {
        LedgerError::Storage(message.into())
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must not be negative")]
    Negative { field: String },

    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

pub type LedgerResult<T> = Result<T, LedgerError>;
