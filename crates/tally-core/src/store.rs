//! # Ledger Store Port
//!
//! The typed storage interface the ledger services compile against.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  tally-ledger services (ChartResolver, PostingEngine, ...)             │
//! │                │  Arc<dyn LedgerStore>                                  │
//! │                ▼                                                        │
//! │  LedgerStore (THIS TRAIT)                                               │
//! │                ▲                                                        │
//! │                │  impl                                                  │
//! │  tally-db::SqliteLedgerStore  (one SQL transaction per write call)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Contract
//! - Every write method is atomic: it either commits everything it was
//!   given or nothing.
//! - Uniqueness clashes (account code in scope, open till per counter)
//!   surface as [`LedgerError::Conflict`](crate::error::LedgerError::Conflict),
//!   never as a generic storage error, so callers can re-read and retry.
//! - Line reads are ordered by (ts_utc, seq).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::ops::Bound;

use crate::document::{Sale, StockMovement};
use crate::error::LedgerResult;
use crate::kind::RefType;
use crate::money::Money;
use crate::party::{PartyBalance, PartyLedgerEntry};
use crate::posting::BalancedJournal;
use crate::statement::{AccountTotals, PostedLine};
use crate::types::{Account, Journal, TillSession};

/// Per-commit settings supplied by the posting service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOptions {
    pub created_by: String,
    /// Reject a journal whose (ref_type, ref_id) already exists.
    pub reject_duplicate_ref: bool,
}

impl CommitOptions {
    pub fn new(created_by: impl Into<String>) -> Self {
        CommitOptions {
            created_by: created_by.into(),
            reject_duplicate_ref: true,
        }
    }

    pub fn allow_duplicate_refs(mut self) -> Self {
        self.reject_duplicate_ref = false;
        self
    }
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    // -------------------------------------------------------------------------
    // Chart of accounts
    // -------------------------------------------------------------------------

    async fn account(&self, id: &str) -> LedgerResult<Option<Account>>;

    /// Looks an account up by code within a scope (`None` = company).
    async fn account_by_code(&self, code: &str, outlet_id: Option<&str>)
        -> LedgerResult<Option<Account>>;

    /// Inserts a new account; `Conflict` when the code is taken in scope.
    async fn insert_account(&self, account: &Account) -> LedgerResult<()>;

    /// Forces header flags back on; returns whether anything changed.
    async fn normalize_header(&self, id: &str) -> LedgerResult<bool>;

    async fn list_accounts(&self) -> LedgerResult<Vec<Account>>;

    // -------------------------------------------------------------------------
    // Journals
    // -------------------------------------------------------------------------

    /// Persists the journal, its lines, party entries and party balance
    /// deltas together. Returns the transaction id.
    async fn commit_journal(
        &self,
        journal: &BalancedJournal,
        options: &CommitOptions,
    ) -> LedgerResult<String>;

    async fn journal(&self, transaction_id: &str) -> LedgerResult<Option<Journal>>;

    async fn journals_for_ref(&self, ref_type: RefType, ref_id: &str) -> LedgerResult<Vec<Journal>>;

    // -------------------------------------------------------------------------
    // Statement reads
    // -------------------------------------------------------------------------

    /// Σ(debit − credit) of posted lines up to `until`, opening excluded.
    async fn account_net(&self, account_id: &str, until: Bound<DateTime<Utc>>) -> LedgerResult<Money>;

    /// Lines with `from <= ts_utc < to`.
    async fn account_lines(
        &self,
        account_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> LedgerResult<Vec<PostedLine>>;

    /// Totals for every posting account up to `until`.
    async fn account_totals(&self, until: Bound<DateTime<Utc>>) -> LedgerResult<Vec<AccountTotals>>;

    // -------------------------------------------------------------------------
    // Party reads
    // -------------------------------------------------------------------------

    async fn party_balance(
        &self,
        party_id: &str,
        outlet_id: Option<&str>,
    ) -> LedgerResult<Option<PartyBalance>>;

    async fn party_entries(
        &self,
        party_id: &str,
        outlet_id: Option<&str>,
    ) -> LedgerResult<Vec<PartyLedgerEntry>>;

    async fn party_balances(&self, outlet_id: Option<&str>) -> LedgerResult<Vec<PartyBalance>>;

    // -------------------------------------------------------------------------
    // Till sessions
    // -------------------------------------------------------------------------

    async fn open_till_session(
        &self,
        outlet_id: &str,
        counter_id: &str,
    ) -> LedgerResult<Option<TillSession>>;

    /// `Conflict` when a session is already open for the counter.
    async fn insert_till_session(&self, session: &TillSession) -> LedgerResult<()>;

    /// Writes the terminal close fields of `closing` and commits the close
    /// journal (if any) in the same transaction. `NoOpenTill` when the
    /// session was closed concurrently. Returns the journal id.
    async fn close_till_session(
        &self,
        closing: &TillSession,
        journal: Option<&BalancedJournal>,
        options: &CommitOptions,
    ) -> LedgerResult<Option<String>>;

    /// History for a counter, newest first.
    async fn till_sessions(&self, outlet_id: &str, counter_id: &str) -> LedgerResult<Vec<TillSession>>;

    async fn session_sales(&self, session_id: &str) -> LedgerResult<Vec<Sale>>;

    // -------------------------------------------------------------------------
    // Collaborator data
    // -------------------------------------------------------------------------

    async fn stock_movements(&self, ref_type: RefType, ref_id: &str)
        -> LedgerResult<Vec<StockMovement>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_options() {
        let options = CommitOptions::new("u1");
        assert!(options.reject_duplicate_ref);
        assert!(!options.allow_duplicate_refs().reject_duplicate_ref);
    }
}
