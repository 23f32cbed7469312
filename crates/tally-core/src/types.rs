//! # Ledger Types
//!
//! Persisted ledger records: accounts, journals and till sessions.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Ledger Types                                   │
//! │                                                                         │
//! │  ┌─────────────────┐       ┌───────────────────┐                        │
//! │  │    Account      │◄──────│    LedgerLine     │                        │
//! │  │  ─────────────  │  1:N  │  ───────────────  │                        │
//! │  │  id (UUID)      │       │  seq (insertion)  │                        │
//! │  │  code (scoped)  │       │  debit / credit   │                        │
//! │  │  parent_id ─┐   │       │  party_id?        │                        │
//! │  └─────────────┼───┘       └─────────┬─────────┘                        │
//! │        ▲       │                     │ N:1                              │
//! │        └───────┘ header tree         ▼                                  │
//! │                            ┌───────────────────┐                        │
//! │                            │ LedgerTransaction │  Σdebit == Σcredit     │
//! │                            │  ref_type/ref_id  │                        │
//! │                            └───────────────────┘                        │
//! │                                                                         │
//! │  ┌─────────────────┐                                                    │
//! │  │  TillSession    │  at most one open per (outlet, counter)           │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Party ledger types live in [`crate::party`], external documents in
//! [`crate::document`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::kind::RefType;
use crate::money::Money;

// =============================================================================
// Account Type / Normal Side
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "PascalCase"))]
#[ts(export)]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

impl AccountType {
    /// The side on which balances of this type normally sit.
    pub const fn normal_side(&self) -> NormalSide {
        match self {
            AccountType::Asset | AccountType::Expense => NormalSide::Debit,
            AccountType::Liability | AccountType::Equity | AccountType::Revenue => {
                NormalSide::Credit
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "PascalCase"))]
#[ts(export)]
pub enum NormalSide {
    Debit,
    Credit,
}

// =============================================================================
// Account
// =============================================================================

/// A node in the chart of accounts.
///
/// Headers aggregate and never receive postings (`allow_posting` is always
/// false on a header). Leaf codes are unique within their outlet scope;
/// `outlet_id = None` is the company-wide scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Account {
    pub id: String,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub normal_side: NormalSide,
    pub is_header: bool,
    pub allow_posting: bool,
    /// Protected from user deletion/rename.
    pub is_system: bool,
    pub parent_id: Option<String>,
    pub outlet_id: Option<String>,
    pub opening_debit: Money,
    pub opening_credit: Money,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Creates a system header account (never postable).
    pub fn header(
        code: impl Into<String>,
        name: impl Into<String>,
        account_type: AccountType,
        parent_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Account {
            id: Uuid::new_v4().to_string(),
            code: code.into(),
            name: name.into(),
            account_type,
            normal_side: account_type.normal_side(),
            is_header: true,
            allow_posting: false,
            is_system: true,
            parent_id,
            outlet_id: None,
            opening_debit: Money::zero(),
            opening_credit: Money::zero(),
            is_active: true,
            created_at: now,
        }
    }

    /// Creates a system posting (leaf) account.
    pub fn leaf(
        code: impl Into<String>,
        name: impl Into<String>,
        account_type: AccountType,
        parent_id: Option<String>,
        outlet_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Account {
            id: Uuid::new_v4().to_string(),
            code: code.into(),
            name: name.into(),
            account_type,
            normal_side: account_type.normal_side(),
            is_header: false,
            allow_posting: true,
            is_system: true,
            parent_id,
            outlet_id,
            opening_debit: Money::zero(),
            opening_credit: Money::zero(),
            is_active: true,
            created_at: now,
        }
    }

    /// Whether lines may be posted against this account.
    pub fn is_postable(&self) -> bool {
        self.is_active && self.allow_posting && !self.is_header
    }

    /// Whether the header flags need re-normalising.
    pub fn header_flags_drifted(&self) -> bool {
        !self.is_header || self.allow_posting || !self.is_system
    }

    /// Opening balance, debit-positive.
    pub fn opening_balance(&self) -> Money {
        self.opening_debit - self.opening_credit
    }
}

// =============================================================================
// Ledger Transaction (Journal)
// =============================================================================

/// Header of a balanced journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LedgerTransaction {
    pub id: String,
    #[ts(as = "String")]
    pub ts_utc: DateTime<Utc>,
    pub outlet_id: Option<String>,
    pub ref_type: RefType,
    pub ref_id: String,
    pub memo: String,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// One debit-or-credit entry of a journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LedgerLine {
    /// Monotonic insertion sequence; breaks same-timestamp ties.
    pub seq: i64,
    pub transaction_id: String,
    pub account_id: String,
    pub debit: Money,
    pub credit: Money,
    pub party_id: Option<String>,
    pub line_memo: Option<String>,
}

impl LedgerLine {
    /// Debit-positive signed amount.
    pub fn net(&self) -> Money {
        self.debit - self.credit
    }
}

/// A stored journal with its lines, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journal {
    pub transaction: LedgerTransaction,
    pub lines: Vec<LedgerLine>,
}

impl Journal {
    pub fn total_debit(&self) -> Money {
        self.lines.iter().map(|l| l.debit).sum()
    }

    pub fn total_credit(&self) -> Money {
        self.lines.iter().map(|l| l.credit).sum()
    }
}

// =============================================================================
// Till Session
// =============================================================================

/// A cash drawer shift for one (outlet, counter).
///
/// ## Lifecycle
/// ```text
/// Closed ──open()──► Open (close_ts = None) ──close()──► Closed (terminal)
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TillSession {
    pub id: String,
    pub outlet_id: String,
    pub counter_id: String,
    #[ts(as = "String")]
    pub open_ts: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub close_ts: Option<DateTime<Utc>>,
    pub opening_float: Money,
    pub declared_cash: Option<Money>,
    pub over_short: Option<Money>,
    pub opened_by: String,
    pub closed_by: Option<String>,
    /// GL journal posted at close, if any amount moved.
    pub close_transaction_id: Option<String>,
}

impl TillSession {
    pub fn open(
        outlet_id: impl Into<String>,
        counter_id: impl Into<String>,
        opening_float: Money,
        opened_by: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        TillSession {
            id: Uuid::new_v4().to_string(),
            outlet_id: outlet_id.into(),
            counter_id: counter_id.into(),
            open_ts: now,
            close_ts: None,
            opening_float,
            declared_cash: None,
            over_short: None,
            opened_by: opened_by.into(),
            closed_by: None,
            close_transaction_id: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.close_ts.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_sides() {
        assert_eq!(AccountType::Asset.normal_side(), NormalSide::Debit);
        assert_eq!(AccountType::Expense.normal_side(), NormalSide::Debit);
        assert_eq!(AccountType::Revenue.normal_side(), NormalSide::Credit);
        assert_eq!(AccountType::Liability.normal_side(), NormalSide::Credit);
    }

    #[test]
    fn test_header_is_never_postable() {
        let header = Account::header("111", "Cash", AccountType::Asset, None, Utc::now());
        assert!(header.is_header);
        assert!(!header.allow_posting);
        assert!(!header.is_postable());
        assert!(!header.header_flags_drifted());

        let mut drifted = header.clone();
        drifted.allow_posting = true;
        assert!(drifted.header_flags_drifted());
    }

    #[test]
    fn test_leaf_postable_until_deactivated() {
        let mut leaf = Account::leaf(
            "11101-OUT1",
            "Cash in hand OUT1",
            AccountType::Asset,
            None,
            Some("OUT1".into()),
            Utc::now(),
        );
        assert!(leaf.is_postable());
        leaf.is_active = false;
        assert!(!leaf.is_postable());
    }

    #[test]
    fn test_till_session_open() {
        let session = TillSession::open("OUT1", "C1", Money::from_cents(10000), "u1", Utc::now());
        assert!(session.is_open());
        assert!(session.declared_cash.is_none());
    }
}
