//! # Statement Math
//!
//! Opening / running / closing balances, cash-book classification and the
//! trial balance, computed over rows the store hands back.
//!
//! ## Windows
//! ```text
//! ──────────────┬───────────────────────────┬──────────────────────► ts
//!               from                        to
//!   opening = account opening               rows: from <= ts < to
//!           + Σ(debit − credit), ts < from  closing = last running value
//!
//! closing(a, t0, t1) == opening(a, t1, ..) because both cover ts < t1.
//! ```
//!
//! Rows are ordered by (ts_utc, seq); `seq` is the insertion sequence and
//! breaks same-instant ties.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::kind::RefType;
use crate::money::Money;
use crate::types::{Account, AccountType};

/// Memo prefix marking a reversed (voided) journal.
pub const VOID_PREFIX: &str = "VOID";

// =============================================================================
// Posted Lines
// =============================================================================

/// A ledger line joined with its transaction header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedLine {
    pub seq: i64,
    pub transaction_id: String,
    pub ts_utc: DateTime<Utc>,
    /// `None` when the stored string is outside the known vocabulary.
    pub ref_type: Option<RefType>,
    pub ref_id: String,
    pub memo: String,
    pub line_memo: Option<String>,
    pub debit: Money,
    pub credit: Money,
}

impl PostedLine {
    pub fn net(&self) -> Money {
        self.debit - self.credit
    }
}

// =============================================================================
// Statement
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StatementRow {
    pub seq: i64,
    pub transaction_id: String,
    #[ts(as = "String")]
    pub ts_utc: DateTime<Utc>,
    pub ref_id: String,
    pub memo: String,
    pub debit: Money,
    pub credit: Money,
    /// Balance after this row, debit-positive.
    pub running: Money,
    /// Human-readable origin ("Sale", "Voucher", "Till Close", ...).
    pub source: String,
    pub voided: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Statement {
    pub account_id: String,
    pub account_code: String,
    pub account_name: String,
    #[ts(as = "String")]
    pub from_utc: DateTime<Utc>,
    #[ts(as = "String")]
    pub to_utc: DateTime<Utc>,
    pub opening: Money,
    pub rows: Vec<StatementRow>,
    pub closing: Money,
}

/// Builds a statement from the opening balance and the in-window lines.
///
/// `lines` must already be in (ts_utc, seq) order.
pub fn build_statement(
    account: &Account,
    from_utc: DateTime<Utc>,
    to_utc: DateTime<Utc>,
    opening: Money,
    lines: Vec<PostedLine>,
) -> Statement {
    let mut running = opening;
    let rows = lines
        .into_iter()
        .map(|line| {
            running += line.net();
            StatementRow {
                source: classify_source(line.ref_type, &line.memo).to_string(),
                voided: is_voided(&line.memo),
                seq: line.seq,
                transaction_id: line.transaction_id,
                ts_utc: line.ts_utc,
                ref_id: line.ref_id,
                memo: line.line_memo.unwrap_or(line.memo),
                debit: line.debit,
                credit: line.credit,
                running,
            }
        })
        .collect();

    Statement {
        account_id: account.id.clone(),
        account_code: account.code.clone(),
        account_name: account.name.clone(),
        from_utc,
        to_utc,
        opening,
        rows,
        closing: running,
    }
}

// =============================================================================
// Cash Book
// =============================================================================

/// Source label for a row.
///
/// The stored `RefType` wins; the memo patterns only label rows whose type
/// could not be read back.
pub fn classify_source(ref_type: Option<RefType>, memo: &str) -> &'static str {
    if let Some(kind) = ref_type {
        return kind.label();
    }
    classify_memo(memo)
}

/// Memo-pattern fallback used for rows without a readable `RefType`.
pub fn classify_memo(memo: &str) -> &'static str {
    let lower = memo.to_ascii_lowercase();
    if memo.contains("Voucher #") {
        "Voucher"
    } else if memo.contains("PO Return #") {
        "Purchase Return"
    } else if memo.contains("PO #") {
        "Purchase"
    } else if memo.contains("Sale Return #") {
        "Sale Return"
    } else if memo.contains("Sale #") {
        "Sale"
    } else if lower.contains("till close") {
        "Till Close"
    } else if lower.contains("payroll") {
        "Payroll"
    } else if lower.contains("opening balance") {
        "Opening Balance"
    } else {
        "Journal"
    }
}

pub fn is_voided(memo: &str) -> bool {
    memo.trim_start().starts_with(VOID_PREFIX)
}

/// A cash account statement with optional hiding of voided rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CashBook {
    pub outlet_id: Option<String>,
    pub include_voided: bool,
    pub statement: Statement,
    /// Rows removed from `statement.rows` by the voided filter.
    pub hidden_rows: usize,
}

impl CashBook {
    /// Hidden rows still count toward running and closing balances.
    pub fn from_statement(
        outlet_id: Option<String>,
        mut statement: Statement,
        include_voided: bool,
    ) -> Self {
        let before = statement.rows.len();
        if !include_voided {
            statement.rows.retain(|row| !row.voided);
        }
        CashBook {
            outlet_id,
            include_voided,
            hidden_rows: before - statement.rows.len(),
            statement,
        }
    }
}

// =============================================================================
// Trial Balance
// =============================================================================

/// Posted totals for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AccountTotals {
    pub account_id: String,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub outlet_id: Option<String>,
    pub opening_debit: Money,
    pub opening_credit: Money,
    pub total_debit: Money,
    pub total_credit: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TrialBalanceRow {
    pub account_id: String,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub outlet_id: Option<String>,
    pub debit: Money,
    pub credit: Money,
    /// debit − credit
    pub balance: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TrialBalance {
    #[ts(as = "String")]
    pub as_of_utc: DateTime<Utc>,
    pub rows: Vec<TrialBalanceRow>,
    pub total_debit: Money,
    pub total_credit: Money,
}

impl TrialBalance {
    /// Accounts with no opening and no postings are left out.
    pub fn from_totals(as_of_utc: DateTime<Utc>, totals: Vec<AccountTotals>) -> Self {
        let rows: Vec<TrialBalanceRow> = totals
            .into_iter()
            .map(|t| {
                let debit = t.opening_debit + t.total_debit;
                let credit = t.opening_credit + t.total_credit;
                TrialBalanceRow {
                    account_id: t.account_id,
                    code: t.code,
                    name: t.name,
                    account_type: t.account_type,
                    outlet_id: t.outlet_id,
                    debit,
                    credit,
                    balance: debit - credit,
                }
            })
            .filter(|row| !(row.debit.is_zero() && row.credit.is_zero()))
            .collect();

        let total_debit = rows.iter().map(|r| r.debit).sum();
        let total_credit = rows.iter().map(|r| r.credit).sum();
        TrialBalance {
            as_of_utc,
            rows,
            total_debit,
            total_credit,
        }
    }

    pub fn is_balanced(&self) -> bool {
        self.total_debit == self.total_credit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, 0, 0).unwrap()
    }

    fn posted(seq: i64, h: u32, kind: Option<RefType>, memo: &str, d: i64, c: i64) -> PostedLine {
        PostedLine {
            seq,
            transaction_id: format!("TX{}", seq),
            ts_utc: t(h),
            ref_type: kind,
            ref_id: format!("D{}", seq),
            memo: memo.into(),
            line_memo: None,
            debit: Money::from_cents(d),
            credit: Money::from_cents(c),
        }
    }

    fn cash_account() -> Account {
        let mut a = Account::leaf("11102-OUT1", "Cash in Till (OUT1)", AccountType::Asset, None, Some("OUT1".into()), t(0));
        a.opening_debit = Money::from_cents(1000);
        a
    }

    #[test]
    fn test_running_balance() {
        let lines = vec![
            posted(1, 9, Some(RefType::Sale), "Sale #1", 5000, 0),
            posted(2, 9, Some(RefType::SaleReturn), "Sale Return #2", 0, 1500),
            posted(3, 10, Some(RefType::TillClose), "Till close OUT1/C1", 0, 2000),
        ];
        let st = build_statement(&cash_account(), t(8), t(11), Money::from_cents(1000), lines);

        let running: Vec<i64> = st.rows.iter().map(|r| r.running.cents()).collect();
        assert_eq!(running, vec![6000, 4500, 2500]);
        assert_eq!(st.closing.cents(), 2500);
        assert_eq!(st.rows[1].source, "Sale Return");
        assert_eq!(st.rows[2].source, "Till Close");
    }

    #[test]
    fn test_empty_window_closing_equals_opening() {
        let st = build_statement(&cash_account(), t(8), t(8) + Duration::hours(1), Money::from_cents(777), vec![]);
        assert_eq!(st.opening, st.closing);
        assert!(st.rows.is_empty());
    }

    #[test]
    fn test_memo_fallback_classification() {
        assert_eq!(classify_source(None, "Voucher #V1 rent"), "Voucher");
        assert_eq!(classify_source(None, "PO Return #P9"), "Purchase Return");
        assert_eq!(classify_source(None, "PO #P9"), "Purchase");
        assert_eq!(classify_source(None, "Sale Return #S2"), "Sale Return");
        assert_eq!(classify_source(None, "Sale #S1"), "Sale");
        assert_eq!(classify_source(None, "TILL CLOSE OUT1/C1"), "Till Close");
        assert_eq!(classify_source(None, "misc"), "Journal");
        assert_eq!(classify_source(Some(RefType::Voucher), "Sale #S1"), "Voucher");
    }

    #[test]
    fn test_cash_book_hides_voided_but_keeps_balance() {
        let lines = vec![
            posted(1, 9, Some(RefType::Sale), "Sale #1", 5000, 0),
            posted(2, 10, Some(RefType::Reversal), "VOID wrong price", 0, 5000),
            posted(3, 10, Some(RefType::Sale), "Sale #3", 2000, 0),
        ];
        let st = build_statement(&cash_account(), t(8), t(11), Money::zero(), lines);
        let full = CashBook::from_statement(Some("OUT1".into()), st.clone(), true);
        let filtered = CashBook::from_statement(Some("OUT1".into()), st, false);

        assert_eq!(full.statement.rows.len(), 3);
        assert_eq!(filtered.statement.rows.len(), 2);
        assert_eq!(filtered.hidden_rows, 1);
        assert_eq!(filtered.statement.closing, full.statement.closing);
        assert!(full.statement.rows[1].voided);
    }

    #[test]
    fn test_trial_balance_totals() {
        let row = |code: &str, od: i64, oc: i64, d: i64, c: i64| AccountTotals {
            account_id: code.into(),
            code: code.into(),
            name: code.into(),
            account_type: AccountType::Asset,
            outlet_id: None,
            opening_debit: Money::from_cents(od),
            opening_credit: Money::from_cents(oc),
            total_debit: Money::from_cents(d),
            total_credit: Money::from_cents(c),
        };
        let tb = TrialBalance::from_totals(
            t(12),
            vec![
                row("11102-OUT1", 0, 0, 5000, 0),
                row("4100", 0, 0, 0, 5000),
                row("9999", 0, 0, 0, 0),
            ],
        );
        assert_eq!(tb.rows.len(), 2);
        assert!(tb.is_balanced());
        assert_eq!(tb.rows[1].balance.cents(), -5000);
    }
}
