//! # Till Math
//!
//! Session totals, expected cash, over/short and the close journal.
//!
//! ## Two Views of the Same Sales
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Sales linked to the session                                            │
//! │                                                                         │
//! │  S1  total 100  cash 100  revised_to = S2   ─┐                          │
//! │  S2  total 110  cash  10  (latest)           │                          │
//! │                                               │                          │
//! │  Business totals (latest rows only)           │ Cash movement (all rows) │
//! │    sales_total = 110                          │   sales_cash = 110       │
//! │                                               └─► every revision row    │
//! │                                                   carries only its delta │
//! │                                                                         │
//! │  expected = float + sales_cash − refunds_cash_abs                       │
//! │  over_short = declared − expected                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Close Journal
//! The till account holds `float + system_cash` before close. The close
//! moves `max(0, declared − float)` to cash in hand and writes the rest of
//! `system_cash` off against Cash Over/Short, leaving the float in the till.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::chart::{AccountRole, SystemAccount};
use crate::document::Sale;
use crate::error::{LedgerError, LedgerResult};
use crate::kind::RefType;
use crate::money::Money;
use crate::posting::{JournalDraft, JournalHeader};
use crate::types::TillSession;

// =============================================================================
// Totals
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TillTotals {
    /// Σtotal of latest non-return sales.
    pub sales_total: Money,
    /// Σ|total| of latest returns.
    pub returns_total_abs: Money,
    pub net_total: Money,
    pub sale_count: i64,
    pub return_count: i64,
    /// Σ(cash + card) of every effective non-return row, sign kept.
    pub sales_cash: Money,
    /// |Σ(cash + card)| of every effective return row.
    pub refunds_cash_abs: Money,
}

impl TillTotals {
    pub fn from_sales(sales: &[Sale]) -> Self {
        let mut totals = TillTotals::default();
        let mut refunds = Money::zero();

        for sale in sales.iter().filter(|s| s.is_effective()) {
            if sale.is_return {
                refunds += sale.paid_now();
            } else {
                totals.sales_cash += sale.paid_now();
            }

            if !sale.is_latest() {
                continue;
            }
            if sale.is_return {
                totals.returns_total_abs += sale.total.abs();
                totals.return_count += 1;
            } else {
                totals.sales_total += sale.total;
                totals.sale_count += 1;
            }
        }

        totals.refunds_cash_abs = refunds.abs();
        totals.net_total = totals.sales_total - totals.returns_total_abs;
        totals
    }

    /// Cash the ledger moved into the till, float excluded.
    pub fn system_cash(&self) -> Money {
        self.sales_cash - self.refunds_cash_abs
    }

    pub fn expected_cash(&self, opening_float: Money) -> Money {
        opening_float + self.system_cash()
    }
}

// =============================================================================
// Close Figures
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseFigures {
    pub expected_cash: Money,
    pub declared_cash: Money,
    pub over_short: Money,
    pub system_cash: Money,
    /// Cash moved from the till to cash in hand.
    pub declared_to_move: Money,
    /// Written off against Cash Over/Short (positive = shortage).
    pub adjustment: Money,
}

impl CloseFigures {
    /// `declared = None` accepts the expected cash.
    pub fn compute(
        opening_float: Money,
        totals: &TillTotals,
        declared: Option<Money>,
    ) -> LedgerResult<Self> {
        let expected_cash = totals.expected_cash(opening_float);
        let declared_cash = declared.unwrap_or(expected_cash);
        if declared_cash.is_negative() {
            return Err(LedgerError::InvalidDeclaredAmount {
                reason: format!("declared cash {} is negative", declared_cash),
            });
        }

        let system_cash = totals.system_cash();
        let declared_to_move = (declared_cash - opening_float).non_negative();
        Ok(CloseFigures {
            expected_cash,
            declared_cash,
            over_short: declared_cash - expected_cash,
            system_cash,
            declared_to_move,
            adjustment: system_cash - declared_to_move,
        })
    }
}

/// GL effect of closing a session; empty when nothing moves.
pub fn till_close_journal(
    session: &TillSession,
    figures: &CloseFigures,
    ts: DateTime<Utc>,
) -> JournalDraft {
    let till = AccountRole::OutletCashInTill(session.outlet_id.clone());
    let hand = AccountRole::OutletCashInHand(session.outlet_id.clone());

    let mut draft = JournalDraft::new(JournalHeader::new(
        ts,
        Some(session.outlet_id.clone()),
        RefType::TillClose,
        &session.id,
        format!("Till close {}/{}", session.outlet_id, session.counter_id),
    ));
    draft
        .debit(hand, figures.declared_to_move)
        .credit(till.clone(), figures.declared_to_move)
        .debit(SystemAccount::CashOverShort, figures.adjustment)
        .credit(till, figures.adjustment);
    draft
}

// =============================================================================
// Status / Preview
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "state", rename_all = "snake_case")]
#[ts(export)]
pub enum TillStatus {
    Closed,
    Open {
        session_id: String,
        #[ts(as = "String")]
        open_ts: DateTime<Utc>,
    },
}

impl TillStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, TillStatus::Open { .. })
    }
}

/// What the cashier sees before declaring the counted cash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosePreview {
    pub session: TillSession,
    pub totals: TillTotals,
    pub expected_cash: Money,
}

// =============================================================================
// Z-Report
// =============================================================================

/// End-of-shift summary. A value only; producing it never touches the
/// ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ZReport {
    pub session_id: String,
    pub outlet_id: String,
    pub counter_id: String,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub closed_at: DateTime<Utc>,
    pub opened_by: String,
    pub closed_by: String,
    pub opening_float: Money,
    pub sales_total: Money,
    pub returns_total: Money,
    pub net_total: Money,
    pub sale_count: i64,
    pub return_count: i64,
    pub sales_cash: Money,
    pub refunds_cash: Money,
    pub expected_cash: Money,
    pub declared_cash: Money,
    pub over_short: Money,
    /// Close journal, absent when nothing moved.
    pub transaction_id: Option<String>,
}

impl ZReport {
    pub fn new(
        session: &TillSession,
        closed_at: DateTime<Utc>,
        closed_by: &str,
        totals: &TillTotals,
        figures: &CloseFigures,
        transaction_id: Option<String>,
    ) -> Self {
        ZReport {
            session_id: session.id.clone(),
            outlet_id: session.outlet_id.clone(),
            counter_id: session.counter_id.clone(),
            opened_at: session.open_ts,
            closed_at,
            opened_by: session.opened_by.clone(),
            closed_by: closed_by.to_string(),
            opening_float: session.opening_float,
            sales_total: totals.sales_total,
            returns_total: totals.returns_total_abs,
            net_total: totals.net_total,
            sale_count: totals.sale_count,
            return_count: totals.return_count,
            sales_cash: totals.sales_cash,
            refunds_cash: totals.refunds_cash_abs,
            expected_cash: figures.expected_cash,
            declared_cash: figures.declared_cash,
            over_short: figures.over_short,
            transaction_id,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for ZReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const RULE: &str = "----------------------------------------";
        writeln!(f, "Z-REPORT  {} / {}", self.outlet_id, self.counter_id)?;
        writeln!(f, "{}", RULE)?;
        writeln!(f, "Session   {}", self.session_id)?;
        writeln!(f, "Opened    {} by {}", self.opened_at.format("%Y-%m-%d %H:%M"), self.opened_by)?;
        writeln!(f, "Closed    {} by {}", self.closed_at.format("%Y-%m-%d %H:%M"), self.closed_by)?;
        writeln!(f, "{}", RULE)?;
        writeln!(f, "{:<22}{:>18}", format!("Sales ({})", self.sale_count), self.sales_total)?;
        writeln!(f, "{:<22}{:>18}", format!("Returns ({})", self.return_count), self.returns_total)?;
        writeln!(f, "{:<22}{:>18}", "Net", self.net_total)?;
        writeln!(f, "{}", RULE)?;
        writeln!(f, "{:<22}{:>18}", "Opening float", self.opening_float)?;
        writeln!(f, "{:<22}{:>18}", "Sales cash", self.sales_cash)?;
        writeln!(f, "{:<22}{:>18}", "Refunds", self.refunds_cash)?;
        writeln!(f, "{:<22}{:>18}", "Expected", self.expected_cash)?;
        writeln!(f, "{:<22}{:>18}", "Declared", self.declared_cash)?;
        write!(f, "{:<22}{:>18}", "Over/short", self.over_short)
    }
}
