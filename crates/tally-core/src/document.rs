//! # Business Documents
//!
//! Documents produced by collaborators (checkout, purchasing, payroll,
//! back office) and consumed read-only by the posting engine.
//!
//! ## Revisions
//! ```text
//! Sale S1 (total 100, cash 100) ── amended ──► Sale S2 (total 110, cash 10)
//!   revised_to_sale_id = S2                     revised_to_sale_id = None
//!
//! S2 carries the full amended totals but only the cash collected BY the
//! amendment. The till sums cash over S1 and S2; business totals use S2 only.
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::kind::RefType;
use crate::money::Money;

// =============================================================================
// Sale
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Draft,
    Final,
}

/// A sale or sale return as recorded at the counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub outlet_id: String,
    pub counter_id: String,
    pub customer_id: Option<String>,
    /// Grand total including tax.
    pub total: Money,
    pub tax_total: Money,
    pub cash_amount: Money,
    pub card_amount: Money,
    pub is_return: bool,
    pub status: SaleStatus,
    #[ts(as = "Option<String>")]
    pub voided_at: Option<DateTime<Utc>>,
    /// Set once a later revision supersedes this row.
    pub revised_to_sale_id: Option<String>,
    pub till_session_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Sale {
    /// Cash and card collected (or refunded) by this row.
    pub fn paid_now(&self) -> Money {
        self.cash_amount + self.card_amount
    }

    /// Total net of tax.
    pub fn subtotal(&self) -> Money {
        self.total - self.tax_total
    }

    /// Final and not voided: counts toward till cash.
    pub fn is_effective(&self) -> bool {
        self.status == SaleStatus::Final && self.voided_at.is_none()
    }

    /// Effective and not superseded: counts toward business totals.
    pub fn is_latest(&self) -> bool {
        self.is_effective() && self.revised_to_sale_id.is_none()
    }
}

// =============================================================================
// Purchase
// =============================================================================

/// A supplier purchase (or purchase return).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: String,
    pub outlet_id: Option<String>,
    pub supplier_id: Option<String>,
    pub grand_total: Money,
    pub tax: Money,
    pub cash_paid: Money,
}

impl Purchase {
    /// Inventory value; stock is carried net of recoverable tax.
    pub fn goods_value(&self) -> Money {
        self.grand_total - self.tax
    }

    /// Amount left on account with the supplier (negative = overpaid).
    pub fn due(&self) -> Money {
        self.grand_total - self.cash_paid
    }
}

// =============================================================================
// Voucher
// =============================================================================

/// What a manual voucher represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoucherKind {
    Journal,
    Receipt,
    Payment,
    Opening,
}

impl VoucherKind {
    pub const fn ref_type(&self) -> RefType {
        match self {
            VoucherKind::Journal => RefType::Voucher,
            VoucherKind::Receipt => RefType::Receipt,
            VoucherKind::Payment => RefType::Payment,
            VoucherKind::Opening => RefType::Opening,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherLine {
    pub account_id: String,
    pub debit: Money,
    pub credit: Money,
    pub party_id: Option<String>,
    pub memo: Option<String>,
}

impl VoucherLine {
    pub fn debit(account_id: impl Into<String>, amount: Money) -> Self {
        VoucherLine {
            account_id: account_id.into(),
            debit: amount,
            credit: Money::zero(),
            party_id: None,
            memo: None,
        }
    }

    pub fn credit(account_id: impl Into<String>, amount: Money) -> Self {
        VoucherLine {
            account_id: account_id.into(),
            debit: Money::zero(),
            credit: amount,
            party_id: None,
            memo: None,
        }
    }

    pub fn with_party(mut self, party_id: impl Into<String>) -> Self {
        self.party_id = Some(party_id.into());
        self
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }
}

/// A free-form manual journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voucher {
    pub id: String,
    pub outlet_id: Option<String>,
    pub kind: VoucherKind,
    pub memo: Option<String>,
    pub lines: Vec<VoucherLine>,
}

// =============================================================================
// Payroll
// =============================================================================

/// A finalized payroll run; only its total reaches the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollRun {
    pub id: String,
    pub outlet_id: Option<String>,
    pub total_net: Money,
}

// =============================================================================
// Stock Movement
// =============================================================================

/// A stock quantity change tagged with the document that caused it.
///
/// Negative quantity = goods out (sold), positive = goods back in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    pub ref_type: RefType,
    pub ref_id: String,
    pub quantity: i64,
    pub unit_cost: Money,
}

impl StockMovement {
    /// Cost of the moved goods, always non-negative.
    pub fn value(&self) -> Money {
        self.unit_cost.abs().times(self.quantity.abs())
    }
}
