//! # Posting Derivations
//!
//! Pure transformation from business documents to balanced journals.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Sale / Purchase / Voucher / PayrollRun / revision pair                │
//! │       │                                                                 │
//! │       ▼  sale_journal(), purchase_journal(), ...  (THIS MODULE)        │
//! │  JournalDraft      lines reference AccountRole or AccountId            │
//! │       │                                                                 │
//! │       ▼  ChartResolver (tally-ledger) turns roles into ids             │
//! │  Vec<JournalLine>                                                       │
//! │       │                                                                 │
//! │       ▼  BalancedJournal::seal()                                       │
//! │  Ok(BalancedJournal) | Err(UnbalancedJournal { debit, credit })        │
//! │       │                                                                 │
//! │       ▼  LedgerStore::commit_journal()  (single SQL transaction)       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Signed Legs
//! Every derivation emits amounts through [`JournalDraft::debit`] /
//! [`JournalDraft::credit`], which take *signed* amounts: a negative debit
//! lands on the credit side of the same account and zero emits nothing.
//! Each derivation is written so its signed legs sum to zero algebraically,
//! so any magnitude and any sign combination balances by construction
//! (an overpaid sale simply credits the customer's receivable).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chart::{AccountRole, SystemAccount};
use crate::document::{PayrollRun, Purchase, Sale, StockMovement, Voucher};
use crate::error::{LedgerError, LedgerResult, ValidationError};
use crate::kind::RefType;
use crate::money::Money;
use crate::types::Journal;
use crate::validation::validate_ref_id;

// =============================================================================
// Draft Types
// =============================================================================

/// Target of a draft line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountRef {
    /// Canonical account, resolved (and created if missing) at post time.
    Role(AccountRole),
    /// A concrete account chosen by the user (vouchers, reversals).
    Id(String),
}

impl From<AccountRole> for AccountRef {
    fn from(role: AccountRole) -> Self {
        AccountRef::Role(role)
    }
}

impl From<SystemAccount> for AccountRef {
    fn from(account: SystemAccount) -> Self {
        AccountRef::Role(AccountRole::System(account))
    }
}

/// Journal header shared by drafts and sealed journals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalHeader {
    pub ts_utc: DateTime<Utc>,
    pub outlet_id: Option<String>,
    pub ref_type: RefType,
    pub ref_id: String,
    pub memo: String,
}

impl JournalHeader {
    pub fn new(
        ts_utc: DateTime<Utc>,
        outlet_id: Option<String>,
        ref_type: RefType,
        ref_id: impl Into<String>,
        memo: impl Into<String>,
    ) -> Self {
        JournalHeader {
            ts_utc,
            outlet_id,
            ref_type,
            ref_id: ref_id.into(),
            memo: memo.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftLine {
    pub account: AccountRef,
    pub debit: Money,
    pub credit: Money,
    pub party_id: Option<String>,
    pub memo: Option<String>,
}

/// An unresolved journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalDraft {
    pub header: JournalHeader,
    pub lines: Vec<DraftLine>,
}

impl JournalDraft {
    pub fn new(header: JournalHeader) -> Self {
        JournalDraft {
            header,
            lines: Vec::new(),
        }
    }

    /// Signed debit: positive debits, negative credits, zero is skipped.
    pub fn debit(&mut self, account: impl Into<AccountRef>, amount: Money) -> &mut Self {
        self.leg(account.into(), amount, None)
    }

    /// Signed credit: `credit(a, x)` is `debit(a, -x)`.
    pub fn credit(&mut self, account: impl Into<AccountRef>, amount: Money) -> &mut Self {
        self.leg(account.into(), -amount, None)
    }

    /// Signed debit that also lands on a party's sub-ledger.
    pub fn debit_party(
        &mut self,
        account: impl Into<AccountRef>,
        amount: Money,
        party_id: Option<&str>,
    ) -> &mut Self {
        self.leg(account.into(), amount, party_id)
    }

    /// Signed credit that also lands on a party's sub-ledger.
    pub fn credit_party(
        &mut self,
        account: impl Into<AccountRef>,
        amount: Money,
        party_id: Option<&str>,
    ) -> &mut Self {
        self.leg(account.into(), -amount, party_id)
    }

    /// Appends a line verbatim (manual vouchers).
    pub fn push(&mut self, line: DraftLine) -> &mut Self {
        self.lines.push(line);
        self
    }

    fn leg(&mut self, account: AccountRef, signed: Money, party_id: Option<&str>) -> &mut Self {
        if signed.is_zero() {
            return self;
        }
        let (debit, credit) = signed.as_leg();
        self.lines.push(DraftLine {
            account,
            debit,
            credit,
            party_id: party_id.map(str::to_string),
            memo: None,
        });
        self
    }

    /// (Σdebit, Σcredit)
    pub fn totals(&self) -> (Money, Money) {
        self.lines.iter().fold((Money::zero(), Money::zero()), |(d, c), l| {
            (d + l.debit, c + l.credit)
        })
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

// =============================================================================
// Sealed Journal
// =============================================================================

/// A line whose account has been resolved to an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    pub account_id: String,
    pub debit: Money,
    pub credit: Money,
    pub party_id: Option<String>,
    pub memo: Option<String>,
}

impl JournalLine {
    pub fn from_draft(line: DraftLine, account_id: String) -> Self {
        JournalLine {
            account_id,
            debit: line.debit,
            credit: line.credit,
            party_id: line.party_id,
            memo: line.memo,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.debit.is_zero() && self.credit.is_zero()
    }

    /// Debit-positive signed amount.
    pub fn net(&self) -> Money {
        self.debit - self.credit
    }
}

/// A journal proven balanced and non-empty.
///
/// The only way to obtain one is [`BalancedJournal::seal`], so storage can
/// accept it without recomputing derivations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalancedJournal {
    header: JournalHeader,
    lines: Vec<JournalLine>,
    total: Money,
}

impl BalancedJournal {
    /// Validates and seals a resolved journal.
    ///
    /// ## Rules
    /// - `ref_id` must be a valid reference
    /// - no negative debit or credit
    /// - all-zero lines are dropped; nothing left is `EmptyJournal`
    /// - Σdebit must equal Σcredit exactly
    pub fn seal(header: JournalHeader, lines: Vec<JournalLine>) -> LedgerResult<Self> {
        validate_ref_id(&header.ref_id)?;

        let lines: Vec<JournalLine> = lines.into_iter().filter(|l| !l.is_zero()).collect();
        for line in &lines {
            if line.debit.is_negative() {
                return Err(ValidationError::Negative {
                    field: "debit".to_string(),
                }
                .into());
            }
            if line.credit.is_negative() {
                return Err(ValidationError::Negative {
                    field: "credit".to_string(),
                }
                .into());
            }
        }
        if lines.is_empty() {
            return Err(LedgerError::EmptyJournal);
        }

        let total = check_balance(lines.iter().map(|l| (l.debit, l.credit)))?;
        Ok(BalancedJournal {
            header,
            lines,
            total,
        })
    }

    pub fn header(&self) -> &JournalHeader {
        &self.header
    }

    pub fn lines(&self) -> &[JournalLine] {
        &self.lines
    }

    /// Σdebit (== Σcredit).
    pub fn total(&self) -> Money {
        self.total
    }
}

/// Sums (debit, credit) pairs and fails unless they agree.
///
/// Returns the common total.
pub fn check_balance(pairs: impl IntoIterator<Item = (Money, Money)>) -> LedgerResult<Money> {
    let (debit, credit) = pairs
        .into_iter()
        .fold((Money::zero(), Money::zero()), |(d, c), (ld, lc)| (d + ld, c + lc));
    if debit != credit {
        return Err(LedgerError::UnbalancedJournal { debit, credit });
    }
    Ok(debit)
}

// =============================================================================
// Stock Valuation Helpers
// =============================================================================

/// Cost of goods leaving stock (negative quantity) for one document kind.
pub fn goods_out(movements: &[StockMovement], kind: RefType) -> Money {
    movements
        .iter()
        .filter(|m| m.ref_type == kind && m.quantity < 0)
        .map(StockMovement::value)
        .sum()
}

/// Cost of goods coming back into stock (positive quantity).
pub fn goods_in(movements: &[StockMovement], kind: RefType) -> Money {
    movements
        .iter()
        .filter(|m| m.ref_type == kind && m.quantity > 0)
        .map(StockMovement::value)
        .sum()
}

// =============================================================================
// Sales
// =============================================================================

/// Sale: Dr Till(paid) Dr AR(total − paid) Cr Revenue(subtotal) Cr Tax;
/// plus Dr COGS / Cr Inventory for goods out.
pub fn sale_journal(sale: &Sale, movements: &[StockMovement], ts: DateTime<Utc>) -> JournalDraft {
    let till = AccountRole::OutletCashInTill(sale.outlet_id.clone());
    let paid = sale.paid_now();
    let on_account = sale.total - paid;

    let mut draft = JournalDraft::new(JournalHeader::new(
        ts,
        Some(sale.outlet_id.clone()),
        RefType::Sale,
        &sale.id,
        format!("Sale #{}", sale.id),
    ));
    draft
        .debit(till, paid)
        .debit_party(
            SystemAccount::AccountsReceivable,
            on_account,
            sale.customer_id.as_deref(),
        )
        .credit(SystemAccount::SalesRevenue, sale.subtotal())
        .credit(SystemAccount::SalesTaxPayable, sale.tax_total);

    let cogs = goods_out(movements, RefType::Sale);
    draft
        .debit(SystemAccount::CostOfGoodsSold, cogs)
        .credit(SystemAccount::Inventory, cogs);
    draft
}

/// Mirror of [`sale_journal`] over magnitudes.
pub fn sale_return_journal(
    sale: &Sale,
    movements: &[StockMovement],
    ts: DateTime<Utc>,
) -> JournalDraft {
    let till = AccountRole::OutletCashInTill(sale.outlet_id.clone());
    let total = sale.total.abs();
    let tax = sale.tax_total.abs();
    let refunded = sale.paid_now().abs();

    let mut draft = JournalDraft::new(JournalHeader::new(
        ts,
        Some(sale.outlet_id.clone()),
        RefType::SaleReturn,
        &sale.id,
        format!("Sale Return #{}", sale.id),
    ));
    draft
        .credit(till, refunded)
        .credit_party(
            SystemAccount::AccountsReceivable,
            total - refunded,
            sale.customer_id.as_deref(),
        )
        .debit(SystemAccount::SalesRevenue, total - tax)
        .debit(SystemAccount::SalesTaxPayable, tax);

    let restocked = goods_in(movements, RefType::SaleReturn);
    draft
        .debit(SystemAccount::Inventory, restocked)
        .credit(SystemAccount::CostOfGoodsSold, restocked);
    draft
}

// =============================================================================
// Revisions
// =============================================================================

/// Material change between two revisions of a document.
///
/// `grand` is always `subtotal + tax`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionDelta {
    pub subtotal: Money,
    pub tax: Money,
    pub grand: Money,
}

impl RevisionDelta {
    pub fn between(previous_total: Money, previous_tax: Money, total: Money, tax: Money) -> Self {
        let subtotal = (total - tax) - (previous_total - previous_tax);
        let tax = tax - previous_tax;
        RevisionDelta {
            subtotal,
            tax,
            grand: subtotal + tax,
        }
    }

    /// No change to the grand total: nothing is posted.
    pub fn is_immaterial(&self) -> bool {
        self.grand.is_zero()
    }
}

/// Dr COGS / Cr Inventory for quantity decreases, the reverse pair for
/// increases. Both pairs are emitted separately.
fn cogs_delta(draft: &mut JournalDraft, movements: &[StockMovement], kind: RefType) {
    let more_out = goods_out(movements, kind);
    let more_in = goods_in(movements, kind);
    draft
        .debit(SystemAccount::CostOfGoodsSold, more_out)
        .credit(SystemAccount::Inventory, more_out)
        .debit(SystemAccount::Inventory, more_in)
        .credit(SystemAccount::CostOfGoodsSold, more_in);
}

/// Delta journal for an amended sale; `None` when the grand total is
/// unchanged.
///
/// ## Example
/// ```rust
/// use chrono::Utc;
/// use tally_core::money::Money;
/// use tally_core::posting::RevisionDelta;
///
/// let delta = RevisionDelta::between(
///     Money::from_cents(11_000), Money::from_cents(1_000),
///     Money::from_cents(22_000), Money::from_cents(2_000),
/// );
/// assert_eq!(delta.grand.cents(), 11_000);
/// ```
pub fn sale_revision_journal(
    previous: &Sale,
    amended: &Sale,
    movements: &[StockMovement],
    ts: DateTime<Utc>,
) -> Option<JournalDraft> {
    let delta = RevisionDelta::between(
        previous.total,
        previous.tax_total,
        amended.total,
        amended.tax_total,
    );
    if delta.is_immaterial() {
        return None;
    }

    let mut draft = JournalDraft::new(JournalHeader::new(
        ts,
        Some(amended.outlet_id.clone()),
        RefType::SaleRev,
        &amended.id,
        format!("Sale #{} revision of #{}", amended.id, previous.id),
    ));
    draft
        .debit(AccountRole::OutletCashInTill(amended.outlet_id.clone()), delta.grand)
        .credit(SystemAccount::SalesRevenue, delta.subtotal)
        .credit(SystemAccount::SalesTaxPayable, delta.tax);
    cogs_delta(&mut draft, movements, RefType::SaleRev);
    Some(draft)
}

/// Delta journal for an amended sale return.
///
/// Positive delta (more refunded): Cr Till / Dr Revenue / Dr Tax.
/// Negative delta (less refunded): the same legs land on the opposite
/// sides through the signed helpers.
pub fn sale_return_revision_journal(
    previous: &Sale,
    amended: &Sale,
    movements: &[StockMovement],
    ts: DateTime<Utc>,
) -> Option<JournalDraft> {
    let delta = RevisionDelta::between(
        previous.total.abs(),
        previous.tax_total.abs(),
        amended.total.abs(),
        amended.tax_total.abs(),
    );
    if delta.is_immaterial() {
        return None;
    }

    let mut draft = JournalDraft::new(JournalHeader::new(
        ts,
        Some(amended.outlet_id.clone()),
        RefType::Amend,
        &amended.id,
        format!("Sale Return #{} amendment of #{}", amended.id, previous.id),
    ));
    draft
        .credit(AccountRole::OutletCashInTill(amended.outlet_id.clone()), delta.grand)
        .debit(SystemAccount::SalesRevenue, delta.subtotal)
        .debit(SystemAccount::SalesTaxPayable, delta.tax);
    cogs_delta(&mut draft, movements, RefType::Amend);
    Some(draft)
}

// =============================================================================
// Purchases
// =============================================================================

/// Purchase: Dr Inventory(goods) Dr InputTax(tax) Cr Cash(paid) Cr AP(due).
///
/// An overpayment at an outlet goes to the outlet's supplier advances
/// instead of a debit balance on payables.
pub fn purchase_journal(purchase: &Purchase, ts: DateTime<Utc>) -> JournalDraft {
    let cash = AccountRole::cash_in_hand(purchase.outlet_id.as_deref());
    let supplier = purchase.supplier_id.as_deref();
    let due = purchase.due();

    let mut draft = JournalDraft::new(JournalHeader::new(
        ts,
        purchase.outlet_id.clone(),
        RefType::Purchase,
        &purchase.id,
        format!("PO #{}", purchase.id),
    ));
    draft
        .debit(SystemAccount::Inventory, purchase.goods_value())
        .debit(SystemAccount::InputTax, purchase.tax)
        .credit(cash, purchase.cash_paid);

    match (&purchase.outlet_id, due.is_negative()) {
        (Some(outlet), true) => {
            draft.debit_party(AccountRole::SupplierAdvances(outlet.clone()), -due, supplier);
        }
        _ => {
            draft.credit_party(SystemAccount::AccountsPayable, due, supplier);
        }
    }
    draft
}

/// Mirror of [`purchase_journal`] over magnitudes.
pub fn purchase_return_journal(purchase: &Purchase, ts: DateTime<Utc>) -> JournalDraft {
    let cash = AccountRole::cash_in_hand(purchase.outlet_id.as_deref());
    let grand = purchase.grand_total.abs();
    let tax = purchase.tax.abs();
    let refunded = purchase.cash_paid.abs();

    let mut draft = JournalDraft::new(JournalHeader::new(
        ts,
        purchase.outlet_id.clone(),
        RefType::PurchaseReturn,
        &purchase.id,
        format!("PO Return #{}", purchase.id),
    ));
    draft
        .credit(SystemAccount::Inventory, grand - tax)
        .credit(SystemAccount::InputTax, tax)
        .debit(cash, refunded)
        .debit_party(
            SystemAccount::AccountsPayable,
            grand - refunded,
            purchase.supplier_id.as_deref(),
        );
    draft
}

// =============================================================================
// Vouchers
// =============================================================================

fn voucher_memo(voucher: &Voucher, prefix: &str) -> String {
    match voucher.memo.as_deref() {
        Some(memo) if !memo.trim().is_empty() => format!("{} #{} {}", prefix, voucher.id, memo),
        _ => format!("{} #{}", prefix, voucher.id),
    }
}

fn push_voucher_lines(draft: &mut JournalDraft, voucher: &Voucher) {
    for line in &voucher.lines {
        draft.push(DraftLine {
            account: AccountRef::Id(line.account_id.clone()),
            debit: line.debit,
            credit: line.credit,
            party_id: line.party_id.clone(),
            memo: line.memo.clone(),
        });
    }
}

/// Manual journal, posted as-is.
pub fn voucher_journal(voucher: &Voucher, ts: DateTime<Utc>) -> JournalDraft {
    let mut draft = JournalDraft::new(JournalHeader::new(
        ts,
        voucher.outlet_id.clone(),
        voucher.kind.ref_type(),
        &voucher.id,
        voucher_memo(voucher, "Voucher"),
    ));
    push_voucher_lines(&mut draft, voucher);
    draft
}

/// Opening balances: the voucher lines plus the difference against
/// opening balance equity.
pub fn opening_balance_journal(voucher: &Voucher, ts: DateTime<Utc>) -> JournalDraft {
    let mut draft = JournalDraft::new(JournalHeader::new(
        ts,
        voucher.outlet_id.clone(),
        RefType::Opening,
        &voucher.id,
        voucher_memo(voucher, "Opening balance"),
    ));
    push_voucher_lines(&mut draft, voucher);
    let (debit, credit) = draft.totals();
    draft.credit(SystemAccount::OpeningEquity, debit - credit);
    draft
}

// =============================================================================
// Payroll
// =============================================================================

pub fn payroll_accrual_journal(run: &PayrollRun, ts: DateTime<Utc>) -> JournalDraft {
    let mut draft = JournalDraft::new(JournalHeader::new(
        ts,
        run.outlet_id.clone(),
        RefType::PayrollAccrual,
        &run.id,
        format!("Payroll accrual #{}", run.id),
    ));
    draft
        .debit(SystemAccount::SalariesExpense, run.total_net)
        .credit(SystemAccount::SalariesPayable, run.total_net);
    draft
}

pub fn payroll_payment_journal(run: &PayrollRun, ts: DateTime<Utc>) -> JournalDraft {
    let mut draft = JournalDraft::new(JournalHeader::new(
        ts,
        run.outlet_id.clone(),
        RefType::PayrollPayment,
        &run.id,
        format!("Payroll payment #{}", run.id),
    ));
    draft
        .debit(SystemAccount::SalariesPayable, run.total_net)
        .credit(AccountRole::cash_in_hand(run.outlet_id.as_deref()), run.total_net);
    draft
}

// =============================================================================
// Reversal
// =============================================================================

/// Exact mirror of a stored journal, memo `VOID <reason>`.
pub fn reversal_journal(original: &Journal, reason: &str, ts: DateTime<Utc>) -> JournalDraft {
    let tx = &original.transaction;
    let mut draft = JournalDraft::new(JournalHeader::new(
        ts,
        tx.outlet_id.clone(),
        RefType::Reversal,
        &tx.id,
        format!("VOID {}", reason.trim()),
    ));
    for line in &original.lines {
        draft.push(DraftLine {
            account: AccountRef::Id(line.account_id.clone()),
            debit: line.credit,
            credit: line.debit,
            party_id: line.party_id.clone(),
            memo: line.line_memo.clone(),
        });
    }
    draft
}

// =============================================================================
// Unit Tests
// =============================================================================
