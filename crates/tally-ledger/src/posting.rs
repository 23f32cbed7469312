//! # Posting Engine
//!
//! One entry point per document family. Each one derives a draft
//! (`tally_core::posting`), resolves its accounts, seals it and hands it to
//! the store, which commits header, lines and party effects together.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  post_sale(ctx, &sale)                                                 │
//! │       │                                                                 │
//! │       ├──► store.stock_movements(Sale, sale.id)     COGS input         │
//! │       ├──► sale_journal(..)          JournalDraft   pure, balanced     │
//! │       ├──► chart.seal_draft(..)      BalancedJournal                   │
//! │       └──► store.commit_journal(..)  transaction id (all or nothing)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use tracing::{debug, info, warn};

use tally_core::document::{PayrollRun, Purchase, Sale, Voucher};
use tally_core::posting::{
    opening_balance_journal, payroll_accrual_journal, payroll_payment_journal,
    purchase_journal, purchase_return_journal, reversal_journal, sale_journal,
    sale_return_journal, sale_return_revision_journal, sale_revision_journal, voucher_journal,
};
use tally_core::{
    BalancedJournal, CommitOptions, Journal, JournalDraft, JournalHeader, JournalLine,
    LedgerContext, LedgerError, LedgerResult, LedgerStore, RefType,
};

use crate::chart::ChartResolver;
use crate::config::PostingSettings;

#[derive(Clone)]
pub struct PostingEngine {
    store: Arc<dyn LedgerStore>,
    chart: ChartResolver,
    reject_duplicate_refs: bool,
}

impl PostingEngine {
    pub fn new(store: Arc<dyn LedgerStore>, chart: ChartResolver, settings: &PostingSettings) -> Self {
        PostingEngine {
            store,
            chart,
            reject_duplicate_refs: settings.reject_duplicate_refs,
        }
    }

    fn options(&self, ctx: &LedgerContext) -> CommitOptions {
        let options = CommitOptions::new(ctx.user_id.clone());
        if self.reject_duplicate_refs {
            options
        } else {
            options.allow_duplicate_refs()
        }
    }

    // =========================================================================
    // Generic primitives
    // =========================================================================

    /// Posts already-resolved lines.
    ///
    /// ## Errors
    /// `UnbalancedJournal`, `EmptyJournal`, `AccountNotFound`,
    /// `AccountNotPostable`, `DuplicatePosting`; nothing is written on error.
    pub async fn post(
        &self,
        ctx: &LedgerContext,
        header: JournalHeader,
        lines: Vec<JournalLine>,
    ) -> LedgerResult<String> {
        let journal = BalancedJournal::seal(header, lines)?;
        self.commit(ctx, &journal).await
    }

    /// Resolves, seals and posts a draft.
    pub async fn post_draft(&self, ctx: &LedgerContext, draft: JournalDraft) -> LedgerResult<String> {
        let journal = self.chart.seal_draft(draft).await?;
        self.commit(ctx, &journal).await
    }

    async fn commit(&self, ctx: &LedgerContext, journal: &BalancedJournal) -> LedgerResult<String> {
        let header = journal.header();
        match self.store.commit_journal(journal, &self.options(ctx)).await {
            Ok(id) => {
                info!(
                    transaction_id = %id,
                    ref_type = %header.ref_type,
                    ref_id = %header.ref_id,
                    total = %journal.total(),
                    user = %ctx.user_id,
                    "Posted"
                );
                Ok(id)
            }
            Err(e) => {
                warn!(
                    ref_type = %header.ref_type,
                    ref_id = %header.ref_id,
                    error = %e,
                    "Posting rejected"
                );
                Err(e)
            }
        }
    }

    // =========================================================================
    // Sales
    // =========================================================================

    pub async fn post_sale(&self, ctx: &LedgerContext, sale: &Sale) -> LedgerResult<String> {
        let movements = self.store.stock_movements(RefType::Sale, &sale.id).await?;
        self.post_draft(ctx, sale_journal(sale, &movements, ctx.now())).await
    }

    pub async fn post_sale_return(&self, ctx: &LedgerContext, sale: &Sale) -> LedgerResult<String> {
        let movements = self.store.stock_movements(RefType::SaleReturn, &sale.id).await?;
        self.post_draft(ctx, sale_return_journal(sale, &movements, ctx.now())).await
    }

    /// Posts the delta between two revisions of a sale.
    ///
    /// ## Returns
    /// `None` when the grand total did not change; nothing is posted.
    pub async fn post_sale_revision(
        &self,
        ctx: &LedgerContext,
        previous: &Sale,
        amended: &Sale,
    ) -> LedgerResult<Option<String>> {
        let movements = self.store.stock_movements(RefType::SaleRev, &amended.id).await?;
        match sale_revision_journal(previous, amended, &movements, ctx.now()) {
            Some(draft) => Ok(Some(self.post_draft(ctx, draft).await?)),
            None => {
                debug!(previous = %previous.id, amended = %amended.id, "Immaterial sale revision");
                Ok(None)
            }
        }
    }

    /// Posts the delta between two revisions of a sale return.
    pub async fn post_sale_return_revision(
        &self,
        ctx: &LedgerContext,
        previous: &Sale,
        amended: &Sale,
    ) -> LedgerResult<Option<String>> {
        let movements = self.store.stock_movements(RefType::Amend, &amended.id).await?;
        match sale_return_revision_journal(previous, amended, &movements, ctx.now()) {
            Some(draft) => Ok(Some(self.post_draft(ctx, draft).await?)),
            None => {
                debug!(previous = %previous.id, amended = %amended.id, "Immaterial return amendment");
                Ok(None)
            }
        }
    }

    // =========================================================================
    // Purchases
    // =========================================================================

    pub async fn post_purchase(&self, ctx: &LedgerContext, purchase: &Purchase) -> LedgerResult<String> {
        self.post_draft(ctx, purchase_journal(purchase, ctx.now())).await
    }

    pub async fn post_purchase_return(&self, ctx: &LedgerContext, purchase: &Purchase) -> LedgerResult<String> {
        self.post_draft(ctx, purchase_return_journal(purchase, ctx.now())).await
    }

    // =========================================================================
    // Manual journals
    // =========================================================================

    /// Posts voucher lines as given.
    pub async fn post_voucher(&self, ctx: &LedgerContext, voucher: &Voucher) -> LedgerResult<String> {
        self.post_draft(ctx, voucher_journal(voucher, ctx.now())).await
    }

    /// Posts opening balances, plugging any difference to opening equity.
    pub async fn post_opening_balance(&self, ctx: &LedgerContext, voucher: &Voucher) -> LedgerResult<String> {
        self.post_draft(ctx, opening_balance_journal(voucher, ctx.now())).await
    }

    // =========================================================================
    // Payroll
    // =========================================================================

    pub async fn post_payroll_accrual(&self, ctx: &LedgerContext, run: &PayrollRun) -> LedgerResult<String> {
        self.post_draft(ctx, payroll_accrual_journal(run, ctx.now())).await
    }

    /// Payment of a finalized run. Ordering against the accrual is the
    /// caller's responsibility.
    pub async fn post_payroll_payment(&self, ctx: &LedgerContext, run: &PayrollRun) -> LedgerResult<String> {
        self.post_draft(ctx, payroll_payment_journal(run, ctx.now())).await
    }

    // =========================================================================
    // Reversal and reads
    // =========================================================================

    /// Posts the exact mirror of a journal with memo `VOID <reason>`.
    ///
    /// ## Errors
    /// - `JournalNotFound` for an unknown id
    /// - `DuplicatePosting` when it was already reversed
    pub async fn reverse(&self, ctx: &LedgerContext, transaction_id: &str, reason: &str) -> LedgerResult<String> {
        let original = self
            .store
            .journal(transaction_id)
            .await?
            .ok_or_else(|| LedgerError::JournalNotFound(transaction_id.to_string()))?;

        self.post_draft(ctx, reversal_journal(&original, reason, ctx.now())).await
    }

    pub async fn journal(&self, transaction_id: &str) -> LedgerResult<Option<Journal>> {
        self.store.journal(transaction_id).await
    }

    pub async fn journals_for_ref(&self, ref_type: RefType, ref_id: &str) -> LedgerResult<Vec<Journal>> {
        self.store.journals_for_ref(ref_type, ref_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tally_core::document::{SaleStatus, StockMovement, VoucherKind, VoucherLine};
    use tally_core::{AccountRole, Money, SystemAccount};
    use tally_db::{Database, DbConfig};

    struct Fixture {
        db: Database,
        engine: PostingEngine,
        chart: ChartResolver,
        store: Arc<dyn LedgerStore>,
    }

    async fn fixture() -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let store: Arc<dyn LedgerStore> = Arc::new(db.ledger_store());
        let chart = ChartResolver::new(store.clone());
        let engine = PostingEngine::new(store.clone(), chart.clone(), &PostingSettings::default());
        Fixture {
            db,
            engine,
            chart,
            store,
        }
    }

    fn ctx() -> LedgerContext {
        LedgerContext::new("u1").with_outlet("OUT1")
    }

    fn sale(id: &str, total: i64, tax: i64, cash: i64) -> Sale {
        Sale {
            id: id.into(),
            outlet_id: "OUT1".into(),
            counter_id: "C1".into(),
            customer_id: Some("CUST1".into()),
            total: Money::from_cents(total),
            tax_total: Money::from_cents(tax),
            cash_amount: Money::from_cents(cash),
            card_amount: Money::zero(),
            is_return: false,
            status: SaleStatus::Final,
            voided_at: None,
            revised_to_sale_id: None,
            till_session_id: None,
            created_at: Utc::now(),
        }
    }

    async fn net_of(f: &Fixture, role: AccountRole) -> Money {
        let id = f.chart.ensure_account(&role).await.unwrap();
        f.store.account_net(&id, std::ops::Bound::Unbounded).await.unwrap()
    }

    #[tokio::test]
    async fn test_sale_with_credit_and_cogs() {
        let f = fixture().await;
        f.db.stock_movements()
            .insert(&StockMovement {
                id: "M1".into(),
                product_id: "P1".into(),
                ref_type: RefType::Sale,
                ref_id: "S1".into(),
                quantity: -3,
                unit_cost: Money::from_cents(1_000),
            })
            .await
            .unwrap();

        let id = f.engine.post_sale(&ctx(), &sale("S1", 11_000, 1_000, 6_000)).await.unwrap();
        let journal = f.engine.journal(&id).await.unwrap().unwrap();
        assert_eq!(journal.total_debit(), Money::from_cents(11_000 + 3_000));
        assert_eq!(journal.total_debit(), journal.total_credit());

        assert_eq!(net_of(&f, AccountRole::OutletCashInTill("OUT1".into())).await, Money::from_cents(6_000));
        assert_eq!(net_of(&f, SystemAccount::AccountsReceivable.into()).await, Money::from_cents(5_000));
        assert_eq!(net_of(&f, SystemAccount::SalesRevenue.into()).await, Money::from_cents(-10_000));
        assert_eq!(net_of(&f, SystemAccount::CostOfGoodsSold.into()).await, Money::from_cents(3_000));

        let balance = f.store.party_balance("CUST1", Some("OUT1")).await.unwrap().unwrap();
        assert_eq!(balance.balance, Money::from_cents(5_000));
    }

    #[tokio::test]
    async fn test_double_post_is_rejected() {
        let f = fixture().await;
        let s = sale("S1", 1_000, 0, 1_000);
        f.engine.post_sale(&ctx(), &s).await.unwrap();

        let err = f.engine.post_sale(&ctx(), &s).await.unwrap_err();
        assert!(matches!(err, LedgerError::DuplicatePosting { ref_type: RefType::Sale, .. }));
        assert_eq!(f.engine.journals_for_ref(RefType::Sale, "S1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicates_allowed_when_configured() {
        let f = fixture().await;
        let engine = PostingEngine::new(
            f.store.clone(),
            f.chart.clone(),
            &PostingSettings {
                reject_duplicate_refs: false,
            },
        );
        let s = sale("S1", 1_000, 0, 1_000);
        engine.post_sale(&ctx(), &s).await.unwrap();
        engine.post_sale(&ctx(), &s).await.unwrap();
        assert_eq!(engine.journals_for_ref(RefType::Sale, "S1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_revision_posts_only_the_delta() {
        let f = fixture().await;
        let previous = sale("S1", 11_000, 1_000, 11_000);
        f.engine.post_sale(&ctx(), &previous).await.unwrap();

        let mut amended = sale("S2", 22_000, 2_000, 11_000);
        amended.customer_id = None;
        let id = f
            .engine
            .post_sale_revision(&ctx(), &previous, &amended)
            .await
            .unwrap()
            .unwrap();

        let journal = f.engine.journal(&id).await.unwrap().unwrap();
        assert_eq!(journal.transaction.ref_type, RefType::SaleRev);
        assert_eq!(journal.total_debit(), Money::from_cents(11_000));

        // unchanged totals post nothing
        let same = f.engine.post_sale_revision(&ctx(), &amended, &amended).await.unwrap();
        assert!(same.is_none());
    }

    #[tokio::test]
    async fn test_voucher_to_unknown_account_fails_atomically() {
        let f = fixture().await;
        let cash = f.chart.ensure_account(&AccountRole::CompanyCash).await.unwrap();
        let voucher = Voucher {
            id: "V1".into(),
            outlet_id: None,
            kind: VoucherKind::Journal,
            memo: Some("typo".into()),
            lines: vec![
                VoucherLine::debit(cash, Money::from_cents(100)),
                VoucherLine::credit("no-such-account", Money::from_cents(100)),
            ],
        };

        let err = f.engine.post_voucher(&ctx(), &voucher).await.unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound(_)));
        assert_eq!(f.db.journals().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unbalanced_voucher_is_rejected() {
        let f = fixture().await;
        let cash = f.chart.ensure_account(&AccountRole::CompanyCash).await.unwrap();
        let revenue = f
            .chart
            .ensure_account(&SystemAccount::SalesRevenue.into())
            .await
            .unwrap();
        let voucher = Voucher {
            id: "V2".into(),
            outlet_id: None,
            kind: VoucherKind::Journal,
            memo: None,
            lines: vec![
                VoucherLine::debit(cash, Money::from_cents(100)),
                VoucherLine::credit(revenue, Money::from_cents(99)),
            ],
        };

        let err = f.engine.post_voucher(&ctx(), &voucher).await.unwrap_err();
        assert!(matches!(err, LedgerError::UnbalancedJournal { .. }));
    }

    #[tokio::test]
    async fn test_reverse_mirrors_and_only_once() {
        let f = fixture().await;
        let id = f.engine.post_sale(&ctx(), &sale("S1", 5_000, 0, 3_000)).await.unwrap();

        let reversal = f.engine.reverse(&ctx(), &id, "keyed twice").await.unwrap();
        let journal = f.engine.journal(&reversal).await.unwrap().unwrap();
        assert_eq!(journal.transaction.ref_type, RefType::Reversal);
        assert_eq!(journal.transaction.ref_id, id);
        assert_eq!(journal.transaction.memo, "VOID keyed twice");

        assert_eq!(net_of(&f, AccountRole::OutletCashInTill("OUT1".into())).await, Money::zero());
        let balance = f.store.party_balance("CUST1", Some("OUT1")).await.unwrap().unwrap();
        assert_eq!(balance.balance, Money::zero());

        let err = f.engine.reverse(&ctx(), &id, "again").await.unwrap_err();
        assert!(matches!(err, LedgerError::DuplicatePosting { .. }));

        let err = f.engine.reverse(&ctx(), "missing", "x").await.unwrap_err();
        assert!(matches!(err, LedgerError::JournalNotFound(_)));
    }

    #[tokio::test]
    async fn test_payroll_accrual_then_payment_clears_payable() {
        let f = fixture().await;
        let run = PayrollRun {
            id: "PR-2024-03".into(),
            outlet_id: None,
            total_net: Money::from_cents(250_000),
        };

        f.engine.post_payroll_accrual(&ctx(), &run).await.unwrap();
        f.engine.post_payroll_payment(&ctx(), &run).await.unwrap();

        assert_eq!(net_of(&f, SystemAccount::SalariesPayable.into()).await, Money::zero());
        assert_eq!(net_of(&f, SystemAccount::SalariesExpense.into()).await, Money::from_cents(250_000));
        assert_eq!(net_of(&f, AccountRole::CompanyCash).await, Money::from_cents(-250_000));
    }
}
