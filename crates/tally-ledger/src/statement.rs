//! # Statement Engine
//!
//! Read side of the ledger: account statements, outlet cash books, the
//! trial balance and party balances. Nothing here writes, so any call can
//! be dropped mid-flight.
//!
//! ## Balance Windows
//! Every figure covers `ts < bound`:
//! ```text
//! statement(a, from, to).opening  == balance(a, from)
//! statement(a, from, to).closing  == balance(a, to)
//! ```

use chrono::{DateTime, Utc};
use std::ops::Bound;
use std::sync::Arc;
use tracing::debug;

use tally_core::party::{PartyBalance, PartyLedgerEntry};
use tally_core::statement::{build_statement, CashBook, Statement, TrialBalance};
use tally_core::{
    Account, AccountRole, LedgerError, LedgerResult, LedgerStore, Money, ValidationError,
};

use crate::chart::ChartResolver;

#[derive(Clone)]
pub struct StatementEngine {
    store: Arc<dyn LedgerStore>,
    chart: ChartResolver,
}

impl StatementEngine {
    pub fn new(store: Arc<dyn LedgerStore>, chart: ChartResolver) -> Self {
        StatementEngine { store, chart }
    }

    async fn load_account(&self, account_id: &str) -> LedgerResult<Account> {
        self.store
            .account(account_id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))
    }

    async fn balance_of(&self, account: &Account, before: DateTime<Utc>) -> LedgerResult<Money> {
        let posted = self.store.account_net(&account.id, Bound::Excluded(before)).await?;
        Ok(account.opening_balance() + posted)
    }

    /// Opening, rows with `from <= ts < to` and closing for an account.
    pub async fn statement(
        &self,
        account_id: &str,
        from_utc: DateTime<Utc>,
        to_utc: DateTime<Utc>,
    ) -> LedgerResult<Statement> {
        let account = self.load_account(account_id).await?;
        self.statement_for(&account, from_utc, to_utc).await
    }

    async fn statement_for(
        &self,
        account: &Account,
        from_utc: DateTime<Utc>,
        to_utc: DateTime<Utc>,
    ) -> LedgerResult<Statement> {
        if to_utc < from_utc {
            return Err(ValidationError::InvalidFormat {
                field: "to_utc".to_string(),
                reason: "window ends before it starts".to_string(),
            }
            .into());
        }

        debug!(code = %account.code, %from_utc, %to_utc, "Building statement");

        let opening = self.balance_of(account, from_utc).await?;
        let lines = self.store.account_lines(&account.id, from_utc, to_utc).await?;
        Ok(build_statement(account, from_utc, to_utc, opening, lines))
    }

    /// Balance of everything posted before `as_of`, opening included.
    pub async fn balance(&self, account_id: &str, as_of: DateTime<Utc>) -> LedgerResult<Money> {
        let account = self.load_account(account_id).await?;
        self.balance_of(&account, as_of).await
    }

    /// Totals of every posting account; `None` covers all postings.
    pub async fn trial_balance(&self, as_of: Option<DateTime<Utc>>) -> LedgerResult<TrialBalance> {
        let (until, stamp) = match as_of {
            Some(t) => (Bound::Excluded(t), t),
            None => (Bound::Unbounded, Utc::now()),
        };
        let totals = self.store.account_totals(until).await?;
        let trial = TrialBalance::from_totals(stamp, totals);

        debug!(
            accounts = trial.rows.len(),
            debit = %trial.total_debit,
            credit = %trial.total_credit,
            "Trial balance"
        );
        Ok(trial)
    }

    /// Cash-in-hand book for an outlet (`None` = company cash).
    ///
    /// Voided rows are hidden unless `include_voided`, but always count
    /// toward the running and closing balances.
    pub async fn cash_book(
        &self,
        outlet_id: Option<&str>,
        from_utc: DateTime<Utc>,
        to_utc: DateTime<Utc>,
        include_voided: bool,
    ) -> LedgerResult<CashBook> {
        let account = self.chart.account(&AccountRole::cash_in_hand(outlet_id)).await?;
        let statement = self.statement_for(&account, from_utc, to_utc).await?;
        Ok(CashBook::from_statement(
            outlet_id.map(str::to_string),
            statement,
            include_voided,
        ))
    }

    /// Same as [`cash_book`](Self::cash_book) for the outlet's till account.
    pub async fn till_book(
        &self,
        outlet_id: &str,
        from_utc: DateTime<Utc>,
        to_utc: DateTime<Utc>,
    ) -> LedgerResult<Statement> {
        let account = self
            .chart
            .account(&AccountRole::OutletCashInTill(outlet_id.to_string()))
            .await?;
        self.statement_for(&account, from_utc, to_utc).await
    }

    // =========================================================================
    // Party reads
    // =========================================================================

    /// Snapshot for (party, scope); zero when the party never posted there.
    pub async fn party_balance(&self, party_id: &str, outlet_id: Option<&str>) -> LedgerResult<PartyBalance> {
        let balance = self.store.party_balance(party_id, outlet_id).await?;
        Ok(balance.unwrap_or_else(|| PartyBalance::zero(party_id, outlet_id.map(str::to_string), Utc::now())))
    }

    pub async fn party_entries(&self, party_id: &str, outlet_id: Option<&str>) -> LedgerResult<Vec<PartyLedgerEntry>> {
        self.store.party_entries(party_id, outlet_id).await
    }

    /// Every party with a snapshot in a scope (aging input).
    pub async fn party_balances(&self, outlet_id: Option<&str>) -> LedgerResult<Vec<PartyBalance>> {
        self.store.party_balances(outlet_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tally_core::document::{Voucher, VoucherKind, VoucherLine};
    use tally_core::{LedgerContext, SystemAccount};
    use tally_db::{Database, DbConfig};

    use crate::config::PostingSettings;
    use crate::posting::PostingEngine;

    struct Fixture {
        chart: ChartResolver,
        engine: PostingEngine,
        statements: StatementEngine,
    }

    async fn fixture() -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let store: Arc<dyn LedgerStore> = Arc::new(db.ledger_store());
        let chart = ChartResolver::new(store.clone());
        Fixture {
            engine: PostingEngine::new(store.clone(), chart.clone(), &PostingSettings::default()),
            statements: StatementEngine::new(store, chart.clone()),
            chart,
        }
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, d, 12, 0, 0).unwrap()
    }

    async fn cash_voucher(f: &Fixture, id: &str, at: DateTime<Utc>, cents: i64, memo: &str) -> String {
        let cash = f.chart.ensure_account(&AccountRole::cash_in_hand(Some("OUT1"))).await.unwrap();
        let revenue = f.chart.ensure_account(&SystemAccount::SalesRevenue.into()).await.unwrap();
        let voucher = Voucher {
            id: id.into(),
            outlet_id: Some("OUT1".into()),
            kind: VoucherKind::Receipt,
            memo: Some(memo.into()),
            lines: vec![
                VoucherLine::debit(cash, Money::from_cents(cents)),
                VoucherLine::credit(revenue, Money::from_cents(cents)),
            ],
        };
        f.engine
            .post_voucher(&LedgerContext::new("u1").at(at), &voucher)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_consecutive_windows_chain() {
        let f = fixture().await;
        cash_voucher(&f, "V1", day(1), 1_000, "float").await;
        cash_voucher(&f, "V2", day(3), 2_500, "banked").await;
        cash_voucher(&f, "V3", day(5), 700, "misc").await;

        let cash = f.chart.ensure_account(&AccountRole::cash_in_hand(Some("OUT1"))).await.unwrap();

        let first = f.statements.statement(&cash, day(1), day(4)).await.unwrap();
        let second = f.statements.statement(&cash, day(4), day(6)).await.unwrap();

        assert_eq!(first.opening, Money::zero());
        assert_eq!(first.rows.len(), 2);
        assert_eq!(first.rows[1].running, Money::from_cents(3_500));
        assert_eq!(first.closing, second.opening);
        assert_eq!(second.closing, Money::from_cents(4_200));
        assert_eq!(
            f.statements.balance(&cash, day(6)).await.unwrap(),
            second.closing
        );
    }

    #[tokio::test]
    async fn test_row_at_window_start_is_in_window_not_opening() {
        let f = fixture().await;
        cash_voucher(&f, "V1", day(2), 1_000, "x").await;
        let cash = f.chart.ensure_account(&AccountRole::cash_in_hand(Some("OUT1"))).await.unwrap();

        let statement = f.statements.statement(&cash, day(2), day(3)).await.unwrap();
        assert_eq!(statement.opening, Money::zero());
        assert_eq!(statement.rows.len(), 1);

        let before = f.statements.statement(&cash, day(1), day(2)).await.unwrap();
        assert!(before.rows.is_empty());
    }

    #[tokio::test]
    async fn test_same_instant_rows_keep_insertion_order() {
        let f = fixture().await;
        cash_voucher(&f, "V1", day(2), 100, "a").await;
        cash_voucher(&f, "V2", day(2), 200, "b").await;
        cash_voucher(&f, "V3", day(2), 300, "c").await;
        let cash = f.chart.ensure_account(&AccountRole::cash_in_hand(Some("OUT1"))).await.unwrap();

        let statement = f
            .statements
            .statement(&cash, day(2), day(2) + Duration::seconds(1))
            .await
            .unwrap();
        let refs: Vec<&str> = statement.rows.iter().map(|r| r.ref_id.as_str()).collect();
        assert_eq!(refs, vec!["V1", "V2", "V3"]);
        assert_eq!(statement.closing, Money::from_cents(600));
    }

    #[tokio::test]
    async fn test_cash_book_hides_voided_rows_but_keeps_balances() {
        let f = fixture().await;
        let tx = cash_voucher(&f, "V1", day(1), 1_000, "wrong amount").await;
        cash_voucher(&f, "V2", day(2), 400, "ok").await;
        f.engine
            .reverse(&LedgerContext::new("u1").at(day(3)), &tx, "wrong amount")
            .await
            .unwrap();

        let all = f.statements.cash_book(Some("OUT1"), day(1), day(4), true).await.unwrap();
        assert_eq!(all.statement.rows.len(), 3);
        assert_eq!(all.statement.rows[0].source, "Receipt");
        assert!(all.statement.rows[2].voided);

        let visible = f.statements.cash_book(Some("OUT1"), day(1), day(4), false).await.unwrap();
        assert_eq!(visible.statement.rows.len(), 2);
        assert_eq!(visible.hidden_rows, 1);
        assert_eq!(visible.statement.closing, all.statement.closing);
        assert_eq!(visible.statement.closing, Money::from_cents(400));
    }

    #[tokio::test]
    async fn test_trial_balance_balances() {
        let f = fixture().await;
        cash_voucher(&f, "V1", day(1), 1_000, "x").await;
        cash_voucher(&f, "V2", day(2), 2_000, "y").await;

        let trial = f.statements.trial_balance(None).await.unwrap();
        assert!(trial.is_balanced());
        assert_eq!(trial.total_debit, Money::from_cents(3_000));
        assert_eq!(trial.rows.len(), 2);

        let earlier = f.statements.trial_balance(Some(day(2))).await.unwrap();
        assert_eq!(earlier.total_debit, Money::from_cents(1_000));
    }

    #[tokio::test]
    async fn test_unknown_party_reads_as_zero() {
        let f = fixture().await;
        let balance = f.statements.party_balance("NOBODY", None).await.unwrap();
        assert_eq!(balance.balance, Money::zero());
        assert!(f.statements.party_entries("NOBODY", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_inverted_window_is_rejected() {
        let f = fixture().await;
        let cash = f.chart.ensure_account(&AccountRole::CompanyCash).await.unwrap();
        let err = f.statements.statement(&cash, day(3), day(1)).await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }
}
