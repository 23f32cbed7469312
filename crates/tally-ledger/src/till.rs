//! # Till Session Manager
//!
//! Cash-drawer shifts per (outlet, counter).
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Closed ──── open(ctx, outlet, counter) ────► Open(session_id, ts)    │
//! │     ▲                                              │                    │
//! │     │                                              │ close(declared)    │
//! │     │                                              ▼                    │
//! │     └──────────── session row terminal ◄──── close_ts + Z-report       │
//! │                                                                         │
//! │  open while Open   → DuplicateTillOpen (existing session untouched)    │
//! │  close while Closed → NoOpenTill                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The pre-check in `open` only gives a fast answer. The partial unique
//! index on open sessions decides between two concurrent opens.

use std::sync::Arc;
use tracing::{debug, info, warn};

use tally_core::till::{
    till_close_journal, CloseFigures, ClosePreview, TillStatus, TillTotals, ZReport,
};
use tally_core::validation::{validate_counter_id, validate_non_negative, validate_outlet_code};
use tally_core::{
    CommitOptions, LedgerContext, LedgerError, LedgerResult, LedgerStore, Money, TillSession,
};

use crate::chart::ChartResolver;
use crate::config::TillSettings;

#[derive(Clone)]
pub struct TillManager {
    store: Arc<dyn LedgerStore>,
    chart: ChartResolver,
    default_float: Money,
}

impl TillManager {
    pub fn new(store: Arc<dyn LedgerStore>, chart: ChartResolver, settings: &TillSettings) -> Self {
        TillManager {
            store,
            chart,
            default_float: settings.default_opening_float(),
        }
    }

    /// Opens a session with the configured default float.
    pub async fn open(&self, ctx: &LedgerContext, outlet_id: &str, counter_id: &str) -> LedgerResult<TillSession> {
        self.open_with_float(ctx, outlet_id, counter_id, self.default_float).await
    }

    /// Opens a session for the counter.
    ///
    /// ## Errors
    /// - `DuplicateTillOpen` with the id of the session already open
    /// - `Validation` for malformed codes or a negative float
    pub async fn open_with_float(
        &self,
        ctx: &LedgerContext,
        outlet_id: &str,
        counter_id: &str,
        opening_float: Money,
    ) -> LedgerResult<TillSession> {
        validate_outlet_code(outlet_id)?;
        validate_counter_id(counter_id)?;
        validate_non_negative("opening_float", opening_float)?;

        if let Some(existing) = self.store.open_till_session(outlet_id, counter_id).await? {
            return Err(duplicate_open(&existing));
        }

        let session = TillSession::open(outlet_id, counter_id, opening_float, ctx.user_id.clone(), ctx.now());
        match self.store.insert_till_session(&session).await {
            Ok(()) => {
                info!(
                    session_id = %session.id,
                    outlet_id = %outlet_id,
                    counter_id = %counter_id,
                    opening_float = %opening_float,
                    user = %ctx.user_id,
                    "Till opened"
                );
                Ok(session)
            }
            Err(LedgerError::Conflict(reason)) => {
                warn!(outlet_id = %outlet_id, counter_id = %counter_id, %reason, "Concurrent till open");
                match self.store.open_till_session(outlet_id, counter_id).await? {
                    Some(winner) => Err(duplicate_open(&winner)),
                    None => Err(LedgerError::Conflict(reason)),
                }
            }
            Err(e) => Err(e),
        }
    }

    pub async fn status(&self, outlet_id: &str, counter_id: &str) -> LedgerResult<TillStatus> {
        let status = match self.store.open_till_session(outlet_id, counter_id).await? {
            Some(session) => TillStatus::Open {
                session_id: session.id,
                open_ts: session.open_ts,
            },
            None => TillStatus::Closed,
        };
        Ok(status)
    }

    /// Totals and expected cash for the open session, before declaring.
    pub async fn preview_close(&self, outlet_id: &str, counter_id: &str) -> LedgerResult<ClosePreview> {
        let session = self.require_open(outlet_id, counter_id).await?;
        let totals = self.totals(&session).await?;
        Ok(ClosePreview {
            expected_cash: totals.expected_cash(session.opening_float),
            session,
            totals,
        })
    }

    /// Closes the open session and posts the cash movement.
    ///
    /// `declared = None` accepts the expected cash. The session write and
    /// the close journal commit together.
    ///
    /// ## Errors
    /// - `NoOpenTill` when nothing is open (or another close won)
    /// - `InvalidDeclaredAmount` for a negative declaration
    pub async fn close(
        &self,
        ctx: &LedgerContext,
        outlet_id: &str,
        counter_id: &str,
        declared: Option<Money>,
    ) -> LedgerResult<ZReport> {
        let session = self.require_open(outlet_id, counter_id).await?;
        let totals = self.totals(&session).await?;
        let figures = CloseFigures::compute(session.opening_float, &totals, declared)?;

        let closed_at = ctx.now();
        let draft = till_close_journal(&session, &figures, closed_at);
        let journal = if draft.lines.is_empty() {
            debug!(session_id = %session.id, "Nothing to move at close");
            None
        } else {
            Some(self.chart.seal_draft(draft).await?)
        };

        let closing = TillSession {
            close_ts: Some(closed_at),
            declared_cash: Some(figures.declared_cash),
            over_short: Some(figures.over_short),
            closed_by: Some(ctx.user_id.clone()),
            ..session.clone()
        };

        let options = CommitOptions::new(ctx.user_id.clone());
        let transaction_id = self
            .store
            .close_till_session(&closing, journal.as_ref(), &options)
            .await?;

        if !figures.over_short.is_zero() {
            warn!(
                session_id = %session.id,
                over_short = %figures.over_short,
                "Till closed with a cash difference"
            );
        }
        info!(
            session_id = %session.id,
            expected = %figures.expected_cash,
            declared = %figures.declared_cash,
            user = %ctx.user_id,
            "Till closed"
        );

        Ok(ZReport::new(
            &session,
            closed_at,
            &ctx.user_id,
            &totals,
            &figures,
            transaction_id,
        ))
    }

    // =========================================================================
    // The context's own till
    // =========================================================================

    /// `open` at the outlet and counter carried by `ctx`.
    pub async fn open_here(&self, ctx: &LedgerContext) -> LedgerResult<TillSession> {
        let (outlet_id, counter_id) = ctx.till_location()?;
        self.open(ctx, outlet_id, counter_id).await
    }

    pub async fn status_here(&self, ctx: &LedgerContext) -> LedgerResult<TillStatus> {
        let (outlet_id, counter_id) = ctx.till_location()?;
        self.status(outlet_id, counter_id).await
    }

    pub async fn preview_close_here(&self, ctx: &LedgerContext) -> LedgerResult<ClosePreview> {
        let (outlet_id, counter_id) = ctx.till_location()?;
        self.preview_close(outlet_id, counter_id).await
    }

    pub async fn close_here(&self, ctx: &LedgerContext, declared: Option<Money>) -> LedgerResult<ZReport> {
        let (outlet_id, counter_id) = ctx.till_location()?;
        self.close(ctx, outlet_id, counter_id, declared).await
    }

    /// Session history for a counter, newest first.
    pub async fn sessions(&self, outlet_id: &str, counter_id: &str) -> LedgerResult<Vec<TillSession>> {
        self.store.till_sessions(outlet_id, counter_id).await
    }

    async fn require_open(&self, outlet_id: &str, counter_id: &str) -> LedgerResult<TillSession> {
        self.store
            .open_till_session(outlet_id, counter_id)
            .await?
            .ok_or_else(|| LedgerError::NoOpenTill {
                outlet_id: outlet_id.to_string(),
                counter_id: counter_id.to_string(),
            })
    }

    async fn totals(&self, session: &TillSession) -> LedgerResult<TillTotals> {
        let sales = self.store.session_sales(&session.id).await?;
        Ok(TillTotals::from_sales(&sales))
    }
}

fn duplicate_open(existing: &TillSession) -> LedgerError {
    LedgerError::DuplicateTillOpen {
        outlet_id: existing.outlet_id.clone(),
        counter_id: existing.counter_id.clone(),
        session_id: existing.id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::ops::Bound;
    use tally_core::document::{Sale, SaleStatus};
    use tally_core::{AccountRole, SystemAccount, ValidationError};
    use tally_db::{Database, DbConfig};

    use crate::config::PostingSettings;
    use crate::posting::PostingEngine;

    struct Fixture {
        db: Database,
        store: Arc<dyn LedgerStore>,
        chart: ChartResolver,
        engine: PostingEngine,
        tills: TillManager,
    }

    async fn fixture() -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let store: Arc<dyn LedgerStore> = Arc::new(db.ledger_store());
        let chart = ChartResolver::new(store.clone());
        Fixture {
            engine: PostingEngine::new(store.clone(), chart.clone(), &PostingSettings::default()),
            tills: TillManager::new(store.clone(), chart.clone(), &TillSettings::default()),
            db,
            store,
            chart,
        }
    }

    fn ctx() -> LedgerContext {
        LedgerContext::new("cashier1").with_outlet("OUT1").with_counter("C1")
    }

    fn linked_sale(id: &str, session: &TillSession, total: i64, cash: i64, is_return: bool) -> Sale {
        Sale {
            id: id.into(),
            outlet_id: session.outlet_id.clone(),
            counter_id: session.counter_id.clone(),
            customer_id: None,
            total: Money::from_cents(total),
            tax_total: Money::zero(),
            cash_amount: Money::from_cents(cash),
            card_amount: Money::zero(),
            is_return,
            status: SaleStatus::Final,
            voided_at: None,
            revised_to_sale_id: None,
            till_session_id: Some(session.id.clone()),
            created_at: Utc::now(),
        }
    }

    async fn record(f: &Fixture, sale: &Sale) {
        f.db.sales().insert(sale).await.unwrap();
        if sale.is_return {
            f.engine.post_sale_return(&ctx(), sale).await.unwrap();
        } else {
            f.engine.post_sale(&ctx(), sale).await.unwrap();
        }
    }

    async fn net_of(f: &Fixture, role: AccountRole) -> Money {
        let id = f.chart.ensure_account(&role).await.unwrap();
        f.store.account_net(&id, Bound::Unbounded).await.unwrap()
    }

    #[tokio::test]
    async fn test_open_then_status() {
        let f = fixture().await;
        assert_eq!(f.tills.status("OUT1", "C1").await.unwrap(), TillStatus::Closed);

        let session = f.tills.open(&ctx(), "OUT1", "C1").await.unwrap();
        assert_eq!(session.opening_float, Money::zero());

        match f.tills.status("OUT1", "C1").await.unwrap() {
            TillStatus::Open { session_id, .. } => assert_eq!(session_id, session.id),
            TillStatus::Closed => panic!("expected an open till"),
        }
        assert!(!f.tills.status("OUT1", "C2").await.unwrap().is_open());
    }

    #[tokio::test]
    async fn test_second_open_is_rejected_and_keeps_first() {
        let f = fixture().await;
        let first = f.tills.open(&ctx(), "OUT1", "C1").await.unwrap();

        let err = f.tills.open(&ctx(), "OUT1", "C1").await.unwrap_err();
        match err {
            LedgerError::DuplicateTillOpen { session_id, .. } => assert_eq!(session_id, first.id),
            other => panic!("unexpected error: {other}"),
        }

        let history = f.tills.sessions("OUT1", "C1").await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].is_open());
    }

    #[tokio::test]
    async fn test_close_scenario_with_shortage() {
        let f = fixture().await;
        let session = f
            .tills
            .open_with_float(&ctx(), "OUT1", "C1", Money::from_cents(10_000))
            .await
            .unwrap();

        record(&f, &linked_sale("S1", &session, 30_000, 30_000, false)).await;
        record(&f, &linked_sale("S2", &session, 20_000, 20_000, false)).await;
        record(&f, &linked_sale("R1", &session, -5_000, -5_000, true)).await;

        let preview = f.tills.preview_close("OUT1", "C1").await.unwrap();
        assert_eq!(preview.totals.sales_cash, Money::from_cents(50_000));
        assert_eq!(preview.totals.refunds_cash_abs, Money::from_cents(5_000));
        assert_eq!(preview.expected_cash, Money::from_cents(55_000));

        let report = f
            .tills
            .close(&ctx(), "OUT1", "C1", Some(Money::from_cents(54_000)))
            .await
            .unwrap();

        assert_eq!(report.expected_cash, Money::from_cents(55_000));
        assert_eq!(report.declared_cash, Money::from_cents(54_000));
        assert_eq!(report.over_short, Money::from_cents(-1_000));
        assert_eq!(report.sale_count, 2);
        assert_eq!(report.return_count, 1);
        assert_eq!(report.net_total, Money::from_cents(45_000));
        assert!(report.transaction_id.is_some());

        // the float never left the drawer
        assert_eq!(net_of(&f, AccountRole::OutletCashInHand("OUT1".into())).await, Money::from_cents(44_000));
        assert_eq!(net_of(&f, SystemAccount::CashOverShort.into()).await, Money::from_cents(1_000));
        assert_eq!(net_of(&f, AccountRole::OutletCashInTill("OUT1".into())).await, Money::zero());

        let closed = f.db.tills().get(&session.id).await.unwrap().unwrap();
        assert_eq!(closed.close_ts, Some(report.closed_at));
        assert_eq!(closed.over_short, Some(Money::from_cents(-1_000)));
        assert_eq!(closed.close_transaction_id, report.transaction_id);
        assert!(!f.tills.status("OUT1", "C1").await.unwrap().is_open());
    }

    #[tokio::test]
    async fn test_close_without_declaration_accepts_expected() {
        let f = fixture().await;
        let session = f.tills.open(&ctx(), "OUT1", "C1").await.unwrap();
        record(&f, &linked_sale("S1", &session, 12_500, 12_500, false)).await;

        let report = f.tills.close(&ctx(), "OUT1", "C1", None).await.unwrap();
        assert_eq!(report.declared_cash, Money::from_cents(12_500));
        assert!(report.over_short.is_zero());
    }

    #[tokio::test]
    async fn test_empty_shift_posts_nothing() {
        let f = fixture().await;
        f.tills.open(&ctx(), "OUT1", "C1").await.unwrap();

        let report = f.tills.close(&ctx(), "OUT1", "C1", None).await.unwrap();
        assert_eq!(report.transaction_id, None);
        assert_eq!(report.sale_count, 0);
    }

    #[tokio::test]
    async fn test_close_without_open_session() {
        let f = fixture().await;
        let err = f.tills.close(&ctx(), "OUT1", "C1", None).await.unwrap_err();
        assert!(matches!(err, LedgerError::NoOpenTill { .. }));
    }

    #[tokio::test]
    async fn test_negative_declaration_leaves_session_open() {
        let f = fixture().await;
        f.tills.open(&ctx(), "OUT1", "C1").await.unwrap();

        let err = f
            .tills
            .close(&ctx(), "OUT1", "C1", Some(Money::from_cents(-1)))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidDeclaredAmount { .. }));
        assert!(f.tills.status("OUT1", "C1").await.unwrap().is_open());
    }

    #[tokio::test]
    async fn test_reopen_after_close() {
        let f = fixture().await;
        f.tills.open(&ctx(), "OUT1", "C1").await.unwrap();
        f.tills.close(&ctx(), "OUT1", "C1", None).await.unwrap();
        f.tills.open(&ctx(), "OUT1", "C1").await.unwrap();

        let history = f.tills.sessions("OUT1", "C1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.iter().filter(|s| s.is_open()).count(), 1);
    }

    #[tokio::test]
    async fn test_context_till_round_trip() {
        let f = fixture().await;
        let here = ctx();

        let session = f.tills.open_here(&here).await.unwrap();
        assert_eq!((session.outlet_id.as_str(), session.counter_id.as_str()), ("OUT1", "C1"));
        assert!(matches!(f.tills.status_here(&here).await.unwrap(), TillStatus::Open { .. }));

        record(&f, &linked_sale("S1", &session, 1_500, 1_500, false)).await;
        let preview = f.tills.preview_close_here(&here).await.unwrap();
        assert_eq!(preview.expected_cash, Money::from_cents(1_500));

        let report = f.tills.close_here(&here, None).await.unwrap();
        assert_eq!(report.session_id, session.id);
        assert_eq!(f.tills.status("OUT1", "C1").await.unwrap(), TillStatus::Closed);
    }

    #[tokio::test]
    async fn test_context_without_counter_is_rejected() {
        let f = fixture().await;
        let err = f
            .tills
            .open_here(&LedgerContext::new("u1").with_outlet("OUT1"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(ValidationError::Required { ref field }) if field == "counter_id"));
        assert!(f.tills.sessions("OUT1", "C1").await.unwrap().is_empty());
    }
}
