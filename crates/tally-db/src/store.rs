//! # SQLite Ledger Store
//!
//! `LedgerStore` implementation over [`Database`].
//!
//! ## Journal Commit
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN IMMEDIATE          write lock held before the first read        │
//! │   1. duplicate guard      (ref_type, ref_id) already posted?           │
//! │   2. account check        every line account exists and is postable    │
//! │   3. ledger_transactions  header row                                   │
//! │   4. ledger_lines         one row per line, seq assigned by SQLite     │
//! │   5. party entries        + balance snapshot upsert per entry          │
//! │   6. re-verify            Σdebit == Σcredit as written                 │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Any error before COMMIT drops the transaction: nothing is persisted.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use std::ops::Bound;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::pool::Database;
use crate::repository::account::AccountRepository;
use crate::repository::journal::JournalRepository;
use crate::repository::party::PartyRepository;
use crate::repository::till::TillSessionRepository;
use tally_core::document::{Sale, StockMovement};
use tally_core::party::{party_entries, PartyBalance, PartyLedgerEntry};
use tally_core::statement::{AccountTotals, PostedLine};
use tally_core::{
    Account, BalancedJournal, CommitOptions, Journal, LedgerError, LedgerResult, LedgerStore,
    LedgerTransaction, Money, RefType, TillSession,
};

/// `LedgerStore` over SQLite; one SQL transaction per write call.
#[derive(Debug, Clone)]
pub struct SqliteLedgerStore {
    db: Database,
}

impl SqliteLedgerStore {
    pub fn new(db: Database) -> Self {
        SqliteLedgerStore { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Writes a journal on an open transaction. The caller commits.
    async fn commit_in(
        conn: &mut SqliteConnection,
        journal: &BalancedJournal,
        options: &CommitOptions,
    ) -> LedgerResult<String> {
        let header = journal.header();

        // a journal can only be reversed once, whatever the options say
        if options.reject_duplicate_ref || header.ref_type == RefType::Reversal {
            if JournalRepository::ref_exists(&mut *conn, header.ref_type, &header.ref_id).await? {
                return Err(LedgerError::DuplicatePosting {
                    ref_type: header.ref_type,
                    ref_id: header.ref_id.clone(),
                });
            }
        }

        for line in journal.lines() {
            let account = AccountRepository::fetch_in(&mut *conn, &line.account_id)
                .await?
                .ok_or_else(|| LedgerError::AccountNotFound(line.account_id.clone()))?;
            if !account.is_postable() {
                return Err(LedgerError::AccountNotPostable { code: account.code });
            }
        }

        let transaction = LedgerTransaction {
            id: Uuid::new_v4().to_string(),
            ts_utc: header.ts_utc,
            outlet_id: header.outlet_id.clone(),
            ref_type: header.ref_type,
            ref_id: header.ref_id.clone(),
            memo: header.memo.clone(),
            created_by: options.created_by.clone(),
            created_at: Utc::now(),
        };
        JournalRepository::insert_transaction(&mut *conn, &transaction).await?;

        for line in journal.lines() {
            JournalRepository::insert_line(&mut *conn, &transaction.id, line).await?;
        }

        for entry in party_entries(journal, &transaction.id) {
            PartyRepository::insert_entry(&mut *conn, &entry).await?;
            PartyRepository::apply_delta(
                &mut *conn,
                &entry.party_id,
                entry.outlet_id.as_deref(),
                entry.delta(),
                transaction.created_at,
            )
            .await?;
        }

        let (debit, credit) = JournalRepository::transaction_sums(&mut *conn, &transaction.id).await?;
        if debit != credit {
            warn!(transaction_id = %transaction.id, %debit, %credit, "Journal unbalanced as written");
            return Err(LedgerError::UnbalancedJournal { debit, credit });
        }

        debug!(
            transaction_id = %transaction.id,
            ref_type = %header.ref_type,
            ref_id = %header.ref_id,
            lines = journal.lines().len(),
            total = %journal.total(),
            "Journal written"
        );

        Ok(transaction.id)
    }
}

fn sql_error(err: sqlx::Error) -> LedgerError {
    crate::error::DbError::from(err).into()
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    async fn account(&self, id: &str) -> LedgerResult<Option<Account>> {
        Ok(self.db.accounts().get_by_id(id).await?)
    }

    async fn account_by_code(&self, code: &str, outlet_id: Option<&str>) -> LedgerResult<Option<Account>> {
        Ok(self.db.accounts().get_by_code(code, outlet_id).await?)
    }

    async fn insert_account(&self, account: &Account) -> LedgerResult<()> {
        Ok(self.db.accounts().insert(account).await?)
    }

    async fn normalize_header(&self, id: &str) -> LedgerResult<bool> {
        Ok(self.db.accounts().normalize_header(id).await?)
    }

    async fn list_accounts(&self) -> LedgerResult<Vec<Account>> {
        Ok(self.db.accounts().list().await?)
    }

    async fn commit_journal(&self, journal: &BalancedJournal, options: &CommitOptions) -> LedgerResult<String> {
        let mut tx = self.db.begin_write().await?;
        let id = Self::commit_in(&mut *tx, journal, options).await?;
        tx.commit().await.map_err(sql_error)?;

        info!(
            transaction_id = %id,
            ref_type = %journal.header().ref_type,
            ref_id = %journal.header().ref_id,
            "Journal committed"
        );
        Ok(id)
    }

    async fn journal(&self, transaction_id: &str) -> LedgerResult<Option<Journal>> {
        Ok(self.db.journals().get(transaction_id).await?)
    }

    async fn journals_for_ref(&self, ref_type: RefType, ref_id: &str) -> LedgerResult<Vec<Journal>> {
        Ok(self.db.journals().for_ref(ref_type, ref_id).await?)
    }

    async fn account_net(&self, account_id: &str, until: Bound<DateTime<Utc>>) -> LedgerResult<Money> {
        Ok(self.db.journals().account_net(account_id, until).await?)
    }

    async fn account_lines(
        &self,
        account_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> LedgerResult<Vec<PostedLine>> {
        Ok(self.db.journals().account_lines(account_id, from, to).await?)
    }

    async fn account_totals(&self, until: Bound<DateTime<Utc>>) -> LedgerResult<Vec<AccountTotals>> {
        Ok(self.db.journals().account_totals(until).await?)
    }

    async fn party_balance(&self, party_id: &str, outlet_id: Option<&str>) -> LedgerResult<Option<PartyBalance>> {
        Ok(self.db.parties().balance(party_id, outlet_id).await?)
    }

    async fn party_entries(&self, party_id: &str, outlet_id: Option<&str>) -> LedgerResult<Vec<PartyLedgerEntry>> {
        Ok(self.db.parties().entries(party_id, outlet_id).await?)
    }

    async fn party_balances(&self, outlet_id: Option<&str>) -> LedgerResult<Vec<PartyBalance>> {
        Ok(self.db.parties().balances(outlet_id).await?)
    }

    async fn open_till_session(&self, outlet_id: &str, counter_id: &str) -> LedgerResult<Option<TillSession>> {
        Ok(self.db.tills().open_for(outlet_id, counter_id).await?)
    }

    async fn insert_till_session(&self, session: &TillSession) -> LedgerResult<()> {
        Ok(self.db.tills().insert(session).await?)
    }

    async fn close_till_session(
        &self,
        closing: &TillSession,
        journal: Option<&BalancedJournal>,
        options: &CommitOptions,
    ) -> LedgerResult<Option<String>> {
        let mut tx = self.db.begin_write().await?;

        // a racing close that already won sees NoOpenTill, not a duplicate journal
        if !TillSessionRepository::is_open_in(&mut *tx, &closing.id).await? {
            return Err(LedgerError::NoOpenTill {
                outlet_id: closing.outlet_id.clone(),
                counter_id: closing.counter_id.clone(),
            });
        }

        let transaction_id = match journal {
            Some(journal) => Some(Self::commit_in(&mut *tx, journal, options).await?),
            None => None,
        };

        let mut closing = closing.clone();
        closing.close_transaction_id = transaction_id.clone();

        if !TillSessionRepository::close_in(&mut *tx, &closing).await? {
            // dropping tx rolls the close journal back
            return Err(LedgerError::NoOpenTill {
                outlet_id: closing.outlet_id,
                counter_id: closing.counter_id,
            });
        }

        tx.commit().await.map_err(sql_error)?;

        info!(
            session_id = %closing.id,
            transaction_id = ?transaction_id,
            "Till session closed"
        );
        Ok(transaction_id)
    }

    async fn till_sessions(&self, outlet_id: &str, counter_id: &str) -> LedgerResult<Vec<TillSession>> {
        Ok(self.db.tills().history(outlet_id, counter_id).await?)
    }

    async fn session_sales(&self, session_id: &str) -> LedgerResult<Vec<Sale>> {
        Ok(self.db.sales().for_session(session_id).await?)
    }

    async fn stock_movements(&self, ref_type: RefType, ref_id: &str) -> LedgerResult<Vec<StockMovement>> {
        Ok(self.db.stock_movements().by_ref(ref_type, ref_id).await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use tally_core::posting::{JournalHeader, JournalLine};
    use tally_core::AccountType;

    struct Fixture {
        store: SqliteLedgerStore,
        cash: Account,
        receivable: Account,
        revenue: Account,
    }

    async fn fixture() -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let store = db.ledger_store();
        let now = Utc::now();

        let cash = Account::leaf("11101-OUT1", "Cash in Hand", AccountType::Asset, None, Some("OUT1".into()), now);
        let receivable = Account::leaf("1130", "Receivables", AccountType::Asset, None, None, now);
        let revenue = Account::leaf("4100", "Sales Revenue", AccountType::Revenue, None, None, now);
        for account in [&cash, &receivable, &revenue] {
            store.insert_account(account).await.unwrap();
        }

        Fixture {
            store,
            cash,
            receivable,
            revenue,
        }
    }

    fn line(account: &Account, debit: i64, credit: i64) -> JournalLine {
        JournalLine {
            account_id: account.id.clone(),
            debit: Money::from_cents(debit),
            credit: Money::from_cents(credit),
            party_id: None,
            memo: None,
        }
    }

    fn header(ref_id: &str) -> JournalHeader {
        JournalHeader::new(Utc::now(), Some("OUT1".into()), RefType::Sale, ref_id, format!("Sale #{}", ref_id))
    }

    #[tokio::test]
    async fn test_commit_writes_header_lines_and_party_entries() {
        let f = fixture().await;
        let mut receivable = line(&f.receivable, 4_000, 0);
        receivable.party_id = Some("CUST1".into());

        let journal = BalancedJournal::seal(
            header("S1"),
            vec![line(&f.cash, 6_000, 0), receivable, line(&f.revenue, 0, 10_000)],
        )
        .unwrap();

        let id = f.store.commit_journal(&journal, &CommitOptions::new("u1")).await.unwrap();

        let stored = f.store.journal(&id).await.unwrap().unwrap();
        assert_eq!(stored.lines.len(), 3);
        assert_eq!(stored.total_debit(), stored.total_credit());
        assert_eq!(stored.transaction.created_by, "u1");
        assert!(stored.lines.windows(2).all(|w| w[0].seq < w[1].seq));

        let balance = f.store.party_balance("CUST1", Some("OUT1")).await.unwrap().unwrap();
        assert_eq!(balance.balance, Money::from_cents(4_000));

        let entries = f.store.party_entries("CUST1", Some("OUT1")).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].transaction_id, id);
        assert_eq!(entries[0].description, "Sale #S1");

        // company scope is a separate key
        assert!(f.store.party_balance("CUST1", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_ref_is_rejected_and_nothing_written() {
        let f = fixture().await;
        let journal =
            BalancedJournal::seal(header("S1"), vec![line(&f.cash, 500, 0), line(&f.revenue, 0, 500)]).unwrap();

        f.store.commit_journal(&journal, &CommitOptions::new("u1")).await.unwrap();
        let err = f
            .store
            .commit_journal(&journal, &CommitOptions::new("u1"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicatePosting { .. }));
        assert_eq!(f.store.journals_for_ref(RefType::Sale, "S1").await.unwrap().len(), 1);

        // explicitly allowed
        f.store
            .commit_journal(&journal, &CommitOptions::new("u1").allow_duplicate_refs())
            .await
            .unwrap();
        assert_eq!(f.store.journals_for_ref(RefType::Sale, "S1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unpostable_account_aborts_whole_commit() {
        let f = fixture().await;
        let assets_root = f.store.account_by_code("1", None).await.unwrap().unwrap();

        let mut party_line = line(&f.receivable, 500, 0);
        party_line.party_id = Some("CUST1".into());
        let journal = BalancedJournal::seal(
            header("S2"),
            vec![party_line, line(&assets_root, 0, 500)],
        )
        .unwrap();

        let err = f
            .store
            .commit_journal(&journal, &CommitOptions::new("u1"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotPostable { ref code } if code == "1"));

        assert_eq!(f.store.database().journals().count().await.unwrap(), 0);
        assert!(f.store.party_balance("CUST1", Some("OUT1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_backdated_journal_keeps_snapshot_stamp_current() {
        let f = fixture().await;
        let receivable_for = |debit| {
            let mut l = line(&f.receivable, debit, 0);
            l.party_id = Some("CUST1".into());
            l
        };

        let today =
            BalancedJournal::seal(header("S1"), vec![receivable_for(1_000), line(&f.revenue, 0, 1_000)]).unwrap();
        f.store.commit_journal(&today, &CommitOptions::new("u1")).await.unwrap();

        let month_ago = Utc::now() - chrono::Duration::days(30);
        let backdated = BalancedJournal::seal(
            JournalHeader::new(month_ago, Some("OUT1".into()), RefType::Sale, "S0", "Sale #S0"),
            vec![receivable_for(400), line(&f.revenue, 0, 400)],
        )
        .unwrap();
        let before_write = Utc::now();
        f.store.commit_journal(&backdated, &CommitOptions::new("u1")).await.unwrap();

        let balance = f.store.party_balance("CUST1", Some("OUT1")).await.unwrap().unwrap();
        assert_eq!(balance.balance, Money::from_cents(1_400));
        assert!(balance.as_of_utc >= before_write, "{} < {}", balance.as_of_utc, before_write);

        // the entry itself keeps its business date
        let entries = f.store.party_entries("CUST1", Some("OUT1")).await.unwrap();
        assert!(entries.iter().any(|e| (e.ts_utc - month_ago).num_seconds() == 0));
    }

    #[tokio::test]
    async fn test_unknown_account_is_reported() {
        let f = fixture().await;
        let mut ghost = line(&f.cash, 0, 100);
        ghost.account_id = "missing".into();
        let journal = BalancedJournal::seal(header("S3"), vec![line(&f.cash, 100, 0), ghost]).unwrap();

        let err = f
            .store
            .commit_journal(&journal, &CommitOptions::new("u1"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound(ref id) if id == "missing"));
    }

    #[tokio::test]
    async fn test_closing_a_closed_session_rolls_back_journal() {
        let f = fixture().await;
        let session = TillSession::open("OUT1", "C1", Money::zero(), "u1", Utc::now());
        f.store.insert_till_session(&session).await.unwrap();

        let mut closing = session.clone();
        closing.close_ts = Some(Utc::now());
        closing.closed_by = Some("u1".into());

        let journal = BalancedJournal::seal(
            JournalHeader::new(Utc::now(), Some("OUT1".into()), RefType::TillClose, &session.id, "Till close OUT1/C1"),
            vec![line(&f.cash, 100, 0), line(&f.revenue, 0, 100)],
        )
        .unwrap();

        let first = f
            .store
            .close_till_session(&closing, Some(&journal), &CommitOptions::new("u1"))
            .await
            .unwrap();
        assert!(first.is_some());

        let err = f
            .store
            .close_till_session(&closing, Some(&journal), &CommitOptions::new("u1").allow_duplicate_refs())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NoOpenTill { .. }));
        assert_eq!(
            f.store.journals_for_ref(RefType::TillClose, &session.id).await.unwrap().len(),
            1
        );

        let history = f.store.till_sessions("OUT1", "C1").await.unwrap();
        assert_eq!(history[0].close_transaction_id, first);
    }

    #[tokio::test]
    async fn test_second_open_session_is_a_conflict() {
        let f = fixture().await;
        let first = TillSession::open("OUT1", "C1", Money::zero(), "u1", Utc::now());
        f.store.insert_till_session(&first).await.unwrap();

        let second = TillSession::open("OUT1", "C1", Money::zero(), "u1", Utc::now());
        let err = f.store.insert_till_session(&second).await.unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
    }
}
