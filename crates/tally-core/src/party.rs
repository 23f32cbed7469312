//! # Party Ledger
//!
//! Customer and supplier sub-ledgers derived from journal lines.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BalancedJournal line with party_id and a nonzero amount               │
//! │       │                                                                 │
//! │       ▼ party_entries()                                                 │
//! │  PartyLedgerEntry (1:1 with the line, doc type from RefType)           │
//! │       │                                                                 │
//! │       ▼ same SQL transaction as the journal                            │
//! │  PartyBalance[(party, scope)] += debit − credit                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A balance is never written on its own; it only moves together with the
//! entry that explains the movement. [`replay`] recomputes a balance from
//! entries and must always agree with the incrementally maintained row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::kind::DocType;
use crate::money::Money;
use crate::posting::BalancedJournal;

/// Storage key of the company-wide scope.
pub const COMPANY_SCOPE_KEY: &str = "";

/// Storage key for a scope (`None` = company).
pub fn scope_key(outlet_id: Option<&str>) -> &str {
    outlet_id.unwrap_or(COMPANY_SCOPE_KEY)
}

// =============================================================================
// Entry
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PartyLedgerEntry {
    pub id: String,
    pub transaction_id: String,
    pub party_id: String,
    pub outlet_id: Option<String>,
    #[ts(as = "String")]
    pub ts_utc: DateTime<Utc>,
    pub doc_type: DocType,
    pub doc_id: String,
    pub debit: Money,
    pub credit: Money,
    pub description: String,
}

impl PartyLedgerEntry {
    pub fn delta(&self) -> Money {
        self.debit - self.credit
    }
}

/// Party entries for every party-tagged, nonzero line of a journal.
///
/// The entry scope is the journal's outlet.
pub fn party_entries(journal: &BalancedJournal, transaction_id: &str) -> Vec<PartyLedgerEntry> {
    let header = journal.header();
    journal
        .lines()
        .iter()
        .filter(|line| !line.is_zero())
        .filter_map(|line| {
            let party_id = line.party_id.as_ref()?;
            Some(PartyLedgerEntry {
                id: Uuid::new_v4().to_string(),
                transaction_id: transaction_id.to_string(),
                party_id: party_id.clone(),
                outlet_id: header.outlet_id.clone(),
                ts_utc: header.ts_utc,
                doc_type: header.ref_type.doc_type(),
                doc_id: header.ref_id.clone(),
                debit: line.debit,
                credit: line.credit,
                description: line.memo.clone().unwrap_or_else(|| header.memo.clone()),
            })
        })
        .collect()
}

// =============================================================================
// Balance
// =============================================================================

/// Running balance snapshot for one (party, scope), debit-positive.
///
/// For a customer a positive balance is money owed to the business; for a
/// supplier a negative balance is money the business owes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PartyBalance {
    pub party_id: String,
    pub outlet_id: Option<String>,
    pub balance: Money,
    #[ts(as = "String")]
    pub as_of_utc: DateTime<Utc>,
}

impl PartyBalance {
    pub fn zero(party_id: impl Into<String>, outlet_id: Option<String>, at: DateTime<Utc>) -> Self {
        PartyBalance {
            party_id: party_id.into(),
            outlet_id,
            balance: Money::zero(),
            as_of_utc: at,
        }
    }

    pub fn apply(&mut self, delta: Money, at: DateTime<Utc>) {
        self.balance += delta;
        self.as_of_utc = at;
    }
}

/// Balance recomputed from scratch.
pub fn replay<'a>(entries: impl IntoIterator<Item = &'a PartyLedgerEntry>) -> Money {
    entries.into_iter().map(PartyLedgerEntry::delta).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::RefType;
    use crate::posting::{JournalHeader, JournalLine};
    use proptest::prelude::*;

    fn line(account: &str, debit: i64, credit: i64, party: Option<&str>) -> JournalLine {
        JournalLine {
            account_id: account.into(),
            debit: Money::from_cents(debit),
            credit: Money::from_cents(credit),
            party_id: party.map(str::to_string),
            memo: None,
        }
    }

    fn journal(ref_type: RefType, lines: Vec<JournalLine>) -> BalancedJournal {
        let header = JournalHeader::new(Utc::now(), Some("OUT1".into()), ref_type, "D1", "Sale #D1");
        BalancedJournal::seal(header, lines).unwrap()
    }

    #[test]
    fn test_entries_only_for_party_lines() {
        let j = journal(
            RefType::Sale,
            vec![
                line("till", 6000, 0, None),
                line("ar", 5000, 0, Some("CUST1")),
                line("rev", 0, 11000, None),
            ],
        );
        let entries = party_entries(&j, "TX1");
        assert_eq!(entries.len(), 1);
        let e = &entries[0];
        assert_eq!(e.party_id, "CUST1");
        assert_eq!(e.doc_type, DocType::Sale);
        assert_eq!(e.doc_id, "D1");
        assert_eq!(e.outlet_id.as_deref(), Some("OUT1"));
        assert_eq!(e.delta().cents(), 5000);
        assert_eq!(e.description, "Sale #D1");
    }

    #[test]
    fn test_doc_type_follows_ref_type() {
        let j = journal(
            RefType::Amend,
            vec![line("ar", 0, 100, Some("CUST1")), line("rev", 100, 0, None)],
        );
        assert_eq!(party_entries(&j, "TX").remove(0).doc_type, DocType::SaleReturn);
    }

    #[test]
    fn test_scope_key() {
        assert_eq!(scope_key(None), COMPANY_SCOPE_KEY);
        assert_eq!(scope_key(Some("OUT1")), "OUT1");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_incremental_balance_matches_replay(
            deltas in prop::collection::vec(-1_000_000i64..1_000_000, 1..40),
        ) {
            let now = Utc::now();
            let mut snapshot = PartyBalance::zero("P1", None, now);
            let mut entries = Vec::new();
            for (i, d) in deltas.into_iter().enumerate() {
                let party_line = if d >= 0 {
                    line("ar", d, 0, Some("P1"))
                } else {
                    line("ar", 0, -d, Some("P1"))
                };
                let offset = line("rev", party_line.credit.cents(), party_line.debit.cents(), None);
                let header = JournalHeader::new(now, None, RefType::Receipt, format!("R{}", i), "");
                let Ok(j) = BalancedJournal::seal(header, vec![party_line, offset]) else {
                    continue;
                };
                for e in party_entries(&j, &format!("TX{}", i)) {
                    snapshot.apply(e.delta(), now);
                    entries.push(e);
                }
            }
            prop_assert_eq!(snapshot.balance, replay(&entries));
        }
    }
}
