//! # Chart-of-Accounts Resolver
//!
//! Get-or-create for every canonical account the ledger posts to.
//!
//! ## Resolution
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ensure_account(OutletCashInTill("OUT1"))                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  header 111 ──► exists?  yes: re-normalize flags if drifted            │
//! │       │                  no : create under root 1 (IsHeader, !posting) │
//! │       ▼                                                                 │
//! │  child 11102-OUT1 ──► exists? yes: return id (no write)                │
//! │                               no : insert under header                 │
//! │                                      │                                  │
//! │                                      ├── Ok        → new id            │
//! │                                      └── Conflict  → lost a race:       │
//! │                                                      re-read, return    │
//! │                                                      the winner's id    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The existence check is an optimization. The unique index on
//! `(code, outlet scope)` decides who wins a concurrent create.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use tally_core::chart::HeaderRule;
use tally_core::validation::validate_outlet_code;
use tally_core::{
    Account, AccountRef, AccountRole, BalancedJournal, JournalDraft, JournalLine, LedgerError,
    LedgerResult, LedgerStore,
};

/// Resolves account roles to account ids, creating accounts on first use.
#[derive(Clone)]
pub struct ChartResolver {
    store: Arc<dyn LedgerStore>,
}

impl ChartResolver {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        ChartResolver { store }
    }

    /// Returns the id of the account for `role`, creating it (and its
    /// cash header) when missing.
    ///
    /// ## Errors
    /// - `AccountNotFound` when a required root header is missing
    /// - `Validation` for a malformed outlet code
    pub async fn ensure_account(&self, role: &AccountRole) -> LedgerResult<String> {
        if let Some(outlet) = role.outlet_id() {
            validate_outlet_code(outlet)?;
        }

        let code = role.code();
        let parent_id = self.ensure_header(role.header()).await?;

        if let Some(existing) = self.store.account_by_code(&code, role.outlet_id()).await? {
            return Ok(existing.id);
        }

        let account = Account::leaf(
            code,
            role.name(),
            role.account_type(),
            Some(parent_id),
            role.outlet_id().map(str::to_string),
            Utc::now(),
        );
        self.get_or_create(account).await
    }

    /// Account id for a draft line reference.
    pub async fn resolve(&self, account: &AccountRef) -> LedgerResult<String> {
        match account {
            AccountRef::Role(role) => self.ensure_account(role).await,
            AccountRef::Id(id) => Ok(id.clone()),
        }
    }

    /// Resolves every line of a draft and seals it.
    pub async fn seal_draft(&self, draft: JournalDraft) -> LedgerResult<BalancedJournal> {
        let mut resolved: HashMap<AccountRole, String> = HashMap::new();
        let mut lines = Vec::with_capacity(draft.lines.len());

        for line in draft.lines {
            let account_id = match &line.account {
                AccountRef::Id(id) => id.clone(),
                AccountRef::Role(role) => match resolved.get(role) {
                    Some(id) => id.clone(),
                    None => {
                        let id = self.ensure_account(role).await?;
                        resolved.insert(role.clone(), id.clone());
                        id
                    }
                },
            };
            lines.push(JournalLine::from_draft(line, account_id));
        }

        BalancedJournal::seal(draft.header, lines)
    }

    /// The account itself, after resolution.
    pub async fn account(&self, role: &AccountRole) -> LedgerResult<Account> {
        let id = self.ensure_account(role).await?;
        self.store
            .account(&id)
            .await?
            .ok_or(LedgerError::AccountNotFound(id))
    }

    async fn ensure_header(&self, rule: HeaderRule) -> LedgerResult<String> {
        match rule {
            HeaderRule::Existing { code } => self
                .store
                .account_by_code(code, None)
                .await?
                .map(|header| header.id)
                .ok_or_else(|| LedgerError::AccountNotFound(code.to_string())),

            HeaderRule::AutoCreate {
                code,
                name,
                account_type,
                parent_code,
            } => {
                if let Some(header) = self.store.account_by_code(code, None).await? {
                    if header.header_flags_drifted() && self.store.normalize_header(&header.id).await? {
                        warn!(code = %code, "Header account flags re-normalized");
                    }
                    return Ok(header.id);
                }

                let parent = self
                    .store
                    .account_by_code(parent_code, None)
                    .await?
                    .ok_or_else(|| LedgerError::AccountNotFound(parent_code.to_string()))?;

                let header = Account::header(code, name, account_type, Some(parent.id), Utc::now());
                self.get_or_create(header).await
            }
        }
    }

    async fn get_or_create(&self, account: Account) -> LedgerResult<String> {
        match self.store.insert_account(&account).await {
            Ok(()) => {
                info!(
                    code = %account.code,
                    outlet_id = ?account.outlet_id,
                    header = account.is_header,
                    "Account created"
                );
                Ok(account.id)
            }
            Err(LedgerError::Conflict(reason)) => {
                warn!(code = %account.code, %reason, "Concurrent account create, re-reading");
                let winner = self
                    .store
                    .account_by_code(&account.code, account.outlet_id.as_deref())
                    .await?
                    .ok_or_else(|| LedgerError::AccountNotFound(account.code.clone()))?;
                debug!(code = %account.code, id = %winner.id, "Using existing account");
                Ok(winner.id)
            }
            Err(e) => Err(e),
        }
    }
}
