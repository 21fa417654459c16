// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The provisioning orchestrator.
//!
//! ## Control Flow
//!
//! ```text
//! provision(user_id, chains)
//!   ├─ parse + default the chain set (unsupported chains fail inline)
//!   ├─ read existing ACTIVE accounts, partition into already/missing
//!   ├─ resolve the custody wallet (fatal on failure)
//!   ├─ fan out one creation task per missing chain, join with deadline
//!   ├─ persist successes in one idempotent batched upsert
//!   └─ audit per-chain outcomes + summary, return aggregate
//! ```
//!
//! Per-chain state machine within one call:
//! `REQUESTED → WALLET_READY → (ACCOUNT_CREATED | ACCOUNT_FAILED) →
//! (PERSISTED | PERSIST_CONFLICT_RESOLVED)`. Wallet failure short-circuits
//! every chain; nothing else crosses chain boundaries.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{error, info, warn};

use crate::chains::Chain;
use crate::custody::{CustodyAccount, CustodyError, CustodyProvider};
use crate::storage::{Account, AccountStore, AuditEvent, AuditEventType, AuditSink, StoreError};

use super::outcome::{ErrorDetail, ProvisionOutcome};

/// Bounded retry with exponential backoff, applied only to retryable
/// custody errors (server/network). Non-retryable errors fail immediately.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts including the first (minimum 1).
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles each retry.
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    pub const fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            base_backoff: Duration::ZERO,
        }
    }

    fn backoff_after(&self, attempt: u32) -> Duration {
        self.base_backoff.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Operation-level failures. Everything per-chain is reported inline in
/// [`ProvisionOutcome::failed`] instead.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// Empty or entirely unsupported chain set; rejected before any work.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// The custody wallet could not be resolved. Fatal for the whole
    /// call: no wallet, no accounts possible.
    #[error("custody wallet resolution failed: {0}")]
    WalletResolution(#[source] CustodyError),

    /// The store failed after provider-side work succeeded. The user now
    /// has custody accounts not yet durably recorded locally; the caller
    /// should retry persistence, not the whole provisioning flow.
    #[error("account persistence failed: {0}")]
    Persistence(#[source] StoreError),
}

pub struct ProvisioningOrchestrator {
    custody: Arc<dyn CustodyProvider>,
    store: Arc<dyn AccountStore>,
    audit: Arc<dyn AuditSink>,
    /// Default chain set when a request names none.
    enabled_chains: Vec<Chain>,
    retry: RetryPolicy,
    /// Local bound on one provisioning call. In-flight provider requests
    /// are not retracted at expiry; see [`ErrorDetail::timed_out`].
    deadline: Duration,
}

impl ProvisioningOrchestrator {
    pub fn new(
        custody: Arc<dyn CustodyProvider>,
        store: Arc<dyn AccountStore>,
        audit: Arc<dyn AuditSink>,
        enabled_chains: Vec<Chain>,
    ) -> Self {
        Self {
            custody,
            store,
            audit,
            enabled_chains,
            retry: RetryPolicy::default(),
            deadline: Duration::from_secs(30),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Ensure a custody wallet and one account per requested chain exist
    /// for `user_id`, persist them, and report per-chain outcomes.
    ///
    /// Idempotent under caller retries: every call converges to the same
    /// persisted state, never duplicates accounts, and never loses
    /// previously succeeded chains.
    pub async fn provision(
        &self,
        user_id: &str,
        requested: &[String],
    ) -> Result<ProvisionOutcome, ProvisionError> {
        if user_id.trim().is_empty() {
            return Err(ProvisionError::Precondition(
                "user id must not be empty".to_string(),
            ));
        }

        let mut failed: BTreeMap<String, ErrorDetail> = BTreeMap::new();
        let chains = self.resolve_chains(requested, &mut failed)?;

        let existing = self
            .store
            .active_accounts(user_id)
            .await
            .map_err(ProvisionError::Persistence)?;

        let mut succeeded: BTreeMap<Chain, Account> = existing
            .into_iter()
            .filter(|account| chains.contains(&account.chain))
            .map(|account| (account.chain, account))
            .collect();

        let missing: Vec<Chain> = chains
            .iter()
            .copied()
            .filter(|chain| !succeeded.contains_key(chain))
            .collect();

        let mut custody_wallet_id = succeeded
            .values()
            .next()
            .map(|account| account.custody_wallet_id.clone());

        if missing.is_empty() {
            info!(user_id = %user_id, chains = chains.len(), "all requested chains already provisioned");
            for (chain, detail) in &failed {
                let event = AuditEvent::new(AuditEventType::AccountProvisionFailed, user_id)
                    .with_chain(chain.clone())
                    .with_details(json!({ "code": detail.code, "retryable": detail.retryable }))
                    .failed(detail.message.clone());
                self.emit(event).await;
            }
            let outcome = ProvisionOutcome {
                user_id: user_id.to_string(),
                custody_wallet_id,
                succeeded,
                failed,
            };
            self.emit_summary(&outcome).await;
            return Ok(outcome);
        }

        let wallet_id = match self.resolve_wallet(user_id).await {
            Ok(wallet_id) => wallet_id,
            Err(e) => {
                error!(user_id = %user_id, code = e.code(), error = %e, "custody wallet resolution failed");
                let event = AuditEvent::new(AuditEventType::ProvisionSummary, user_id)
                    .failed(e.to_string());
                self.emit(event).await;
                return Err(ProvisionError::WalletResolution(e));
            }
        };
        custody_wallet_id = Some(wallet_id.clone());

        let (created, fan_failures) = self.fan_out(user_id, &wallet_id, &missing).await;
        failed.extend(fan_failures);

        let records: Vec<Account> = created
            .into_iter()
            .map(|account| Account::from_custody(user_id, account))
            .collect();

        let newly_persisted = if records.is_empty() {
            Vec::new()
        } else {
            match self.store.upsert_accounts(user_id, records).await {
                Ok(durable) => durable,
                Err(e) => {
                    error!(user_id = %user_id, error = %e, "failed to persist provisioned accounts");
                    let event = AuditEvent::new(AuditEventType::ProvisionSummary, user_id)
                        .failed(format!("persistence failed: {e}"));
                    self.emit(event).await;
                    return Err(ProvisionError::Persistence(e));
                }
            }
        };

        for account in newly_persisted {
            let event = AuditEvent::new(AuditEventType::AccountProvisioned, user_id)
                .with_chain(account.chain.as_str())
                .with_details(json!({
                    "address": account.address,
                    "custodyWalletId": account.custody_wallet_id,
                    "custodyAccountId": account.custody_account_id,
                }));
            self.emit(event).await;
            succeeded.insert(account.chain, account);
        }

        for (chain, detail) in &failed {
            let event = AuditEvent::new(AuditEventType::AccountProvisionFailed, user_id)
                .with_chain(chain.clone())
                .with_details(json!({ "code": detail.code, "retryable": detail.retryable }))
                .failed(detail.message.clone());
            self.emit(event).await;
        }

        let outcome = ProvisionOutcome {
            user_id: user_id.to_string(),
            custody_wallet_id,
            succeeded,
            failed,
        };

        info!(
            user_id = %user_id,
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            "provisioning complete"
        );
        self.emit_summary(&outcome).await;
        Ok(outcome)
    }

    /// Parse and default the requested chain set. Unsupported identifiers
    /// fail inline without reaching the provider; a set with nothing
    /// provisionable at all is a precondition failure.
    fn resolve_chains(
        &self,
        requested: &[String],
        failed: &mut BTreeMap<String, ErrorDetail>,
    ) -> Result<BTreeSet<Chain>, ProvisionError> {
        if requested.is_empty() {
            if self.enabled_chains.is_empty() {
                return Err(ProvisionError::Precondition(
                    "no chains requested and no enabled default set".to_string(),
                ));
            }
            return Ok(self.enabled_chains.iter().copied().collect());
        }

        let mut chains = BTreeSet::new();
        for raw in requested {
            match Chain::parse(raw) {
                Some(chain) => {
                    chains.insert(chain);
                }
                None => {
                    failed.insert(raw.trim().to_string(), ErrorDetail::unsupported(raw.trim()));
                }
            }
        }

        if chains.is_empty() {
            return Err(ProvisionError::Precondition(format!(
                "no supported chains in request: {requested:?}"
            )));
        }
        Ok(chains)
    }

    async fn resolve_wallet(&self, user_id: &str) -> Result<String, CustodyError> {
        let mut attempt = 0;
        loop {
            match self.custody.get_or_create_wallet(user_id).await {
                Ok(wallet_id) => return Ok(wallet_id),
                Err(e) if e.retryable() && attempt + 1 < self.retry.max_attempts => {
                    warn!(user_id = %user_id, attempt, error = %e, "retrying custody wallet resolution");
                    sleep(self.retry.backoff_after(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One creation task per missing chain, joined under the local
    /// deadline. Each task catches its own error; a chain's failure never
    /// cancels siblings in flight. Every chain lands in exactly one of
    /// the returned collections.
    async fn fan_out(
        &self,
        user_id: &str,
        wallet_id: &str,
        missing: &[Chain],
    ) -> (Vec<CustodyAccount>, BTreeMap<String, ErrorDetail>) {
        let mut set: JoinSet<(Chain, Result<CustodyAccount, CustodyError>)> = JoinSet::new();
        for &chain in missing {
            let custody = Arc::clone(&self.custody);
            let retry = self.retry;
            let wallet_id = wallet_id.to_string();
            let user_id = user_id.to_string();
            set.spawn(async move {
                let result =
                    create_with_retry(custody.as_ref(), retry, &wallet_id, chain, &user_id).await;
                (chain, result)
            });
        }

        let deadline = Instant::now() + self.deadline;
        let mut created = Vec::new();
        let mut failed = BTreeMap::new();
        let mut resolved: BTreeSet<Chain> = BTreeSet::new();
        let mut deadline_hit = false;

        loop {
            match timeout_at(deadline, set.join_next()).await {
                Ok(Some(Ok((chain, Ok(account))))) => {
                    resolved.insert(chain);
                    created.push(account);
                }
                Ok(Some(Ok((chain, Err(e))))) => {
                    warn!(user_id = %user_id, chain = %chain, code = e.code(), error = %e, "account creation failed");
                    resolved.insert(chain);
                    failed.insert(chain.as_str().to_string(), ErrorDetail::from_custody(&e));
                }
                Ok(Some(Err(join_err))) => {
                    // A panicked task loses its chain tag; the sweep
                    // below reports whichever chain never resolved.
                    error!(user_id = %user_id, error = %join_err, "account creation task aborted");
                }
                Ok(None) => break,
                Err(_) => {
                    deadline_hit = true;
                    warn!(user_id = %user_id, "provisioning deadline expired with creations in flight");
                    self.spawn_trailing_persistence(user_id, set);
                    break;
                }
            }
        }

        for &chain in missing {
            if !resolved.contains(&chain) {
                let detail = if deadline_hit {
                    ErrorDetail::timed_out()
                } else {
                    ErrorDetail::aborted()
                };
                failed.entry(chain.as_str().to_string()).or_insert(detail);
            }
        }

        (created, failed)
    }

    /// Requests already sent to the provider are not retractable. Let
    /// them finish server-side and persist whatever arrives so completed
    /// custody work is not lost; the caller has already been answered.
    fn spawn_trailing_persistence(
        &self,
        user_id: &str,
        mut set: JoinSet<(Chain, Result<CustodyAccount, CustodyError>)>,
    ) {
        let store = Arc::clone(&self.store);
        let audit = Arc::clone(&self.audit);
        let user_id = user_id.to_string();

        tokio::spawn(async move {
            while let Some(joined) = set.join_next().await {
                let (chain, result) = match joined {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!(user_id = %user_id, error = %e, "late account creation task aborted");
                        continue;
                    }
                };

                match result {
                    Ok(custody_account) => {
                        let record = Account::from_custody(&user_id, custody_account);
                        match store.upsert_accounts(&user_id, vec![record]).await {
                            Ok(durable) => {
                                info!(user_id = %user_id, chain = %chain, "late account creation persisted after deadline");
                                if let Some(account) = durable.first() {
                                    let event = AuditEvent::new(
                                        AuditEventType::AccountProvisioned,
                                        user_id.as_str(),
                                    )
                                    .with_chain(chain.as_str())
                                    .with_details(json!({
                                        "address": account.address,
                                        "late": true,
                                    }));
                                    if let Err(e) = audit.emit(event).await {
                                        warn!(error = %e, "audit emission failed");
                                    }
                                }
                            }
                            Err(e) => {
                                warn!(user_id = %user_id, chain = %chain, error = %e, "failed to persist late account creation");
                            }
                        }
                    }
                    Err(e) => {
                        warn!(user_id = %user_id, chain = %chain, code = e.code(), error = %e, "late account creation failed");
                    }
                }
            }
        });
    }

    async fn emit_summary(&self, outcome: &ProvisionOutcome) {
        let event = AuditEvent::new(AuditEventType::ProvisionSummary, outcome.user_id.as_str())
            .with_details(json!({
                "succeeded": outcome.succeeded.keys().map(|c| c.as_str()).collect::<Vec<_>>(),
                "failed": outcome.failed.keys().cloned().collect::<Vec<_>>(),
            }));
        let event = if outcome.overall_success() {
            event
        } else {
            event.failed(outcome.aggregated_failure_message())
        };
        self.emit(event).await;
    }

    /// Audit is best-effort relative to the primary operation.
    async fn emit(&self, event: AuditEvent) {
        if let Err(e) = self.audit.emit(event).await {
            warn!(error = %e, "audit emission failed");
        }
    }
}

async fn create_with_retry(
    custody: &dyn CustodyProvider,
    retry: RetryPolicy,
    wallet_id: &str,
    chain: Chain,
    user_id: &str,
) -> Result<CustodyAccount, CustodyError> {
    let mut attempt = 0;
    loop {
        match custody.create_account(wallet_id, chain, user_id).await {
            Ok(account) => return Ok(account),
            Err(e) if e.retryable() && attempt + 1 < retry.max_attempts => {
                warn!(user_id = %user_id, chain = %chain, attempt, error = %e, "retrying account creation");
                sleep(retry.backoff_after(attempt)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
