// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Provisioning outcome types.
//!
//! Partial success is a valid, expected terminal state, not an exception:
//! callers receive the full per-chain picture and must inspect `failed`
//! explicitly.

use std::collections::BTreeMap;

use serde::Serialize;
use utoipa::ToSchema;

use crate::chains::Chain;
use crate::custody::CustodyError;
use crate::storage::Account;

/// Per-chain failure detail, surfaced to callers and audit events.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorDetail {
    /// Stable machine-readable code.
    pub code: String,
    /// Human-readable description.
    pub message: String,
    /// Whether a later retry of this chain can be expected to succeed.
    pub retryable: bool,
}

impl ErrorDetail {
    pub fn from_custody(err: &CustodyError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            retryable: err.retryable(),
        }
    }

    pub fn unsupported(raw: &str) -> Self {
        Self::from_custody(&CustodyError::UnsupportedChain(raw.to_string()))
    }

    /// The chain's creation was still in flight when the local deadline
    /// expired. The provider-side request is not retracted; a trailing
    /// task persists its result if it eventually succeeds.
    pub fn timed_out() -> Self {
        Self {
            code: "PROVISION_TIMEOUT".to_string(),
            message: "account creation did not complete before the provisioning deadline; \
                      it may still finish and be persisted"
                .to_string(),
            retryable: true,
        }
    }

    /// The creation task died without reporting a result.
    pub fn aborted() -> Self {
        Self {
            code: "PROVISION_ABORTED".to_string(),
            message: "account creation task aborted before completing".to_string(),
            retryable: true,
        }
    }
}

/// Aggregate result of one provisioning call.
///
/// `succeeded` is the union of pre-existing accounts and newly created
/// ones; `failed` is keyed by the chain identifier as requested (so
/// unsupported identifiers appear under their raw name). Every requested
/// chain lands in exactly one of the two maps.
#[derive(Debug, Clone)]
pub struct ProvisionOutcome {
    pub user_id: String,
    /// Custody wallet backing the accounts. Absent only when every
    /// requested chain was already provisioned before the call.
    pub custody_wallet_id: Option<String>,
    pub succeeded: BTreeMap<Chain, Account>,
    pub failed: BTreeMap<String, ErrorDetail>,
}

impl ProvisionOutcome {
    /// "N of M chains provisioned" is a success; the call is only an
    /// overall failure when nothing succeeded and something failed.
    pub fn overall_success(&self) -> bool {
        !self.succeeded.is_empty() || self.failed.is_empty()
    }

    /// Aggregated message for the overall-failure case.
    pub fn aggregated_failure_message(&self) -> String {
        let parts: Vec<String> = self
            .failed
            .iter()
            .map(|(chain, detail)| format!("{chain}: {}", detail.code))
            .collect();
        format!("all requested chains failed ({})", parts.join(", "))
    }
}
