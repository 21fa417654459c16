// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response structures for the REST API. All types derive
//! `Serialize`/`Deserialize` and `ToSchema` for JSON handling and OpenAPI
//! documentation. The wire format is camelCase.
//!
//! Partial failure is part of the response contract, never an exception:
//! [`ProvisionResponse`] always carries both the succeeded and the failed
//! map, and callers must inspect `failed` explicitly.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::chains::Chain;
use crate::provisioning::{ErrorDetail, ProvisionOutcome};
use crate::storage::{Account, AccountStatus};

/// Request to provision wallet accounts for a user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionRequest {
    /// The verified user to provision for. KYC gating is the caller's
    /// responsibility.
    pub user_id: String,
    /// Chains to provision. Empty or absent means the service's enabled
    /// default set.
    #[serde(default)]
    pub chains: Vec<String>,
}

/// One provisioned account as returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionedAccount {
    /// On-chain address controlled by the custody provider.
    pub address: String,
    /// Provider-side wallet identifier.
    pub custody_wallet_id: String,
    /// Provider-side account identifier.
    pub custody_account_id: String,
    /// Provider address-format enum value.
    pub address_format: String,
}

impl From<&Account> for ProvisionedAccount {
    fn from(account: &Account) -> Self {
        Self {
            address: account.address.clone(),
            custody_wallet_id: account.custody_wallet_id.clone(),
            custody_account_id: account.custody_account_id.clone(),
            address_format: account.address_format.clone(),
        }
    }
}

/// Aggregate provisioning response.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionResponse {
    pub user_id: String,
    /// Custody wallet backing the accounts; absent when every requested
    /// chain was already provisioned before the call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custody_wallet_id: Option<String>,
    /// Per-chain successes (pre-existing and newly created).
    pub succeeded: BTreeMap<Chain, ProvisionedAccount>,
    /// Per-chain failures, keyed by the chain identifier as requested.
    pub failed: BTreeMap<String, ErrorDetail>,
}

impl From<&ProvisionOutcome> for ProvisionResponse {
    fn from(outcome: &ProvisionOutcome) -> Self {
        Self {
            user_id: outcome.user_id.clone(),
            custody_wallet_id: outcome.custody_wallet_id.clone(),
            succeeded: outcome
                .succeeded
                .iter()
                .map(|(chain, account)| (*chain, ProvisionedAccount::from(account)))
                .collect(),
            failed: outcome.failed.clone(),
        }
    }
}

/// One account row in the listing endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub chain: Chain,
    pub address: String,
    pub custody_wallet_id: String,
    pub custody_account_id: String,
    pub address_format: String,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountView {
    fn from(account: Account) -> Self {
        Self {
            chain: account.chain,
            address: account.address,
            custody_wallet_id: account.custody_wallet_id,
            custody_account_id: account.custody_account_id,
            address_format: account.address_format,
            status: account.status,
            created_at: account.created_at,
        }
    }
}

/// Response listing a user's active accounts.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountListResponse {
    pub user_id: String,
    pub accounts: Vec<AccountView>,
    pub total: usize,
}
