// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Custody provider boundary.
//!
//! The provisioning orchestrator talks to the external wallet-custody
//! service exclusively through [`CustodyProvider`]. The production
//! implementation is [`TurnkeyClient`]; tests substitute recording fakes.
//!
//! Every provider failure maps into exactly one [`CustodyError`] kind.
//! Retry decisions are made from [`CustodyError::retryable`], never from
//! provider message strings.

pub mod turnkey;

pub use turnkey::TurnkeyClient;

use async_trait::async_trait;

use crate::chains::Chain;

/// A per-chain account as returned by the custody provider.
///
/// Addresses have already passed the chain's structural validator by the
/// time this type exists; an invalid provider address never gets this far.
#[derive(Debug, Clone)]
pub struct CustodyAccount {
    pub chain: Chain,
    /// On-chain address controlled by the custody provider.
    pub address: String,
    /// Provider-side wallet identifier this account belongs to.
    pub custody_wallet_id: String,
    /// Provider-side account identifier.
    pub custody_account_id: String,
    /// Provider address-format enum value (see [`crate::chains::ChainSpec`]).
    pub address_format: String,
}

/// Organization details returned by the custody provider's query API.
///
/// Only used as a liveness probe by the health aggregator.
#[derive(Debug, Clone)]
pub struct OrganizationInfo {
    pub organization_id: String,
    pub organization_name: Option<String>,
}

/// Closed error taxonomy for the custody provider.
///
/// | Kind | Trigger | Retryable |
/// |------|---------|-----------|
/// | `Client` | provider HTTP 4xx | no |
/// | `Server` | provider HTTP 5xx | yes |
/// | `Network` | connect/timeout/DNS failure | yes |
/// | `Protocol` | malformed 2xx response | no |
/// | `UnsupportedChain` | chain not in the registry | no |
#[derive(Debug, Clone, thiserror::Error)]
pub enum CustodyError {
    #[error("custody provider rejected the request ({status}): {message}")]
    Client { status: u16, message: String },

    #[error("custody provider failed ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("custody provider unreachable: {0}")]
    Network(String),

    #[error("custody response broke the API contract: {0}")]
    Protocol(String),

    #[error("unsupported chain: {0}")]
    UnsupportedChain(String),
}

impl CustodyError {
    /// Whether the orchestrator may retry the operation with backoff.
    pub fn retryable(&self) -> bool {
        matches!(self, CustodyError::Server { .. } | CustodyError::Network(_))
    }

    /// Stable machine-readable code surfaced to callers and audit events.
    pub fn code(&self) -> &'static str {
        match self {
            CustodyError::Client { .. } => "TURNKEY_CLIENT_ERROR",
            CustodyError::Server { .. } => "TURNKEY_SERVER_ERROR",
            CustodyError::Network(_) => "TURNKEY_NETWORK_ERROR",
            CustodyError::Protocol(_) => "TURNKEY_PROTOCOL_ERROR",
            CustodyError::UnsupportedChain(_) => "UNSUPPORTED_CHAIN",
        }
    }
}

/// Outbound port for the wallet-custody service.
#[async_trait]
pub trait CustodyProvider: Send + Sync {
    /// Resolve the custody wallet for a user, creating it if absent.
    ///
    /// Creation carries a deterministic idempotency key derived from the
    /// user id, so a retry or a concurrent duplicate create resolves
    /// provider-side to the same wallet.
    async fn get_or_create_wallet(&self, user_id: &str) -> Result<String, CustodyError>;

    /// Create one account for `chain` under `wallet_id`.
    ///
    /// Carries an idempotency key derived from (user id, chain); a
    /// client-side retry after a timeout cannot create two accounts.
    async fn create_account(
        &self,
        wallet_id: &str,
        chain: Chain,
        user_id: &str,
    ) -> Result<CustodyAccount, CustodyError>;

    /// Lightweight liveness probe. Never called on the provisioning path.
    async fn organization_info(&self) -> Result<OrganizationInfo, CustodyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_server_and_network_errors_are_retryable() {
        assert!(CustodyError::Server {
            status: 500,
            message: "boom".into()
        }
        .retryable());
        assert!(CustodyError::Network("connection refused".into()).retryable());

        assert!(!CustodyError::Client {
            status: 400,
            message: "bad".into()
        }
        .retryable());
        assert!(!CustodyError::Protocol("no wallet id".into()).retryable());
        assert!(!CustodyError::UnsupportedChain("bitcoin".into()).retryable());
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            CustodyError::Server {
                status: 502,
                message: String::new()
            }
            .code(),
            "TURNKEY_SERVER_ERROR"
        );
        assert_eq!(
            CustodyError::UnsupportedChain("bitcoin".into()).code(),
            "UNSUPPORTED_CHAIN"
        );
    }
}
