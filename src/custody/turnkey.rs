// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Turnkey custody API integration.
//!
//! Turnkey holds all key material and performs wallet/account creation on
//! behalf of users; private keys never reach this service. Requests are
//! authenticated with an API key and carry a deterministic
//! `Idempotency-Key` header so provider-side retries of the same logical
//! operation cannot create duplicates.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;

use super::{CustodyAccount, CustodyError, CustodyProvider, OrganizationInfo};
use crate::chains::Chain;

const DEFAULT_BASE_URL: &str = "https://api.turnkey.com";

/// Deterministic wallet name per user. The provider treats the wallet
/// idempotency key, not the name, as the dedup handle; the name exists for
/// operator-facing dashboards.
const WALLET_NAME_PREFIX: &str = "rw-wallet-";

const CREATE_WALLET_PATH: &str = "/public/v1/submit/create_wallet";
const CREATE_ACCOUNTS_PATH: &str = "/public/v1/submit/create_wallet_accounts";
const GET_ORGANIZATION_PATH: &str = "/public/v1/query/get_organization";

#[derive(Debug, Clone)]
pub struct TurnkeyClient {
    base_url: String,
    api_key: String,
    organization_id: String,
    http: Client,
}

impl TurnkeyClient {
    pub fn is_configured() -> bool {
        required_env_present("TURNKEY_API_KEY") && required_env_present("TURNKEY_ORGANIZATION_ID")
    }

    pub fn from_env() -> Result<Self, CustodyError> {
        let base_url = env_or_default("TURNKEY_BASE_URL", DEFAULT_BASE_URL);
        let api_key = env_required("TURNKEY_API_KEY")?;
        let organization_id = env_required("TURNKEY_ORGANIZATION_ID")?;

        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| CustodyError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            api_key,
            organization_id,
            http,
        })
    }

    async fn post_json(
        &self,
        path: &str,
        payload: &Value,
        idempotency_key: Option<&str>,
    ) -> Result<Value, CustodyError> {
        let (status, body) = self.post_raw(path, payload, idempotency_key).await?;

        if !(200..300).contains(&status) {
            return Err(classify_status(status, &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| CustodyError::Protocol(format!("POST {path} returned invalid JSON: {e}")))
    }

    /// Send a request and return (status, body) without classifying the
    /// status. `get_or_create_wallet` needs the raw pair to recover the
    /// wallet id from duplicate-creation responses.
    async fn post_raw(
        &self,
        path: &str,
        payload: &Value,
        idempotency_key: Option<&str>,
    ) -> Result<(u16, String), CustodyError> {
        let mut request = self
            .http
            .post(format!("{}{}", self.base_url.trim_end_matches('/'), path))
            .header("X-API-Key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(payload);

        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_transport(path, &e))?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok((status, body))
    }
}

#[async_trait]
impl CustodyProvider for TurnkeyClient {
    async fn get_or_create_wallet(&self, user_id: &str) -> Result<String, CustodyError> {
        let payload = json!({
            "organizationId": self.organization_id,
            "walletName": wallet_name(user_id),
            "accounts": []
        });

        let key = wallet_idempotency_key(user_id);
        let (status, body) = self
            .post_raw(CREATE_WALLET_PATH, &payload, Some(&key))
            .await?;

        if (200..300).contains(&status) {
            let value: Value = serde_json::from_str(&body).map_err(|e| {
                CustodyError::Protocol(format!("create_wallet returned invalid JSON: {e}"))
            })?;
            return parse_wallet_id(&value);
        }

        // A concurrent caller may have raced us to create the same wallet.
        // The provider is the source of truth: a duplicate response that
        // still carries the wallet id is the already-exists case.
        if status == 409 {
            if let Ok(value) = serde_json::from_str::<Value>(&body) {
                if let Ok(wallet_id) = parse_wallet_id(&value) {
                    info!(user_id = %user_id, wallet_id = %wallet_id, "custody wallet already exists");
                    return Ok(wallet_id);
                }
            }
        }

        Err(classify_status(status, &body))
    }

    async fn create_account(
        &self,
        wallet_id: &str,
        chain: Chain,
        user_id: &str,
    ) -> Result<CustodyAccount, CustodyError> {
        let spec = chain.spec();
        let payload = json!({
            "organizationId": self.organization_id,
            "walletId": wallet_id,
            "accounts": [{
                "curve": spec.curve,
                "pathFormat": "PATH_FORMAT_BIP32",
                "path": spec.derivation_path,
                "addressFormat": spec.address_format
            }]
        });

        let key = account_idempotency_key(user_id, chain);
        let value = self
            .post_json(CREATE_ACCOUNTS_PATH, &payload, Some(&key))
            .await?;

        parse_account(&value, chain, wallet_id).inspect_err(|e| {
            // A contract break from the provider, not a transient fault.
            error!(chain = %chain, wallet_id = %wallet_id, error = %e, "custody account response rejected");
        })
    }

    async fn organization_info(&self) -> Result<OrganizationInfo, CustodyError> {
        let payload = json!({ "organizationId": self.organization_id });
        let value = self.post_json(GET_ORGANIZATION_PATH, &payload, None).await?;
        parse_organization(&value)
    }
}

/// Deterministic wallet name for a user.
pub fn wallet_name(user_id: &str) -> String {
    format!("{WALLET_NAME_PREFIX}{user_id}")
}

/// Idempotency key for the wallet create-if-absent step, stable per user.
pub fn wallet_idempotency_key(user_id: &str) -> String {
    Uuid::new_v5(
        &Uuid::NAMESPACE_URL,
        format!("relational-provisioner/wallet/{user_id}").as_bytes(),
    )
    .to_string()
}

/// Idempotency key for one account creation, stable per (user, chain).
pub fn account_idempotency_key(user_id: &str, chain: Chain) -> String {
    Uuid::new_v5(
        &Uuid::NAMESPACE_URL,
        format!("relational-provisioner/account/{user_id}/{chain}").as_bytes(),
    )
    .to_string()
}

/// Map a non-2xx provider status into the closed taxonomy.
pub fn classify_status(status: u16, body: &str) -> CustodyError {
    let message = if body.trim().is_empty() {
        "(empty response body)".to_string()
    } else {
        body.trim().to_string()
    };

    match status {
        400..=499 => CustodyError::Client { status, message },
        500..=599 => CustodyError::Server { status, message },
        // Redirects and anything else outside the success/error families
        // violate the provider contract.
        _ => CustodyError::Protocol(format!("unexpected status {status}: {message}")),
    }
}

/// Map a reqwest transport failure (connect refused, timeout, DNS) into
/// the taxonomy. Anything that never produced an HTTP status is a
/// network error and therefore retryable.
fn classify_transport(path: &str, e: &reqwest::Error) -> CustodyError {
    CustodyError::Network(format!("POST {path} failed: {e}"))
}

pub fn parse_wallet_id(response: &Value) -> Result<String, CustodyError> {
    response
        .pointer("/activity/result/createWalletResult/walletId")
        .and_then(Value::as_str)
        .filter(|id| !id.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| CustodyError::Protocol("missing wallet id in create_wallet response".into()))
}

pub fn parse_account(
    response: &Value,
    chain: Chain,
    wallet_id: &str,
) -> Result<CustodyAccount, CustodyError> {
    let account = response
        .pointer("/activity/result/createWalletAccountsResult/accounts/0")
        .ok_or_else(|| {
            CustodyError::Protocol("missing account in create_wallet_accounts response".into())
        })?;

    let custody_account_id = account
        .get("walletAccountId")
        .and_then(Value::as_str)
        .filter(|id| !id.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| CustodyError::Protocol("missing walletAccountId in account response".into()))?;

    let address = account
        .get("address")
        .and_then(Value::as_str)
        .filter(|a| !a.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| CustodyError::Protocol("missing address in account response".into()))?;

    if !chain.validate_address(&address) {
        return Err(CustodyError::Protocol(format!(
            "provider address {address} failed structural validation for chain {chain}"
        )));
    }

    Ok(CustodyAccount {
        chain,
        address,
        custody_wallet_id: wallet_id.to_string(),
        custody_account_id,
        address_format: chain.spec().address_format.to_string(),
    })
}

pub fn parse_organization(response: &Value) -> Result<OrganizationInfo, CustodyError> {
    let organization_id = response
        .pointer("/organizationData/organizationId")
        .and_then(Value::as_str)
        .filter(|id| !id.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            CustodyError::Protocol("missing organizationId in get_organization response".into())
        })?;

    let organization_name = response
        .pointer("/organizationData/organizationName")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(OrganizationInfo {
        organization_id,
        organization_name,
    })
}

fn required_env_present(name: &str) -> bool {
    env_optional(name).is_some()
}

fn env_required(name: &str) -> Result<String, CustodyError> {
    env_optional(name)
        .ok_or_else(|| CustodyError::Protocol(format!("missing configuration: {name}")))
}

fn env_optional(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    env_optional(name).unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wallet_names_are_deterministic_and_prefixed() {
        assert_eq!(wallet_name("user-42"), "rw-wallet-user-42");
        assert_eq!(wallet_name("user-42"), wallet_name("user-42"));
    }

    #[test]
    fn wallet_idempotency_key_is_stable_per_user() {
        let first = wallet_idempotency_key("user-42");
        let second = wallet_idempotency_key("user-42");
        assert_eq!(first, second);
        assert!(Uuid::parse_str(&first).is_ok());

        assert_ne!(first, wallet_idempotency_key("user-43"));
    }

    #[test]
    fn account_idempotency_keys_differ_per_chain_and_from_wallet_key() {
        let evm = account_idempotency_key("user-42", Chain::Evm);
        let solana = account_idempotency_key("user-42", Chain::Solana);

        assert_eq!(evm, account_idempotency_key("user-42", Chain::Evm));
        assert_ne!(evm, solana);
        assert_ne!(evm, wallet_idempotency_key("user-42"));
    }

    #[test]
    fn status_classification_is_exhaustive_over_the_taxonomy() {
        assert!(matches!(
            classify_status(400, "bad request"),
            CustodyError::Client { status: 400, .. }
        ));
        assert!(matches!(
            classify_status(404, ""),
            CustodyError::Client { status: 404, .. }
        ));
        assert!(matches!(
            classify_status(500, "boom"),
            CustodyError::Server { status: 500, .. }
        ));
        assert!(matches!(
            classify_status(503, "unavailable"),
            CustodyError::Server { status: 503, .. }
        ));
        assert!(matches!(classify_status(302, ""), CustodyError::Protocol(_)));
    }

    #[test]
    fn classified_errors_carry_retryability() {
        assert!(!classify_status(422, "nope").retryable());
        assert!(classify_status(502, "bad gateway").retryable());
    }

    #[test]
    fn parse_wallet_id_reads_activity_result() {
        let response = json!({
            "activity": { "result": { "createWalletResult": { "walletId": "w-123" } } }
        });
        assert_eq!(parse_wallet_id(&response).unwrap(), "w-123");
    }

    #[test]
    fn parse_wallet_id_missing_is_protocol_error() {
        let response = json!({ "activity": { "result": {} } });
        assert!(matches!(
            parse_wallet_id(&response),
            Err(CustodyError::Protocol(_))
        ));
    }

    fn account_response(address: &str) -> Value {
        json!({
            "activity": { "result": { "createWalletAccountsResult": { "accounts": [{
                "walletAccountId": "acct-1",
                "address": address,
                "addressFormat": "ADDRESS_FORMAT_ETHEREUM"
            }] } } }
        })
    }

    #[test]
    fn parse_account_accepts_valid_addresses() {
        let response = account_response("0x742d35Cc6634C0532925a3b844Bc9e7595f4aB12");
        let account = parse_account(&response, Chain::Evm, "w-123").unwrap();
        assert_eq!(account.custody_wallet_id, "w-123");
        assert_eq!(account.custody_account_id, "acct-1");
        assert_eq!(account.address_format, "ADDRESS_FORMAT_ETHEREUM");
    }

    #[test]
    fn parse_account_rejects_invalid_address_as_protocol_error() {
        let response = account_response("not-an-address");
        let err = parse_account(&response, Chain::Evm, "w-123").unwrap_err();
        assert!(matches!(err, CustodyError::Protocol(_)));
        assert!(err.to_string().contains("not-an-address"));
    }

    #[test]
    fn parse_account_missing_account_is_protocol_error() {
        let response = json!({
            "activity": { "result": { "createWalletAccountsResult": { "accounts": [] } } }
        });
        assert!(matches!(
            parse_account(&response, Chain::Evm, "w-123"),
            Err(CustodyError::Protocol(_))
        ));
    }

    #[test]
    fn parse_organization_reads_id_and_optional_name() {
        let response = json!({
            "organizationData": { "organizationId": "org-1", "organizationName": "Relational" }
        });
        let info = parse_organization(&response).unwrap();
        assert_eq!(info.organization_id, "org-1");
        assert_eq!(info.organization_name.as_deref(), Some("Relational"));

        let bare = json!({ "organizationData": { "organizationId": "org-1" } });
        assert!(parse_organization(&bare).unwrap().organization_name.is_none());
    }

    #[test]
    fn parse_organization_missing_id_is_protocol_error() {
        let response = json!({ "organizationData": {} });
        assert!(matches!(
            parse_organization(&response),
            Err(CustodyError::Protocol(_))
        ));
    }
}
