// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory for the account database and audit logs | `/data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `ENABLED_CHAINS` | Comma-separated default chain set | `aptos,solana,evm` |
//! | `PROVISION_DEADLINE_SECS` | Local bound on one provisioning call | `30` |
//! | `TURNKEY_BASE_URL` | Custody provider API base URL | `https://api.turnkey.com` |
//! | `TURNKEY_API_KEY` | Custody provider API key | Required |
//! | `TURNKEY_ORGANIZATION_ID` | Custody provider organization | Required |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::time::Duration;

use crate::chains::Chain;

/// Environment variable name for the data directory path.
///
/// The account database and audit logs live here.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Environment variable name for the default chain set.
pub const ENABLED_CHAINS_ENV: &str = "ENABLED_CHAINS";

/// Environment variable name for the provisioning deadline in seconds.
pub const PROVISION_DEADLINE_ENV: &str = "PROVISION_DEADLINE_SECS";

/// Service-level settings resolved at startup.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub enabled_chains: Vec<Chain>,
    pub provision_deadline: Duration,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);
        let data_dir =
            PathBuf::from(std::env::var(DATA_DIR_ENV).unwrap_or_else(|_| "/data".to_string()));
        let enabled_chains = std::env::var(ENABLED_CHAINS_ENV)
            .map(|raw| parse_chain_list(&raw))
            .unwrap_or_else(|_| Chain::ALL.to_vec());
        let provision_deadline = std::env::var(PROVISION_DEADLINE_ENV)
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));

        Self {
            host,
            port,
            data_dir,
            enabled_chains,
            provision_deadline,
        }
    }
}

/// Parse a comma-separated chain list, dropping unknown entries.
pub fn parse_chain_list(raw: &str) -> Vec<Chain> {
    let mut chains = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        match Chain::parse(part) {
            Some(chain) if !chains.contains(&chain) => chains.push(chain),
            Some(_) => {}
            None => tracing::warn!(chain = part, "ignoring unknown chain in {ENABLED_CHAINS_ENV}"),
        }
    }
    chains
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_chain_list_handles_spacing_and_duplicates() {
        assert_eq!(
            parse_chain_list("aptos, evm ,aptos"),
            vec![Chain::Aptos, Chain::Evm]
        );
    }

    #[test]
    fn parse_chain_list_drops_unknown_entries() {
        assert_eq!(parse_chain_list("evm,bitcoin"), vec![Chain::Evm]);
        assert!(parse_chain_list("bitcoin").is_empty());
        assert!(parse_chain_list("").is_empty());
    }
}
