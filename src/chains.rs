// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Supported chains and their custody-provider parameters.
//!
//! Each chain maps to the Turnkey address format, signing curve, and
//! derivation path used when creating accounts, plus a structural address
//! validator. Adding a chain means adding one enum variant and one
//! [`ChainSpec`] row; no other module changes.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A logical blockchain identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    /// Aptos (ed25519, 0x-prefixed hex addresses).
    Aptos,
    /// Solana (ed25519, base58 addresses).
    Solana,
    /// EVM-compatible chains (secp256k1, 0x-prefixed 20-byte addresses).
    Evm,
}

/// Custody-provider parameters for one chain.
#[derive(Debug, Clone)]
pub struct ChainSpec {
    /// Turnkey address format enum value.
    pub address_format: &'static str,
    /// Turnkey curve enum value.
    pub curve: &'static str,
    /// BIP-44 style derivation path for the default account.
    pub derivation_path: &'static str,
}

const APTOS_SPEC: ChainSpec = ChainSpec {
    address_format: "ADDRESS_FORMAT_APTOS",
    curve: "CURVE_ED25519",
    derivation_path: "m/44'/637'/0'/0'/0'",
};

const SOLANA_SPEC: ChainSpec = ChainSpec {
    address_format: "ADDRESS_FORMAT_SOLANA",
    curve: "CURVE_ED25519",
    derivation_path: "m/44'/501'/0'/0'",
};

const EVM_SPEC: ChainSpec = ChainSpec {
    address_format: "ADDRESS_FORMAT_ETHEREUM",
    curve: "CURVE_SECP256K1",
    derivation_path: "m/44'/60'/0'/0/0",
};

impl Chain {
    /// Every chain this build can provision.
    pub const ALL: [Chain; 3] = [Chain::Aptos, Chain::Solana, Chain::Evm];

    /// Parse a chain identifier as it appears in API requests and config.
    ///
    /// Returns `None` for anything not in the registry; callers surface
    /// that as an unsupported-chain failure before any network call.
    pub fn parse(raw: &str) -> Option<Chain> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "aptos" => Some(Chain::Aptos),
            "solana" => Some(Chain::Solana),
            "evm" => Some(Chain::Evm),
            _ => None,
        }
    }

    /// The wire identifier, matching the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Chain::Aptos => "aptos",
            Chain::Solana => "solana",
            Chain::Evm => "evm",
        }
    }

    /// Custody-provider parameters for this chain.
    pub fn spec(self) -> &'static ChainSpec {
        match self {
            Chain::Aptos => &APTOS_SPEC,
            Chain::Solana => &SOLANA_SPEC,
            Chain::Evm => &EVM_SPEC,
        }
    }

    /// Structural validation of a provider-returned address.
    ///
    /// Format, length, and charset only; no checksums and no network
    /// lookups. A provider address failing this check is a contract
    /// break, not a user error.
    pub fn validate_address(self, address: &str) -> bool {
        match self {
            Chain::Evm => {
                address.len() == 42
                    && address.starts_with("0x")
                    && address[2..].bytes().all(|b| b.is_ascii_hexdigit())
            }
            Chain::Solana => {
                (32..=44).contains(&address.len())
                    && address.bytes().all(is_base58_byte)
            }
            Chain::Aptos => {
                let hex = address.strip_prefix("0x").unwrap_or("");
                (1..=64).contains(&hex.len()) && hex.bytes().all(|b| b.is_ascii_hexdigit())
            }
        }
    }
}

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Chain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Chain::parse(s).ok_or_else(|| format!("unsupported chain: {s}"))
    }
}

/// Base58 alphabet check (Bitcoin variant: no `0`, `O`, `I`, `l`).
fn is_base58_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() && !matches!(b, b'0' | b'O' | b'I' | b'l')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_chains() {
        assert_eq!(Chain::parse("aptos"), Some(Chain::Aptos));
        assert_eq!(Chain::parse("SOLANA"), Some(Chain::Solana));
        assert_eq!(Chain::parse(" evm "), Some(Chain::Evm));
    }

    #[test]
    fn parse_rejects_unknown_chains() {
        assert_eq!(Chain::parse("bitcoin"), None);
        assert_eq!(Chain::parse(""), None);
        assert_eq!(Chain::parse("evm2"), None);
    }

    #[test]
    fn display_round_trips_through_parse() {
        for chain in Chain::ALL {
            assert_eq!(Chain::parse(chain.as_str()), Some(chain));
        }
    }

    #[test]
    fn evm_addresses_are_0x_plus_40_hex() {
        let chain = Chain::Evm;
        assert!(chain.validate_address("0x742d35Cc6634C0532925a3b844Bc9e7595f4aB12"));
        assert!(!chain.validate_address("742d35Cc6634C0532925a3b844Bc9e7595f4aB12"));
        assert!(!chain.validate_address("0x742d35Cc6634C0532925a3b844Bc9e7595f4aB1")); // 39 hex
        assert!(!chain.validate_address("0x742d35Cc6634C0532925a3b844Bc9e7595f4aB123")); // 41 hex
        assert!(!chain.validate_address("0xZZ2d35Cc6634C0532925a3b844Bc9e7595f4aB12"));
    }

    #[test]
    fn solana_addresses_are_base58_32_to_44() {
        let chain = Chain::Solana;
        assert!(chain.validate_address("4Nd1mYvNy6xB3JokBCSKxMQkGqmQ4DqGq7FzKxA6v8jM"));
        // Too short.
        assert!(!chain.validate_address("4Nd1mYvNy6xB3JokBCSKxMQkGqm"));
        // Excluded base58 characters.
        assert!(!chain.validate_address("0Nd1mYvNy6xB3JokBCSKxMQkGqmQ4DqGq7FzKxA6v8jM"));
        assert!(!chain.validate_address("lNd1mYvNy6xB3JokBCSKxMQkGqmQ4DqGq7FzKxA6v8jM"));
    }

    #[test]
    fn aptos_addresses_are_0x_plus_hex() {
        let chain = Chain::Aptos;
        assert!(chain.validate_address("0x1"));
        assert!(chain.validate_address(&format!("0x{}", "a".repeat(64))));
        assert!(!chain.validate_address("0x"));
        assert!(!chain.validate_address(&format!("0x{}", "a".repeat(65))));
        assert!(!chain.validate_address("1abc"));
    }

    #[test]
    fn specs_carry_provider_parameters() {
        assert_eq!(Chain::Evm.spec().address_format, "ADDRESS_FORMAT_ETHEREUM");
        assert_eq!(Chain::Evm.spec().curve, "CURVE_SECP256K1");
        assert_eq!(Chain::Solana.spec().curve, "CURVE_ED25519");
        assert_eq!(Chain::Aptos.spec().address_format, "ADDRESS_FORMAT_APTOS");
    }
}
