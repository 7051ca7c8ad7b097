//! Chain registry and per-chain RPC clients.
//!
//! The supported set is the ground truth shared with the frontend; any
//! request naming a chain outside it fails validation before a single RPC
//! call is made. RPC endpoints resolve environment-first so deployments can
//! repoint a chain without a rebuild.

use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use url::Url;

use crate::config::ChainsConfig;
use crate::error::RelayError;

pub mod contracts;
pub mod submit;
pub mod tx;

#[derive(Debug, Clone, Copy)]
pub struct ChainDescriptor {
    pub chain_id: u64,
    pub name: &'static str,
    pub native_symbol: &'static str,
    /// Public endpoint used when no env or config override resolves
    pub default_rpc: &'static str,
    /// Pre-chain-id env naming kept for existing deployments
    pub legacy_env_alias: &'static str,
}

/// Every chain the platform serves. Must stay equal to the frontend's list.
pub const SUPPORTED_CHAINS: &[ChainDescriptor] = &[
    ChainDescriptor {
        chain_id: 42220,
        name: "Celo",
        native_symbol: "CELO",
        default_rpc: "https://forno.celo.org",
        legacy_env_alias: "RPC_URL_CELO",
    },
    ChainDescriptor {
        chain_id: 42161,
        name: "Arbitrum",
        native_symbol: "ETH",
        default_rpc: "https://arb1.arbitrum.io/rpc",
        legacy_env_alias: "RPC_URL_ARBITRUM",
    },
    ChainDescriptor {
        chain_id: 1135,
        name: "Lisk",
        native_symbol: "ETH",
        default_rpc: "https://rpc.api.lisk.com",
        legacy_env_alias: "RPC_URL_LISK",
    },
    ChainDescriptor {
        chain_id: 8453,
        name: "Base",
        native_symbol: "ETH",
        default_rpc: "https://mainnet.base.org",
        legacy_env_alias: "RPC_URL_BASE",
    },
];

pub fn descriptor(chain_id: u64) -> Option<&'static ChainDescriptor> {
    SUPPORTED_CHAINS.iter().find(|d| d.chain_id == chain_id)
}

/// Parse a user-supplied address string.
pub fn parse_address(value: &str) -> Result<Address, RelayError> {
    value
        .trim()
        .parse::<Address>()
        .map_err(|_| RelayError::BadAddress(value.trim().to_string()))
}

/// Canonical EIP-55 form used as the key of every store row. Mixed lowercase
/// and checksummed keys previously produced duplicate rows, so every store
/// boundary goes through here.
pub fn checksummed(value: &str) -> Result<String, RelayError> {
    Ok(parse_address(value)?.to_checksum(None))
}

#[derive(Clone)]
pub struct ChainRegistry {
    config_overrides: std::collections::HashMap<u64, String>,
}

impl ChainRegistry {
    pub fn new(config: &ChainsConfig) -> Self {
        assert!(
            config.rpc_urls.len() <= SUPPORTED_CHAINS.len(),
            "RPC override map names more chains than are supported"
        );
        Self {
            config_overrides: config.rpc_urls.clone(),
        }
    }

    pub fn resolve(&self, chain_id: u64) -> Result<&'static ChainDescriptor, RelayError> {
        descriptor(chain_id).ok_or(RelayError::UnsupportedChain(chain_id))
    }

    /// Endpoint lookup order: `RPC_URL_<chainId>`, the chain's legacy alias,
    /// the blanket `RPC_URL`, a config-file override, the compiled default.
    pub fn rpc_url(&self, desc: &ChainDescriptor) -> Result<Url, RelayError> {
        let candidates = [
            std::env::var(format!("RPC_URL_{}", desc.chain_id)).ok(),
            std::env::var(desc.legacy_env_alias).ok(),
            std::env::var("RPC_URL").ok(),
            self.config_overrides.get(&desc.chain_id).cloned(),
            Some(desc.default_rpc.to_string()),
        ];
        let raw = candidates
            .into_iter()
            .flatten()
            .find(|value| !value.trim().is_empty())
            .ok_or_else(|| RelayError::RpcUnavailable {
                chain_id: desc.chain_id,
                reason: "no RPC URL resolves".to_string(),
            })?;

        Url::parse(raw.trim()).map_err(|err| RelayError::RpcUnavailable {
            chain_id: desc.chain_id,
            reason: format!("malformed RPC URL {raw:?}: {err}"),
        })
    }

    /// Connect and fail fast: the endpoint must answer `eth_chainId` and
    /// report the id we asked for, so a mis-set URL is caught before any
    /// transaction work starts.
    pub async fn connect(&self, chain_id: u64) -> Result<ChainClient, RelayError> {
        let desc = self.resolve(chain_id)?;
        let url = self.rpc_url(desc)?;
        let provider = RootProvider::new_http(url);

        let reported = provider
            .get_chain_id()
            .await
            .map_err(|err| RelayError::RpcUnavailable {
                chain_id,
                reason: err.to_string(),
            })?;
        if reported != chain_id {
            return Err(RelayError::RpcUnavailable {
                chain_id,
                reason: format!("endpoint reports chain {reported}"),
            });
        }

        Ok(ChainClient { desc, provider })
    }
}

/// Minimal per-chain surface the relayer needs: id, gas price, balances,
/// pending nonce, call/estimate, raw broadcast, receipts, code presence.
#[derive(Clone)]
pub struct ChainClient {
    desc: &'static ChainDescriptor,
    provider: RootProvider,
}

impl ChainClient {
    pub fn chain_id(&self) -> u64 {
        self.desc.chain_id
    }

    pub fn descriptor(&self) -> &'static ChainDescriptor {
        self.desc
    }

    pub fn provider(&self) -> &RootProvider {
        &self.provider
    }

    pub async fn gas_price(&self) -> Result<u128, RelayError> {
        self.provider
            .get_gas_price()
            .await
            .map_err(|err| self.rpc_err(err))
    }

    pub async fn native_balance(&self, address: Address) -> Result<U256, RelayError> {
        self.provider
            .get_balance(address)
            .await
            .map_err(|err| self.rpc_err(err))
    }

    pub async fn pending_nonce(&self, address: Address) -> Result<u64, RelayError> {
        self.provider
            .get_transaction_count(address)
            .pending()
            .await
            .map_err(|err| self.rpc_err(err))
    }

    pub async fn estimate_gas(&self, request: TransactionRequest) -> Result<u64, RelayError> {
        self.provider
            .estimate_gas(request)
            .await
            .map_err(|err| self.rpc_err(err))
    }

    pub async fn has_code(&self, address: Address) -> Result<bool, RelayError> {
        let code: Bytes = self
            .provider
            .get_code_at(address)
            .await
            .map_err(|err| self.rpc_err(err))?;
        Ok(!code.is_empty())
    }

    pub async fn send_raw(&self, raw: &[u8]) -> Result<TxHash, RelayError> {
        assert!(!raw.is_empty(), "Raw transaction bytes cannot be empty");
        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .map_err(|err| self.rpc_err(err))?;
        Ok(*pending.tx_hash())
    }

    pub async fn receipt(&self, hash: TxHash) -> Result<Option<TransactionReceipt>, RelayError> {
        self.provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|err| self.rpc_err(err))
    }

    fn rpc_err(&self, err: impl std::fmt::Display) -> RelayError {
        RelayError::RpcUnavailable {
            chain_id: self.desc.chain_id,
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_set_matches_frontend() {
        let ids: Vec<u64> = SUPPORTED_CHAINS.iter().map(|d| d.chain_id).collect();
        assert_eq!(ids, vec![42220, 42161, 1135, 8453]);
        assert!(descriptor(42220).is_some());
        assert!(descriptor(1).is_none());
    }

    #[test]
    fn descriptors_are_complete() {
        for desc in SUPPORTED_CHAINS {
            assert!(!desc.name.is_empty());
            assert!(!desc.native_symbol.is_empty());
            assert!(desc.default_rpc.starts_with("https://"));
            assert!(desc.legacy_env_alias.starts_with("RPC_URL_"));
        }
    }

    #[test]
    fn address_parsing_and_checksum() {
        let lower = "0xd8da6bf26964af9d7eed9e03e53415d37aa96045";
        let canonical = checksummed(lower).expect("valid address");
        assert_eq!(canonical, "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045");
        // Canonicalization is idempotent
        assert_eq!(checksummed(&canonical).unwrap(), canonical);

        assert!(parse_address("not-an-address").is_err());
        assert!(parse_address("0x1234").is_err());
    }
}
