//! Operator identity, signing and transaction submission.
//!
//! The process holds exactly one EVM account, parsed from `PRIVATE_KEY` at
//! boot and read-only afterwards. Nonce assignment is serialized per chain:
//! the per-chain lock is held from nonce read through broadcast so two
//! concurrent requests cannot pick the same pending count.

use std::collections::HashMap;
use std::sync::Mutex as StdMutex;
use std::sync::Arc;
use std::time::Duration;

use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::BlockId;
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TransactionBuilder;
use alloy::primitives::utils::format_ether;
use alloy::primitives::{Address, TxHash, TxKind, U256};
use alloy::providers::Provider;
use alloy::rpc::types::TransactionRequest;
use alloy::signers::SignerSync;
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::{Instant, sleep};
use tracing::{info, warn};

use crate::chain::ChainClient;
use crate::error::RelayError;

/// 0.000001 native units; below this no transaction is attempted
pub const MIN_RELAYER_BALANCE_WEI: U256 = U256::from_limbs([1_000_000_000_000u64, 0, 0, 0]);

const RECEIPT_BACKOFF_START: Duration = Duration::from_secs(1);
const RECEIPT_BACKOFF_CAP: Duration = Duration::from_secs(8);

fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(RECEIPT_BACKOFF_CAP)
}

/// Per-chain broadcast locks; see module docs.
#[derive(Default)]
pub struct NonceLocks {
    chains: StdMutex<HashMap<u64, Arc<Mutex<()>>>>,
}

impl NonceLocks {
    pub async fn acquire(&self, chain_id: u64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.chains.lock().expect("nonce lock map poisoned");
            Arc::clone(
                map.entry(chain_id)
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }
}

pub struct Operator {
    signer: PrivateKeySigner,
    address: Address,
    receipt_timeout: Duration,
    nonce_locks: NonceLocks,
}

impl Operator {
    /// Load the operator key from `PRIVATE_KEY`. Boot aborts here when the
    /// variable is unset or does not parse as a secp256k1 key.
    pub fn from_env(receipt_timeout: Duration) -> Result<Self> {
        let raw = std::env::var("PRIVATE_KEY").context("PRIVATE_KEY must be set")?;
        let signer = raw
            .trim()
            .parse::<PrivateKeySigner>()
            .context("PRIVATE_KEY is not a valid private key")?;
        Ok(Self::new(signer, receipt_timeout))
    }

    pub fn new(signer: PrivateKeySigner, receipt_timeout: Duration) -> Self {
        assert!(
            receipt_timeout >= Duration::from_secs(10),
            "Receipt timeout below 10 seconds cannot cover a slow chain"
        );
        let address = signer.address();
        Self {
            signer,
            address,
            receipt_timeout,
            nonce_locks: NonceLocks::default(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Serialize nonce assignment for a chain. Callers hold the returned
    /// guard from before the nonce read until after broadcast.
    pub async fn lock_chain(&self, chain_id: u64) -> OwnedMutexGuard<()> {
        self.nonce_locks.acquire(chain_id).await
    }

    /// Balance guard: refuse to build anything when the operator cannot pay
    /// for gas on this chain.
    pub async fn ensure_funded(&self, client: &ChainClient) -> Result<(), RelayError> {
        let balance = client.native_balance(self.address).await?;
        if balance < MIN_RELAYER_BALANCE_WEI {
            return Err(RelayError::InsufficientRelayerFunds {
                balance: format_ether(balance),
                symbol: client.descriptor().native_symbol.to_string(),
            });
        }
        Ok(())
    }

    /// Sign, broadcast and wait for inclusion. Returns the hash on success;
    /// post-broadcast failures carry the hash inside the error. Callers that
    /// hold a nonce lock should prefer `sign_and_send` + `await_receipt` so
    /// the lock can be released once the transaction is on the wire.
    pub async fn submit(&self, client: &ChainClient, tx: TxLegacy) -> Result<TxHash, RelayError> {
        let tx_hash = self.sign_and_send(client, &tx).await?;
        self.await_receipt(client, &tx, tx_hash).await?;
        Ok(tx_hash)
    }

    /// Sign and broadcast without waiting for a receipt.
    pub async fn sign_and_send(
        &self,
        client: &ChainClient,
        tx: &TxLegacy,
    ) -> Result<TxHash, RelayError> {
        assert_eq!(
            tx.chain_id,
            Some(client.chain_id()),
            "Transaction chain id must match the client"
        );

        let signature = self
            .signer
            .sign_hash_sync(&tx.signature_hash())
            .map_err(|err| RelayError::Internal(format!("signing failed: {err}")))?;
        let envelope = TxEnvelope::Legacy(tx.clone().into_signed(signature));
        let mut raw = Vec::with_capacity(envelope.encode_2718_len());
        envelope.encode_2718(&mut raw);

        let tx_hash = client.send_raw(&raw).await?;
        info!(
            chain_id = client.chain_id(),
            %tx_hash,
            nonce = tx.nonce,
            "Transaction broadcast"
        );
        Ok(tx_hash)
    }

    /// Poll for the receipt on a backoff schedule until the configured
    /// deadline.
    pub async fn await_receipt(
        &self,
        client: &ChainClient,
        tx: &TxLegacy,
        tx_hash: TxHash,
    ) -> Result<(), RelayError> {
        let deadline = Instant::now() + self.receipt_timeout;
        let mut delay = RECEIPT_BACKOFF_START;

        loop {
            sleep(delay).await;
            if Instant::now() >= deadline {
                warn!(%tx_hash, "Receipt poll deadline reached");
                return Err(RelayError::TxTimeout {
                    tx_hash: tx_hash.to_string(),
                });
            }
            delay = next_backoff(delay);

            let receipt = match client.receipt(tx_hash).await {
                Ok(receipt) => receipt,
                Err(err) => {
                    // Transient provider trouble; the deadline bounds retries
                    warn!(%tx_hash, "Receipt query failed: {err}");
                    continue;
                }
            };

            let Some(receipt) = receipt else {
                continue;
            };

            if receipt.status() {
                info!(
                    %tx_hash,
                    block = receipt.block_number.unwrap_or_default(),
                    "Transaction confirmed"
                );
                return Ok(());
            }

            let reason = self
                .revert_reason(client, tx, receipt.block_number)
                .await;
            return Err(RelayError::ChainReverted {
                reason,
                tx_hash: Some(tx_hash.to_string()),
            });
        }
    }

    /// Replay the call at the failing block to recover the revert string.
    /// Best effort: a provider that prunes state simply yields no reason.
    async fn revert_reason(
        &self,
        client: &ChainClient,
        tx: &TxLegacy,
        block_number: Option<u64>,
    ) -> String {
        let TxKind::Call(to) = tx.to else {
            return "transaction reverted".to_string();
        };
        let request = TransactionRequest::default()
            .with_from(self.address)
            .with_to(to)
            .with_input(tx.input.clone())
            .with_gas_price(tx.gas_price);

        let call = client.provider().call(request);
        let call = match block_number {
            Some(number) => call.block(BlockId::number(number)),
            None => call,
        };

        match call.await {
            Ok(_) => "transaction reverted without a revert reason".to_string(),
            Err(err) => err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_to_cap() {
        let mut delay = RECEIPT_BACKOFF_START;
        let mut schedule = vec![delay];
        for _ in 0..4 {
            delay = next_backoff(delay);
            schedule.push(delay);
        }
        assert_eq!(
            schedule,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
                Duration::from_secs(8),
            ]
        );
    }

    #[test]
    fn min_balance_is_one_microether() {
        assert_eq!(
            MIN_RELAYER_BALANCE_WEI,
            U256::from(10u64).pow(U256::from(12u64))
        );
    }

    #[test]
    fn operator_address_derives_from_key() {
        let signer = PrivateKeySigner::random();
        let expected = signer.address();
        let operator = Operator::new(signer, Duration::from_secs(300));
        assert_eq!(operator.address(), expected);
    }
}
