//! Analytics aggregation over the faucet factories.
//!
//! A run walks every configured (network, factory) pair, pulls the registry
//! views, and rewrites the chart documents in the cache table. At most one
//! run executes at a time; a second trigger observes the in-process flag and
//! returns immediately.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::time::Duration;

use alloy::primitives::Address;
use anyhow::{Context, Result};
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, EntityTrait};
use serde_json::{Value, json};
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::chain::contracts::{IERC20Metadata, IFaucet, IFaucetFactory};
use crate::chain::{ChainClient, ChainRegistry};
use crate::config::AnalyticsConfig;
use crate::entities::analytics_cache;
use crate::entities::prelude::AnalyticsCache;
use crate::error::RelayError;
use crate::state::ApiCache;

pub mod charts;

use self::charts::{FactoryTx, NetworkSnapshot};

pub const KEY_DASHBOARD: &str = "dashboard";
pub const KEY_FAUCETS: &str = "faucets";
pub const KEY_TRANSACTIONS: &str = "transactions";
pub const KEY_USERS: &str = "users";
pub const KEY_CLAIMS: &str = "claims";
pub const KEY_LAST_UPDATED: &str = "last_updated";
pub const KEY_UPDATE_STATUS: &str = "update_status";

/// Every key a reader may ask for.
pub const CHART_KEYS: &[&str] = &[
    KEY_DASHBOARD,
    KEY_FAUCETS,
    KEY_TRANSACTIONS,
    KEY_USERS,
    KEY_CLAIMS,
    KEY_LAST_UPDATED,
    KEY_UPDATE_STATUS,
];

/// Compiled-in factory registries, overridable per network in the config
/// file so new factories do not require a rebuild.
const DEFAULT_FACTORIES: &[(u64, &[&str])] = &[
    (42220, &["0x171b9d1b7d4f021b6b49101b1ffbc4adbf0c4d15"]),
    (42161, &["0x96e9911df17e94f6048cbd8aa1f249f1f8a8a898"]),
    (1135, &["0x4f5cf5372963a67a41e7b9f8ab27dee3ce7e9ed4"]),
    (8453, &["0x9d6cc3eec8b3229a9c9c2e9a6f553c8c2fbb4b83"]),
];

#[derive(Debug, Clone)]
pub struct FactoryNetwork {
    pub chain_id: u64,
    pub factories: Vec<Address>,
}

/// Result of asking for an update.
#[derive(Debug, Clone)]
pub enum UpdateOutcome {
    Completed(UpdateReport),
    /// Another run holds the flag; no work was done
    InProgress,
}

#[derive(Debug, Clone)]
pub struct UpdateReport {
    pub networks: usize,
    pub faucets: u64,
    pub transactions: u64,
}

pub struct Aggregator {
    database: DatabaseConnection,
    registry: ChainRegistry,
    cache: Arc<ApiCache>,
    networks: Vec<FactoryNetwork>,
    synthetic_users: bool,
    updating: AtomicBool,
}

impl Aggregator {
    pub fn new(
        database: DatabaseConnection,
        registry: ChainRegistry,
        cache: Arc<ApiCache>,
        config: &AnalyticsConfig,
    ) -> Result<Self> {
        let networks = if config.networks.is_empty() {
            DEFAULT_FACTORIES
                .iter()
                .map(|(chain_id, factories)| {
                    let parsed = factories
                        .iter()
                        .map(|raw| raw.parse::<Address>().expect("compiled factory address"))
                        .collect();
                    FactoryNetwork {
                        chain_id: *chain_id,
                        factories: parsed,
                    }
                })
                .collect()
        } else {
            config
                .networks
                .iter()
                .map(|network| {
                    let parsed = network
                        .factories
                        .iter()
                        .map(|raw| {
                            raw.parse::<Address>().with_context(|| {
                                format!("Invalid factory address {raw} for chain {}", network.chain_id)
                            })
                        })
                        .collect::<Result<Vec<_>>>()?;
                    Ok(FactoryNetwork {
                        chain_id: network.chain_id,
                        factories: parsed,
                    })
                })
                .collect::<Result<Vec<_>>>()?
        };

        assert!(!networks.is_empty(), "Analytics requires at least one network");

        Ok(Self {
            database,
            registry,
            cache,
            networks,
            synthetic_users: config.synthetic_users,
            updating: AtomicBool::new(false),
        })
    }

    pub fn is_updating(&self) -> bool {
        self.updating.load(AtomicOrdering::SeqCst)
    }

    /// Run one full update unless one is already in flight.
    pub async fn run_update(&self) -> Result<UpdateOutcome, RelayError> {
        if self
            .updating
            .compare_exchange(false, true, AtomicOrdering::SeqCst, AtomicOrdering::SeqCst)
            .is_err()
        {
            return Ok(UpdateOutcome::InProgress);
        }

        let started_at = Utc::now();
        let status = json!({
            "status": "updating",
            "updating": true,
            "startedAt": started_at.timestamp(),
        });
        // Status write failures must release the flag before surfacing
        if let Err(err) = self.write_key(KEY_UPDATE_STATUS, status).await {
            self.updating.store(false, AtomicOrdering::SeqCst);
            return Err(err);
        }

        let result = self.aggregate().await;
        let finished_at = Utc::now();

        let status = match &result {
            Ok(report) => json!({
                "status": "completed",
                "updating": false,
                "startedAt": started_at.timestamp(),
                "finishedAt": finished_at.timestamp(),
                "networks": report.networks,
                "faucets": report.faucets,
                "transactions": report.transactions,
            }),
            Err(err) => json!({
                "status": "failed",
                "updating": false,
                "startedAt": started_at.timestamp(),
                "finishedAt": finished_at.timestamp(),
                "error": err.to_string(),
            }),
        };
        if let Err(status_err) = self.write_key(KEY_UPDATE_STATUS, status).await {
            warn!("Failed to persist analytics status: {status_err}");
        }
        self.updating.store(false, AtomicOrdering::SeqCst);

        let report = result?;
        info!(
            networks = report.networks,
            faucets = report.faucets,
            transactions = report.transactions,
            "Analytics update completed"
        );
        Ok(UpdateOutcome::Completed(report))
    }

    async fn aggregate(&self) -> Result<UpdateReport, RelayError> {
        let mut snapshots = Vec::with_capacity(self.networks.len());
        for network in &self.networks {
            match self.collect_network(network).await {
                Ok(snapshot) => snapshots.push(snapshot),
                // A single dark network must not blank the whole dashboard
                Err(err) => warn!(
                    chain_id = network.chain_id,
                    "Skipping network in analytics run: {err}"
                ),
            }
        }
        if snapshots.is_empty() {
            return Err(RelayError::Internal(
                "no analytics network could be read".to_string(),
            ));
        }

        let all_transactions: Vec<FactoryTx> = snapshots
            .iter()
            .flat_map(|snapshot| snapshot.transactions.clone())
            .collect();

        let faucets = charts::faucets_chart(&snapshots);
        let users = charts::users_chart(&all_transactions, self.synthetic_users);
        let claims = charts::claims_chart(&all_transactions);
        let transactions = charts::transactions_chart(&snapshots);
        let dashboard = charts::dashboard(&snapshots, &users);

        self.write_key(KEY_FAUCETS, to_value(&faucets)?).await?;
        self.write_key(KEY_USERS, to_value(&users)?).await?;
        self.write_key(KEY_CLAIMS, to_value(&claims)?).await?;
        self.write_key(KEY_TRANSACTIONS, to_value(&transactions)?)
            .await?;
        self.write_key(KEY_DASHBOARD, to_value(&dashboard)?).await?;
        self.write_key(
            KEY_LAST_UPDATED,
            json!({ "lastUpdated": Utc::now().timestamp() }),
        )
        .await?;

        Ok(UpdateReport {
            networks: snapshots.len(),
            faucets: snapshots.iter().map(|s| s.faucet_count as u64).sum(),
            transactions: all_transactions.len() as u64,
        })
    }

    async fn collect_network(&self, network: &FactoryNetwork) -> Result<NetworkSnapshot, RelayError> {
        let desc = self.registry.resolve(network.chain_id)?;
        let client = self.registry.connect(network.chain_id).await?;

        let mut faucet_count = 0usize;
        let mut transactions = Vec::new();
        // Token metadata resolved at most once per faucet per run
        let mut token_memo: HashMap<Address, Option<(String, u8)>> = HashMap::new();

        for factory in &network.factories {
            if !client.has_code(*factory).await? {
                warn!(chain_id = network.chain_id, factory = %factory, "Factory has no code, skipping");
                continue;
            }

            let handle = IFaucetFactory::new(*factory, client.provider().clone());
            let faucets = handle
                .getAllFaucets()
                .call()
                .await
                .map_err(|err| view_error(&client, "getAllFaucets", err))?;
            faucet_count += faucets.len();

            let raw_transactions = handle
                .getAllTransactions()
                .call()
                .await
                .map_err(|err| view_error(&client, "getAllTransactions", err))?;

            for raw in raw_transactions {
                // Ether payouts use the chain's native symbol at 18 decimals;
                // token payouts resolve through the faucet's token views
                let token_meta = if raw.isEther {
                    Some((desc.native_symbol.to_string(), 18))
                } else {
                    self.resolve_token_meta(&client, raw.faucetAddress, &mut token_memo)
                        .await
                };
                let (token_symbol, decimals) = match token_meta {
                    Some((symbol, decimals)) => (Some(symbol), decimals),
                    None => (None, 18),
                };
                let timestamp = i64::try_from(raw.timestamp).unwrap_or(i64::MAX);
                transactions.push(FactoryTx {
                    network: desc.name.to_string(),
                    faucet: raw.faucetAddress.to_checksum(None),
                    tx_type: raw.transactionType,
                    initiator: raw.initiator.to_checksum(None),
                    timestamp,
                    token_symbol,
                    amount: crate::sweeper::units_to_decimal(raw.amount, decimals),
                });
            }
        }

        Ok(NetworkSnapshot {
            network: desc.name.to_string(),
            chain_id: network.chain_id,
            faucet_count,
            transactions,
        })
    }

    /// Token metadata via the faucet's `token()` with a `tokenAddress()`
    /// fallback, then the ERC-20's `symbol()` and `decimals()`. Any failure
    /// resolves to `None`; charts render those transactions unlabeled.
    async fn resolve_token_meta(
        &self,
        client: &ChainClient,
        faucet: Address,
        memo: &mut HashMap<Address, Option<(String, u8)>>,
    ) -> Option<(String, u8)> {
        if let Some(cached) = memo.get(&faucet) {
            return cached.clone();
        }

        let handle = IFaucet::new(faucet, client.provider().clone());
        let token_address = match handle.token().call().await {
            Ok(address) => Some(address),
            Err(_) => handle.tokenAddress().call().await.ok(),
        };

        let meta = match token_address {
            Some(address) if address != Address::ZERO => {
                let token = IERC20Metadata::new(address, client.provider().clone());
                match (
                    token.symbol().call().await,
                    token.decimals().call().await,
                ) {
                    (Ok(symbol), Ok(decimals)) => Some((symbol, decimals)),
                    _ => None,
                }
            }
            _ => None,
        };

        memo.insert(faucet, meta.clone());
        meta
    }

    async fn write_key(&self, key: &str, payload: Value) -> Result<(), RelayError> {
        assert!(CHART_KEYS.contains(&key), "Unknown analytics cache key");
        let model = analytics_cache::ActiveModel {
            cache_key: Set(key.to_string()),
            payload: Set(payload.clone()),
            updated_at: Set(Utc::now().fixed_offset()),
        };
        AnalyticsCache::insert(model)
            .on_conflict(
                OnConflict::column(analytics_cache::Column::CacheKey)
                    .update_columns([
                        analytics_cache::Column::Payload,
                        analytics_cache::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.database)
            .await?;
        self.cache.charts.insert(key.to_string(), payload).await;
        Ok(())
    }

    /// Read a chart document, serving the in-process cache first.
    pub async fn read_key(&self, key: &str) -> Result<Option<Value>, RelayError> {
        assert!(CHART_KEYS.contains(&key), "Unknown analytics cache key");
        if let Some(cached) = self.cache.charts.get(key).await {
            return Ok(Some(cached));
        }
        let row = AnalyticsCache::find_by_id(key.to_string())
            .one(&self.database)
            .await?;
        match row {
            Some(row) => {
                self.cache
                    .charts
                    .insert(key.to_string(), row.payload.clone())
                    .await;
                Ok(Some(row.payload))
            }
            None => Ok(None),
        }
    }

    /// Periodic refresh, shut down through the same watch channel as the
    /// HTTP server.
    pub async fn run_refresh_loop(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(interval_secs = interval.as_secs(), "Analytics refresh loop started");
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    match changed {
                        Ok(_) => {
                            if *shutdown.borrow() {
                                info!("Analytics refresh shutdown signal received");
                                break;
                            }
                        }
                        Err(_) => {
                            warn!("Shutdown channel closed unexpectedly. Exiting refresh loop");
                            break;
                        }
                    }
                }
                _ = sleep(interval) => {
                    match self.run_update().await {
                        Ok(UpdateOutcome::Completed(_)) => {}
                        Ok(UpdateOutcome::InProgress) => {
                            info!("Skipping scheduled analytics refresh; update already running");
                        }
                        Err(err) => error!("Scheduled analytics refresh failed: {err}"),
                    }
                }
            }
        }
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, RelayError> {
    serde_json::to_value(value).map_err(RelayError::internal)
}

fn view_error(client: &ChainClient, selector: &str, err: impl std::fmt::Display) -> RelayError {
    RelayError::RpcUnavailable {
        chain_id: client.chain_id(),
        reason: format!("{selector}() view call failed: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_factories_cover_all_supported_chains() {
        let chain_ids: Vec<u64> = DEFAULT_FACTORIES.iter().map(|(id, _)| *id).collect();
        assert_eq!(chain_ids, vec![42220, 42161, 1135, 8453]);
        for (_, factories) in DEFAULT_FACTORIES {
            assert!(!factories.is_empty());
            for raw in *factories {
                raw.parse::<Address>().expect("compiled factory parses");
            }
        }
    }

    #[test]
    fn chart_keys_are_the_fixed_set() {
        assert_eq!(CHART_KEYS.len(), 7);
        assert!(CHART_KEYS.contains(&"dashboard"));
        assert!(CHART_KEYS.contains(&"update_status"));
    }
}
