use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::future::Cache;
use sea_orm::DatabaseConnection;
use serde_json::Value;

use crate::analytics::Aggregator;
use crate::chain::ChainRegistry;
use crate::chain::submit::Operator;
use crate::config::CacheConfig;

#[derive(Clone)]
pub struct AppState {
    pub database: DatabaseConnection,
    pub cache: Arc<ApiCache>,
    pub registry: ChainRegistry,
    pub operator: Arc<Operator>,
    pub aggregator: Arc<Aggregator>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        database: DatabaseConnection,
        cache: Arc<ApiCache>,
        registry: ChainRegistry,
        operator: Arc<Operator>,
        aggregator: Arc<Aggregator>,
    ) -> Self {
        assert!(
            cache.charts_capacity >= 8,
            "Chart cache capacity must be configured"
        );
        assert!(
            Arc::strong_count(&aggregator) >= 1,
            "Aggregator must be shared"
        );
        Self {
            database,
            cache,
            registry,
            operator,
            aggregator,
            start_time: Instant::now(),
        }
    }
}

/// In-process read caches in front of the analytics tables.
pub struct ApiCache {
    pub charts: Cache<String, Value>,
    pub charts_capacity: u64,
}

impl ApiCache {
    pub fn new(config: &CacheConfig) -> Self {
        assert!(
            config.charts_max_capacity >= 8,
            "Chart cache capacity threshold"
        );

        let charts = Cache::builder()
            .max_capacity(config.charts_max_capacity)
            .time_to_live(Duration::from_secs(config.charts_ttl_seconds))
            .time_to_idle(Duration::from_secs(config.charts_ttl_seconds / 2 + 1))
            .build();

        Self {
            charts,
            charts_capacity: config.charts_max_capacity,
        }
    }
}
