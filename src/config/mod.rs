use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, ConfigError, File, FileFormat};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub chains: ChainsConfig,
    #[serde(default)]
    pub relayer: RelayerConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    pub cache: CacheConfig,
}

impl ApiConfig {
    pub fn load() -> Result<Self> {
        let configured_path =
            std::env::var("RELAY_API_CONFIG").unwrap_or_else(|_| "config/api.toml".to_string());
        assert!(
            !configured_path.is_empty(),
            "Configuration path must be non-empty"
        );
        assert!(
            configured_path.len() < 4096,
            "Configuration path length exceeds hard limit"
        );

        let mut builder = Config::builder()
            .add_source(File::new(&configured_path, FileFormat::Toml).required(true));

        if let Ok(env_override) = std::env::var("RELAY_API_ENV") {
            if !env_override.is_empty() {
                let env_file = format!("config/api.{}.toml", env_override);
                if Path::new(&env_file).exists() {
                    builder = builder.add_source(File::new(&env_file, FileFormat::Toml));
                }
            }
        }

        let settings = builder
            .build()
            .map_err(|err| map_config_error(err, &configured_path))?;
        let mut config: Self = settings
            .try_deserialize()
            .context("Failed to deserialize API configuration")?;

        // The database URL is a deployment secret; the environment always wins.
        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.is_empty() {
                config.database.url = url;
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&mut self) -> Result<()> {
        assert!(
            !self.database.url.is_empty(),
            "Database URL must be specified (config file or DATABASE_URL)"
        );
        assert!(
            self.server.port > 0,
            "Server port must be greater than zero"
        );
        assert!(
            self.relayer.receipt_timeout_secs >= 10,
            "Receipt timeout must be at least 10 seconds"
        );
        assert!(
            self.relayer.receipt_timeout_secs <= 1800,
            "Receipt timeout cannot exceed 30 minutes"
        );
        self.analytics.ensure_bounds()?;
        self.cache.ensure_bounds()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: Option<IpAddr>,
    pub port: u16,
    /// Allowed CORS origins; empty means any origin (development)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    pub fn address(&self) -> SocketAddr {
        let host = self.host.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert!(self.port != 0, "HTTP port cannot be zero");
        assert!(self.port < 65535, "HTTP port must be below 65535");
        SocketAddr::new(host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,
    pub max_connections: u32,
    pub min_connections: Option<u32>,
}

/// Per-chain RPC URL overrides from the config file. Environment variables
/// (`RPC_URL_<chainId>` and the legacy aliases) take precedence; see
/// `chain::ChainRegistry`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChainsConfig {
    #[serde(default)]
    pub rpc_urls: std::collections::HashMap<u64, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayerConfig {
    /// Hard deadline for the receipt poll
    pub receipt_timeout_secs: u64,
}

impl Default for RelayerConfig {
    fn default() -> Self {
        Self {
            receipt_timeout_secs: 300,
        }
    }
}

impl RelayerConfig {
    pub fn receipt_timeout(&self) -> Duration {
        assert!(
            self.receipt_timeout_secs >= 10,
            "Receipt timeout invariant broken"
        );
        Duration::from_secs(self.receipt_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Periodic refresh interval in seconds; 0 disables the background loop
    pub refresh_interval_secs: u64,
    /// Inject the fixed synthetic-user backfill into the users chart
    pub synthetic_users: bool,
    /// Per-network factory lists; empty falls back to the compiled defaults
    pub networks: Vec<AnalyticsNetworkConfig>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 0,
            synthetic_users: true,
            networks: Vec::new(),
        }
    }
}

impl AnalyticsConfig {
    pub fn refresh_interval(&self) -> Option<Duration> {
        if self.refresh_interval_secs == 0 {
            return None;
        }
        Some(Duration::from_secs(self.refresh_interval_secs))
    }

    fn ensure_bounds(&self) -> Result<()> {
        if self.refresh_interval_secs > 0 {
            assert!(
                self.refresh_interval_secs >= 60,
                "Analytics refresh below one minute would hammer the RPC providers"
            );
        }
        for network in &self.networks {
            assert!(
                !network.factories.is_empty(),
                "Analytics network {} has no factory addresses",
                network.chain_id
            );
            assert!(
                network.factories.len() <= 32,
                "Analytics factory list exceeds defensive limit"
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsNetworkConfig {
    pub chain_id: u64,
    pub factories: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub charts_max_capacity: u64,
    pub charts_ttl_seconds: u64,
}

impl CacheConfig {
    fn ensure_bounds(&self) -> Result<()> {
        assert!(
            self.charts_max_capacity >= 8,
            "Chart cache must hold at least the fixed key set"
        );
        assert!(
            self.charts_ttl_seconds <= 86_400,
            "Chart cache TTL cannot exceed one day"
        );
        Ok(())
    }
}

fn map_config_error(err: ConfigError, path: &str) -> ConfigError {
    match err {
        ConfigError::NotFound(_) => ConfigError::NotFound(path.to_string()),
        other => other,
    }
}
