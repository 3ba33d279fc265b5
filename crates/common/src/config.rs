//! Node configuration.
//!
//! Built-in defaults, optionally layered with a TOML file, then overridden by
//! environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default number of pre-params kept warm.
pub const DEFAULT_POOL_SIZE: usize = 5;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config file {path}: {source}")]
    File {
        path: String,
        #[source]
        source: config::ConfigError,
    },

    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub pool: PoolConfig,
    pub bitcoin: BitcoinConfig,
    pub logging: LoggingConfig,
}

/// Pre-params pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of parameter objects kept ready.
    pub size: usize,
    /// First delay after a failed generation attempt.
    pub retry_initial_backoff_ms: u64,
    /// Upper bound for the doubling retry delay.
    pub retry_max_backoff_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_POOL_SIZE,
            retry_initial_backoff_ms: 500,
            retry_max_backoff_ms: 30_000,
        }
    }
}

impl PoolConfig {
    /// Pool of `size` entries with default retry policy.
    pub fn with_size(size: usize) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    pub fn retry_initial_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_initial_backoff_ms)
    }

    pub fn retry_max_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_max_backoff_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.size == 0 {
            return Err(ConfigError::Invalid(
                "pool.size must be at least 1".to_string(),
            ));
        }
        if self.retry_initial_backoff_ms > self.retry_max_backoff_ms {
            return Err(ConfigError::Invalid(format!(
                "pool.retry_initial_backoff_ms ({}) exceeds pool.retry_max_backoff_ms ({})",
                self.retry_initial_backoff_ms, self.retry_max_backoff_ms
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BitcoinConfig {
    /// mainnet, testnet or signet.
    pub network: String,
    /// Esplora base URL; the network preset is used when unset.
    pub esplora_url: Option<String>,
}

impl Default for BitcoinConfig {
    fn default() -> Self {
        Self {
            network: "testnet".to_string(),
            esplora_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "text" or "json".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl NodeConfig {
    /// Load configuration from an optional TOML file and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut node_config = match path {
            Some(path) if path.exists() => Self::from_file(path)?,
            _ => Self::default(),
        };

        node_config.override_from(|key| std::env::var(key).ok())?;
        node_config.validate()?;

        Ok(node_config)
    }

    /// Read a TOML file on top of the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .and_then(|settings| settings.try_deserialize::<NodeConfig>())
            .map_err(|source| ConfigError::File {
                path: path.display().to_string(),
                source,
            })?;

        Ok(settings)
    }

    /// Apply overrides from a key lookup (the environment in production).
    pub fn override_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(size) = lookup("PARAMS_POOL_SIZE") {
            self.pool.size = parse_env("PARAMS_POOL_SIZE", &size)?;
        }

        if let Some(backoff) = lookup("PARAMS_RETRY_BACKOFF_MS") {
            self.pool.retry_initial_backoff_ms = parse_env("PARAMS_RETRY_BACKOFF_MS", &backoff)?;
        }

        if let Some(backoff) = lookup("PARAMS_RETRY_MAX_BACKOFF_MS") {
            self.pool.retry_max_backoff_ms = parse_env("PARAMS_RETRY_MAX_BACKOFF_MS", &backoff)?;
        }

        if let Some(network) = lookup("BITCOIN_NETWORK") {
            self.bitcoin.network = network;
        }

        if let Some(url) = lookup("ESPLORA_URL") {
            self.bitcoin.esplora_url = Some(url);
        }

        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Some(format) = lookup("LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pool.validate()
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = NodeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pool.size, DEFAULT_POOL_SIZE);
        assert_eq!(config.bitcoin.network, "testnet");
        assert!(!config.logging.is_json());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = NodeConfig::default();
        config
            .override_from(lookup(&[
                ("PARAMS_POOL_SIZE", "12"),
                ("PARAMS_RETRY_BACKOFF_MS", "10"),
                ("BITCOIN_NETWORK", "signet"),
                ("LOG_FORMAT", "JSON"),
            ]))
            .unwrap();

        assert_eq!(config.pool.size, 12);
        assert_eq!(config.pool.retry_initial_backoff(), Duration::from_millis(10));
        assert_eq!(config.bitcoin.network, "signet");
        assert!(config.logging.is_json());
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = NodeConfig::default();
        let result = config.override_from(lookup(&[("PARAMS_POOL_SIZE", "five")]));

        match result {
            Err(ConfigError::InvalidEnv { key, .. }) => assert_eq!(key, "PARAMS_POOL_SIZE"),
            other => panic!("Expected InvalidEnv, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_pool_size_rejected() {
        let config = PoolConfig::with_size(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backoff_ordering_rejected() {
        let config = PoolConfig {
            size: 1,
            retry_initial_backoff_ms: 1_000,
            retry_max_backoff_ms: 10,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[pool]\nsize = 3\n\n[bitcoin]\nnetwork = \"mainnet\"\nesplora_url = \"http://localhost:3002\""
        )
        .unwrap();

        let config = NodeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.pool.size, 3);
        // Unset keys keep their defaults
        assert_eq!(config.pool.retry_max_backoff_ms, 30_000);
        assert_eq!(config.bitcoin.network, "mainnet");
        assert_eq!(
            config.bitcoin.esplora_url.as_deref(),
            Some("http://localhost:3002")
        );
    }
}
