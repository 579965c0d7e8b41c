//! Node Configuration
//!
//! Loaded from TOML. Every field has a default, so a partial file (or no
//! file at all) yields a working node.
//!
//! ```toml
//! miner_address = "miner"
//! miner_reward = 10
//! block_size = 100
//! mine_interval_ms = 1000
//!
//! [genesis_balances]
//! alice = 1000
//!
//! [mempool]
//! max_tx_count = 10000
//!
//! [limits]
//! max_steps = 100000
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use lib_contracts::ExecutionLimits;
use lib_types::{Address, Amount};

use crate::execution::EngineConfig;
use crate::mempool::MempoolConfig;

/// Configuration loading or validation error
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("Configuration parsing error: {0}")]
    Parsing(#[from] toml::de::Error),

    #[error("Invalid configuration: {reason}")]
    Invalid { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Account credited with fees and block rewards
    pub miner_address: Address,
    /// Flat reward per applied block
    pub miner_reward: Amount,
    /// Maximum transactions taken from the pool per block
    pub block_size: usize,
    /// Period of the mining loop
    pub mine_interval_ms: u64,
    /// Verify ed25519 signatures on admission
    pub verify_signatures: bool,
    /// Balances credited when the node starts
    pub genesis_balances: BTreeMap<Address, Amount>,
    pub mempool: MempoolConfig,
    pub limits: ExecutionLimits,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            miner_address: Address::from("miner"),
            miner_reward: 10,
            block_size: 100,
            mine_interval_ms: 1_000,
            verify_signatures: true,
            genesis_balances: BTreeMap::new(),
            mempool: MempoolConfig::default(),
            limits: ExecutionLimits::default(),
        }
    }
}

impl NodeConfig {
    /// Small limits, fast mining, signatures not checked
    pub fn for_testing() -> Self {
        Self {
            block_size: 10,
            mine_interval_ms: 50,
            verify_signatures: false,
            limits: ExecutionLimits::for_testing(),
            ..Default::default()
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: NodeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML file
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        tracing::info!("Loading node configuration from {}", path.display());
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.miner_address.as_str().is_empty() {
            return Err(ConfigError::Invalid {
                reason: "miner_address must not be empty".to_string(),
            });
        }
        if self.miner_address.is_contract() {
            return Err(ConfigError::Invalid {
                reason: format!("miner_address {} is in the contract address space", self.miner_address),
            });
        }
        if self.block_size == 0 {
            return Err(ConfigError::Invalid {
                reason: "block_size must be at least 1".to_string(),
            });
        }
        if self.mine_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "mine_interval_ms must be at least 1".to_string(),
            });
        }
        if self.mempool.max_tx_count == 0 {
            return Err(ConfigError::Invalid {
                reason: "mempool.max_tx_count must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn mine_interval(&self) -> Duration {
        Duration::from_millis(self.mine_interval_ms)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            miner_address: self.miner_address.clone(),
            block_reward: self.miner_reward,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = NodeConfig::from_toml_str(
            r#"
miner_reward = 25

[genesis_balances]
alice = 100

[limits]
max_steps = 500
"#,
        )
        .unwrap();

        assert_eq!(config.miner_reward, 25);
        assert_eq!(config.genesis_balances.get(&Address::from("alice")), Some(&100));
        assert_eq!(config.limits.max_steps, 500);
        assert_eq!(config.limits.wasm_fuel, ExecutionLimits::default().wasm_fuel);
        assert_eq!(config.miner_address, Address::from("miner"));
        assert_eq!(config.mine_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = NodeConfig::from_toml_str("block_size = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        let err = NodeConfig::from_toml_str(r#"miner_address = "contract_abc""#).unwrap_err();
        assert!(err.to_string().contains("contract address space"));

        let err = NodeConfig::from_toml_str("block_size = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parsing(_)));
    }
}
