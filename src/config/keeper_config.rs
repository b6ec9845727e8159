use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::eth::RetryConfig;
use crate::fees::{FeeStrategy, GWEI};

/// Complete keeper configuration, loaded from a TOML file. The signing key
/// is deliberately absent: it comes from the `KEEPER_PRIVATE_KEY`
/// environment variable and is never written to disk by this process.
#[derive(Debug, Clone, Deserialize)]
pub struct KeeperConfig {
    pub node: NodeConfig,
    pub contracts: ContractsConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub fees: FeeConfig,
    /// Block-explorer URL prefix for transaction links in logs
    #[serde(default = "default_explorer_url")]
    pub explorer_url: String,
    /// Optional distribution minimum in decimal token units, e.g. "100" or
    /// "12.5". Scaled by the token's on-chain decimals at startup; the
    /// effective threshold is the max of this and the on-chain minimum.
    pub min_distribute_override: Option<String>,
}

/// Node and chain configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    /// Bounded retry budget for transient read failures
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_retry_base_delay_secs")]
    pub retry_base_delay_secs: u64,
    #[serde(default = "default_retry_max_delay_secs")]
    pub retry_max_delay_secs: u64,
}

impl NodeConfig {
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            base_delay: Duration::from_secs(self.retry_base_delay_secs),
            max_delay: Duration::from_secs(self.retry_max_delay_secs),
            ..RetryConfig::default()
        }
    }
}

/// Contract wiring: deployment artifacts for the keeper-managed contracts
/// and the address of the revenue token
#[derive(Debug, Clone, Deserialize)]
pub struct ContractsConfig {
    /// Path to the vault token's forge deployment artifact
    pub vault_deployment: String,
    /// Revenue token address (checksummed hex)
    pub revenue_token: String,
    pub collectors: Vec<CollectorConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    pub name: String,
    /// Path to this collector's forge deployment artifact
    pub deployment: String,
}

/// Trigger cadence and confirmation timing
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_snapshot_interval_secs")]
    pub snapshot_interval_secs: u64,
    #[serde(default = "default_distribute_interval_secs")]
    pub distribute_interval_secs: u64,
    #[serde(default = "default_confirm_timeout_secs")]
    pub confirm_timeout_secs: u64,
    #[serde(default = "default_receipt_poll_secs")]
    pub receipt_poll_secs: u64,
    #[serde(default = "default_settle_delay_secs")]
    pub settle_delay_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            snapshot_interval_secs: default_snapshot_interval_secs(),
            distribute_interval_secs: default_distribute_interval_secs(),
            confirm_timeout_secs: default_confirm_timeout_secs(),
            receipt_poll_secs: default_receipt_poll_secs(),
            settle_delay_secs: default_settle_delay_secs(),
        }
    }
}

/// Fee policy knobs, in gwei where noted
#[derive(Debug, Clone, Deserialize)]
pub struct FeeConfig {
    #[serde(default = "default_priority_fee_gwei")]
    pub priority_fee_gwei: u64,
    #[serde(default = "default_base_fee_floor_gwei")]
    pub base_fee_floor_gwei: u64,
    /// Safety margin on the gas estimate, in basis points (15000 = 1.5x)
    #[serde(default = "default_gas_margin_bps")]
    pub gas_margin_bps: u64,
    #[serde(default = "default_fallback_gas_limit")]
    pub fallback_gas_limit: u64,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            priority_fee_gwei: default_priority_fee_gwei(),
            base_fee_floor_gwei: default_base_fee_floor_gwei(),
            gas_margin_bps: default_gas_margin_bps(),
            fallback_gas_limit: default_fallback_gas_limit(),
        }
    }
}

impl FeeConfig {
    pub fn strategy(&self) -> FeeStrategy {
        FeeStrategy {
            priority_fee_per_gas: self.priority_fee_gwei as u128 * GWEI,
            base_fee_floor: self.base_fee_floor_gwei as u128 * GWEI,
            gas_margin_bps: self.gas_margin_bps,
            fallback_gas_limit: self.fallback_gas_limit,
        }
    }
}

fn default_explorer_url() -> String {
    "https://testnet.snowtrace.io/tx/".to_string()
}
fn default_snapshot_interval_secs() -> u64 {
    1800
}
fn default_distribute_interval_secs() -> u64 {
    900
}
fn default_confirm_timeout_secs() -> u64 {
    180
}
fn default_receipt_poll_secs() -> u64 {
    3
}
fn default_settle_delay_secs() -> u64 {
    5
}
fn default_max_retries() -> usize {
    3
}
fn default_retry_base_delay_secs() -> u64 {
    2
}
fn default_retry_max_delay_secs() -> u64 {
    10
}
fn default_priority_fee_gwei() -> u64 {
    2
}
fn default_base_fee_floor_gwei() -> u64 {
    15
}
fn default_gas_margin_bps() -> u64 {
    15_000
}
fn default_fallback_gas_limit() -> u64 {
    200_000
}

impl KeeperConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: KeeperConfig =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let config: KeeperConfig = toml::from_str(
            r#"
            [node]
            rpc_url = "https://api.avax-test.network/ext/bc/C/rpc"
            chain_id = 43113

            [contracts]
            vault_deployment = "deployments/VaultToken.json"
            revenue_token = "0x5425890298aed601595a70ab815c96711a31bc65"
            collectors = [
                { name = "compute", deployment = "deployments/ComputeRevenueSplitter.json" },
                { name = "storage", deployment = "deployments/StorageRevenueSplitter.json" },
            ]
            "#,
        )
        .unwrap();

        assert_eq!(config.schedule.snapshot_interval_secs, 1800);
        assert_eq!(config.schedule.distribute_interval_secs, 900);
        assert_eq!(config.node.max_retries, 3);
        assert_eq!(config.node.retry_config().base_delay, Duration::from_secs(2));
        assert_eq!(config.fees.priority_fee_gwei, 2);
        assert_eq!(config.fees.fallback_gas_limit, 200_000);
        assert_eq!(config.contracts.collectors.len(), 2);
        assert!(config.min_distribute_override.is_none());
    }

    #[test]
    fn overrides_are_honored() {
        let config: KeeperConfig = toml::from_str(
            r#"
            min_distribute_override = "100"

            [node]
            rpc_url = "http://localhost:8545"
            chain_id = 1337
            max_retries = 5
            retry_max_delay_secs = 30

            [contracts]
            vault_deployment = "v.json"
            revenue_token = "0x5425890298aed601595a70ab815c96711a31bc65"
            collectors = []

            [schedule]
            snapshot_interval_secs = 60

            [fees]
            gas_margin_bps = 20000
            "#,
        )
        .unwrap();

        assert_eq!(config.schedule.snapshot_interval_secs, 60);
        // unset keys inside a present section still default
        assert_eq!(config.schedule.distribute_interval_secs, 900);
        assert_eq!(config.fees.gas_margin_bps, 20_000);
        assert_eq!(config.min_distribute_override.as_deref(), Some("100"));

        let strategy = config.fees.strategy();
        assert_eq!(strategy.priority_fee_per_gas, 2 * GWEI);
        assert_eq!(strategy.gas_margin_bps, 20_000);

        let retry = config.node.retry_config();
        assert_eq!(retry.max_retries, 5);
        assert_eq!(retry.base_delay, Duration::from_secs(2));
        assert_eq!(retry.max_delay, Duration::from_secs(30));
    }
}
