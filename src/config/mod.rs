mod contract_config;
mod keeper_config;

pub use contract_config::{load_deployed_address, IRevenueSplitter, IVaultToken, IERC20};
pub use keeper_config::{
    CollectorConfig, ContractsConfig, FeeConfig, KeeperConfig, NodeConfig, ScheduleConfig,
};
