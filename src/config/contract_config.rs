use alloy::primitives::Address;
use alloy::sol;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

sol! {
    /// Yield-bearing vault token with periodic protocol snapshots
    #[sol(rpc)]
    interface IVaultToken {
        function lastSnapshotTime() external view returns (uint256);
        function MIN_SNAPSHOT_INTERVAL() external view returns (uint256);
        function takeSnapshot() external;
        function totalSupply() external view returns (uint256);
        function decimals() external view returns (uint8);
    }

    /// Revenue collector that splits an accumulated token balance across
    /// configured recipients by basis points
    #[sol(rpc)]
    interface IRevenueSplitter {
        function minBalanceToDistribute() external view returns (uint256);
        function distribute() external;
        function getRecipients() external view returns (address[] memory);
        function getBpsForRecipient(address recipient) external view returns (uint256);
        function BP_SCALE() external view returns (uint256);
    }

    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function decimals() external view returns (uint8);
    }
}

/// Forge deployment artifact: `{"deployedTo": "0x..."}`
#[derive(Debug, Deserialize)]
struct DeploymentArtifact {
    #[serde(rename = "deployedTo")]
    deployed_to: Address,
}

/// Read a contract address from a forge deployment artifact
pub fn load_deployed_address<P: AsRef<Path>>(path: P) -> Result<Address> {
    let file = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read deployment artifact: {:?}", path.as_ref()))?;
    let artifact: DeploymentArtifact = serde_json::from_str(&file)
        .with_context(|| format!("Failed to parse deployment artifact: {:?}", path.as_ref()))?;
    Ok(artifact.deployed_to)
}
