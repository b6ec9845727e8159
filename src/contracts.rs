//! Capability interfaces for the three contract roles the keeper touches,
//! plus their production implementations over sol!-generated bindings.
//!
//! Each trait exposes only the methods the engine actually invokes, so tests
//! can substitute doubles with controlled on-chain state.

use alloy::{
    network::TransactionBuilder,
    primitives::{Address, Bytes, U256},
    rpc::types::TransactionRequest,
    sol_types::SolCall,
};
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{IRevenueSplitter, IVaultToken, IERC20};
use crate::eth::{ChainError, EthHttpCli};

/// Contract that takes periodic protocol snapshots
#[async_trait]
pub trait SnapshotVault: Send + Sync {
    fn address(&self) -> Address;
    /// Unix timestamp of the last snapshot, read fresh from the chain
    async fn last_snapshot_time(&self) -> Result<u64, ChainError>;
    /// Minimum seconds between snapshots, a contract constant
    async fn min_snapshot_interval(&self) -> Result<u64, ChainError>;
    /// Draft for the snapshot transaction: target and calldata only
    fn take_snapshot_call(&self) -> TransactionRequest;
}

/// Contract holding accumulated revenue to be swept to recipients
#[async_trait]
pub trait RevenueCollector: Send + Sync {
    fn address(&self) -> Address;
    /// On-chain minimum balance below which distribution is not worthwhile
    async fn min_balance_to_distribute(&self) -> Result<U256, ChainError>;
    /// Draft for the distribution transaction: target and calldata only
    fn distribute_call(&self) -> TransactionRequest;
}

/// The revenue token, read-only
#[async_trait]
pub trait FungibleToken: Send + Sync {
    async fn balance_of(&self, account: Address) -> Result<U256, ChainError>;
    async fn decimals(&self) -> Result<u8, ChainError>;
}

fn truncating_u64(value: U256) -> u64 {
    // Timestamps and intervals fit u64 for any plausible chain
    value.try_into().unwrap_or(u64::MAX)
}

/// Production `SnapshotVault` over the deployed vault token
pub struct VaultContract {
    address: Address,
    cli: Arc<EthHttpCli>,
}

impl VaultContract {
    pub fn new(address: Address, cli: Arc<EthHttpCli>) -> Self {
        Self { address, cli }
    }
}

#[async_trait]
impl SnapshotVault for VaultContract {
    fn address(&self) -> Address {
        self.address
    }

    async fn last_snapshot_time(&self) -> Result<u64, ChainError> {
        let vault = IVaultToken::new(self.address, self.cli.provider());
        let last = self
            .cli
            .retry(|| async { vault.lastSnapshotTime().call().await })
            .await?;
        Ok(truncating_u64(last))
    }

    async fn min_snapshot_interval(&self) -> Result<u64, ChainError> {
        let vault = IVaultToken::new(self.address, self.cli.provider());
        let interval = self
            .cli
            .retry(|| async { vault.MIN_SNAPSHOT_INTERVAL().call().await })
            .await?;
        Ok(truncating_u64(interval))
    }

    fn take_snapshot_call(&self) -> TransactionRequest {
        let call_data = IVaultToken::takeSnapshotCall {}.abi_encode();
        TransactionRequest::default()
            .with_to(self.address)
            .with_input(Bytes::from(call_data))
    }
}

/// Production `RevenueCollector` over a deployed revenue splitter
pub struct SplitterContract {
    address: Address,
    cli: Arc<EthHttpCli>,
}

impl SplitterContract {
    pub fn new(address: Address, cli: Arc<EthHttpCli>) -> Self {
        Self { address, cli }
    }
}

#[async_trait]
impl RevenueCollector for SplitterContract {
    fn address(&self) -> Address {
        self.address
    }

    async fn min_balance_to_distribute(&self) -> Result<U256, ChainError> {
        let splitter = IRevenueSplitter::new(self.address, self.cli.provider());
        Ok(self
            .cli
            .retry(|| async { splitter.minBalanceToDistribute().call().await })
            .await?)
    }

    fn distribute_call(&self) -> TransactionRequest {
        let call_data = IRevenueSplitter::distributeCall {}.abi_encode();
        TransactionRequest::default()
            .with_to(self.address)
            .with_input(Bytes::from(call_data))
    }
}

/// Production `FungibleToken` over the deployed revenue token
pub struct TokenContract {
    address: Address,
    cli: Arc<EthHttpCli>,
}

impl TokenContract {
    pub fn new(address: Address, cli: Arc<EthHttpCli>) -> Self {
        Self { address, cli }
    }
}

#[async_trait]
impl FungibleToken for TokenContract {
    async fn balance_of(&self, account: Address) -> Result<U256, ChainError> {
        let token = IERC20::new(self.address, self.cli.provider());
        Ok(self
            .cli
            .retry(|| async { token.balanceOf(account).call().await })
            .await?)
    }

    async fn decimals(&self) -> Result<u8, ChainError> {
        let token = IERC20::new(self.address, self.cli.provider());
        Ok(self
            .cli
            .retry(|| async { token.decimals().call().await })
            .await?)
    }
}
