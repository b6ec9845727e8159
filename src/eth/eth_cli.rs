use alloy::{
    eips::BlockNumberOrTag,
    network::Ethereum,
    primitives::{Address, TxHash, U256},
    providers::{Provider, ProviderBuilder, RootProvider},
    rpc::types::TransactionRequest,
};
use anyhow::{Context as AnyhowContext, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};
use url::Url;

use crate::eth::error::{ChainError, Transience};
use crate::eth::gateway::{Gateway, ReceiptSummary};
use crate::fees::FeeMarket;

/// HTTP gateway to the chain node. Stateless beyond its connection; every
/// other component reaches the ledger through this type.
#[derive(Clone)]
pub struct EthHttpCli {
    inner: Arc<RootProvider<Ethereum>>,
    chain_id: u64,
    retry_config: RetryConfig,
    rpc: Arc<String>,
}

/// Retry configuration for transient network errors
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl EthHttpCli {
    /// Create a new gateway for the given endpoint
    pub fn new(rpc_url: &str, chain_id: u64, retry_config: RetryConfig) -> Result<Self> {
        debug!(
            "Creating EthHttpCli for URL: {}, Chain ID: {}",
            rpc_url, chain_id
        );

        let url =
            Url::parse(rpc_url).with_context(|| format!("Failed to parse RPC URL: {}", rpc_url))?;
        let provider: RootProvider<Ethereum> = ProviderBuilder::default().connect_http(url);

        Ok(Self {
            rpc: Arc::new(rpc_url.to_string()),
            inner: Arc::new(provider),
            chain_id,
            retry_config,
        })
    }

    pub fn rpc(&self) -> Arc<String> {
        self.rpc.clone()
    }

    #[allow(unused)]
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Provider handle for sol!-generated contract bindings
    pub fn provider(&self) -> RootProvider<Ethereum> {
        (*self.inner).clone()
    }

    /// Execute an operation with bounded retry and backoff.
    ///
    /// Only transient network errors are retried. A semantic error response
    /// from the node returns immediately: retrying it would either waste the
    /// budget or, for writes, risk duplicate effects.
    pub async fn retry<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: Transience + std::fmt::Debug,
    {
        let mut last_error = None;

        for attempt in 0..=self.retry_config.max_retries {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!("Operation succeeded on attempt {}", attempt + 1);
                    }
                    return Ok(result);
                }
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.retry_config.max_retries {
                        let delay = std::cmp::min(
                            Duration::from_millis(
                                (self.retry_config.base_delay.as_millis() as f64
                                    * self.retry_config.backoff_multiplier.powi(attempt as i32))
                                    as u64,
                            ),
                            self.retry_config.max_delay,
                        );
                        warn!(
                            "Operation failed on attempt {}, retrying in {:?}: {:?}",
                            attempt + 1,
                            delay,
                            last_error
                        );
                        sleep(delay).await;
                    }
                }
            }
        }

        // last_error is always set when the loop falls through
        Err(last_error.unwrap())
    }
}

#[async_trait]
impl Gateway for EthHttpCli {
    async fn estimate_gas(&self, draft: &TransactionRequest) -> Result<u64, ChainError> {
        // Revert simulations and node unavailability both collapse into
        // Estimation: the caller's fallback policy covers either.
        self.retry(|| async { self.inner.estimate_gas(draft.clone()).await })
            .await
            .map_err(|e| ChainError::Estimation(e.to_string()))
    }

    async fn fee_market(&self) -> Result<FeeMarket, ChainError> {
        let block = self
            .retry(|| async { self.inner.get_block_by_number(BlockNumberOrTag::Latest).await })
            .await
            .map_err(|e| ChainError::Transient(format!("failed to fetch latest block: {e}")))?;

        Ok(FeeMarket {
            base_fee: block.and_then(|b| b.header.base_fee_per_gas).map(u128::from),
        })
    }

    async fn pending_nonce(&self, account: Address) -> Result<u64, ChainError> {
        // Pending, not latest: the count must include any in-flight
        // transaction from this account.
        self.retry(|| async { self.inner.get_transaction_count(account).pending().await })
            .await
            .map_err(|e| {
                ChainError::Transient(format!("failed to get nonce for {}: {}", account, e))
            })
    }

    async fn native_balance(&self, account: Address) -> Result<U256, ChainError> {
        self.retry(|| async { self.inner.get_balance(account).await })
            .await
            .map_err(|e| {
                ChainError::Transient(format!("failed to get balance for {}: {}", account, e))
            })
    }

    async fn broadcast(&self, raw: Vec<u8>) -> Result<TxHash, ChainError> {
        // Single attempt: a rejection is semantic, and blindly re-sending
        // would surface as a nonce conflict if the first send was accepted.
        match self.inner.send_raw_transaction(&raw).await {
            Ok(pending) => Ok(*pending.tx_hash()),
            Err(e) => match e.as_error_resp() {
                Some(resp) => Err(ChainError::classify_broadcast(&resp.message)),
                None => Err(ChainError::Transient(e.to_string())),
            },
        }
    }

    async fn receipt(&self, tx_hash: TxHash) -> Result<Option<ReceiptSummary>, ChainError> {
        let receipt = self
            .retry(|| async { self.inner.get_transaction_receipt(tx_hash).await })
            .await
            .map_err(|e| {
                ChainError::Transient(format!("failed to get receipt for {}: {}", tx_hash, e))
            })?;

        Ok(receipt.map(|r| ReceiptSummary {
            tx_hash: r.transaction_hash,
            block_number: r.block_number,
            gas_used: r.gas_used,
            success: r.status(),
        }))
    }
}
