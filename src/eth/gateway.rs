use alloy::{
    primitives::{Address, TxHash, U256},
    rpc::types::TransactionRequest,
};
use async_trait::async_trait;
use tokio::time::{sleep, Duration};

use crate::eth::error::ChainError;
use crate::fees::FeeMarket;

/// Receipt data the keeper actually consumes, detached from the full RPC
/// receipt so test doubles can produce it cheaply.
#[derive(Debug, Clone)]
pub struct ReceiptSummary {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    pub success: bool,
}

/// Outcome of waiting for a broadcast transaction.
#[derive(Debug, Clone)]
pub enum Confirmation {
    Confirmed(ReceiptSummary),
    Reverted(ReceiptSummary),
    TimedOut,
}

/// The keeper's sole contact surface with the remote ledger for
/// transaction-level operations. Contract reads go through the capability
/// traits in `contracts` instead; this trait covers everything a submission
/// attempt needs.
///
/// Implementations retry transient network errors internally with bounded
/// backoff. Semantic failures (revert simulations, broadcast rejections) are
/// never retried here; they propagate for policy-level handling.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Simulate the draft and return a gas estimate. Fails with
    /// `ChainError::Estimation` on revert-simulation or node unavailability;
    /// the caller must supply a fallback gas limit policy.
    async fn estimate_gas(&self, draft: &TransactionRequest) -> Result<u64, ChainError>;

    /// Best-effort fee-market snapshot. `base_fee` is `None` when the node
    /// omits it (pre-fee-market chain).
    async fn fee_market(&self) -> Result<FeeMarket, ChainError>;

    /// Next nonce for the account, reflecting *pending* transactions so an
    /// in-flight attempt is never collided with.
    async fn pending_nonce(&self, account: Address) -> Result<u64, ChainError>;

    /// Native-currency balance of the account.
    async fn native_balance(&self, account: Address) -> Result<U256, ChainError>;

    /// Broadcast a signed raw transaction. Rejections are classified into
    /// `Underpriced`, `NonceConflict`, `InsufficientFunds` or `Rpc` and are
    /// never blindly retried.
    async fn broadcast(&self, raw: Vec<u8>) -> Result<TxHash, ChainError>;

    /// Receipt-by-hash lookup; `None` until the transaction is included.
    async fn receipt(&self, tx_hash: TxHash) -> Result<Option<ReceiptSummary>, ChainError>;

    /// Poll for a receipt until inclusion or timeout. Polling, not push: the
    /// node is only guaranteed to answer receipt-by-hash lookups. The wait is
    /// bounded; a timeout leaves the transaction outcome unknown.
    async fn await_receipt(
        &self,
        tx_hash: TxHash,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Confirmation, ChainError> {
        let wait = tokio::time::timeout(timeout, async {
            loop {
                if let Some(summary) = self.receipt(tx_hash).await? {
                    return Ok::<ReceiptSummary, ChainError>(summary);
                }
                sleep(poll_interval).await;
            }
        })
        .await;

        match wait {
            Ok(Ok(summary)) if summary.success => Ok(Confirmation::Confirmed(summary)),
            Ok(Ok(summary)) => Ok(Confirmation::Reverted(summary)),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(Confirmation::TimedOut),
        }
    }
}
