mod distribute;
mod snapshot;

pub use distribute::DistributeAction;
pub use snapshot::SnapshotAction;

use alloy::{primitives::TxHash, rpc::types::TransactionRequest};
use async_trait::async_trait;
use tokio::time::Duration;

use crate::eth::{ChainError, ReceiptSummary};

/// Eligibility decision for one action at one tick. Produced fresh on every
/// evaluation, never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    Due,
    NotDue(String),
    Blocked(String),
}

/// Terminal classification of one action tick, reported per action so a host
/// process can alert on patterns (e.g. repeated Blocked).
#[derive(Debug, Clone)]
pub enum TickOutcome {
    Succeeded(ReceiptSummary),
    Skipped(String),
    Blocked(String),
    Reverted(ReceiptSummary),
    /// Confirmation wait expired; the transaction may still land later, so
    /// its nonce is considered possibly consumed.
    TimedOut(TxHash),
    Failed(String),
}

impl TickOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            TickOutcome::Succeeded(_) => "Succeeded",
            TickOutcome::Skipped(_) => "Skipped",
            TickOutcome::Blocked(_) => "Blocked",
            TickOutcome::Reverted(_) => "Reverted",
            TickOutcome::TimedOut(_) => "TimedOut",
            TickOutcome::Failed(_) => "Failed",
        }
    }
}

/// One named, idempotent on-chain operation.
///
/// Defined at process start from static configuration and never mutated.
/// Implementations read chain state through their contract capabilities; the
/// executor owns everything from fee planning to confirmation.
#[async_trait]
pub trait Action: Send + Sync {
    fn id(&self) -> &str;

    /// Wall-clock period between eligibility checks
    fn interval(&self) -> Duration;

    /// Decide eligibility from fresh chain state. Side-effect free.
    async fn check(&self) -> Result<Precondition, ChainError>;

    /// Draft the transaction: target and calldata only. The executor fills
    /// sender, nonce, fees and gas.
    fn build_call(&self) -> TransactionRequest;

    /// Re-read the state the precondition depended on, for reporting only.
    /// Success is never gated on this: external transfers between broadcast
    /// and re-read are a valid outcome.
    async fn report_after(&self);
}
