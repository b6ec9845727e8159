use alloy::transports::TransportError;
use thiserror::Error;

/// Errors surfaced by the chain gateway.
///
/// `Transient` is the only kind the gateway itself retries; every other kind
/// carries meaning the caller has to branch on (fall back, re-plan, block, or
/// give up for the tick).
#[derive(Debug, Error, Clone)]
pub enum ChainError {
    #[error("transient network error: {0}")]
    Transient(String),
    #[error("gas estimation failed: {0}")]
    Estimation(String),
    #[error("transaction underpriced: {0}")]
    Underpriced(String),
    #[error("nonce conflict: {0}")]
    NonceConflict(String),
    #[error("insufficient funds for gas: {0}")]
    InsufficientFunds(String),
    #[error("failed to build or sign transaction: {0}")]
    Build(String),
    #[error("rpc error: {0}")]
    Rpc(String),
}

impl ChainError {
    /// Classify a node's broadcast rejection from its error text.
    ///
    /// Node implementations do not agree on exact wording, so this matches
    /// the substrings used by geth, erigon and avalanchego.
    pub fn classify_broadcast(msg: &str) -> Self {
        let lower = msg.to_ascii_lowercase();
        if lower.contains("underpriced")
            || lower.contains("fee too low")
            || lower.contains("max fee per gas less than block base fee")
        {
            ChainError::Underpriced(msg.to_string())
        } else if lower.contains("nonce too low")
            || lower.contains("nonce too high")
            || lower.contains("replacement transaction")
        {
            ChainError::NonceConflict(msg.to_string())
        } else if lower.contains("insufficient funds") {
            ChainError::InsufficientFunds(msg.to_string())
        } else {
            ChainError::Rpc(msg.to_string())
        }
    }
}

/// Splits errors into transient network faults, which the gateway may retry
/// with backoff, and semantic failures, which it must not.
pub trait Transience {
    fn is_transient(&self) -> bool;
}

impl Transience for TransportError {
    fn is_transient(&self) -> bool {
        // An error response came from the node and means something about the
        // request; everything else is transport-level flakiness.
        self.as_error_resp().is_none()
    }
}

impl Transience for alloy::contract::Error {
    fn is_transient(&self) -> bool {
        matches!(self, alloy::contract::Error::TransportError(e) if e.is_transient())
    }
}

impl From<alloy::contract::Error> for ChainError {
    fn from(e: alloy::contract::Error) -> Self {
        if e.is_transient() {
            ChainError::Transient(e.to_string())
        } else {
            ChainError::Rpc(e.to_string())
        }
    }
}
