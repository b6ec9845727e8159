use alloy::{
    consensus::{SignableTransaction, TxEnvelope},
    network::{TransactionBuilder, TxSignerSync},
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
};
use anyhow::Result;
use tracing::debug;

/// TxnBuilder - Build and sign transactions
///
/// Purely local: the private key never leaves the process and no network
/// call happens here.
pub struct TxnBuilder;

impl TxnBuilder {
    /// Build and sign a fully populated transaction request
    pub fn build_and_sign_transaction(
        tx_request: TransactionRequest,
        signer: &PrivateKeySigner,
    ) -> Result<TxEnvelope> {
        debug!("Signer address: {:?}", signer.address());
        let mut unsigned_tx = tx_request
            .build_unsigned()
            .map_err(|e| anyhow::anyhow!("incomplete transaction request: {e}"))?;
        let sig = signer.sign_transaction_sync(&mut unsigned_tx)?;
        let tx_envelope = unsigned_tx.into_signed(sig);

        debug!("Transaction built and signed successfully");
        Ok(tx_envelope.into())
    }
}
