//! Instrumented in-memory gateway for executor and scheduler tests: counts
//! nonce queries and broadcasts, tracks concurrent submission windows, and
//! replays scripted broadcast rejections.

use alloy::{
    primitives::{keccak256, Address, TxHash, U256},
    rpc::types::TransactionRequest,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use crate::eth::error::ChainError;
use crate::eth::gateway::{Gateway, ReceiptSummary};
use crate::fees::{FeeMarket, GWEI};

#[derive(Debug, Clone, Copy)]
pub enum ReceiptMode {
    /// Receipt available on the first poll, status success
    Success,
    /// Receipt available on the first poll, status failed
    Revert,
    /// No receipt ever; the confirmation wait must time out
    Never,
}

pub struct MockGateway {
    /// Next account nonce; accepted broadcasts advance it
    pub nonce: AtomicU64,
    pub nonce_queries: AtomicU64,
    /// Every broadcast call, accepted or rejected
    pub broadcast_count: AtomicU64,
    /// Open submission windows, entered at nonce fetch and exited when the
    /// attempt's outcome is known: a receipt, or a rejection that frees the
    /// nonce. An abandoned confirmation wait leaves its window open, mirroring
    /// the nonce staying possibly-consumed. The serialization invariant
    /// requires the maximum to stay at 1.
    pub in_flight: AtomicU64,
    pub max_in_flight: AtomicU64,
    pub fail_estimation: AtomicBool,
    native_balance: Mutex<U256>,
    broadcast_errors: Mutex<VecDeque<ChainError>>,
    receipt_mode: Mutex<ReceiptMode>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self {
            nonce: AtomicU64::new(7),
            nonce_queries: AtomicU64::new(0),
            broadcast_count: AtomicU64::new(0),
            in_flight: AtomicU64::new(0),
            max_in_flight: AtomicU64::new(0),
            fail_estimation: AtomicBool::new(false),
            native_balance: Mutex::new(U256::from(10u128.pow(18))),
            broadcast_errors: Mutex::new(VecDeque::new()),
            receipt_mode: Mutex::new(ReceiptMode::Success),
        }
    }
}

impl MockGateway {
    pub fn set_native_balance(&self, balance: U256) {
        *self.native_balance.lock().unwrap() = balance;
    }

    /// Queue a rejection for the next broadcast call
    pub fn push_broadcast_error(&self, error: ChainError) {
        self.broadcast_errors.lock().unwrap().push_back(error);
    }

    pub fn set_receipt_mode(&self, mode: ReceiptMode) {
        *self.receipt_mode.lock().unwrap() = mode;
    }

    fn enter_window(&self) {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
    }

    fn exit_window(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn estimate_gas(&self, _draft: &TransactionRequest) -> Result<u64, ChainError> {
        if self.fail_estimation.load(Ordering::SeqCst) {
            Err(ChainError::Estimation("execution reverted".into()))
        } else {
            Ok(100_000)
        }
    }

    async fn fee_market(&self) -> Result<FeeMarket, ChainError> {
        Ok(FeeMarket {
            base_fee: Some(15 * GWEI),
        })
    }

    async fn pending_nonce(&self, _account: Address) -> Result<u64, ChainError> {
        self.nonce_queries.fetch_add(1, Ordering::SeqCst);
        self.enter_window();
        Ok(self.nonce.load(Ordering::SeqCst))
    }

    async fn native_balance(&self, _account: Address) -> Result<U256, ChainError> {
        Ok(*self.native_balance.lock().unwrap())
    }

    async fn broadcast(&self, raw: Vec<u8>) -> Result<TxHash, ChainError> {
        self.broadcast_count.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.broadcast_errors.lock().unwrap().pop_front() {
            // Any rejection other than underpriced aborts the attempt and
            // frees the nonce; underpriced keeps the window open for the
            // single re-plan with the same nonce.
            if !matches!(error, ChainError::Underpriced(_)) {
                self.exit_window();
            }
            return Err(error);
        }

        self.nonce.fetch_add(1, Ordering::SeqCst);
        Ok(keccak256(&raw))
    }

    async fn receipt(&self, tx_hash: TxHash) -> Result<Option<ReceiptSummary>, ChainError> {
        let mode = *self.receipt_mode.lock().unwrap();
        match mode {
            ReceiptMode::Never => Ok(None),
            ReceiptMode::Success | ReceiptMode::Revert => {
                self.exit_window();
                Ok(Some(ReceiptSummary {
                    tx_hash,
                    block_number: Some(1_024),
                    gas_used: 90_000,
                    success: matches!(mode, ReceiptMode::Success),
                }))
            }
        }
    }
}
