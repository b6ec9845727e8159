use alloy::{
    eips::Encodable2718,
    primitives::{utils::format_ether, Address, TxHash, U256},
    rpc::types::TransactionRequest,
    network::TransactionBuilder,
    signers::local::PrivateKeySigner,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

use crate::actions::{Action, Precondition, TickOutcome};
use crate::eth::{ChainError, Confirmation, Gateway, TxnBuilder};
use crate::fees::{FeePlan, FeeStrategy};

/// The single administrative key controlling the keeper account.
///
/// Owned behind a mutex whose guard spans nonce fetch through confirmation:
/// nonce correctness covers that whole window, so locking only around
/// signing would not be enough.
pub struct SigningIdentity {
    signer: PrivateKeySigner,
}

impl SigningIdentity {
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self { signer }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }
}

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub confirm_timeout: Duration,
    pub receipt_poll_interval: Duration,
    /// Pause between confirmation and the reporting re-read; the node may
    /// serve slightly stale state right after inclusion.
    pub settle_delay: Duration,
    /// Block-explorer URL prefix for human-readable transaction links
    pub explorer_url: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            confirm_timeout: Duration::from_secs(180),
            receipt_poll_interval: Duration::from_secs(3),
            settle_delay: Duration::from_secs(5),
            explorer_url: String::new(),
        }
    }
}

/// Orchestrates one action tick: evaluate, build, estimate, plan fees, sign,
/// broadcast, confirm. Every recoverable-vs-terminal decision is an explicit
/// branch on the error kind.
pub struct ActionExecutor {
    gateway: Arc<dyn Gateway>,
    identity: Arc<Mutex<SigningIdentity>>,
    fee_strategy: FeeStrategy,
    chain_id: u64,
    config: ExecutorConfig,
}

impl ActionExecutor {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        identity: Arc<Mutex<SigningIdentity>>,
        fee_strategy: FeeStrategy,
        chain_id: u64,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            gateway,
            identity,
            fee_strategy,
            chain_id,
            config,
        }
    }

    /// Run one tick of the action and classify the outcome.
    pub async fn execute(&self, action: &dyn Action) -> TickOutcome {
        match self.run(action).await {
            Ok(outcome) => outcome,
            Err(ChainError::InsufficientFunds(msg)) => TickOutcome::Blocked(msg),
            Err(ChainError::NonceConflict(msg)) => {
                // Another signer on this key breaks the serialization
                // invariant. Never retried blindly: bumping the nonce could
                // duplicate an effect.
                error!(
                    "{}: nonce conflict, is another process sharing the key? {}",
                    action.id(),
                    msg
                );
                TickOutcome::Failed(format!("nonce conflict: {}", msg))
            }
            Err(e) => TickOutcome::Failed(e.to_string()),
        }
    }

    async fn run(&self, action: &dyn Action) -> Result<TickOutcome, ChainError> {
        match action.check().await? {
            Precondition::Due => {}
            Precondition::NotDue(reason) => {
                debug!("{}: not due: {}", action.id(), reason);
                return Ok(TickOutcome::Skipped(reason));
            }
            Precondition::Blocked(reason) => {
                warn!("{}: blocked: {}", action.id(), reason);
                return Ok(TickOutcome::Blocked(reason));
            }
        }

        let identity = self.identity.lock().await;
        let from = identity.address();
        let draft = action
            .build_call()
            .with_from(from)
            .with_chain_id(self.chain_id);

        let estimate = match self.gateway.estimate_gas(&draft).await {
            Ok(units) => {
                debug!("{}: estimated gas {}", action.id(), units);
                Some(units)
            }
            // Simulation failures are common on congested nodes even for
            // valid calls; fall back rather than abort.
            Err(ChainError::Estimation(msg)) => {
                warn!(
                    "{}: gas estimation failed, using fallback limit: {}",
                    action.id(),
                    msg
                );
                None
            }
            Err(e) => return Err(e),
        };

        let market = self.gateway.fee_market().await?;
        let plan = self.fee_strategy.plan(market, estimate);
        if plan.estimate_degraded {
            warn!(
                "{}: fee plan running with degraded confidence, gas limit {}",
                action.id(),
                plan.gas_limit
            );
        }

        // Funds gate before any broadcast: a failed broadcast with gas
        // partially consumed is not recoverable mid-flight.
        let native = self.gateway.native_balance(from).await?;
        let required = U256::from(plan.max_cost());
        if native < required {
            return Ok(TickOutcome::Blocked(format!(
                "insufficient native balance for gas: required {}, available {}",
                format_ether(required),
                format_ether(native)
            )));
        }

        let nonce = self.gateway.pending_nonce(from).await?;
        let tx_hash = match self
            .sign_and_broadcast(&identity, &draft, &plan, nonce)
            .await
        {
            Ok(hash) => hash,
            Err(ChainError::Underpriced(msg)) => {
                // Nothing was accepted, so the nonce is still free: one
                // re-plan from a fresh market snapshot, same nonce. Bounded
                // to a single retry so fees cannot escalate unboundedly.
                warn!(
                    "{}: broadcast underpriced, re-planning once: {}",
                    action.id(),
                    msg
                );
                let market = self.gateway.fee_market().await?;
                let replanned = self.fee_strategy.plan(market, estimate);
                self.sign_and_broadcast(&identity, &draft, &replanned, nonce)
                    .await?
            }
            Err(e) => return Err(e),
        };

        info!(
            "{} transaction sent (nonce {}): {}{}",
            action.id(),
            nonce,
            self.config.explorer_url,
            tx_hash
        );

        let confirmation = self
            .gateway
            .await_receipt(
                tx_hash,
                self.config.confirm_timeout,
                self.config.receipt_poll_interval,
            )
            .await?;
        drop(identity);

        match confirmation {
            Confirmation::Confirmed(summary) => {
                info!(
                    "{} confirmed in block {:?}, gas used {}",
                    action.id(),
                    summary.block_number,
                    summary.gas_used
                );
                tokio::time::sleep(self.config.settle_delay).await;
                action.report_after().await;
                Ok(TickOutcome::Succeeded(summary))
            }
            Confirmation::Reverted(summary) => {
                // A revert usually means a precondition changed between
                // evaluation and inclusion. Terminal for this tick; the next
                // tick re-evaluates from scratch.
                warn!(
                    "{} reverted on-chain: {}{}",
                    action.id(),
                    self.config.explorer_url,
                    summary.tx_hash
                );
                Ok(TickOutcome::Reverted(summary))
            }
            Confirmation::TimedOut => {
                // The transaction may still confirm later; resubmitting with
                // this nonce could double the effect. Surface the unknown
                // outcome and let the next tick re-evaluate fresh state.
                warn!(
                    "{} confirmation timed out, outcome unknown: {}{}",
                    action.id(),
                    self.config.explorer_url,
                    tx_hash
                );
                Ok(TickOutcome::TimedOut(tx_hash))
            }
        }
    }

    async fn sign_and_broadcast(
        &self,
        identity: &SigningIdentity,
        draft: &TransactionRequest,
        plan: &FeePlan,
        nonce: u64,
    ) -> Result<TxHash, ChainError> {
        let request = draft
            .clone()
            .with_nonce(nonce)
            .with_gas_limit(plan.gas_limit)
            .with_max_fee_per_gas(plan.max_fee_per_gas)
            .with_max_priority_fee_per_gas(plan.priority_fee_per_gas);

        let envelope = TxnBuilder::build_and_sign_transaction(request, identity.signer())
            .map_err(|e| ChainError::Build(e.to_string()))?;

        self.gateway.broadcast(envelope.encoded_2718()).await
    }
}
