use alloy::primitives::U256;
use alloy::primitives::utils::format_units;
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use std::cmp::max;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{info, warn};

use crate::actions::{Action, Precondition};
use crate::contracts::{FungibleToken, RevenueCollector};
use crate::eth::ChainError;

/// Sweeps a collector's accumulated revenue once its token balance reaches
/// the distribution threshold. One instance per collector contract; every
/// check reads that collector's state fresh.
pub struct DistributeAction {
    id: String,
    collector: Arc<dyn RevenueCollector>,
    token: Arc<dyn FungibleToken>,
    interval: Duration,
    /// Optional configured minimum in raw token units; the effective
    /// threshold is the max of this and the on-chain minimum.
    override_min: Option<U256>,
    token_decimals: u8,
}

impl DistributeAction {
    pub fn new(
        name: &str,
        collector: Arc<dyn RevenueCollector>,
        token: Arc<dyn FungibleToken>,
        interval: Duration,
        override_min: Option<U256>,
        token_decimals: u8,
    ) -> Self {
        Self {
            id: format!("distribute:{}", name),
            collector,
            token,
            interval,
            override_min,
            token_decimals,
        }
    }

    fn display(&self, amount: U256) -> String {
        format_units(amount, self.token_decimals).unwrap_or_else(|_| amount.to_string())
    }
}

#[async_trait]
impl Action for DistributeAction {
    fn id(&self) -> &str {
        &self.id
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn check(&self) -> Result<Precondition, ChainError> {
        let balance = self.token.balance_of(self.collector.address()).await?;
        let on_chain_min = self.collector.min_balance_to_distribute().await?;
        let threshold = max(self.override_min.unwrap_or(U256::ZERO), on_chain_min);

        // Inclusive boundary: a balance of exactly the threshold is due
        if balance >= threshold {
            info!(
                "{}: collector balance {} reaches threshold {}",
                self.id,
                self.display(balance),
                self.display(threshold)
            );
            Ok(Precondition::Due)
        } else {
            Ok(Precondition::NotDue(format!(
                "collector balance {} below threshold {}",
                self.display(balance),
                self.display(threshold)
            )))
        }
    }

    fn build_call(&self) -> TransactionRequest {
        self.collector.distribute_call()
    }

    async fn report_after(&self) {
        match self.token.balance_of(self.collector.address()).await {
            Ok(balance) => info!(
                "{}: collector balance after distribution: {}",
                self.id,
                self.display(balance)
            ),
            Err(e) => warn!("{}: could not re-read collector balance: {}", self.id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::network::TransactionBuilder;
    use alloy::primitives::{address, Address};

    const COLLECTOR: Address = address!("066e4FBb1Cb2fd7dE4fb1432a7B1C1169B4c2C8F");

    struct FakeCollector {
        min_balance: U256,
    }

    #[async_trait]
    impl RevenueCollector for FakeCollector {
        fn address(&self) -> Address {
            COLLECTOR
        }
        async fn min_balance_to_distribute(&self) -> Result<U256, ChainError> {
            Ok(self.min_balance)
        }
        fn distribute_call(&self) -> TransactionRequest {
            TransactionRequest::default().with_to(COLLECTOR)
        }
    }

    struct FakeToken {
        balance: U256,
    }

    #[async_trait]
    impl FungibleToken for FakeToken {
        async fn balance_of(&self, _account: Address) -> Result<U256, ChainError> {
            Ok(self.balance)
        }
        async fn decimals(&self) -> Result<u8, ChainError> {
            Ok(6)
        }
    }

    fn action(balance: u64, on_chain_min: u64, override_min: Option<u64>) -> DistributeAction {
        DistributeAction::new(
            "compute",
            Arc::new(FakeCollector {
                min_balance: U256::from(on_chain_min),
            }),
            Arc::new(FakeToken {
                balance: U256::from(balance),
            }),
            Duration::from_secs(900),
            override_min.map(U256::from),
            6,
        )
    }

    #[tokio::test]
    async fn boundary_is_inclusive() {
        assert_eq!(
            action(50, 50, None).check().await.unwrap(),
            Precondition::Due
        );
        assert!(matches!(
            action(49, 50, None).check().await.unwrap(),
            Precondition::NotDue(_)
        ));
    }

    #[tokio::test]
    async fn override_dominates_via_max() {
        // override 100, on-chain 50: the effective threshold is 100
        assert!(matches!(
            action(80, 50, Some(100)).check().await.unwrap(),
            Precondition::NotDue(_)
        ));
        assert!(matches!(
            action(40, 50, Some(100)).check().await.unwrap(),
            Precondition::NotDue(_)
        ));
        assert_eq!(
            action(100, 50, Some(100)).check().await.unwrap(),
            Precondition::Due
        );
    }

    #[tokio::test]
    async fn unset_override_leaves_on_chain_minimum() {
        assert_eq!(
            action(60, 50, None).check().await.unwrap(),
            Precondition::Due
        );
        // an override below the on-chain minimum never weakens it
        assert!(matches!(
            action(40, 50, Some(10)).check().await.unwrap(),
            Precondition::NotDue(_)
        ));
    }

    #[tokio::test]
    async fn action_ids_name_the_collector() {
        assert_eq!(action(0, 0, None).id(), "distribute:compute");
    }
}
