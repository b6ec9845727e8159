use async_trait::async_trait;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::time::Duration;
use tracing::{info, warn};

use alloy::rpc::types::TransactionRequest;

use crate::actions::{Action, Precondition};
use crate::contracts::SnapshotVault;
use crate::eth::ChainError;

/// Takes a protocol snapshot once the on-chain minimum interval has elapsed.
/// Both the last snapshot time and the interval are read from the contract
/// on every check; only the "now" side of the comparison uses the local
/// clock.
pub struct SnapshotAction {
    vault: Arc<dyn SnapshotVault>,
    interval: Duration,
}

impl SnapshotAction {
    pub fn new(vault: Arc<dyn SnapshotVault>, interval: Duration) -> Self {
        Self { vault, interval }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[async_trait]
impl Action for SnapshotAction {
    fn id(&self) -> &str {
        "snapshot"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn check(&self) -> Result<Precondition, ChainError> {
        let last = self.vault.last_snapshot_time().await?;
        let min_interval = self.vault.min_snapshot_interval().await?;
        let elapsed = unix_now().saturating_sub(last);

        if elapsed >= min_interval {
            Ok(Precondition::Due)
        } else {
            Ok(Precondition::NotDue(format!(
                "snapshot interval not reached: {}s of {}s elapsed",
                elapsed, min_interval
            )))
        }
    }

    fn build_call(&self) -> TransactionRequest {
        self.vault.take_snapshot_call()
    }

    async fn report_after(&self) {
        match self.vault.last_snapshot_time().await {
            Ok(last) => info!("vault last snapshot time is now {}", last),
            Err(e) => warn!("could not re-read last snapshot time: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::network::TransactionBuilder;
    use alloy::primitives::Address;

    struct FakeVault {
        last: u64,
        min_interval: u64,
    }

    #[async_trait]
    impl SnapshotVault for FakeVault {
        fn address(&self) -> Address {
            Address::ZERO
        }
        async fn last_snapshot_time(&self) -> Result<u64, ChainError> {
            Ok(self.last)
        }
        async fn min_snapshot_interval(&self) -> Result<u64, ChainError> {
            Ok(self.min_interval)
        }
        fn take_snapshot_call(&self) -> TransactionRequest {
            TransactionRequest::default().with_to(Address::ZERO)
        }
    }

    fn action_with(last: u64, min_interval: u64) -> SnapshotAction {
        SnapshotAction::new(
            Arc::new(FakeVault { last, min_interval }),
            Duration::from_secs(1800),
        )
    }

    #[tokio::test]
    async fn not_due_before_interval_elapses() {
        // last snapshot 1700s ago, interval 1800s
        let action = action_with(unix_now() - 1700, 1800);
        assert!(matches!(
            action.check().await.unwrap(),
            Precondition::NotDue(_)
        ));
    }

    #[tokio::test]
    async fn due_at_exactly_the_interval() {
        let action = action_with(unix_now() - 1800, 1800);
        assert_eq!(action.check().await.unwrap(), Precondition::Due);
    }

    #[tokio::test]
    async fn due_long_after_the_interval() {
        let action = action_with(unix_now() - 86_400, 1800);
        assert_eq!(action.check().await.unwrap(), Precondition::Due);
    }

    #[tokio::test]
    async fn read_failure_propagates() {
        struct BrokenVault;

        #[async_trait]
        impl SnapshotVault for BrokenVault {
            fn address(&self) -> Address {
                Address::ZERO
            }
            async fn last_snapshot_time(&self) -> Result<u64, ChainError> {
                Err(ChainError::Transient("connection reset".into()))
            }
            async fn min_snapshot_interval(&self) -> Result<u64, ChainError> {
                Ok(1800)
            }
            fn take_snapshot_call(&self) -> TransactionRequest {
                TransactionRequest::default()
            }
        }

        let action = SnapshotAction::new(Arc::new(BrokenVault), Duration::from_secs(1800));
        assert!(action.check().await.is_err());
    }
}
