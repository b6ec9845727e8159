use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Notify};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::actions::{Action, TickOutcome};
use crate::executor::ActionExecutor;

/// Owns one periodic trigger per action and the single serialized executor
/// slot they all funnel into.
///
/// A trigger firing only *requests* an evaluation. Requests queue in a
/// depth-1 coalescing slot per action: a tick that lands while a previous
/// request is still pending is dropped, so a slow execution never piles up
/// duplicate work for the same action.
pub struct Scheduler {
    actions: Vec<Arc<dyn Action>>,
    executor: Arc<ActionExecutor>,
    pending: Arc<Vec<AtomicBool>>,
    wakeup: Arc<Notify>,
}

impl Scheduler {
    pub fn new(actions: Vec<Arc<dyn Action>>, executor: Arc<ActionExecutor>) -> Self {
        let pending = Arc::new(
            actions
                .iter()
                .map(|_| AtomicBool::new(false))
                .collect::<Vec<_>>(),
        );
        Self {
            actions,
            executor,
            pending,
            wakeup: Arc::new(Notify::new()),
        }
    }

    /// Run every action once, in order, on the same code path the timers
    /// use. Called at process startup before entering periodic mode.
    pub async fn run_all_once(&self) -> Vec<(String, TickOutcome)> {
        let mut results = Vec::with_capacity(self.actions.len());
        for idx in 0..self.actions.len() {
            results.push(self.run_action(idx).await);
        }
        results
    }

    async fn run_action(&self, idx: usize) -> (String, TickOutcome) {
        let action = &self.actions[idx];
        let outcome = self.executor.execute(action.as_ref()).await;
        match &outcome {
            TickOutcome::Succeeded(summary) => {
                info!("{}: succeeded ({})", action.id(), summary.tx_hash)
            }
            TickOutcome::Skipped(reason) => debug!("{}: skipped: {}", action.id(), reason),
            TickOutcome::Blocked(reason) => warn!("{}: blocked: {}", action.id(), reason),
            TickOutcome::Reverted(summary) => {
                warn!("{}: reverted ({})", action.id(), summary.tx_hash)
            }
            TickOutcome::TimedOut(tx_hash) => warn!(
                "{}: confirmation timed out, outcome unknown ({})",
                action.id(),
                tx_hash
            ),
            TickOutcome::Failed(e) => error!("{}: failed: {}", action.id(), e),
        }
        (action.id().to_string(), outcome)
    }

    /// Periodic mode. Returns once `shutdown` observes `true`; no new
    /// evaluations start after that, and an in-flight action finishes its
    /// confirmation wait (or times out) first.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut timers = Vec::with_capacity(self.actions.len());
        for (idx, action) in self.actions.iter().enumerate() {
            let pending = self.pending.clone();
            let wakeup = self.wakeup.clone();
            let mut shutdown_rx = shutdown.clone();
            let period = action.interval();
            let id = action.id().to_string();

            timers.push(tokio::spawn(async move {
                let mut ticker = interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // the startup run covers the immediate first tick
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            if pending[idx].swap(true, Ordering::SeqCst) {
                                debug!("{}: trigger coalesced, evaluation already queued", id);
                            }
                            wakeup.notify_one();
                        }
                        _ = shutdown_rx.changed() => break,
                    }
                }
            }));
        }

        loop {
            let mut ran_any = false;
            for idx in 0..self.actions.len() {
                if *shutdown.borrow() {
                    break;
                }
                if self.pending[idx].swap(false, Ordering::SeqCst) {
                    ran_any = true;
                    self.run_action(idx).await;
                }
            }
            if *shutdown.borrow() {
                break;
            }
            if !ran_any {
                tokio::select! {
                    _ = self.wakeup.notified() => {}
                    _ = shutdown.changed() => break,
                }
            }
        }

        for timer in timers {
            timer.abort();
        }
        info!("scheduler stopped");
    }
}
