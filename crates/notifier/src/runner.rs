//! Interval loop around the overdue dispatch

use rentledger_common::{
    db::SharedStore,
    push::PushSender,
    services::notifications::{dispatch_overdue, DispatchSummary},
    Result,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

pub struct NotifierRunner {
    store: SharedStore,
    push: Arc<dyn PushSender>,
    link: String,
}

impl NotifierRunner {
    pub fn new(store: SharedStore, push: Arc<dyn PushSender>, link: String) -> Self {
        Self { store, push, link }
    }

    /// One dispatch over all users
    pub async fn run_once(&self) -> Result<DispatchSummary> {
        dispatch_overdue(self.store.as_ref(), self.push.as_ref(), &self.link).await
    }

    /// Dispatch every `period` until `shutdown` resolves. A failed run is
    /// logged and the next tick still fires.
    pub async fn run<F>(&self, period: Duration, run_on_start: bool, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let start = if run_on_start {
            Instant::now()
        } else {
            Instant::now() + period
        };
        let mut ticker = interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(summary) => info!(
                            message = %summary.message,
                            users = summary.users.len(),
                            messages_sent = summary.messages_sent,
                            tokens_pruned = summary.tokens_pruned,
                            failures = summary.failures,
                            "Dispatch run complete"
                        ),
                        Err(e) => error!(error = %e, "Dispatch run failed"),
                    }
                }
            }
        }
    }
}
