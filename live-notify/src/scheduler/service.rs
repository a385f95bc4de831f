//! Poll scheduler.
//!
//! A single loop checks every active room once, in registration order, then
//! sleeps for the configured interval. Cancellation is observed between
//! passes and during the sleep; an in-flight pass always runs to completion.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::monitor::CheckOutcome;
use crate::notification::NotificationDispatcher;
use crate::subscription::SubscriptionRegistry;

/// Default time between two passes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct PollSchedulerConfig {
    /// Sleep between the end of one pass and the start of the next.
    pub interval: Duration,
}

impl Default for PollSchedulerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Counters for one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub checked: usize,
    pub transitions: usize,
    pub failures: usize,
}

pub struct PollScheduler {
    registry: Arc<SubscriptionRegistry>,
    dispatcher: Arc<NotificationDispatcher>,
    config: PollSchedulerConfig,
    cancellation_token: CancellationToken,
}

impl PollScheduler {
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        dispatcher: Arc<NotificationDispatcher>,
        config: PollSchedulerConfig,
    ) -> Self {
        Self::with_cancellation(registry, dispatcher, config, CancellationToken::new())
    }

    pub fn with_cancellation(
        registry: Arc<SubscriptionRegistry>,
        dispatcher: Arc<NotificationDispatcher>,
        config: PollSchedulerConfig,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            config,
            cancellation_token,
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Request the loop to stop at the next pass boundary.
    pub fn stop(&self) {
        self.cancellation_token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// Check every active room once.
    ///
    /// A room dropped by an unsubscribe during the pass is still checked if it
    /// was part of the snapshot; its edges then find no subscribers.
    pub async fn run_pass(&self) -> PassReport {
        let rooms = self.registry.active_rooms().await;
        let mut report = PassReport::default();

        for (room_id, monitor) in rooms {
            report.checked += 1;
            // The monitor guard is dropped at the end of this statement, before dispatch.
            let outcome = monitor.lock().await.check_once().await;
            match outcome {
                CheckOutcome::Transition(event) => {
                    report.transitions += 1;
                    self.dispatcher.dispatch(&event).await;
                }
                CheckOutcome::NoChange => {}
                CheckOutcome::FetchFailed(e) => {
                    report.failures += 1;
                    debug!("Skipping room {} this pass: {}", room_id, e);
                }
            }
        }

        if report.failures > 0 {
            warn!(
                "Poll pass finished with {} of {} rooms failing",
                report.failures, report.checked
            );
        } else {
            debug!(
                "Poll pass finished: {} rooms, {} transitions",
                report.checked, report.transitions
            );
        }
        report
    }

    /// Run passes until cancelled.
    pub async fn run(self: Arc<Self>) {
        info!(
            "Poll scheduler started (interval {:?})",
            self.config.interval
        );

        loop {
            if self.cancellation_token.is_cancelled() {
                break;
            }

            self.run_pass().await;

            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                _ = self.cancellation_token.cancelled() => break,
            }
        }

        info!("Poll scheduler stopped");
    }

    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).run())
    }
}
