//! # Outbox Drainer
//!
//! Delivers queued like actions in FIFO order. One drain attempts every
//! queued action exactly once:
//!
//! - structurally invalid actions are discarded
//! - actions over the retry bound (when one is configured) are discarded
//! - delivered actions are removed
//! - failed actions get their retry count bumped and stay queued
//!
//! A failure never aborts the batch. Only one drain runs at a time; a drain
//! requested while another is running returns [`DrainOutcome::Skipped`].

use core_library::{PendingActionRepository, PendingLikeAction};
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use provider_feed_api::FeedApi;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::actions::like_target;
use crate::Result;

/// Counters for one drain pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub delivered: usize,
    pub failed: usize,
    pub discarded: usize,
}

impl DrainReport {
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed + self.discarded
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    Completed(DrainReport),
    /// Another drain was already running
    Skipped,
}

enum Step {
    Delivered,
    Failed,
    Discarded,
}

pub struct OutboxDrainer {
    outbox: Arc<dyn PendingActionRepository>,
    api: Arc<dyn FeedApi>,
    event_bus: EventBus,
    /// `None` retries forever
    max_retries: Option<u32>,
    in_flight: Mutex<()>,
}

impl OutboxDrainer {
    pub fn new(
        outbox: Arc<dyn PendingActionRepository>,
        api: Arc<dyn FeedApi>,
        event_bus: EventBus,
        max_retries: Option<u32>,
    ) -> Self {
        Self {
            outbox,
            api,
            event_bus,
            max_retries,
            in_flight: Mutex::new(()),
        }
    }

    /// Run one drain pass unless one is already running
    ///
    /// # Errors
    ///
    /// Only when the outbox cannot be read. Per-action failures are counted
    /// in the report.
    #[instrument(skip(self))]
    pub async fn drain(&self) -> Result<DrainOutcome> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!("Drain already running, skipping");
            return Ok(DrainOutcome::Skipped);
        };

        let started = Instant::now();
        let drain_id = Uuid::new_v4().to_string();
        let pending = self.outbox.list_pending().await?;

        if pending.is_empty() {
            debug!("Outbox empty");
            return Ok(DrainOutcome::Completed(DrainReport::default()));
        }

        info!(pending = pending.len(), "Draining outbox");
        self.emit(SyncEvent::DrainStarted {
            drain_id: drain_id.clone(),
            pending: pending.len() as u64,
        });

        let mut report = DrainReport::default();
        for action in pending {
            match self.process(&action).await {
                Step::Delivered => report.delivered += 1,
                Step::Failed => report.failed += 1,
                Step::Discarded => report.discarded += 1,
            }
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            delivered = report.delivered,
            failed = report.failed,
            discarded = report.discarded,
            duration_ms,
            "Drain completed"
        );
        self.emit(SyncEvent::DrainCompleted {
            drain_id,
            delivered: report.delivered as u64,
            failed: report.failed as u64,
            discarded: report.discarded as u64,
            duration_ms,
        });

        Ok(DrainOutcome::Completed(report))
    }

    async fn process(&self, action: &PendingLikeAction) -> Step {
        let Some((kind, target_id)) = action.target() else {
            return self.discard(action, "missing or invalid target").await;
        };

        if let Some(max) = self.max_retries {
            if action.retry_count >= max {
                warn!(
                    action_id = %action.id,
                    retry_count = action.retry_count,
                    "Retry limit reached, dropping action"
                );
                return self.discard(action, "retry limit reached").await;
            }
        }

        match self
            .api
            .set_liked(like_target(kind, target_id), action.desired_liked)
            .await
        {
            Ok(()) => match self.outbox.remove(&action.id).await {
                Ok(_) => {
                    debug!(action_id = %action.id, "Action delivered");
                    self.emit(SyncEvent::ActionDelivered {
                        action_id: action.id.to_string(),
                    });
                    Step::Delivered
                }
                Err(e) => {
                    // Delivered but still queued; the next drain re-sends it
                    error!(action_id = %action.id, error = %e, "Failed to remove delivered action");
                    Step::Failed
                }
            },
            Err(e) => {
                let retry_count = match self.outbox.record_failure(&action.id).await {
                    Ok(count) => count.unwrap_or(action.retry_count + 1),
                    Err(store_error) => {
                        error!(action_id = %action.id, error = %store_error, "Failed to record delivery failure");
                        action.retry_count + 1
                    }
                };
                warn!(action_id = %action.id, retry_count, error = %e, "Delivery failed, keeping action");
                self.emit(SyncEvent::ActionFailed {
                    action_id: action.id.to_string(),
                    message: e.to_string(),
                    retry_count,
                });
                Step::Failed
            }
        }
    }

    async fn discard(&self, action: &PendingLikeAction, reason: &str) -> Step {
        if let Err(e) = self.outbox.remove(&action.id).await {
            error!(action_id = %action.id, error = %e, "Failed to discard action");
            return Step::Failed;
        }

        warn!(action_id = %action.id, reason, "Action discarded");
        self.emit(SyncEvent::ActionDiscarded {
            action_id: action.id.to_string(),
            reason: reason.to_string(),
        });
        Step::Discarded
    }

    fn emit(&self, event: SyncEvent) {
        let _ = self.event_bus.emit(CoreEvent::Sync(event));
    }
}
