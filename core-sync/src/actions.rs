//! # Action Repository
//!
//! Implements the toggle-like protocol for a single post or reel:
//!
//! 1. Flip the liked flag and adjust the counter in the Local Store right away
//!    (optimistic update, visible to readers before any network I/O).
//! 2. If the network is reachable and nothing is queued for the entity,
//!    deliver the like/dislike. On failure undo the local change and surface
//!    the error.
//! 3. Otherwise append a `PendingLikeAction` to the outbox and keep the
//!    optimistic state. Queuing behind older actions for the same entity keeps
//!    the server seeing the user's intents in order.
//!
//! Every store mutation is announced with `LibraryEvent::LikeChanged` so
//! readers can refresh from the store.

use bridge_traits::{network::NetworkMonitor, time::Clock};
use core_library::{
    ActionId, MediaEntity, MediaKind, MediaRepository, PendingActionRepository,
    PendingLikeAction,
};
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent, SyncEvent};
use provider_feed_api::{FeedApi, LikeTarget};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::{Result, SyncError};

/// How a toggle reached (or will reach) the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Delivered online and acknowledged with a 2xx
    Confirmed,
    /// Stored in the outbox for the drainer
    Queued(ActionId),
    /// The stored state already changed under us; nothing was applied
    Unchanged,
}

/// Result of a successful `toggle_like`
#[derive(Debug, Clone)]
pub struct ToggleOutcome {
    /// Stored entity after the toggle
    pub entity: MediaEntity,
    pub delivery: Delivery,
}

pub(crate) fn like_target(kind: MediaKind, id: &str) -> LikeTarget<'_> {
    match kind {
        MediaKind::Post => LikeTarget::Post(id),
        MediaKind::Reel => LikeTarget::Reel(id),
    }
}

/// Optimistic like/unlike with rollback or outbox fallback
pub struct ActionRepository {
    media: Arc<dyn MediaRepository>,
    outbox: Arc<dyn PendingActionRepository>,
    api: Arc<dyn FeedApi>,
    network_monitor: Arc<dyn NetworkMonitor>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
}

impl ActionRepository {
    pub fn new(
        media: Arc<dyn MediaRepository>,
        outbox: Arc<dyn PendingActionRepository>,
        api: Arc<dyn FeedApi>,
        network_monitor: Arc<dyn NetworkMonitor>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            media,
            outbox,
            api,
            network_monitor,
            clock,
            event_bus,
        }
    }

    /// Toggle the like state of one post or reel
    ///
    /// # Returns
    ///
    /// The stored entity after the call together with how the change was
    /// delivered.
    ///
    /// # Errors
    ///
    /// - `SyncError::NotFound` if the entity is not in the Local Store
    /// - `SyncError::Network` / `SyncError::Server` if online delivery failed;
    ///   the local change has been rolled back
    /// - `SyncError::Library` on store failure
    #[instrument(skip(self), fields(kind = %kind))]
    pub async fn toggle_like(&self, kind: MediaKind, id: &str) -> Result<ToggleOutcome> {
        let current = self
            .media
            .find(kind, id)
            .await?
            .ok_or_else(|| SyncError::NotFound {
                kind: kind.to_string(),
                id: id.to_string(),
            })?;

        let desired = !current.liked_by_user;

        let Some(entity) = self
            .media
            .apply_like(kind, id, desired, self.clock.unix_timestamp_millis())
            .await?
        else {
            // A concurrent toggle flipped the flag between our read and write
            debug!("Toggle lost the race, leaving stored state as is");
            let entity = self.media.find(kind, id).await?.unwrap_or(current);
            return Ok(ToggleOutcome {
                entity,
                delivery: Delivery::Unchanged,
            });
        };
        self.emit_like_changed(&entity, false);

        if !self.network_monitor.is_connected().await {
            debug!("Offline, queueing");
            return self.enqueue(&current, entity).await;
        }
        match self.outbox.has_pending_for(kind, id).await {
            Ok(true) => {
                debug!("Older actions still queued for this entity");
                self.enqueue(&current, entity).await
            }
            Ok(false) => self.deliver_online(&current, entity).await,
            Err(e) => {
                warn!(error = %e, "Failed to read outbox, rolling back");
                self.rollback(&current, &entity).await?;
                Err(e.into())
            }
        }
    }

    async fn deliver_online(&self, before: &MediaEntity, entity: MediaEntity) -> Result<ToggleOutcome> {
        let desired = entity.liked_by_user;

        match self
            .api
            .set_liked(like_target(entity.kind, &entity.id), desired)
            .await
        {
            Ok(()) => {
                info!(liked = desired, "Like delivered");
                Ok(ToggleOutcome {
                    entity,
                    delivery: Delivery::Confirmed,
                })
            }
            Err(e) => {
                let error = SyncError::from(e);
                warn!(error = %error, "Like delivery failed, rolling back");
                self.rollback(before, &entity).await?;
                Err(error)
            }
        }
    }

    async fn enqueue(&self, before: &MediaEntity, entity: MediaEntity) -> Result<ToggleOutcome> {
        let action = PendingLikeAction::new(
            entity.kind,
            entity.id.clone(),
            entity.liked_by_user,
            self.clock.unix_timestamp_millis(),
        );

        if let Err(e) = self.outbox.enqueue(&action).await {
            warn!(error = %e, "Failed to queue like action, rolling back");
            self.rollback(before, &entity).await?;
            return Err(e.into());
        }

        info!(action_id = %action.id, liked = action.desired_liked, "Like queued");
        let _ = self.event_bus.emit(CoreEvent::Sync(SyncEvent::ActionQueued {
            action_id: action.id.to_string(),
            target_id: entity.id.clone(),
            kind: entity.kind.to_string(),
            desired_liked: action.desired_liked,
        }));

        Ok(ToggleOutcome {
            entity,
            delivery: Delivery::Queued(action.id),
        })
    }

    /// Undo the optimistic step, reversing exactly the counter change it made
    async fn rollback(&self, before: &MediaEntity, applied: &MediaEntity) -> Result<()> {
        let count_delta = before.like_count as i64 - applied.like_count as i64;

        match self
            .media
            .revert_like(
                applied.kind,
                &applied.id,
                before.liked_by_user,
                count_delta,
                self.clock.unix_timestamp_millis(),
            )
            .await?
        {
            Some(restored) => self.emit_like_changed(&restored, true),
            None => warn!(id = %applied.id, "Nothing to roll back, state already changed"),
        }
        Ok(())
    }

    fn emit_like_changed(&self, entity: &MediaEntity, rolled_back: bool) {
        let _ = self
            .event_bus
            .emit(CoreEvent::Library(LibraryEvent::LikeChanged {
                kind: entity.kind.to_string(),
                target_id: entity.id.clone(),
                liked: entity.liked_by_user,
                like_count: entity.like_count,
                rolled_back,
            }));
    }
}
