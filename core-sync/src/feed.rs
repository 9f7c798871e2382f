//! # Feed Repository
//!
//! Reads posts and reels for display. The Local Store is always the answer;
//! the network only refreshes it first when reachable.
//!
//! | Network | Fetch | Store | Result |
//! |---------|-------|-------|--------|
//! | offline | skipped | any | stored items |
//! | online | ok | any | upserted page, read back from the store |
//! | online | failed | non-empty | stored items + `refresh_error` |
//! | online | failed | empty | the fetch error |

use bridge_traits::{network::NetworkMonitor, time::Clock};
use core_library::{MediaEntity, MediaKind, MediaRecord, MediaRepository};
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
use provider_feed_api::{FeedApi, PostDto, ReelDto};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::{Result, SyncError};

/// Items to display plus the refresh failure, if one was tolerated
#[derive(Debug)]
pub struct FeedSnapshot {
    pub items: Vec<MediaEntity>,
    /// Set when the upstream refresh failed and cached items were served
    pub refresh_error: Option<SyncError>,
}

impl FeedSnapshot {
    pub fn is_stale(&self) -> bool {
        self.refresh_error.is_some()
    }
}

fn post_record(dto: PostDto) -> MediaRecord {
    MediaRecord {
        id: dto.post_id,
        author_name: dto.user_name,
        author_avatar_url: dto.user_image,
        media_url: dto.post_image,
        like_count: dto.like_count,
        liked_by_user: dto.liked_by_user,
    }
}

fn reel_record(dto: ReelDto) -> MediaRecord {
    MediaRecord {
        id: dto.reel_id,
        author_name: dto.user_name,
        author_avatar_url: dto.user_image,
        media_url: dto.reel_video,
        like_count: dto.like_count,
        liked_by_user: dto.liked_by_user,
    }
}

/// Store-first reads with an upstream refresh when online
pub struct FeedRepository {
    media: Arc<dyn MediaRepository>,
    api: Arc<dyn FeedApi>,
    network_monitor: Arc<dyn NetworkMonitor>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
}

impl FeedRepository {
    pub fn new(
        media: Arc<dyn MediaRepository>,
        api: Arc<dyn FeedApi>,
        network_monitor: Arc<dyn NetworkMonitor>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            media,
            api,
            network_monitor,
            clock,
            event_bus,
        }
    }

    pub async fn get_posts(&self) -> Result<FeedSnapshot> {
        self.load(MediaKind::Post).await
    }

    pub async fn get_reels(&self) -> Result<FeedSnapshot> {
        self.load(MediaKind::Reel).await
    }

    /// Stored items without touching the network
    pub async fn cached(&self, kind: MediaKind) -> Result<Vec<MediaEntity>> {
        Ok(self.media.list(kind).await?)
    }

    #[instrument(skip(self), fields(kind = %kind))]
    async fn load(&self, kind: MediaKind) -> Result<FeedSnapshot> {
        if !self.network_monitor.is_connected().await {
            info!("Offline, serving stored items");
            return Ok(FeedSnapshot {
                items: self.cached(kind).await?,
                refresh_error: None,
            });
        }

        match self.fetch(kind).await {
            Ok(records) => {
                let count = self
                    .media
                    .upsert_many(kind, &records, self.clock.unix_timestamp_millis())
                    .await?;

                let _ = self
                    .event_bus
                    .emit(CoreEvent::Library(LibraryEvent::FeedRefreshed {
                        kind: kind.to_string(),
                        count: count as u64,
                    }));

                Ok(FeedSnapshot {
                    items: self.cached(kind).await?,
                    refresh_error: None,
                })
            }
            Err(error) => {
                let items = self.cached(kind).await?;
                if items.is_empty() {
                    return Err(error);
                }

                warn!(error = %error, cached = items.len(), "Refresh failed, serving stored items");
                Ok(FeedSnapshot {
                    items,
                    refresh_error: Some(error),
                })
            }
        }
    }

    async fn fetch(&self, kind: MediaKind) -> Result<Vec<MediaRecord>> {
        let records = match kind {
            MediaKind::Post => self
                .api
                .fetch_feed()
                .await?
                .into_iter()
                .map(post_record)
                .collect(),
            MediaKind::Reel => self
                .api
                .fetch_reels()
                .await?
                .into_iter()
                .map(reel_record)
                .collect(),
        };
        Ok(records)
    }
}
