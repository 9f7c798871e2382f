//! Shared fakes for unit tests

use async_trait::async_trait;
use bridge_desktop::WatchNetworkChangeStream;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::network::{NetworkChangeStream, NetworkInfo, NetworkMonitor, NetworkType};
use bridge_traits::time::Clock;
use chrono::{DateTime, Utc};
use core_library::{
    create_test_pool, MediaKind, MediaRecord, MediaRepository, SqliteMediaRepository,
    SqlitePendingActionRepository,
};
use provider_feed_api::{FeedApi, FeedApiError, LikeTarget, PostDto, ReelDto};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

pub struct Store {
    pub media: Arc<SqliteMediaRepository>,
    pub outbox: Arc<SqlitePendingActionRepository>,
}

pub fn record(id: &str, like_count: u64, liked: bool) -> MediaRecord {
    MediaRecord {
        id: id.to_string(),
        author_name: format!("user-{}", id),
        author_avatar_url: format!("https://img.test/{}/avatar.png", id),
        media_url: format!("https://img.test/{}/media.jpg", id),
        like_count,
        liked_by_user: liked,
    }
}

pub fn post_dto(id: &str, like_count: u64, liked: bool) -> PostDto {
    PostDto {
        post_id: id.to_string(),
        user_name: format!("user-{}", id),
        user_image: format!("https://img.test/{}/avatar.png", id),
        post_image: format!("https://img.test/{}/media.jpg", id),
        like_count,
        liked_by_user: liked,
    }
}

/// Posts `p1 (10, unliked)`, `p2 (3, liked)` and reel `r1 (0, unliked)`
pub async fn seeded_store() -> Store {
    let pool = create_test_pool().await.unwrap();
    let media = Arc::new(SqliteMediaRepository::new(pool.clone()));
    let outbox = Arc::new(SqlitePendingActionRepository::new(pool));

    media
        .upsert_many(
            MediaKind::Post,
            &[record("p1", 10, false), record("p2", 3, true)],
            1,
        )
        .await
        .unwrap();
    media
        .upsert_many(MediaKind::Reel, &[record("r1", 0, false)], 1)
        .await
        .unwrap();

    Store { media, outbox }
}

/// Scriptable upstream API that records like/dislike deliveries
#[derive(Default)]
pub struct FakeFeedApi {
    posts: Vec<PostDto>,
    reels: Vec<ReelDto>,
    fail_fetch: bool,
    failing_targets: Mutex<HashSet<String>>,
    deliveries: Mutex<Vec<(String, bool)>>,
    delay: Option<Duration>,
}

impl FakeFeedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_posts(mut self, posts: Vec<PostDto>) -> Self {
        self.posts = posts;
        self
    }

    pub fn failing_fetch(mut self) -> Self {
        self.fail_fetch = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fail_delivery_for(self, id: &str) -> Self {
        self.failing_targets.lock().unwrap().insert(id.to_string());
        self
    }

    pub fn heal(&self, id: &str) {
        self.failing_targets.lock().unwrap().remove(id);
    }

    /// `(target id, liked)` for every delivery attempt, in order
    pub fn deliveries(&self) -> Vec<(String, bool)> {
        self.deliveries.lock().unwrap().clone()
    }

    async fn deliver(&self, target: LikeTarget<'_>, liked: bool) -> provider_feed_api::Result<()> {
        let id = match target {
            LikeTarget::Post(id) | LikeTarget::Reel(id) => id.to_string(),
        };
        self.deliveries.lock().unwrap().push((id.clone(), liked));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_targets.lock().unwrap().contains(&id) {
            return Err(FeedApiError::Api {
                status_code: 500,
                message: "upstream failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl FeedApi for FakeFeedApi {
    async fn fetch_feed(&self) -> provider_feed_api::Result<Vec<PostDto>> {
        if self.fail_fetch {
            return Err(FeedApiError::ParseError("unexpected body".to_string()));
        }
        Ok(self.posts.clone())
    }

    async fn fetch_reels(&self) -> provider_feed_api::Result<Vec<ReelDto>> {
        if self.fail_fetch {
            return Err(FeedApiError::Network("connection reset".to_string()));
        }
        Ok(self.reels.clone())
    }

    async fn like(&self, target: LikeTarget<'_>) -> provider_feed_api::Result<()> {
        self.deliver(target, true).await
    }

    async fn dislike(&self, target: LikeTarget<'_>) -> provider_feed_api::Result<()> {
        self.deliver(target, false).await
    }
}

/// Connectivity that tests flip by hand
pub struct StaticMonitor {
    connected: AtomicBool,
    state: watch::Sender<NetworkInfo>,
}

impl StaticMonitor {
    pub fn new(connected: bool) -> Self {
        let (state, _) = watch::channel(Self::info(connected));
        Self {
            connected: AtomicBool::new(connected),
            state,
        }
    }

    fn info(connected: bool) -> NetworkInfo {
        if connected {
            NetworkInfo::connected(Some(NetworkType::WiFi))
        } else {
            NetworkInfo::disconnected()
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
        self.state.send_replace(Self::info(connected));
    }
}

#[async_trait]
impl NetworkMonitor for StaticMonitor {
    async fn get_network_info(&self) -> BridgeResult<NetworkInfo> {
        Ok(Self::info(self.connected.load(Ordering::SeqCst)))
    }

    async fn subscribe_changes(&self) -> BridgeResult<Box<dyn NetworkChangeStream>> {
        Ok(Box::new(WatchNetworkChangeStream::new(self.state.subscribe())))
    }
}

/// Clock that advances one millisecond per reading
pub struct TestClock {
    millis: AtomicI64,
}

impl Default for TestClock {
    fn default() -> Self {
        Self {
            millis: AtomicI64::new(1_700_000_000_000),
        }
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        let millis = self.millis.fetch_add(1, Ordering::SeqCst);
        DateTime::from_timestamp_millis(millis).unwrap_or_default()
    }
}
