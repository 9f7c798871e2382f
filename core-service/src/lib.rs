//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, connectivity,
//! clock) into the feed sync core. Desktop apps typically enable the
//! `desktop-shims` feature, which lets [`CoreConfig`] fall back to the
//! `bridge-desktop` adapters for anything not injected.
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use core_service::CoreService;
//! use core_library::MediaKind;
//!
//! let config = CoreConfig::builder()
//!     .database_path("feed.db")
//!     .api_base_url("http://localhost:3000")
//!     .build()?;
//! let core = CoreService::new(config).await?;
//! core.start().await;
//!
//! let posts = core.get_posts().await?;
//! core.toggle_like(MediaKind::Post, &posts.items[0].id).await?;
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use core_library::{
    create_pool, DatabaseConfig, MediaEntity, MediaKind, PendingActionRepository,
    SqliteMediaRepository, SqlitePendingActionRepository,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{EventBus, EventStream, DEFAULT_EVENT_BUFFER_SIZE};
use core_sync::{
    ActionRepository, DrainOutcome, FeedRepository, FeedSnapshot, OutboxDrainer,
    SyncCoordinator, ToggleOutcome,
};
use provider_feed_api::FeedApiConnector;
use tracing::info;

/// Primary façade exposed to host applications.
///
/// Every component receives its collaborators through the constructor; there
/// is no global state. Cloning is cheap and shares the same core.
#[derive(Clone)]
pub struct CoreService {
    inner: Arc<Inner>,
}

struct Inner {
    actions: ActionRepository,
    feed: FeedRepository,
    outbox: Arc<SqlitePendingActionRepository>,
    coordinator: SyncCoordinator,
    event_bus: EventBus,
}

impl CoreService {
    /// Open the Local Store and wire every component from `config`.
    ///
    /// The background coordinator is not started; call [`CoreService::start`].
    pub async fn new(config: CoreConfig) -> Result<Self> {
        config.validate()?;

        let db_config = if config.is_in_memory() {
            DatabaseConfig::in_memory()
        } else {
            DatabaseConfig::new(&config.database_path)
        };
        let pool = create_pool(db_config).await?;

        let media = Arc::new(SqliteMediaRepository::new(pool.clone()));
        let outbox = Arc::new(SqlitePendingActionRepository::new(pool));
        let api = Arc::new(
            FeedApiConnector::new(config.http_client.clone(), config.api_base_url.clone())
                .with_timeout(config.sync.request_timeout),
        );
        let event_bus = EventBus::new(DEFAULT_EVENT_BUFFER_SIZE);

        let actions = ActionRepository::new(
            media.clone(),
            outbox.clone(),
            api.clone(),
            config.network_monitor.clone(),
            config.clock.clone(),
            event_bus.clone(),
        );
        let feed = FeedRepository::new(
            media,
            api.clone(),
            config.network_monitor.clone(),
            config.clock.clone(),
            event_bus.clone(),
        );
        let drainer = Arc::new(OutboxDrainer::new(
            outbox.clone(),
            api,
            event_bus.clone(),
            config.sync.max_action_retries,
        ));
        let coordinator = SyncCoordinator::new(
            drainer,
            config.network_monitor.clone(),
            event_bus.clone(),
            config.sync,
        );

        info!(api = %config.api_base_url, "Core service initialized");

        Ok(Self {
            inner: Arc::new(Inner {
                actions,
                feed,
                outbox,
                coordinator,
                event_bus,
            }),
        })
    }

    /// Start background outbox delivery
    pub async fn start(&self) {
        self.inner.coordinator.start().await;
    }

    /// Stop background outbox delivery
    pub async fn shutdown(&self) {
        self.inner.coordinator.shutdown().await;
    }

    pub async fn get_posts(&self) -> Result<FeedSnapshot> {
        Ok(self.inner.feed.get_posts().await?)
    }

    pub async fn get_reels(&self) -> Result<FeedSnapshot> {
        Ok(self.inner.feed.get_reels().await?)
    }

    /// Stored items of a kind, without a refresh
    pub async fn cached(&self, kind: MediaKind) -> Result<Vec<MediaEntity>> {
        Ok(self.inner.feed.cached(kind).await?)
    }

    pub async fn toggle_like(&self, kind: MediaKind, id: &str) -> Result<ToggleOutcome> {
        Ok(self.inner.actions.toggle_like(kind, id).await?)
    }

    /// Deliver the outbox now instead of waiting for a trigger
    pub async fn drain_now(&self) -> Result<DrainOutcome> {
        Ok(self.inner.coordinator.drain_now().await?)
    }

    pub async fn pending_action_count(&self) -> Result<i64> {
        Ok(self.inner.outbox.count().await?)
    }

    /// Store mutations, outbox activity and connectivity changes
    pub fn subscribe_events(&self) -> EventStream {
        EventStream::new(self.inner.event_bus.subscribe())
    }
}
