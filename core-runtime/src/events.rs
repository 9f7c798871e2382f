//! # Event Bus System
//!
//! Provides an event-driven notification channel for the feed sync core using
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The local store is the single source of truth for what the UI shows. Rather
//! than binding views to persistence objects, the core emits an explicit
//! mutation notification on this bus whenever stored state changes; readers
//! then re-query the store.
//!
//! ```text
//! ┌──────────────────┐   emit    ┌───────────┐   subscribe   ┌────────────┐
//! │ Action repository├─────────>│           ├──────────────>│ UI / view  │
//! └──────────────────┘          │ EventBus  │               │   model    │
//! ┌──────────────────┐   emit    │ (broadcast│               └────────────┘
//! │  Outbox drainer  ├─────────>│  channel) │   subscribe   ┌────────────┐
//! └──────────────────┘          │           ├──────────────>│ Diagnostics│
//! ┌──────────────────┐   emit    │           │               └────────────┘
//! │ Sync coordinator ├─────────>│           │
//! └──────────────────┘          └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Library(LibraryEvent::LikeChanged {
//!         kind: "post".to_string(),
//!         target_id: "p1".to_string(),
//!         liked: true,
//!         like_count: 11,
//!         rolled_back: false,
//!     }))
//!     .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert!(matches!(event, CoreEvent::Library(_)));
//! # }
//! ```
//!
//! ## Event Types
//!
//! ### Library Events
//! - `FeedRefreshed`: a page of posts or reels was upserted from upstream
//! - `LikeChanged`: a like flag and counter changed (optimistic apply or rollback)
//!
//! ### Sync Events
//! - `ActionQueued`: a like toggle was stored in the outbox while offline
//! - `DrainStarted` / `DrainCompleted`: one pass over the outbox
//! - `ActionDelivered` / `ActionFailed` / `ActionDiscarded`: per-action outcome
//!
//! ### Network Events
//! - `Connected` / `Disconnected`: connectivity transitions seen by the coordinator

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast::{self, error::RecvError, error::SendError};

pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Local store mutations
    Library(LibraryEvent),
    /// Outbox and drain activity
    Sync(SyncEvent),
    /// Connectivity transitions
    Network(NetworkEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Library(e) => e.description(),
            CoreEvent::Sync(e) => e.description(),
            CoreEvent::Network(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Library(LibraryEvent::LikeChanged {
                rolled_back: true, ..
            }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::ActionFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::ActionDiscarded { .. }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::DrainCompleted { .. }) => EventSeverity::Info,
            CoreEvent::Network(_) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Library Events
// ============================================================================

/// Events describing changes to locally stored media entities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    /// A page of entities was refreshed from upstream.
    FeedRefreshed {
        /// Entity kind (`post` or `reel`).
        kind: String,
        /// Number of entities upserted.
        count: u64,
    },
    /// The like state of an entity changed.
    LikeChanged {
        /// Entity kind (`post` or `reel`).
        kind: String,
        /// Entity identifier.
        target_id: String,
        /// Stored liked flag after the change.
        liked: bool,
        /// Stored like counter after the change.
        like_count: u64,
        /// Whether this change undid a failed optimistic update.
        rolled_back: bool,
    },
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::FeedRefreshed { .. } => "Feed refreshed from upstream",
            LibraryEvent::LikeChanged {
                rolled_back: true, ..
            } => "Like change rolled back",
            LibraryEvent::LikeChanged { .. } => "Like state changed",
        }
    }
}

// ============================================================================
// Sync Events
// ============================================================================

/// Events related to the pending-action outbox.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// A like toggle was queued for later delivery.
    ActionQueued {
        /// Outbox entry identifier.
        action_id: String,
        /// Target entity identifier.
        target_id: String,
        /// Target kind (`post` or `reel`).
        kind: String,
        /// Desired liked state to deliver.
        desired_liked: bool,
    },
    /// A drain pass started.
    DrainStarted {
        /// Identifier of this drain pass.
        drain_id: String,
        /// Number of actions in the outbox when the pass started.
        pending: u64,
    },
    /// A queued action was delivered and removed.
    ActionDelivered {
        /// Outbox entry identifier.
        action_id: String,
    },
    /// Delivery failed; the action stays queued.
    ActionFailed {
        /// Outbox entry identifier.
        action_id: String,
        /// Human-readable error message.
        message: String,
        /// Failed deliveries so far, including this one.
        retry_count: u32,
    },
    /// A queued action was dropped without delivery.
    ActionDiscarded {
        /// Outbox entry identifier.
        action_id: String,
        /// Why the action was dropped.
        reason: String,
    },
    /// A drain pass finished.
    DrainCompleted {
        /// Identifier of this drain pass.
        drain_id: String,
        /// Actions delivered and removed.
        delivered: u64,
        /// Actions left queued after a failed delivery.
        failed: u64,
        /// Actions dropped as invalid or over the retry bound.
        discarded: u64,
        /// Wall time of the pass in milliseconds.
        duration_ms: u64,
    },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::ActionQueued { .. } => "Like action queued for delivery",
            SyncEvent::DrainStarted { .. } => "Outbox drain started",
            SyncEvent::ActionDelivered { .. } => "Queued action delivered",
            SyncEvent::ActionFailed { .. } => "Queued action delivery failed",
            SyncEvent::ActionDiscarded { .. } => "Queued action discarded",
            SyncEvent::DrainCompleted { .. } => "Outbox drain completed",
        }
    }
}

// ============================================================================
// Network Events
// ============================================================================

/// Connectivity transitions observed by the sync coordinator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum NetworkEvent {
    Connected,
    Disconnected,
}

impl NetworkEvent {
    fn description(&self) -> &str {
        match self {
            NetworkEvent::Connected => "Network reachable",
            NetworkEvent::Disconnected => "Network unreachable",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to core events.
///
/// Cloning the bus is cheap; all clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let likes = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Library(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
