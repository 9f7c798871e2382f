//! # Like Sync Module
//!
//! Keeps the Local Store and the upstream API in agreement about which posts
//! and reels the user likes, tolerating periods without connectivity.
//!
//! ## Overview
//!
//! - Optimistic like toggles with rollback on online failure
//! - Outbox fallback while offline
//! - Store-first feed reads with an upstream refresh when reachable
//! - Background delivery of the outbox on reconnect and on a timer
//!
//! ## Components
//!
//! - **Action Repository** (`actions`): The toggle-like protocol
//! - **Feed Repository** (`feed`): Refresh with cached fallback
//! - **Outbox Drainer** (`drainer`): Single-flight FIFO delivery of queued actions
//! - **Sync Coordinator** (`coordinator`): Background task that triggers drains

pub mod actions;
pub mod coordinator;
pub mod drainer;
pub mod error;
pub mod feed;

#[cfg(test)]
mod testing;

pub use actions::{ActionRepository, Delivery, ToggleOutcome};
pub use coordinator::SyncCoordinator;
pub use drainer::{DrainOutcome, DrainReport, OutboxDrainer};
pub use error::{Result, SyncError};
pub use feed::{FeedRepository, FeedSnapshot};
