//! # Local Store
//!
//! Owns the on-device database that is the single source of truth for what
//! the UI displays.
//!
//! ## Overview
//!
//! This crate manages:
//! - SQLite schema and migrations (`migrations/`)
//! - Media entities (posts and reels) with their like flag and counter
//! - The durable outbox of pending like actions
//!
//! Network responses only ever refresh or reconcile against this store;
//! nothing reads entity state from the network directly.

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use db::{create_pool, create_test_pool, DatabaseConfig};
pub use error::{LibraryError, Result};
pub use models::{ActionId, MediaEntity, MediaKind, MediaRecord, PendingLikeAction};
pub use repositories::{
    MediaRepository, PendingActionRepository, SqliteMediaRepository,
    SqlitePendingActionRepository,
};
