//! # Repository Pattern Implementation
//!
//! Repository traits and their SQLite implementations.
//!
//! ## Architecture
//!
//! - Traits define the interface so services can be tested against fakes
//! - SQLite implementations use sqlx for async database access
//! - All operations return `Result<T>` for error handling
//!
//! ## Available Repositories
//!
//! - `MediaRepository` - Posts and reels with their like state
//! - `PendingActionRepository` - Outbox of undelivered like toggles

pub mod media;
pub mod pending_actions;

pub use media::{MediaRepository, SqliteMediaRepository};
pub use pending_actions::{PendingActionRepository, SqlitePendingActionRepository};
