//! Domain models for the local feed store
//!
//! `MediaEntity` is the read model handed to the presentation layer. It is a
//! plain value: mutating it does nothing, all changes go through the
//! repositories and are announced on the event bus.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::LibraryError;

// =============================================================================
// ID Types
// =============================================================================

/// Unique identifier for a pending like action
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionId(String);

impl ActionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for ActionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Media Entities
// =============================================================================

/// Kind of likeable entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Post,
    Reel,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Post => "post",
            MediaKind::Reel => "reel",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "post" => Ok(MediaKind::Post),
            "reel" => Ok(MediaKind::Reel),
            other => Err(LibraryError::InvalidInput {
                field: "kind".to_string(),
                message: format!("unknown media kind '{}'", other),
            }),
        }
    }
}

/// Upstream snapshot of one entity, as written by a refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRecord {
    pub id: String,
    pub author_name: String,
    pub author_avatar_url: String,
    /// Post image or reel video URL
    pub media_url: String,
    pub like_count: u64,
    pub liked_by_user: bool,
}

impl MediaRecord {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("id cannot be empty".to_string());
        }
        Ok(())
    }
}

/// A post or reel as stored locally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaEntity {
    pub id: String,
    pub kind: MediaKind,
    pub author_name: String,
    pub author_avatar_url: String,
    pub media_url: String,
    /// Never negative; adjusted by exactly one with each flag flip
    pub like_count: u64,
    pub liked_by_user: bool,
    /// Index in the last upstream page
    pub feed_position: i64,
    /// Unix milliseconds of the last refresh or like toggle
    pub updated_at: i64,
}

impl MediaEntity {
    /// Every remote URL this entity references
    pub fn media_urls(&self) -> [&str; 2] {
        [&self.author_avatar_url, &self.media_url]
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct MediaRow {
    pub id: String,
    pub kind: String,
    pub author_name: String,
    pub author_avatar_url: String,
    pub media_url: String,
    pub like_count: i64,
    pub liked_by_user: bool,
    pub feed_position: i64,
    pub updated_at: i64,
}

impl TryFrom<MediaRow> for MediaEntity {
    type Error = LibraryError;

    fn try_from(row: MediaRow) -> Result<Self, Self::Error> {
        Ok(Self {
            kind: row.kind.parse()?,
            id: row.id,
            author_name: row.author_name,
            author_avatar_url: row.author_avatar_url,
            media_url: row.media_url,
            like_count: row.like_count.max(0) as u64,
            liked_by_user: row.liked_by_user,
            feed_position: row.feed_position,
            updated_at: row.updated_at,
        })
    }
}

// =============================================================================
// Outbox
// =============================================================================

/// A like toggle awaiting delivery to the upstream API
///
/// Target fields are optional because rows are read back from durable
/// storage that may contain malformed entries; such actions are discarded by
/// the drainer rather than retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PendingLikeAction {
    #[sqlx(try_from = "String")]
    pub id: ActionId,
    pub target_id: Option<String>,
    pub target_kind: Option<String>,
    pub desired_liked: bool,
    /// Unix milliseconds; drain order is ascending
    pub created_at: i64,
    /// Failed delivery attempts so far
    #[sqlx(try_from = "i64")]
    pub retry_count: u32,
}

impl PendingLikeAction {
    pub fn new(kind: MediaKind, target_id: impl Into<String>, desired_liked: bool, created_at: i64) -> Self {
        Self {
            id: ActionId::new(),
            target_id: Some(target_id.into()),
            target_kind: Some(kind.as_str().to_string()),
            desired_liked,
            created_at,
            retry_count: 0,
        }
    }

    /// Parsed target, or `None` when the stored row is structurally invalid
    pub fn target(&self) -> Option<(MediaKind, &str)> {
        let id = self.target_id.as_deref().filter(|id| !id.trim().is_empty())?;
        let kind = self.target_kind.as_deref()?.parse().ok()?;
        Some((kind, id))
    }
}
