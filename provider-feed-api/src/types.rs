//! Feed API wire types
//!
//! Field names match the upstream JSON exactly.

use serde::{Deserialize, Serialize};

/// One entry of `GET /user/feed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDto {
    pub post_id: String,
    pub user_name: String,
    pub user_image: String,
    pub post_image: String,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub liked_by_user: bool,
}

/// One entry of `GET /user/reels`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReelDto {
    pub reel_id: String,
    pub user_name: String,
    pub user_image: String,
    pub reel_video: String,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub liked_by_user: bool,
}

/// `GET /user/feed` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedResponse {
    pub feed: Vec<PostDto>,
}

/// `GET /user/reels` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReelsResponse {
    pub reels: Vec<ReelDto>,
}

/// Entity a like or dislike is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeTarget<'a> {
    Post(&'a str),
    Reel(&'a str),
}

/// Body of `POST /user/like` and `DELETE /user/dislike`
///
/// Exactly one of `post_id` or `reels_id` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeRequest {
    pub like: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reels_id: Option<String>,
}

impl LikeRequest {
    pub fn new(target: LikeTarget<'_>, like: bool) -> Self {
        let (post_id, reels_id) = match target {
            LikeTarget::Post(id) => (Some(id.to_string()), None),
            LikeTarget::Reel(id) => (None, Some(id.to_string())),
        };
        Self {
            like,
            post_id,
            reels_id,
        }
    }
}
