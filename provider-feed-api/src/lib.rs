//! # Feed API Provider
//!
//! Client for the upstream social feed API.
//!
//! ## Overview
//!
//! This module provides:
//! - Feed and reels listing (`GET /user/feed`, `GET /user/reels`)
//! - Like and dislike delivery (`POST /user/like`, `DELETE /user/dislike`)
//! - Typed errors that separate transport, server and decode failures
//!
//! All I/O goes through an injected [`HttpClient`](bridge_traits::http::HttpClient).

pub mod connector;
pub mod error;
pub mod types;

pub use connector::{FeedApi, FeedApiConnector};
pub use error::{FeedApiError, Result};
pub use types::{FeedResponse, LikeRequest, LikeTarget, PostDto, ReelDto, ReelsResponse};
