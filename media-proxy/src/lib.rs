//! # Media Cache Proxy
//!
//! An axum service that sits between the feed client and the upstream API.
//! Feed and reels responses have their media URLs replaced by content-addressed
//! copies in a disk cache; like/dislike calls pass through untouched.
//!
//! ```ignore
//! use media_proxy::{router, ProxyConfig, ProxyState};
//!
//! let state = ProxyState::from_config(&config, http_client).await?;
//! let listener = tokio::net::TcpListener::bind(config.listen_addr()).await?;
//! axum::serve(listener, router(state)).await?;
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod rewrite;
pub mod routes;
pub mod upstream;

pub use cache::{cache_key, CachedFile, MediaCache};
pub use config::ProxyConfig;
pub use error::{ProxyError, Result};
pub use routes::{router, ProxyState};
pub use upstream::Upstream;
