//! # Host Bridge Traits
//!
//! Capability traits that the feed sync core consumes but does not implement.
//!
//! ## Overview
//!
//! The client core never talks to sockets, clocks or the operating system
//! directly. Every such dependency is expressed as a trait here and injected at
//! construction time, so tests can substitute fakes and hosts can provide
//! native adapters.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Async HTTP transport with retry policy and timeouts
//! - [`NetworkMonitor`](network::NetworkMonitor) - Connectivity observer (polled accessor plus change stream)
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Implementations
//!
//! | Platform | Implementation Crate |
//! |----------|---------------------|
//! | Desktop / server | `bridge-desktop` |
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is
//! missing:
//!
//! ```ignore
//! let http_client = config.http_client
//!     .ok_or_else(|| Error::CapabilityMissing {
//!         capability: "HttpClient".to_string(),
//!         message: "No HTTP client implementation provided".to_string(),
//!     })?;
//! ```
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so they can be shared across tokio
//! tasks behind an `Arc`.

pub mod error;
pub mod http;
pub mod network;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use network::{NetworkChangeStream, NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType};
pub use time::{Clock, LogLevel, SystemClock};
