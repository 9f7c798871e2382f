//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop and server hosts
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`, with bounded timeouts, retry with
//!   exponential backoff and optionally relaxed TLS verification
//! - `NetworkMonitor` using a TCP reachability probe whose results are
//!   published on a `tokio::sync::watch` channel
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{DesktopNetworkMonitor, ReqwestHttpClient};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let http_client = Arc::new(ReqwestHttpClient::new()?);
//!     let monitor = Arc::new(DesktopNetworkMonitor::new());
//!     // Use in core configuration
//!     Ok(())
//! }
//! ```

mod http;
mod network;

pub use http::{ReqwestHttpClient, ReqwestHttpClientBuilder};
pub use network::{DesktopNetworkMonitor, WatchNetworkChangeStream};
