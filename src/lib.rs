//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (`core-service` for the offline-tolerant client core and
//! `media-proxy` for the image caching proxy). Host applications can depend on
//! `feedsync-workspace` and enable the documented features without needing to
//! wire each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service;

#[cfg(feature = "proxy")]
pub use media_proxy;
