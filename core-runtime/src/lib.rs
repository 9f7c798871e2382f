//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the feed sync core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that other modules depend on.
//! It establishes the logging conventions, configuration validation and the
//! broadcast channel used to notify readers about store mutations and
//! outbox activity.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
