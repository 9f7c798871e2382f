//! # Core Configuration Module
//!
//! Provides configuration management for the feed sync core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds every injected dependency and setting the core needs.
//! It enforces fail-fast validation so that a misconfigured host never gets a
//! half-working core.
//!
//! ## Required Dependencies
//!
//! - `HttpClient` - transport for the upstream API (desktop default: reqwest)
//! - `NetworkMonitor` - connectivity observer (desktop default: TCP probe)
//!
//! When the `desktop-shims` feature is enabled, the `bridge-desktop`
//! implementations are injected automatically if not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/path/to/feed.db")
//!     .api_base_url("https://api.example.com")
//!     .drain_interval(Duration::from_secs(30))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // Missing API base URL
//! let config = CoreConfig::builder()
//!     .database_path("/path/to/feed.db")
//!     .build()
//!     .expect("Should fail - missing API base URL");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{Clock, HttpClient, NetworkMonitor, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Database path understood as "keep everything in memory".
pub const IN_MEMORY_DATABASE: &str = ":memory:";

/// Default interval between periodic outbox drains.
pub const DEFAULT_DRAIN_INTERVAL: Duration = Duration::from_secs(60);

/// Default interval between connectivity probes.
pub const DEFAULT_NETWORK_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Default bound on a single upstream call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Outbox and background sync settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Interval of the periodic drain tick
    pub drain_interval: Duration,
    /// Interval at which the coordinator polls connectivity
    pub network_poll_interval: Duration,
    /// Failed deliveries after which a queued action is discarded.
    ///
    /// `None` keeps failed actions queued forever.
    pub max_action_retries: Option<u32>,
    /// Timeout applied to each upstream request
    pub request_timeout: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            drain_interval: DEFAULT_DRAIN_INTERVAL,
            network_poll_interval: DEFAULT_NETWORK_POLL_INTERVAL,
            max_action_retries: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Core configuration for the feed sync core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Path to the SQLite database file, or [`IN_MEMORY_DATABASE`]
    pub database_path: PathBuf,

    /// Base URL of the upstream feed API (or of a media proxy in front of it)
    pub api_base_url: String,

    /// HTTP client for upstream requests
    pub http_client: Arc<dyn HttpClient>,

    /// Connectivity observer
    pub network_monitor: Arc<dyn NetworkMonitor>,

    /// Time source for `updated_at` and queue ordering
    pub clock: Arc<dyn Clock>,

    /// Outbox and background sync settings
    pub sync: SyncSettings,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field("api_base_url", &self.api_base_url)
            .field("http_client", &"HttpClient { ... }")
            .field("network_monitor", &"NetworkMonitor { ... }")
            .field("clock", &"Clock { ... }")
            .field("sync", &self.sync)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Whether the database lives only in memory
    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY_DATABASE
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Database path is not empty
    /// - API base URL is an absolute http(s) URL
    /// - Intervals and timeouts are non-zero
    /// - A retry bound, when set, allows at least one attempt
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        let url = url::Url::parse(&self.api_base_url).map_err(|e| {
            Error::Config(format!(
                "API base URL '{}' is invalid: {}",
                self.api_base_url, e
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "API base URL must use http or https, got '{}'",
                url.scheme()
            )));
        }

        if self.sync.drain_interval.is_zero() {
            return Err(Error::Config(
                "Drain interval must be greater than zero".to_string(),
            ));
        }

        if self.sync.network_poll_interval.is_zero() {
            return Err(Error::Config(
                "Network poll interval must be greater than zero".to_string(),
            ));
        }

        if self.sync.request_timeout.is_zero() {
            return Err(Error::Config(
                "Request timeout must be greater than zero".to_string(),
            ));
        }

        if self.sync.max_action_retries == Some(0) {
            return Err(Error::Config(
                "max_action_retries must be at least 1; use None for unbounded retries"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required for upstream API calls. \
                 Desktop: enable the 'desktop-shims' feature to use ReqwestHttpClient. \
                 Mobile: inject the platform-native HTTP adapter."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn network_monitor_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "NetworkMonitor".to_string(),
        message: "NetworkMonitor implementation is required to route like toggles \
                 and wake the outbox drainer. \
                 Desktop: enable the 'desktop-shims' feature to use DesktopNetworkMonitor. \
                 Mobile: inject the platform reachability adapter."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::with_timeout(timeout)
        .map_err(|e| Error::Internal(format!("Failed to create default HttpClient: {}", e)))?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_network_monitor() -> Result<Arc<dyn NetworkMonitor>> {
    use bridge_desktop::DesktopNetworkMonitor;

    Ok(Arc::new(DesktopNetworkMonitor::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_network_monitor() -> Result<Arc<dyn NetworkMonitor>> {
    Err(network_monitor_missing_error())
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    api_base_url: Option<String>,
    http_client: Option<Arc<dyn HttpClient>>,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
    clock: Option<Arc<dyn Clock>>,
    sync: SyncSettings,
}

impl CoreConfigBuilder {
    /// Sets the database path.
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Keeps the local store in memory (tests, ephemeral sessions).
    pub fn in_memory_database(mut self) -> Self {
        self.database_path = Some(PathBuf::from(IN_MEMORY_DATABASE));
        self
    }

    /// Sets the base URL of the upstream feed API.
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Sets the HTTP client implementation.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the connectivity observer.
    pub fn network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.network_monitor = Some(monitor);
        self
    }

    /// Sets the time source. Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn drain_interval(mut self, interval: Duration) -> Self {
        self.sync.drain_interval = interval;
        self
    }

    pub fn network_poll_interval(mut self, interval: Duration) -> Self {
        self.sync.network_poll_interval = interval;
        self
    }

    /// Bounds delivery attempts per queued action. `None` retries forever.
    pub fn max_action_retries(mut self, retries: Option<u32>) -> Self {
        self.sync.max_action_retries = retries;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.sync.request_timeout = timeout;
        self
    }

    /// Replaces every sync setting at once.
    pub fn sync_settings(mut self, settings: SyncSettings) -> Self {
        self.sync = settings;
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Returns
    ///
    /// Returns `Ok(CoreConfig)` on success, or an error if:
    /// - Database path or API base URL are missing
    /// - A required bridge is missing and no desktop default is available
    /// - Configuration values are invalid
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;

        let api_base_url = self.api_base_url.ok_or_else(|| {
            Error::Config("API base URL is required. Use .api_base_url() to set it.".to_string())
        })?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(self.sync.request_timeout)?,
        };

        let network_monitor = match self.network_monitor {
            Some(monitor) => monitor,
            None => provide_default_network_monitor()?,
        };

        let config = CoreConfig {
            database_path,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            http_client,
            network_monitor,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            sync: self.sync,
        };

        config.validate()?;

        Ok(config)
    }
}
