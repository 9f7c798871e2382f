//! Network Monitoring Abstraction
//!
//! Connectivity observer used by the client core to route like toggles
//! (network call vs. outbox) and to wake the outbox drainer.

use crate::error::Result;

/// Network connection type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkType {
    /// Cellular/mobile data connection
    Cellular,
    /// WiFi connection
    WiFi,
    /// Ethernet connection
    Ethernet,
    /// Other or unknown connection type
    Other,
}

/// Network connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    /// Connected to network
    Connected,
    /// Not connected to any network
    Disconnected,
    /// Connection status unknown or indeterminate
    Indeterminate,
}

/// Network information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    pub status: NetworkStatus,
    pub network_type: Option<NetworkType>,
    /// Whether the connection is metered (has data limits/costs)
    pub is_metered: bool,
}

impl NetworkInfo {
    pub fn connected(network_type: Option<NetworkType>) -> Self {
        Self {
            status: NetworkStatus::Connected,
            network_type,
            is_metered: false,
        }
    }

    pub fn disconnected() -> Self {
        Self {
            status: NetworkStatus::Disconnected,
            network_type: None,
            is_metered: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == NetworkStatus::Connected
    }
}

/// Network monitor trait
///
/// Exposes reachability two ways:
/// - a polled accessor ([`is_connected`](NetworkMonitor::is_connected)) used at
///   decision points such as a like toggle
/// - a change stream ([`subscribe_changes`](NetworkMonitor::subscribe_changes))
///   used by background consumers
///
/// Change streams may deliver the same status more than once in a row, e.g.
/// after a brief flap is coalesced. Consumers must treat a repeated
/// `Connected` as an idempotent trigger.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::network::NetworkMonitor;
///
/// async fn should_call_remote(monitor: &dyn NetworkMonitor) -> bool {
///     monitor.is_connected().await
/// }
/// ```
#[async_trait::async_trait]
pub trait NetworkMonitor: Send + Sync {
    /// Get current network information
    async fn get_network_info(&self) -> Result<NetworkInfo>;

    /// Check if currently connected to any network
    async fn is_connected(&self) -> bool {
        matches!(
            self.get_network_info().await,
            Ok(NetworkInfo {
                status: NetworkStatus::Connected,
                ..
            })
        )
    }

    /// Subscribe to network status changes
    ///
    /// The returned stream yields the current status first and then every
    /// subsequent update.
    async fn subscribe_changes(&self) -> Result<Box<dyn NetworkChangeStream>>;
}

/// Stream of network status changes
#[async_trait::async_trait]
pub trait NetworkChangeStream: Send {
    /// Get the next network info update
    ///
    /// Returns `None` when the stream is closed.
    async fn next(&mut self) -> Option<NetworkInfo>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;

    mock! {
        Monitor {}

        #[async_trait::async_trait]
        impl NetworkMonitor for Monitor {
            async fn get_network_info(&self) -> Result<NetworkInfo>;
            async fn subscribe_changes(&self) -> Result<Box<dyn NetworkChangeStream>>;
        }
    }

    #[test]
    fn test_network_info() {
        let info = NetworkInfo::connected(Some(NetworkType::WiFi));

        assert_eq!(info.status, NetworkStatus::Connected);
        assert_eq!(info.network_type, Some(NetworkType::WiFi));
        assert!(info.is_connected());
        assert!(!NetworkInfo::disconnected().is_connected());
    }

    #[tokio::test]
    async fn test_is_connected_defaults_to_network_info() {
        let mut monitor = MockMonitor::new();
        monitor
            .expect_get_network_info()
            .times(1)
            .returning(|| Ok(NetworkInfo::disconnected()));

        assert!(!monitor.is_connected().await);
    }

    #[tokio::test]
    async fn test_is_connected_false_on_probe_error() {
        let mut monitor = MockMonitor::new();
        monitor.expect_get_network_info().returning(|| {
            Err(crate::error::BridgeError::NotAvailable(
                "probe".to_string(),
            ))
        });

        assert!(!monitor.is_connected().await);
    }
}
