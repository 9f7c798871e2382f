//! Network Monitoring Implementation

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    network::{NetworkChangeStream, NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType},
};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

const DEFAULT_PROBE_ADDR: &str = "8.8.8.8:53";
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Desktop network monitor implementation
///
/// Reachability is determined by a TCP connect probe. Every probe result is
/// published on a `watch` channel, so subscribers observe the latest status
/// and rapid flaps coalesce into the most recent value.
///
/// Platform-specific change notifications (netlink, SystemConfiguration,
/// Network List Manager) are not used. Status only changes when someone
/// probes, so long-lived consumers should call
/// [`get_network_info`](NetworkMonitor::get_network_info) periodically.
pub struct DesktopNetworkMonitor {
    probe_addr: String,
    probe_timeout: Duration,
    state: watch::Sender<NetworkInfo>,
}

impl DesktopNetworkMonitor {
    /// Create a new network monitor probing a public DNS resolver
    pub fn new() -> Self {
        Self::with_probe(DEFAULT_PROBE_ADDR, DEFAULT_PROBE_TIMEOUT)
    }

    /// Create a monitor probing a custom `host:port`
    pub fn with_probe(addr: impl Into<String>, timeout: Duration) -> Self {
        let (state, _) = watch::channel(NetworkInfo {
            status: NetworkStatus::Indeterminate,
            network_type: None,
            is_metered: false,
        });

        Self {
            probe_addr: addr.into(),
            probe_timeout: timeout,
            state,
        }
    }

    /// Check network connectivity by attempting a TCP connection
    async fn check_connectivity(&self) -> NetworkStatus {
        match tokio::time::timeout(
            self.probe_timeout,
            tokio::net::TcpStream::connect(self.probe_addr.as_str()),
        )
        .await
        {
            Ok(Ok(_)) => NetworkStatus::Connected,
            Ok(Err(_)) => NetworkStatus::Disconnected,
            Err(_) => NetworkStatus::Disconnected,
        }
    }

    /// Publish a status, notifying subscribers only when it changed
    fn publish(&self, info: NetworkInfo) {
        let changed = self.state.send_if_modified(|current| {
            if current.status != info.status {
                *current = info.clone();
                true
            } else {
                false
            }
        });

        if changed {
            info!(status = ?info.status, "Network status changed");
        }
    }

    /// Latest published status without probing
    pub fn current(&self) -> NetworkInfo {
        self.state.borrow().clone()
    }
}

impl Default for DesktopNetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkMonitor for DesktopNetworkMonitor {
    async fn get_network_info(&self) -> Result<NetworkInfo> {
        let status = self.check_connectivity().await;

        let info = NetworkInfo {
            status,
            network_type: if status == NetworkStatus::Connected {
                // Interface type is not distinguishable from a socket probe
                Some(NetworkType::Other)
            } else {
                None
            },
            is_metered: false,
        };

        debug!(status = ?status, "Network probe completed");
        self.publish(info.clone());

        Ok(info)
    }

    async fn subscribe_changes(&self) -> Result<Box<dyn NetworkChangeStream>> {
        Ok(Box::new(WatchNetworkChangeStream::new(self.state.subscribe())))
    }
}

/// Change stream over a `watch` receiver
///
/// Yields the current value on the first call, then one item per published
/// update. Ends when the sender is dropped.
pub struct WatchNetworkChangeStream {
    receiver: watch::Receiver<NetworkInfo>,
    primed: bool,
}

impl WatchNetworkChangeStream {
    pub fn new(receiver: watch::Receiver<NetworkInfo>) -> Self {
        Self {
            receiver,
            primed: false,
        }
    }
}

#[async_trait]
impl NetworkChangeStream for WatchNetworkChangeStream {
    async fn next(&mut self) -> Option<NetworkInfo> {
        if !self.primed {
            self.primed = true;
            return Some(self.receiver.borrow_and_update().clone());
        }

        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_probe_reports_connected_for_listening_address() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let monitor = DesktopNetworkMonitor::with_probe(addr.to_string(), Duration::from_secs(1));

        let info = monitor.get_network_info().await.unwrap();

        assert_eq!(info.status, NetworkStatus::Connected);
        assert!(monitor.is_connected().await);
        assert_eq!(monitor.current().status, NetworkStatus::Connected);
    }

    #[tokio::test]
    async fn test_probe_reports_disconnected_for_closed_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let monitor = DesktopNetworkMonitor::with_probe(addr.to_string(), Duration::from_secs(1));

        let info = monitor.get_network_info().await.unwrap();

        assert_eq!(info.status, NetworkStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_subscription_yields_current_then_changes() {
        let monitor = DesktopNetworkMonitor::new();
        let mut stream = monitor.subscribe_changes().await.unwrap();

        let first = stream.next().await.unwrap();
        assert_eq!(first.status, NetworkStatus::Indeterminate);

        monitor.publish(NetworkInfo::connected(None));
        let second = stream.next().await.unwrap();
        assert_eq!(second.status, NetworkStatus::Connected);
    }

    #[tokio::test]
    async fn test_unchanged_status_is_not_republished() {
        let monitor = DesktopNetworkMonitor::new();
        let mut receiver = monitor.state.subscribe();

        monitor.publish(NetworkInfo::disconnected());
        assert!(receiver.has_changed().unwrap());
        receiver.borrow_and_update();

        monitor.publish(NetworkInfo::disconnected());
        assert!(!receiver.has_changed().unwrap());
    }
}
