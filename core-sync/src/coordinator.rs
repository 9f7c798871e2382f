//! # Sync Coordinator
//!
//! Owns the background task that wakes the [`OutboxDrainer`].
//!
//! ## Triggers
//!
//! - once at startup, if the network is reachable
//! - every `Connected` notification from the network monitor, including
//!   repeated ones (the drain is idempotent)
//! - every `drain_interval` tick while connected
//!
//! The monitor is also polled every `network_poll_interval` so hosts whose
//! monitor only answers `is_connected()` still get reconnect drains. A drain
//! that is already running when a trigger fires is skipped, never queued.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let coordinator = SyncCoordinator::new(drainer, network_monitor, event_bus, settings);
//! coordinator.start().await;
//! // ...
//! coordinator.shutdown().await;
//! ```

use bridge_traits::network::{NetworkChangeStream, NetworkMonitor};
use core_runtime::config::SyncSettings;
use core_runtime::events::{CoreEvent, EventBus, NetworkEvent};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::drainer::{DrainOutcome, OutboxDrainer};
use crate::Result;

struct Running {
    cancellation_token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct SyncCoordinator {
    drainer: Arc<OutboxDrainer>,
    network_monitor: Arc<dyn NetworkMonitor>,
    event_bus: EventBus,
    settings: SyncSettings,
    running: Mutex<Option<Running>>,
}

impl SyncCoordinator {
    pub fn new(
        drainer: Arc<OutboxDrainer>,
        network_monitor: Arc<dyn NetworkMonitor>,
        event_bus: EventBus,
        settings: SyncSettings,
    ) -> Self {
        Self {
            drainer,
            network_monitor,
            event_bus,
            settings,
            running: Mutex::new(None),
        }
    }

    /// Spawn the background task. Calling it again while running is a no-op.
    pub async fn start(&self) {
        let mut running = self.running.lock().await;
        if running.is_some() {
            debug!("Sync coordinator already running");
            return;
        }

        let cancellation_token = CancellationToken::new();
        let worker = Worker {
            drainer: self.drainer.clone(),
            network_monitor: self.network_monitor.clone(),
            event_bus: self.event_bus.clone(),
            settings: self.settings,
            connected: false,
        };
        let handle = tokio::spawn(worker.run(cancellation_token.clone()));

        info!(
            drain_interval_secs = self.settings.drain_interval.as_secs(),
            "Sync coordinator started"
        );
        *running = Some(Running {
            cancellation_token,
            handle,
        });
    }

    /// Stop the background task and wait for it to finish
    ///
    /// A drain in progress runs to completion first.
    pub async fn shutdown(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };

        running.cancellation_token.cancel();
        if let Err(e) = running.handle.await {
            error!(error = %e, "Sync coordinator task failed");
        }
        info!("Sync coordinator stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Drain immediately from the caller's task
    pub async fn drain_now(&self) -> Result<DrainOutcome> {
        self.drainer.drain().await
    }
}

struct Worker {
    drainer: Arc<OutboxDrainer>,
    network_monitor: Arc<dyn NetworkMonitor>,
    event_bus: EventBus,
    settings: SyncSettings,
    connected: bool,
}

impl Worker {
    async fn run(mut self, cancellation_token: CancellationToken) {
        let mut changes = match self.network_monitor.subscribe_changes().await {
            Ok(stream) => Some(stream),
            Err(e) => {
                warn!(error = %e, "Network change stream unavailable, polling only");
                None
            }
        };

        let startup = self.network_monitor.is_connected().await;
        self.on_status(startup, true).await;

        let mut poll = interval(self.settings.network_poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        poll.tick().await;

        let mut drain_tick = interval(self.settings.drain_interval);
        drain_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        drain_tick.tick().await;

        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => break,
                change = next_change(&mut changes) => match change {
                    Some(info) => self.on_status(info.is_connected(), true).await,
                    None => {
                        debug!("Network change stream closed");
                        changes = None;
                    }
                },
                _ = poll.tick() => {
                    let connected = self.network_monitor.is_connected().await;
                    self.on_status(connected, false).await;
                }
                _ = drain_tick.tick() => {
                    if self.connected {
                        self.drain().await;
                    }
                }
            }
        }
    }

    /// `notified` marks an explicit status report, which always triggers a
    /// drain when connected. Polls only trigger on the transition.
    async fn on_status(&mut self, connected: bool, notified: bool) {
        let was_connected = std::mem::replace(&mut self.connected, connected);

        if connected != was_connected {
            let event = if connected {
                info!("Network reachable");
                NetworkEvent::Connected
            } else {
                info!("Network unreachable");
                NetworkEvent::Disconnected
            };
            let _ = self.event_bus.emit(CoreEvent::Network(event));
        }

        if connected && (notified || !was_connected) {
            self.drain().await;
        }
    }

    async fn drain(&self) {
        match self.drainer.drain().await {
            Ok(DrainOutcome::Completed(report)) if report.attempted() > 0 => {
                debug!(?report, "Background drain finished");
            }
            Ok(_) => {}
            Err(e) => error!(error = %e, "Background drain failed"),
        }
    }
}

async fn next_change(
    changes: &mut Option<Box<dyn NetworkChangeStream>>,
) -> Option<bridge_traits::network::NetworkInfo> {
    match changes {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}
