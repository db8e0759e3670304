use crate::connection::ConnectionRegistry;
use crate::live::LiveConnection;
use events::{EventBus, Principal};
use log::*;
use std::sync::Arc;
use std::time::Duration;

/// How often an open connection emits a `live:heartbeat` frame.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Snapshot of the live connections currently held by a [`Manager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStats {
    pub connections: usize,
    pub users: usize,
    pub listeners: usize,
}

pub struct Manager {
    bus: EventBus,
    registry: Arc<ConnectionRegistry>,
    heartbeat_interval: Duration,
}

impl Manager {
    pub fn new(bus: EventBus) -> Self {
        Self::with_heartbeat_interval(bus, DEFAULT_HEARTBEAT_INTERVAL)
    }

    pub fn with_heartbeat_interval(bus: EventBus, heartbeat_interval: Duration) -> Self {
        let heartbeat_interval = if heartbeat_interval.is_zero() {
            warn!(
                "Heartbeat interval must be positive, using {}s",
                DEFAULT_HEARTBEAT_INTERVAL.as_secs()
            );
            DEFAULT_HEARTBEAT_INTERVAL
        } else {
            heartbeat_interval
        };

        Self {
            bus,
            registry: Arc::new(ConnectionRegistry::new()),
            heartbeat_interval,
        }
    }

    /// Open a live connection for an authenticated principal.
    ///
    /// The connection is subscribed to the bus and registered before this
    /// returns.
    pub fn connect(&self, principal: Principal) -> LiveConnection {
        let connection = LiveConnection::open(
            &self.bus,
            &self.registry,
            principal,
            self.heartbeat_interval,
        );
        info!(
            "Opened live connection {} for user {}",
            connection.id().as_str(),
            connection.principal().user_id
        );
        connection
    }

    /// Ask every open connection to finish. Used on server shutdown.
    pub fn close_all(&self) -> usize {
        let closed = self.registry.close_all();
        info!("Closing {closed} live connection(s)");
        closed
    }

    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            connections: self.registry.len(),
            users: self.registry.user_count(),
            listeners: self.bus.listener_count(),
        }
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }
}
