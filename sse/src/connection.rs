use dashmap::DashMap;
use events::{Principal, UserId};
use log::*;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Connection information (no redundant connection_id)
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub principal: Principal,
    /// Cancelled when the server tears the connection down.
    pub shutdown: CancellationToken,
}

/// Registry of open live connections with dual indices for O(1) lookups.
///
/// Event routing goes through the bus; the registry exists so the server can
/// see who is connected and close every stream on shutdown.
pub struct ConnectionRegistry {
    /// Primary storage: lookup by connection_id for registration/cleanup - O(1)
    connections: DashMap<ConnectionId, ConnectionInfo>,

    /// Secondary index: connections per user - O(1)
    user_index: DashMap<UserId, HashSet<ConnectionId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            user_index: DashMap::new(),
        }
    }

    /// Register a new connection - O(1)
    pub fn register(&self, principal: Principal, shutdown: CancellationToken) -> ConnectionId {
        let connection_id = ConnectionId::new();
        let user_id = principal.user_id.clone();

        // Insert into primary storage
        self.connections.insert(
            connection_id.clone(),
            ConnectionInfo {
                principal,
                shutdown,
            },
        );

        // Update secondary index
        self.user_index
            .entry(user_id)
            .or_default()
            .insert(connection_id.clone());

        connection_id
    }

    /// Unregister a connection - O(1). Unknown ids are ignored, so repeated
    /// teardown of the same connection is harmless.
    pub fn unregister(&self, connection_id: &ConnectionId) -> bool {
        // Remove from primary storage
        let Some((_, info)) = self.connections.remove(connection_id) else {
            trace!(
                "Connection {} already unregistered",
                connection_id.as_str()
            );
            return false;
        };

        let user_id = info.principal.user_id;

        // Update secondary index
        if let Some(mut entry) = self.user_index.get_mut(&user_id) {
            entry.remove(connection_id);

            // Clean up empty user entries
            if entry.is_empty() {
                drop(entry); // Release lock before removal
                self.user_index.remove_if(&user_id, |_, ids| ids.is_empty());
            }
        }

        true
    }

    /// Number of open connections for a user - O(1)
    pub fn connections_for_user(&self, user_id: &UserId) -> usize {
        self.user_index
            .get(user_id)
            .map(|ids| ids.len())
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn user_count(&self) -> usize {
        self.user_index.len()
    }

    /// Ask every open connection to close - O(n)
    pub fn close_all(&self) -> usize {
        let mut closed = 0;
        for entry in self.connections.iter() {
            if !entry.value().shutdown.is_cancelled() {
                entry.value().shutdown.cancel();
                closed += 1;
            }
        }
        closed
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
