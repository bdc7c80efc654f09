// realtime-gateway/src/registry.rs
use common::ConnectionContext;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

enum Slot {
    /// Connection is open and its handshake has not settled
    Pending,
    Authorized(Arc<ConnectionContext>),
}

/// Live connections and, once authorized, their context
pub struct ConnectionRegistry {
    connections: DashMap<Uuid, Slot>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Mark a connection as live. Returns false if the id is already in use.
    pub fn open(&self, connection_id: Uuid) -> bool {
        match self.connections.entry(connection_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(Slot::Pending);
                true
            }
        }
    }

    /// Store the context of a connection that passed authorization.
    ///
    /// Only a connection that is still open and pending can be promoted; a result that
    /// arrives after disconnect (or a second one) is discarded and `None` is returned.
    pub fn put(&self, context: ConnectionContext) -> Option<Arc<ConnectionContext>> {
        let mut slot = self.connections.get_mut(&context.connection_id)?;

        if matches!(*slot, Slot::Authorized(_)) {
            return None;
        }

        let context = Arc::new(context);
        *slot = Slot::Authorized(context.clone());
        Some(context)
    }

    pub fn get(&self, connection_id: &Uuid) -> Option<Arc<ConnectionContext>> {
        match self.connections.get(connection_id)?.value() {
            Slot::Authorized(context) => Some(context.clone()),
            Slot::Pending => None,
        }
    }

    /// Forget a connection. Safe to call more than once.
    pub fn remove(&self, connection_id: &Uuid) -> bool {
        self.connections.remove(connection_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn authorized_count(&self) -> usize {
        self.connections
            .iter()
            .filter(|entry| matches!(entry.value(), Slot::Authorized(_)))
            .count()
    }
}
