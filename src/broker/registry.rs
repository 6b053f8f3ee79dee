//! Client registry: maps a client identity to its outbound transport.

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::Mutex;

use super::ClientWriter;
use crate::topic::ClientId;

/// Registered clients, keyed by id
///
/// A single mutex guards the map; every operation holds it only for the map
/// access itself. Registering an id that is already present replaces its
/// handle (last write wins) and the old handle is handed back untouched.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: Mutex<AHashMap<ClientId, Arc<ClientWriter>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `client_id` with `writer`, returning any handle it replaced
    pub fn register(
        &self,
        client_id: ClientId,
        writer: Arc<ClientWriter>,
    ) -> Option<Arc<ClientWriter>> {
        self.clients.lock().insert(client_id, writer)
    }

    /// Outbound handle for `client_id`, if it ever connected
    pub fn lookup(&self, client_id: &str) -> Option<Arc<ClientWriter>> {
        self.clients.lock().get(client_id).cloned()
    }

    /// Snapshot of registered ids, in no particular order
    pub fn list(&self) -> Vec<ClientId> {
        self.clients.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }
}
