use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::atomic::{AtomicU64, Ordering},
};

use spin::Mutex;

/// Context shared by every connection task of a server.
///
/// Holds the connection registry; registration happens on accept,
/// deregistration when a connection task winds down.
pub struct Ctx {
    conns: Mutex<HashMap<u64, SocketAddr>>,
    next_id: AtomicU64,
}

impl Ctx {
    pub fn new() -> Self {
        Ctx {
            conns: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Registers a connection, returning its id.
    ///
    /// Ids are monotonic over the server's lifetime and never reused.
    pub fn register(&self, peer: SocketAddr) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.conns.lock().insert(id, peer);

        id
    }

    /// Drops a connection from the registry.
    pub fn deregister(&self, id: u64) {
        self.conns.lock().remove(&id);
    }

    /// Returns the number of registered connections.
    pub fn len(&self) -> usize {
        self.conns.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Ctx {
    fn default() -> Self {
        Ctx::new()
    }
}
