//! Client session table.

use std::collections::HashMap;

use parking_lot::RwLock;

use lingo_transport::{SessionHandle, SessionId};

/// Live client connections by session id.
///
/// The front server inserts on open and removes on close; the outgoing
/// workers look sessions up to deliver replies. A missing session simply
/// means the client went away and the reply is dropped.
#[derive(Default)]
pub struct SessionTable {
    inner: RwLock<HashMap<SessionId, SessionHandle>>,
}

impl SessionTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an open session.
    pub fn open(&self, handle: SessionHandle) {
        self.inner.write().insert(handle.id(), handle);
    }

    /// Removes a closed session.
    pub fn close(&self, session_id: SessionId) -> Option<SessionHandle> {
        self.inner.write().remove(&session_id)
    }

    /// Looks a session up.
    pub fn get(&self, session_id: SessionId) -> Option<SessionHandle> {
        self.inner.read().get(&session_id).cloned()
    }

    /// Whether the session is currently open.
    pub fn contains(&self, session_id: SessionId) -> bool {
        self.inner.read().contains_key(&session_id)
    }

    /// Number of open sessions.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether no session is open.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
