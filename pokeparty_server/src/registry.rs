// Session registry: the server's record of every client that completed the
// handshake.
//
// One `SessionRegistry` is created per server and shared with every
// connection thread through an `Arc`. All access, reads included, goes
// through the same `Mutex`, and the lock is held only for the in-memory
// append or copy, never across network I/O.
//
// Sessions are append-only and live as long as the registry. Ids come from a
// counter inside the lock, so they are unique and increase in the order
// handshakes completed. The peer port is kept alongside as the connection's
// human-readable identity.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

/// Registry-assigned session id, unique for the life of the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One connected user, as declared in the handshake. Never mutated after
/// registration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserSession {
    pub id: SessionId,
    /// Remote port of the connection that registered this session.
    pub peer_port: u16,
    /// Display name from the handshake line, terminator removed.
    pub name: String,
}

#[derive(Default)]
struct Inner {
    sessions: Vec<UserSession>,
    next_id: u64,
}

#[derive(Default)]
pub struct SessionRegistry {
    inner: Mutex<Inner>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a session for `name` connected from `peer_port` and return the
    /// stored record.
    pub fn register(&self, peer_port: u16, name: impl Into<String>) -> UserSession {
        let mut inner = self.lock();
        let session = UserSession {
            id: SessionId(inner.next_id),
            peer_port,
            name: name.into(),
        };
        inner.next_id += 1;
        inner.sessions.push(session.clone());
        session
    }

    /// Point-in-time copy of all sessions in registration order.
    pub fn snapshot(&self) -> Vec<UserSession> {
        self.lock().sessions.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panic while holding the lock cannot leave a half-pushed `Vec`, so a
    // poisoned registry is still consistent.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Render a snapshot as the numbered listing written to the debug log.
pub fn format_listing(sessions: &[UserSession]) -> String {
    let mut out = String::from("connected users:");
    for (i, s) in sessions.iter().enumerate() {
        out.push_str(&format!("\n  {}. {} (port {}, session {})", i + 1, s.name, s.peer_port, s.id));
    }
    out
}
