use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use fieldlink_transport::DeviceStream;
use serde::Serialize;
use tracing::debug;

/// Snapshot of one accepted session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub peer: SocketAddr,
    pub accepted_at: SystemTime,
    /// Framed messages delivered to the handler so far.
    pub messages: u64,
}

struct Entry {
    info: SessionInfo,
    control: DeviceStream,
}

/// The sessions a listener currently serves, keyed by peer address.
#[derive(Default)]
pub struct SessionRegistry {
    entries: Mutex<HashMap<SocketAddr, Entry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a session. `control` is a clone of its socket used by
    /// [`SessionRegistry::close_all`].
    pub fn register(&self, peer: SocketAddr, control: DeviceStream) {
        let info = SessionInfo {
            peer,
            accepted_at: SystemTime::now(),
            messages: 0,
        };
        self.lock().insert(peer, Entry { info, control });
    }

    pub fn unregister(&self, peer: &SocketAddr) {
        self.lock().remove(peer);
    }

    pub fn record_message(&self, peer: &SocketAddr) {
        if let Some(entry) = self.lock().get_mut(peer) {
            entry.info.messages += 1;
        }
    }

    /// Current sessions, oldest first.
    pub fn snapshot(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> = self.lock().values().map(|e| e.info.clone()).collect();
        sessions.sort_by_key(|s| s.accepted_at);
        sessions
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Shut every tracked socket down. Handlers notice on their next read
    /// and unregister themselves. Returns the number of sessions signalled.
    pub fn close_all(&self) -> usize {
        let entries = self.lock();
        for (peer, entry) in entries.iter() {
            if let Err(e) = entry.control.shutdown() {
                debug!(%peer, error = %e, "session shutdown failed");
            }
        }
        entries.len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SocketAddr, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.len())
            .finish()
    }
}
