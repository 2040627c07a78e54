//! Session storage backends
//!
//! The registry keeps sessions in a [`SessionStore`]. Stores only map ids to
//! handles and track last access; they never lock a session themselves.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::time::Instant;

use crate::session::{SessionHandle, SessionId};

/// Keyed storage for live sessions
pub trait SessionStore: Send + Sync {
    /// Insert a handle, first evicting least recently used sessions while the
    /// store holds `max` or more. Eviction and insert are one atomic step.
    /// Returns the evicted ids.
    fn insert_bounded(&self, id: SessionId, handle: SessionHandle, max: Option<usize>)
        -> Vec<SessionId>;

    fn insert(&self, id: SessionId, handle: SessionHandle) {
        self.insert_bounded(id, handle, None);
    }

    /// Fetch a handle and mark it as used
    fn get(&self, id: &str) -> Option<SessionHandle>;

    fn remove(&self, id: &str) -> Option<SessionHandle>;

    fn contains(&self, id: &str) -> bool;

    fn ids(&self) -> Vec<SessionId>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Id of the session used longest ago
    fn least_recently_used(&self) -> Option<SessionId>;

    /// Ids of sessions not used since `cutoff`
    fn idle_since(&self, cutoff: Instant) -> Vec<SessionId>;
}

struct Entry {
    handle: SessionHandle,
    last_access: Mutex<Instant>,
}

/// In-process store backed by a hash map
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<SessionId, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn oldest(entries: &HashMap<SessionId, Entry>) -> Option<SessionId> {
    entries
        .iter()
        .min_by_key(|(_, e)| *e.last_access.lock())
        .map(|(id, _)| id.clone())
}

impl SessionStore for MemoryStore {
    fn insert_bounded(
        &self,
        id: SessionId,
        handle: SessionHandle,
        max: Option<usize>,
    ) -> Vec<SessionId> {
        let mut entries = self.entries.write();
        let mut evicted = Vec::new();
        if let Some(max) = max {
            while entries.len() >= max {
                let Some(victim) = oldest(&entries) else {
                    break;
                };
                entries.remove(&victim);
                evicted.push(victim);
            }
        }

        let entry = Entry {
            handle,
            last_access: Mutex::new(Instant::now()),
        };
        entries.insert(id, entry);
        evicted
    }

    fn get(&self, id: &str) -> Option<SessionHandle> {
        let entries = self.entries.read();
        let entry = entries.get(id)?;
        *entry.last_access.lock() = Instant::now();
        Some(entry.handle.clone())
    }

    fn remove(&self, id: &str) -> Option<SessionHandle> {
        self.entries.write().remove(id).map(|e| e.handle)
    }

    fn contains(&self, id: &str) -> bool {
        self.entries.read().contains_key(id)
    }

    fn ids(&self) -> Vec<SessionId> {
        self.entries.read().keys().cloned().collect()
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn least_recently_used(&self) -> Option<SessionId> {
        oldest(&self.entries.read())
    }

    fn idle_since(&self, cutoff: Instant) -> Vec<SessionId> {
        self.entries
            .read()
            .iter()
            .filter(|(_, e)| *e.last_access.lock() < cutoff)
            .map(|(id, _)| id.clone())
            .collect()
    }
}
