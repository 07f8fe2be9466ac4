use std::collections::HashMap;
use std::sync::Mutex;

use crate::clock::Clock;
use crate::models::{RendezvousRecord, RoomKey};

const DEFAULT_TTL_MS: i64 = 60_000;
const DEFAULT_DISCOVER_LIMIT: usize = 32;

/// In-memory TTL-indexed peer registry: `(namespace, room) -> peer_id -> record`.
/// Guarded by a single coarse lock; cross-room operations (prune) do not need to be
/// atomic with Room Hub operations (invariants are each structure-local).
#[derive(Default)]
pub struct RendezvousRegistry {
    rooms: Mutex<HashMap<RoomKey, HashMap<String, RendezvousRecord>>>,
}

impl RendezvousRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any existing record for `peer_id` in `(namespace, room)`.
    #[allow(clippy::too_many_arguments)]
    pub fn register(
        &self,
        namespace: &str,
        room: &str,
        peer_id: &str,
        addresses: Vec<String>,
        ttl_ms: Option<i64>,
        metadata: HashMap<String, serde_json::Value>,
        clock: &dyn Clock,
    ) -> RendezvousRecord {
        let key = RoomKey::new(namespace, room);
        let seen_at = clock.now_ms();
        let ttl = ttl_ms.unwrap_or(DEFAULT_TTL_MS).max(1);
        let record = RendezvousRecord {
            peer_id: peer_id.to_string(),
            namespace: namespace.to_string(),
            room: room.to_string(),
            addresses,
            metadata,
            seen_at,
            expires_at: seen_at + ttl,
        };

        let mut rooms = self.rooms.lock().unwrap_or_else(|e| e.into_inner());
        rooms
            .entry(key)
            .or_default()
            .insert(peer_id.to_string(), record.clone());
        record
    }

    /// Prunes expired entries first, then returns up to `limit` records for
    /// `(namespace, room)` sorted by `seen_at` descending.
    pub fn discover(
        &self,
        namespace: &str,
        room: &str,
        limit: Option<usize>,
        clock: &dyn Clock,
    ) -> Vec<RendezvousRecord> {
        self.prune_expired(clock.now_ms());

        let key = RoomKey::new(namespace, room);
        let rooms = self.rooms.lock().unwrap_or_else(|e| e.into_inner());
        let limit = limit.unwrap_or(DEFAULT_DISCOVER_LIMIT);

        let Some(entries) = rooms.get(&key) else {
            return Vec::new();
        };
        let mut records: Vec<RendezvousRecord> = entries.values().cloned().collect();
        records.sort_by(|a, b| b.seen_at.cmp(&a.seen_at));
        records.truncate(limit);
        records
    }

    /// Removes `peer_id` from `(namespace, room)`. Returns whether an entry was removed.
    /// The room entry evaporates when it becomes empty (no empty sets left behind).
    pub fn remove_peer(&self, namespace: &str, room: &str, peer_id: &str) -> bool {
        let key = RoomKey::new(namespace, room);
        let mut rooms = self.rooms.lock().unwrap_or_else(|e| e.into_inner());
        let Some(entries) = rooms.get_mut(&key) else {
            return false;
        };
        let removed = entries.remove(peer_id).is_some();
        if entries.is_empty() {
            rooms.remove(&key);
        }
        removed
    }

    /// Removes every record with `expires_at <= now`, deleting rooms left empty.
    pub fn prune_expired(&self, now: i64) -> usize {
        let mut rooms = self.rooms.lock().unwrap_or_else(|e| e.into_inner());
        let mut pruned = 0usize;
        rooms.retain(|_, entries| {
            let before = entries.len();
            entries.retain(|_, record| record.expires_at > now);
            pruned += before - entries.len();
            !entries.is_empty()
        });
        pruned
    }

    #[cfg(test)]
    fn room_count(&self) -> usize {
        self.rooms.lock().unwrap().len()
    }
}
