use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::mpsc;

use crate::models::RoomKey;

/// Outbound frames are queued onto a bounded channel per session. A full queue means the
/// peer isn't keeping up with its own room's signaling traffic; rather than block the
/// sender's dispatch loop or drop frames silently, the session is closed (see
/// `RoomHub::fanout` and `PeerSession::try_send`).
const OUTBOUND_QUEUE_CAPACITY: usize = 32;

/// A live WebSocket session admitted to exactly one room.
pub struct PeerSession {
    pub peer_id: String,
    pub client_address: String,
    outbound: mpsc::Sender<String>,
}

impl PeerSession {
    pub fn new(peer_id: String, client_address: String) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        (
            Self {
                peer_id,
                client_address,
                outbound: tx,
            },
            rx,
        )
    }

    /// Enqueues a frame for delivery. Returns `false` if the queue is saturated or the
    /// session's receiver has already been dropped, in which case the caller should treat
    /// the session as dead and let it close.
    pub fn try_send(&self, frame: String) -> bool {
        self.outbound.try_send(frame).is_ok()
    }
}

/// In-memory index of live sessions per `(namespace, room)`. Owns fan-out to peers in a
/// room excluding the sender. Guarded by a single `RwLock`: joins/leaves are writes,
/// fan-out and membership queries are reads over an immutable snapshot of the sender
/// handles, so a slow consumer's `try_send` never holds the lock.
#[derive(Default)]
pub struct RoomHub {
    rooms: RwLock<HashMap<RoomKey, HashMap<String, PeerSession>>>,
}

impl RoomHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `session` into its `(namespace, room)` set, creating it if absent.
    pub fn join(&self, key: &RoomKey, session: PeerSession) {
        let mut rooms = self.rooms.write().unwrap_or_else(|e| e.into_inner());
        rooms
            .entry(key.clone())
            .or_default()
            .insert(session.peer_id.clone(), session);
    }

    /// Removes the session for `peer_id` from `key`, collapsing the room if now empty.
    pub fn leave(&self, key: &RoomKey, peer_id: &str) {
        let mut rooms = self.rooms.write().unwrap_or_else(|e| e.into_inner());
        if let Some(members) = rooms.get_mut(key) {
            members.remove(peer_id);
            if members.is_empty() {
                rooms.remove(key);
            }
        }
    }

    /// Number of live sessions in `(namespace, room)`.
    pub fn room_size(&self, key: &RoomKey) -> usize {
        let rooms = self.rooms.read().unwrap_or_else(|e| e.into_inner());
        rooms.get(key).map(|m| m.len()).unwrap_or(0)
    }

    /// Total number of live sessions across all rooms, for the `active_connections`
    /// invariant check in tests.
    pub fn total_sessions(&self) -> usize {
        let rooms = self.rooms.read().unwrap_or_else(|e| e.into_inner());
        rooms.values().map(|m| m.len()).sum()
    }

    /// Delivers `frame` to every member of `key` except `sender_peer_id`. Best-effort:
    /// a saturated recipient is closed by dropping it from the room rather than blocking
    /// delivery to the rest. Returns the peer ids that were dropped for saturation so the
    /// caller can tear their sessions down (release rate-limit slots, rendezvous entries).
    pub fn fanout(&self, key: &RoomKey, sender_peer_id: &str, frame: &str) -> Vec<String> {
        let mut dead = Vec::new();
        let rooms = self.rooms.read().unwrap_or_else(|e| e.into_inner());
        if let Some(members) = rooms.get(key) {
            for (peer_id, session) in members.iter() {
                if peer_id == sender_peer_id {
                    continue;
                }
                if !session.try_send(frame.to_string()) {
                    dead.push(peer_id.clone());
                }
            }
        }
        dead
    }
}
