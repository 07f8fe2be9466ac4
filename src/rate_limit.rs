use std::collections::HashMap;
use std::sync::Mutex;

use crate::clock::Clock;

const MESSAGE_WINDOW_MS: i64 = 60_000;

/// Per-address concurrent connection counter. Entries are removed at zero so that an
/// absent key always means zero live connections.
#[derive(Default)]
struct ConnectionBuckets(HashMap<String, usize>);

/// Per-address fixed 60s message window. The window resets wholesale (not sliding) once
/// `now >= window_start + 60_000`, rather than tracking a rolling log of timestamps.
#[derive(Clone, Copy)]
struct MessageBucket {
    window_start: i64,
    count: usize,
}

/// Two independent rate-limit dimensions keyed by client address: concurrent connections,
/// and messages per fixed 60s window. Each operation touches exactly one map entry under
/// one lock, so it completes in O(1).
pub struct RateLimiter {
    connections: Mutex<ConnectionBuckets>,
    messages: Mutex<HashMap<String, MessageBucket>>,
    max_connections: usize,
    max_messages_per_window: usize,
}

impl RateLimiter {
    pub fn new(max_connections: usize, max_messages_per_window: usize) -> Self {
        Self {
            connections: Mutex::new(ConnectionBuckets::default()),
            messages: Mutex::new(HashMap::new()),
            max_connections,
            max_messages_per_window,
        }
    }

    /// Increments the connection counter for `addr`. Returns `false` (and leaves the
    /// counter unchanged) if admitting this connection would exceed the configured max.
    pub fn allow_connection(&self, addr: &str) -> bool {
        let mut buckets = self.connections.lock().unwrap_or_else(|e| e.into_inner());
        let entry = buckets.0.entry(addr.to_string()).or_insert(0);
        *entry += 1;
        if *entry > self.max_connections {
            *entry -= 1;
            if *entry == 0 {
                buckets.0.remove(addr);
            }
            false
        } else {
            true
        }
    }

    /// Decrements the connection counter for `addr`, removing the entry at zero.
    pub fn release_connection(&self, addr: &str) {
        let mut buckets = self.connections.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(count) = buckets.0.get_mut(addr) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                buckets.0.remove(addr);
            }
        }
    }

    #[cfg(test)]
    fn connection_count(&self, addr: &str) -> usize {
        let buckets = self.connections.lock().unwrap();
        buckets.0.get(addr).copied().unwrap_or(0)
    }

    /// Opens or rolls the 60s window for `addr` and increments its counter. Returns
    /// `false` once the counter exceeds the configured max for the current window.
    pub fn allow_message(&self, addr: &str, clock: &dyn Clock) -> bool {
        let now = clock.now_ms();
        let mut windows = self.messages.lock().unwrap_or_else(|e| e.into_inner());
        let bucket = windows.entry(addr.to_string()).or_insert(MessageBucket {
            window_start: now,
            count: 0,
        });
        if now >= bucket.window_start + MESSAGE_WINDOW_MS {
            bucket.window_start = now;
            bucket.count = 0;
        }
        bucket.count += 1;
        bucket.count <= self.max_messages_per_window
    }
}
