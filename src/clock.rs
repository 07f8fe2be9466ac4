use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

/// Monotonic-in-effect time source, injectable so tests can control TTL math without
/// sleeping. All TTL arithmetic in the Rendezvous Registry and Rate Limiter goes through
/// this trait rather than calling `SystemTime::now()` directly.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;

    /// Current time as an ISO-8601 UTC string, for wire envelopes and log lines.
    fn now_iso(&self) -> String {
        let ms = self.now_ms();
        let secs = ms.div_euclid(1000);
        let nanos = (ms.rem_euclid(1000)) as u32 * 1_000_000;
        chrono::DateTime::from_timestamp(secs, nanos)
            .unwrap_or_else(chrono::Utc::now)
            .to_rfc3339()
    }
}

/// Real wall-clock time, used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// Generates a collision-resistant peer id of the form `peer-{ms}-{random-hex}` for
/// clients that did not supply their own `peerId`.
pub fn generate_peer_id(clock: &dyn Clock) -> String {
    let ms = clock.now_ms();
    let mut rng = rand::thread_rng();
    let suffix: [u8; 8] = rng.r#gen();
    format!("peer-{ms}-{}", hex::encode(suffix))
}
