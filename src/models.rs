use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Composite `(namespace, room)` key, with stable serialization `"{namespace}::{room}"`
/// used as a map key by both the Room Hub and the Rendezvous Registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomKey {
    pub namespace: String,
    pub room: String,
}

impl RoomKey {
    pub fn new(namespace: impl Into<String>, room: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            room: room.into(),
        }
    }

    /// Namespace/room default to "global"/"public" when the caller supplied none.
    pub fn from_optional(namespace: Option<&str>, room: Option<&str>) -> Self {
        Self::new(
            namespace.filter(|s| !s.is_empty()).unwrap_or("global"),
            room.filter(|s| !s.is_empty()).unwrap_or("public"),
        )
    }

    pub fn as_string(&self) -> String {
        format!("{}::{}", self.namespace, self.room)
    }
}

/// A discoverable advertisement of a peer with a TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendezvousRecord {
    #[serde(rename = "peerId")]
    pub peer_id: String,
    pub namespace: String,
    pub room: String,
    pub addresses: Vec<String>,
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(rename = "seenAt")]
    pub seen_at: i64,
    #[serde(rename = "expiresAt")]
    pub expires_at: i64,
}

// --- HTTP request/response bodies ---

#[derive(Debug, Deserialize, rocket::FromForm)]
pub struct BootstrapQuery {
    pub namespace: Option<String>,
    pub room: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BootstrapResponse {
    pub namespace: String,
    pub room: String,
    pub peers: usize,
    #[serde(rename = "signalingUrl")]
    pub signaling_url: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    pub namespace: Option<String>,
    pub room: Option<String>,
    #[serde(rename = "peerId")]
    pub peer_id: String,
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(rename = "ttlMs", default)]
    pub ttl_ms: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize, rocket::FromForm)]
pub struct DiscoverQuery {
    pub namespace: Option<String>,
    pub room: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DiscoverResponse {
    pub namespace: String,
    pub room: String,
    pub peers: Vec<RendezvousRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub now: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

// --- Wire envelopes over /signal ---

#[derive(Debug, Serialize)]
pub struct WelcomeEnvelope {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(rename = "peerId")]
    pub peer_id: String,
    pub namespace: String,
    pub room: String,
    pub now: String,
}

impl WelcomeEnvelope {
    pub fn new(peer_id: String, namespace: String, room: String, now: String) -> Self {
        Self {
            kind: "welcome",
            peer_id,
            namespace,
            room,
            now,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HeartbeatAck {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub now: String,
}

impl HeartbeatAck {
    pub fn new(now: String) -> Self {
        Self {
            kind: "heartbeat-ack",
            now,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub code: &'static str,
}

impl ErrorEnvelope {
    pub fn rate_limited() -> Self {
        Self {
            kind: "error",
            code: "rate_limited",
        }
    }

    pub fn invalid_json() -> Self {
        Self {
            kind: "error",
            code: "invalid_json",
        }
    }
}

/// Client-reported telemetry for a single ICE-connection update. Never relayed.
#[derive(Debug, Deserialize)]
pub struct TelemetryFields {
    #[serde(rename = "iceState")]
    pub ice_state: Option<String>,
    #[serde(rename = "failureReason")]
    pub failure_reason: Option<String>,
    #[serde(rename = "relayUsed")]
    pub relay_used: Option<bool>,
    pub region: Option<String>,
    pub carrier: Option<String>,
}
