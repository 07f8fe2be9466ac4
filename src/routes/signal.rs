use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use rocket::form::FromForm;
use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use rocket::{get, Response, State};
use rocket_ws::{Message, WebSocket};
use serde_json::json;

use crate::auth::{CredentialVerifier, PresentedToken};
use crate::clock::{generate_peer_id, Clock};
use crate::error::ServerError;
use crate::metrics::Metrics;
use crate::models::{
    ErrorBody, HeartbeatAck, RoomKey, TelemetryFields, WelcomeEnvelope,
};
use crate::rate_limit::RateLimiter;
use crate::rendezvous::RendezvousRegistry;
use crate::room_hub::{PeerSession, RoomHub};

use super::ClientAddress;

#[derive(FromForm)]
pub struct SignalQuery {
    namespace: Option<String>,
    room: Option<String>,
    #[field(name = "peerId")]
    peer_id: Option<String>,
}

/// The handshake either upgrades to a WebSocket channel or rejects with a plain HTTP
/// status, depending on admission/auth checks performed before any upgrade response is
/// written. Only the `Upgrade` variant actually switches protocols.
pub enum SignalResponse {
    Upgrade(rocket_ws::Channel<'static>),
    Rejected(Status, Json<ErrorBody>),
}

impl<'r> Responder<'r, 'static> for SignalResponse {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        match self {
            SignalResponse::Upgrade(channel) => channel.respond_to(request),
            SignalResponse::Rejected(status, body) => {
                Response::build_from(body.respond_to(request)?)
                    .status(status)
                    .ok()
            }
        }
    }
}

/// Handshake pipeline per the design: extract address, admit by connection count,
/// authenticate, resolve namespace/room/peer id, then upgrade. Steps 1-4 run to
/// completion before any upgrade response is produced; step 5 (attach + register +
/// metrics) runs as the upgrade is granted.
#[get("/signal?<query..>")]
#[allow(clippy::too_many_arguments)]
pub fn signal(
    ws: WebSocket,
    query: SignalQuery,
    token: PresentedToken,
    address: ClientAddress,
    verifier: &State<Arc<CredentialVerifier>>,
    rate_limiter: &State<Arc<RateLimiter>>,
    hub: &State<Arc<RoomHub>>,
    registry: &State<Arc<RendezvousRegistry>>,
    metrics: &State<Arc<Metrics>>,
    clock: &State<Arc<dyn Clock>>,
) -> SignalResponse {
    let client_address = address.0;

    if !rate_limiter.allow_connection(&client_address) {
        metrics.rate_limited_total.inc();
        tracing::warn!(
            message = "peer.connection_rate_limited",
            client_address = client_address.as_str()
        );
        let error = ServerError::RateLimitExceeded;
        return SignalResponse::Rejected(
            error.http_status(),
            Json(ErrorBody {
                error: "Too many concurrent connections".to_string(),
            }),
        );
    }

    if !verifier.verify(token.0.as_deref()) {
        rate_limiter.release_connection(&client_address);
        metrics.auth_failures_total.inc();
        tracing::warn!(
            message = "peer.auth_failed",
            client_address = client_address.as_str()
        );
        let error = ServerError::AuthenticationFailure;
        return SignalResponse::Rejected(
            error.http_status(),
            Json(ErrorBody {
                error: "Invalid or missing token".to_string(),
            }),
        );
    }

    let key = RoomKey::from_optional(query.namespace.as_deref(), query.room.as_deref());
    let peer_id = query
        .peer_id
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| generate_peer_id(clock.as_ref()));

    let hub = hub.inner().clone();
    let registry = registry.inner().clone();
    let rate_limiter = rate_limiter.inner().clone();
    let metrics = metrics.inner().clone();
    let clock = clock.inner().clone();

    let (session, mut outbound_rx) = PeerSession::new(peer_id.clone(), client_address.clone());
    hub.join(&key, session);
    registry.register(
        &key.namespace,
        &key.room,
        &peer_id,
        Vec::new(),
        Some(60_000),
        [("transport".to_string(), json!("websocket"))]
            .into_iter()
            .collect(),
        clock.as_ref(),
    );
    metrics.connections_total.inc();
    metrics.active_connections.inc();
    tracing::info!(
        message = "peer.connected",
        peer_id = peer_id.as_str(),
        namespace = key.namespace.as_str(),
        room = key.room.as_str(),
        client_address = client_address.as_str()
    );

    let guard = SessionGuard {
        hub: hub.clone(),
        registry: registry.clone(),
        rate_limiter: rate_limiter.clone(),
        metrics: metrics.clone(),
        key: key.clone(),
        peer_id: peer_id.clone(),
        client_address: client_address.clone(),
    };

    let channel = ws.channel(move |mut stream| {
        Box::pin(async move {
            let _guard = guard;

            let welcome = WelcomeEnvelope::new(
                peer_id.clone(),
                key.namespace.clone(),
                key.room.clone(),
                clock.now_iso(),
            );
            if stream
                .send(Message::Text(serde_json::to_string(&welcome).unwrap()))
                .await
                .is_err()
            {
                return Ok(());
            }

            loop {
                tokio::select! {
                    inbound = stream.next() => {
                        match inbound {
                            Some(Ok(Message::Text(text))) => {
                                handle_frame(
                                    &text,
                                    &peer_id,
                                    &key,
                                    &client_address,
                                    &hub,
                                    &rate_limiter,
                                    &metrics,
                                    clock.as_ref(),
                                    &mut stream,
                                )
                                .await?;
                            }
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Ok(_)) => {
                                // Binary/ping/pong frames carry no signaling semantics; ignored.
                            }
                            Some(Err(_)) => break,
                        }
                    }
                    forwarded = outbound_rx.recv() => {
                        match forwarded {
                            Some(frame) => {
                                if stream.send(Message::Text(frame)).await.is_err() {
                                    break;
                                }
                            }
                            None => break,
                        }
                    }
                }
            }

            Ok(())
        })
    });

    SignalResponse::Upgrade(channel)
}

#[allow(clippy::too_many_arguments)]
async fn handle_frame<S>(
    text: &str,
    peer_id: &str,
    key: &RoomKey,
    client_address: &str,
    hub: &Arc<RoomHub>,
    rate_limiter: &Arc<RateLimiter>,
    metrics: &Arc<Metrics>,
    clock: &dyn Clock,
    stream: &mut S,
) -> Result<(), S::Error>
where
    S: futures_util::Sink<Message> + Unpin,
{
    if !rate_limiter.allow_message(client_address, clock) {
        metrics.rate_limited_total.inc();
        return send_server_error(stream, ServerError::RateLimitExceeded).await;
    }
    metrics.messages_total.inc();

    let parsed: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => return send_server_error(stream, ServerError::MalformedInput(e.to_string())).await,
    };

    let kind = parsed.get("type").and_then(|v| v.as_str()).unwrap_or("");

    match kind {
        "heartbeat" => {
            let ack = HeartbeatAck::new(clock.now_iso());
            stream
                .send(Message::Text(serde_json::to_string(&ack).unwrap()))
                .await?;
        }
        "telemetry" => {
            if let Ok(fields) = serde_json::from_value::<TelemetryFields>(parsed) {
                metrics.record_telemetry(&fields);
            }
        }
        _ => match build_relay_envelope(parsed, peer_id, key, clock.now_iso()) {
            Some(envelope) => {
                let frame = serde_json::to_string(&envelope).unwrap();
                let dead = hub.fanout(key, peer_id, &frame);
                for dead_peer in dead {
                    hub.leave(key, &dead_peer);
                }
            }
            None => {
                return send_server_error(
                    stream,
                    ServerError::MalformedInput("relay payload must be a JSON object".to_string()),
                )
                .await
            }
        },
    }

    Ok(())
}

async fn send_server_error<S>(stream: &mut S, error: ServerError) -> Result<(), S::Error>
where
    S: futures_util::Sink<Message> + Unpin,
{
    if let Some(envelope) = error.ws_envelope() {
        let body = serde_json::to_string(&envelope).unwrap();
        stream.send(Message::Text(body)).await?;
    }
    Ok(())
}

/// Shallow-merges the client payload with server-stamped envelope fields, overwriting any
/// client-supplied `sourcePeerId`/`namespace`/`room`/`receivedAt`. Returns `None` when the
/// payload isn't a JSON object, since there is nothing to merge into.
fn build_relay_envelope(
    mut payload: serde_json::Value,
    source_peer_id: &str,
    key: &RoomKey,
    received_at: String,
) -> Option<serde_json::Value> {
    let obj = payload.as_object_mut()?;
    obj.insert("sourcePeerId".to_string(), json!(source_peer_id));
    obj.insert("namespace".to_string(), json!(key.namespace));
    obj.insert("room".to_string(), json!(key.room));
    obj.insert("receivedAt".to_string(), json!(received_at));
    Some(payload)
}

/// Runs teardown exactly once when a session's channel future completes, regardless of
/// which branch (close, error, or forced close by backpressure) ended it. Mirrors the
/// reference codebase's `PresenceGuard` drop-based cleanup.
struct SessionGuard {
    hub: Arc<RoomHub>,
    registry: Arc<RendezvousRegistry>,
    rate_limiter: Arc<RateLimiter>,
    metrics: Arc<Metrics>,
    key: RoomKey,
    peer_id: String,
    client_address: String,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.hub.leave(&self.key, &self.peer_id);
        self.registry
            .remove_peer(&self.key.namespace, &self.key.room, &self.peer_id);
        self.rate_limiter.release_connection(&self.client_address);
        self.metrics.active_connections.dec();
        tracing::info!(
            message = "peer.disconnected",
            peer_id = self.peer_id.as_str(),
            namespace = self.key.namespace.as_str(),
            room = self.key.room.as_str()
        );
    }
}
