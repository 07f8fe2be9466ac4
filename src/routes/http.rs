use std::sync::Arc;

use rocket::http::{ContentType, Status};
use rocket::serde::json::Json;
use rocket::{get, post, State};

use crate::auth::RequireAuth;
use crate::clock::Clock;
use crate::config::Config;
use crate::metrics::Metrics;
use crate::models::RoomKey;
use crate::models::{
    BootstrapQuery, BootstrapResponse, DiscoverQuery, DiscoverResponse, ErrorBody,
    HealthResponse, RegisterBody,
};
use crate::rendezvous::RendezvousRegistry;
use crate::room_hub::RoomHub;

#[get("/health")]
pub fn health(clock: &State<Arc<dyn Clock>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        now: clock.now_iso(),
    })
}

#[get("/metrics")]
pub fn metrics_text(metrics: &State<Arc<Metrics>>) -> (ContentType, String) {
    (
        ContentType::new("text", "plain").with_params(("version", "0.0.4")),
        metrics.render(),
    )
}

#[get("/bootstrap?<query..>")]
pub fn bootstrap(
    query: BootstrapQuery,
    hub: &State<Arc<RoomHub>>,
    config: &State<Arc<Config>>,
) -> Json<BootstrapResponse> {
    let key = RoomKey::from_optional(query.namespace.as_deref(), query.room.as_deref());
    Json(BootstrapResponse {
        namespace: key.namespace.clone(),
        room: key.room.clone(),
        peers: hub.room_size(&key),
        signaling_url: config.public_signaling_url.clone(),
    })
}

#[post("/rendezvous/register", format = "json", data = "<body>")]
pub fn register(
    body: Result<Json<RegisterBody>, rocket::serde::json::Error<'_>>,
    _auth: RequireAuth,
    registry: &State<Arc<RendezvousRegistry>>,
    clock: &State<Arc<dyn Clock>>,
) -> Result<Json<crate::models::RendezvousRecord>, (Status, Json<ErrorBody>)> {
    let Json(body) = body.map_err(|e| {
        let error = crate::error::ServerError::MalformedInput(e.to_string());
        (error.http_status(), Json(ErrorBody { error: e.to_string() }))
    })?;

    let key = RoomKey::from_optional(body.namespace.as_deref(), body.room.as_deref());
    let record = registry.register(
        &key.namespace,
        &key.room,
        &body.peer_id,
        body.addresses,
        body.ttl_ms,
        body.metadata,
        clock.as_ref(),
    );
    Ok(Json(record))
}

#[get("/rendezvous/discover?<query..>")]
pub fn discover(
    query: DiscoverQuery,
    registry: &State<Arc<RendezvousRegistry>>,
    clock: &State<Arc<dyn Clock>>,
) -> Json<DiscoverResponse> {
    let key = RoomKey::from_optional(query.namespace.as_deref(), query.room.as_deref());
    let peers = registry.discover(
        &key.namespace,
        &key.room,
        query.limit,
        clock.as_ref(),
    );
    Json(DiscoverResponse {
        namespace: key.namespace,
        room: key.room,
        peers,
    })
}
