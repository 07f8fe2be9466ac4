// Route module decomposition — each domain area in its own file.
// Shared types (request guards, fairings, catchers) live here; route functions in
// submodules, matching the reference codebase's `routes/mod.rs` convention.

pub mod http;
pub mod signal;

pub use http::{bootstrap, discover, health, metrics_text, register};

use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::Response;

/// The client's address for rate-limiting and logging: the first hop of
/// `X-Forwarded-For` when present, else the socket's remote address.
pub struct ClientAddress(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientAddress {
    type Error = std::convert::Infallible;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let addr = req
            .headers()
            .get_one("X-Forwarded-For")
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim().to_string())
            .or_else(|| req.remote().map(|r| r.ip().to_string()))
            .unwrap_or_else(|| "unknown".to_string());
        Outcome::Success(ClientAddress(addr))
    }
}

/// Stamps the required CORS headers onto every response. A dedicated fairing rather than a
/// general CORS crate because the required header names (`Allow-Methods`, `Allow-Headers`)
/// are nonstandard, not the `Access-Control-Allow-*` names a generic CORS crate would emit.
pub struct Cors;

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "CORS headers",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _req: &'r Request<'_>, response: &mut Response<'r>) {
        response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
        response.set_header(Header::new("Allow-Methods", "GET,POST,OPTIONS"));
        response.set_header(Header::new("Allow-Headers", "Content-Type,Authorization"));
    }
}

/// Catch-all `OPTIONS` responder: every mounted path answers preflight with 204 and no
/// body; `Cors` stamps the required headers onto it afterward.
#[rocket::options("/<_path..>", rank = 1)]
pub fn options_preflight(_path: std::path::PathBuf) -> rocket::response::status::NoContent {
    rocket::response::status::NoContent
}

#[rocket::catch(404)]
pub fn not_found() -> rocket::serde::json::Json<crate::models::ErrorBody> {
    rocket::serde::json::Json(crate::models::ErrorBody {
        error: "Not found".to_string(),
    })
}

#[rocket::catch(429)]
pub fn too_many_requests() -> rocket::serde::json::Json<crate::models::ErrorBody> {
    rocket::serde::json::Json(crate::models::ErrorBody {
        error: "Too many requests".to_string(),
    })
}

#[rocket::catch(401)]
pub fn unauthorized() -> rocket::serde::json::Json<crate::models::ErrorBody> {
    rocket::serde::json::Json(crate::models::ErrorBody {
        error: "Unauthorized".to_string(),
    })
}

