use rocket::http::Status;

use crate::models::ErrorEnvelope;

/// Internal error taxonomy, translated to a wire-level representation (HTTP status + body,
/// or a WS error envelope) only at the handler boundary. `ConfigurationFailure` is the only
/// variant that is fatal; the rest are always recovered locally.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("authentication failed")]
    AuthenticationFailure,
    #[error("rate limit exceeded")]
    RateLimitExceeded,
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error("transport failure")]
    TransportFailure,
    #[error("per-peer outbound backpressure violated")]
    BackpressureViolation,
    #[error("configuration failure: {0}")]
    ConfigurationFailure(String),
}

impl ServerError {
    /// HTTP status for handshake/register-style rejections. `TransportFailure` and
    /// `BackpressureViolation` have no HTTP representation — they only ever occur on an
    /// already-admitted session and are handled by tearing the session down instead.
    pub fn http_status(&self) -> Status {
        match self {
            ServerError::AuthenticationFailure => Status::Unauthorized,
            ServerError::RateLimitExceeded => Status::TooManyRequests,
            ServerError::MalformedInput(_) => Status::BadRequest,
            ServerError::ConfigurationFailure(_) => Status::InternalServerError,
            ServerError::TransportFailure | ServerError::BackpressureViolation => {
                Status::InternalServerError
            }
        }
    }

    /// The inline WS error envelope for the two categories that can occur mid-session
    /// without closing it.
    pub fn ws_envelope(&self) -> Option<ErrorEnvelope> {
        match self {
            ServerError::RateLimitExceeded => Some(ErrorEnvelope::rate_limited()),
            ServerError::MalformedInput(_) => Some(ErrorEnvelope::invalid_json()),
            _ => None,
        }
    }
}
