use rocket::request::{FromRequest, Outcome, Request};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::config::Config;
use crate::error::ServerError;

/// Holds the configured shared-secret digest and performs constant-time verification.
/// When no digest is configured, `verify` accepts every token (auth disabled).
pub struct CredentialVerifier {
    digest: Option<[u8; 32]>,
}

impl CredentialVerifier {
    pub fn new(config: &Config) -> Self {
        let digest = config
            .signal_token_sha256
            .as_deref()
            .and_then(|hex_digest| hex::decode(hex_digest).ok())
            .and_then(|bytes| bytes.try_into().ok());
        Self { digest }
    }

    /// `true` when no digest is configured, or when `raw_token` hashes to the configured
    /// digest. Comparison is constant-time over the raw digest bytes; an absent or empty
    /// token always fails when a digest is configured.
    pub fn verify(&self, raw_token: Option<&str>) -> bool {
        let Some(expected) = &self.digest else {
            return true;
        };
        let Some(token) = raw_token.filter(|t| !t.is_empty()) else {
            return false;
        };
        let computed = sha256_bytes(token.as_bytes());
        computed.ct_eq(expected).into()
    }

    pub fn auth_enabled(&self) -> bool {
        self.digest.is_some()
    }
}

fn sha256_bytes(input: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(input);
    hasher.finalize().into()
}

/// Hex-encodes the SHA-256 digest of `input`. Used by operators to produce
/// `SIGNAL_TOKEN_SHA256` from a plaintext shared secret, and by tests.
pub fn sha256_hex(input: &str) -> String {
    hex::encode(sha256_bytes(input.as_bytes()))
}

/// Extracted bearer token from a request: `Authorization: Bearer <t>` wins over the
/// `token` query parameter. Absence is represented as `None`, not a request failure —
/// whether that is acceptable is decided by the caller (handshake vs. register route).
pub struct PresentedToken(pub Option<String>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for PresentedToken {
    type Error = std::convert::Infallible;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        if let Some(header) = req.headers().get_one("Authorization")
            && let Some(token) = header.strip_prefix("Bearer ")
        {
            return Outcome::Success(PresentedToken(Some(token.to_string())));
        }
        let token = req
            .query_value::<String>("token")
            .and_then(|r| r.ok());
        Outcome::Success(PresentedToken(token))
    }
}

/// Rejects the request with 401 unless the presented token verifies. Used on routes that
/// require auth unconditionally (rendezvous register); the signaling handshake does its
/// own verification inline so it can increment `auth_failures_total` and log the specific
/// peer/address context.
pub struct RequireAuth;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RequireAuth {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let verifier = match req.rocket().state::<std::sync::Arc<CredentialVerifier>>() {
            Some(v) => v,
            None => {
                return Outcome::Error((
                    ServerError::ConfigurationFailure("credential verifier not managed".into())
                        .http_status(),
                    (),
                ))
            }
        };
        let PresentedToken(token) = match PresentedToken::from_request(req).await {
            Outcome::Success(t) => t,
            _ => PresentedToken(None),
        };
        if verifier.verify(token.as_deref()) {
            Outcome::Success(RequireAuth)
        } else {
            if let Some(metrics) = req.rocket().state::<std::sync::Arc<crate::metrics::Metrics>>() {
                metrics.auth_failures_total.inc();
            }
            Outcome::Error((ServerError::AuthenticationFailure.http_status(), ()))
        }
    }
}
