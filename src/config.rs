use std::env;

/// Service configuration, read once from the environment at startup.
///
/// Environment variables:
/// - `PORT` — listening port (default: 8787)
/// - `SIGNAL_TOKEN_SHA256` — hex SHA-256 of the shared bearer secret; empty disables auth
/// - `RATE_LIMIT_MESSAGES_PER_MINUTE` — per-address message cap per 60s window (default: 300)
/// - `RATE_LIMIT_CONNECTIONS_PER_IP` — per-address concurrent connection cap (default: 12)
/// - `PUBLIC_SIGNALING_URL` — returned verbatim by `/bootstrap` (default: wss://example.com/signal)
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub signal_token_sha256: Option<String>,
    pub rate_limit_messages_per_minute: usize,
    pub rate_limit_connections_per_ip: usize,
    pub public_signaling_url: String,
}

/// Fatal startup misconfiguration. The process must exit non-zero without binding a socket.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("SIGNAL_TOKEN_SHA256 must be a 64-character hex string, got {0} characters")]
    BadTokenDigestLength(usize),
    #[error("SIGNAL_TOKEN_SHA256 is not valid hex")]
    BadTokenDigestHex,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8787,
            signal_token_sha256: None,
            rate_limit_messages_per_minute: 300,
            rate_limit_connections_per_ip: 12,
            public_signaling_url: "wss://example.com/signal".to_string(),
        }
    }
}

impl Config {
    /// Build a `Config` from environment variables, with defaults. Each field is parsed
    /// independently; a missing or unparseable variable falls back to its default rather
    /// than aborting startup. Only a malformed `SIGNAL_TOKEN_SHA256` is fatal.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = env::var("PORT")
            && let Ok(n) = val.parse::<u16>()
        {
            config.port = n;
        }
        if let Ok(val) = env::var("RATE_LIMIT_MESSAGES_PER_MINUTE")
            && let Ok(n) = val.parse::<usize>()
        {
            config.rate_limit_messages_per_minute = n;
        }
        if let Ok(val) = env::var("RATE_LIMIT_CONNECTIONS_PER_IP")
            && let Ok(n) = val.parse::<usize>()
        {
            config.rate_limit_connections_per_ip = n;
        }
        if let Ok(val) = env::var("PUBLIC_SIGNALING_URL")
            && !val.is_empty()
        {
            config.public_signaling_url = val;
        }

        if let Ok(val) = env::var("SIGNAL_TOKEN_SHA256") {
            let trimmed = val.trim();
            if !trimmed.is_empty() {
                if trimmed.len() != 64 {
                    return Err(ConfigError::BadTokenDigestLength(trimmed.len()));
                }
                if hex::decode(trimmed).is_err() {
                    return Err(ConfigError::BadTokenDigestHex);
                }
                config.signal_token_sha256 = Some(trimmed.to_lowercase());
            }
        }

        Ok(config)
    }
}
