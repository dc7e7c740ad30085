//! Process configuration, loaded once in `main` and handed to the server.
//! No component reads the environment after startup; the signing key and TTL
//! are immutable for the process lifetime.

use std::time::Duration;

use anyhow::{bail, Result};

pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_DB_PATH: &str = "tasknest.db";
pub const DEFAULT_SESSION_TTL_SECS: u64 = 600;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub db_path: String,
    /// Symmetric HMAC key for session tokens. In non-test deployments this
    /// must come from a secret store, never a literal.
    pub signing_key: Vec<u8>,
    pub session_ttl: Duration,
}

impl Config {
    /// Read configuration from environment variables. Fails fast when the
    /// signing key is absent; everything else has a local-dev default.
    pub fn from_env() -> Result<Self> {
        let http_port = std::env::var("TASKNEST_HTTP_PORT")
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(DEFAULT_HTTP_PORT);
        let db_path = std::env::var("TASKNEST_DB").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());
        let ttl_secs = std::env::var("TASKNEST_SESSION_TTL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_SESSION_TTL_SECS);
        let signing_key = match std::env::var("TASKNEST_SIGNING_KEY") {
            Ok(k) if !k.trim().is_empty() => k.into_bytes(),
            _ => bail!("TASKNEST_SIGNING_KEY must be set to a non-empty secret"),
        };
        Ok(Config {
            http_port,
            db_path,
            signing_key,
            session_ttl: Duration::from_secs(ttl_secs),
        })
    }
}
