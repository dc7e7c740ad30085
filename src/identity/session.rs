//! Time-bounded, tamper-evident session tokens.
//!
//! A token is `base64url(claims json) . base64url(hmac-sha256(key, payload))`.
//! The claims never persist anywhere; the token itself is the only artifact.
//! There is no revocation: a token stays valid until its embedded expiry, a
//! trust window bounded by the configured TTL.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

/// Identity claim carried inside a signed token. Timestamps are epoch seconds;
/// `expires_at` is strictly later than `issued_at`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    pub identity: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

fn malformed() -> AppError {
    AppError::auth("malformed_token", "token could not be verified")
}

/// Issues and validates session tokens. Key and TTL are fixed at construction
/// and immutable for the process lifetime, so this is safe to clone into any
/// request task without synchronization.
#[derive(Clone)]
pub struct Sessions {
    key: Arc<Vec<u8>>,
    ttl: Duration,
}

impl Sessions {
    pub fn new(key: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self { key: Arc::new(key.into()), ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mint a signed token for a verified identity. Deterministic given
    /// identical inputs and key; only `now` varies between calls.
    pub fn issue(&self, identity: &str, now: DateTime<Utc>) -> String {
        let claims = SessionClaims {
            identity: identity.to_string(),
            issued_at: now.timestamp(),
            expires_at: now.timestamp() + self.ttl.as_secs() as i64,
        };
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).expect("claims serialize"));
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("hmac accepts any key length");
        mac.update(payload.as_bytes());
        let sig = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{payload}.{sig}")
    }

    pub fn issue_now(&self, identity: &str) -> String {
        self.issue(identity, Utc::now())
    }

    /// Check signature, freshness and identity claim. Pure in
    /// (token, expected_identity, now, key); touches no shared mutable state.
    pub fn validate(&self, token: &str, expected_identity: &str, now: DateTime<Utc>) -> AppResult<SessionClaims> {
        if token.is_empty() {
            return Err(AppError::auth("missing_token", "missing token"));
        }
        let (payload, sig) = token.split_once('.').ok_or_else(malformed)?;
        let sig_bytes = URL_SAFE_NO_PAD.decode(sig).map_err(|_| malformed())?;
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("hmac accepts any key length");
        mac.update(payload.as_bytes());
        // Constant-time comparison.
        mac.verify_slice(&sig_bytes).map_err(|_| malformed())?;
        let raw = URL_SAFE_NO_PAD.decode(payload).map_err(|_| malformed())?;
        let claims: SessionClaims = serde_json::from_slice(&raw).map_err(|_| malformed())?;
        if now.timestamp() >= claims.expires_at {
            return Err(AppError::auth("expired", "session expired"));
        }
        if claims.identity != expected_identity {
            return Err(AppError::auth("identity_mismatch", "token does not grant access to this tenant"));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sessions() -> Sessions {
        Sessions::new(b"unit-test-signing-key".to_vec(), Duration::from_secs(600))
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 23, 12, 0, 0).unwrap()
    }

    #[test]
    fn issue_then_validate_round_trip() {
        let s = sessions();
        let token = s.issue("alice", t0());
        let claims = s.validate(&token, "alice", t0()).unwrap();
        assert_eq!(claims.identity, "alice");
        assert_eq!(claims.expires_at, claims.issued_at + 600);
    }

    #[test]
    fn expiry_boundary() {
        let s = sessions();
        let token = s.issue("alice", t0());
        // Just before expiry: valid. At expiry: rejected.
        let almost = t0() + chrono::Duration::seconds(599);
        assert!(s.validate(&token, "alice", almost).is_ok());
        let at_expiry = t0() + chrono::Duration::seconds(600);
        let err = s.validate(&token, "alice", at_expiry).unwrap_err();
        assert_eq!(err.code_str(), "expired");
        assert_eq!(err.http_status(), 401);
    }

    #[test]
    fn identity_mismatch_is_rejected() {
        let s = sessions();
        let token = s.issue("alice", t0());
        let err = s.validate(&token, "bob", t0()).unwrap_err();
        assert_eq!(err.code_str(), "identity_mismatch");
    }

    #[test]
    fn tampered_or_garbage_tokens_are_malformed() {
        let s = sessions();
        let token = s.issue("alice", t0());
        // Flip the payload while keeping the signature.
        let (payload, sig) = token.split_once('.').unwrap();
        let forged_claims = SessionClaims {
            identity: "bob".into(),
            issued_at: t0().timestamp(),
            expires_at: t0().timestamp() + 600,
        };
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_claims).unwrap());
        assert_ne!(payload, forged_payload);
        let err = s.validate(&format!("{forged_payload}.{sig}"), "bob", t0()).unwrap_err();
        assert_eq!(err.code_str(), "malformed_token");

        assert_eq!(s.validate("not-a-token", "alice", t0()).unwrap_err().code_str(), "malformed_token");
        assert_eq!(s.validate("a.b", "alice", t0()).unwrap_err().code_str(), "malformed_token");
        assert_eq!(s.validate("", "alice", t0()).unwrap_err().code_str(), "missing_token");
    }

    #[test]
    fn token_signed_with_other_key_is_rejected() {
        let s = sessions();
        let other = Sessions::new(b"a-different-key".to_vec(), Duration::from_secs(600));
        let token = other.issue("alice", t0());
        let err = s.validate(&token, "alice", t0()).unwrap_err();
        assert_eq!(err.code_str(), "malformed_token");
    }
}
