//! Admission decision for tenant-scoped requests.
//!
//! The gate walks Anonymous → TokenPresented → Validated → Admitted; any
//! failed check ends in Denied. The identity-match check is the tenant
//! isolation enforcement point: a structurally valid token for principal A
//! never admits a request addressing principal B's namespace.

use chrono::Utc;
use tracing::debug;

use super::session::{SessionClaims, Sessions};
use crate::error::AppResult;
use crate::ident::normalize_identity;

#[derive(Clone)]
pub struct AuthorizationGate {
    sessions: Sessions,
}

impl AuthorizationGate {
    pub fn new(sessions: Sessions) -> Self {
        Self { sessions }
    }

    /// Decide admit/deny for a raw token and the path-derived target identity.
    /// Only an `Ok` here may be followed by tenant storage access, and the
    /// access must be scoped to the returned claim's identity.
    pub fn admit(&self, token: Option<&str>, target_identity: &str) -> AppResult<SessionClaims> {
        let target = normalize_identity(target_identity);
        self.sessions
            .validate(token.unwrap_or(""), &target, Utc::now())
            .map_err(|err| {
                debug!("denied access to '{target}': {}", err.code_str());
                err
            })
    }
}
