//! Credential registration and verification.
//!
//! Secrets are stored only as salted Argon2id PHC strings. Registration
//! creates the identity row and provisions the tenant task table inside one
//! transaction, so a partial failure cannot leave an identity without storage
//! or an orphaned namespace.

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};
use rusqlite::{params, OptionalExtension};
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::ident::{normalize_identity, validate_identity};
use crate::storage::{tasks, SharedStore};

/// A registered identity capable of owning tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: i64,
    pub identity: String,
}

fn hash_secret(secret: &str) -> AppResult<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes)
        .map_err(|e| { tracing::error!("salt generation failed: {e}"); AppError::internal("crypto_error", "credential hashing failed") })?;
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| { tracing::error!("salt encoding failed: {e}"); AppError::internal("crypto_error", "credential hashing failed") })?;
    let argon2 = Argon2::default();
    let phc = argon2
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|e| { tracing::error!("password hashing failed: {e}"); AppError::internal("crypto_error", "credential hashing failed") })?
        .to_string();
    Ok(phc)
}

fn verify_secret(hash: &str, secret: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(secret.as_bytes(), &parsed).is_ok()
    } else {
        false
    }
}

/// Persists principals and answers credential checks.
#[derive(Clone)]
pub struct CredentialStore {
    store: SharedStore,
}

impl CredentialStore {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Register a new principal. One durable identity record plus one durable
    /// empty namespace, committed together or not at all.
    pub fn register(&self, identity: &str, secret: &str) -> AppResult<i64> {
        let identity = validate_identity(identity)?;
        if secret.is_empty() {
            return Err(AppError::user("missing_secret", "secret is required"));
        }
        let secret_hash = hash_secret(secret)?;
        let created_at = chrono::Utc::now().timestamp();

        let mut conn = self.store.0.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO users (identity, secret_hash, created_at) VALUES (?1, ?2, ?3)",
            params![identity, secret_hash, created_at],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(f, _) if f.code == rusqlite::ErrorCode::ConstraintViolation => {
                AppError::conflict("duplicate_identity", "identity already registered")
            }
            other => other.into(),
        })?;
        let principal_id = tx.last_insert_rowid();
        tasks::provision_with(&tx, &identity)?;
        tx.commit()?;

        info!("registered principal '{identity}' (id {principal_id})");
        Ok(principal_id)
    }

    /// Verify a presented secret against the stored hash. No side effects.
    /// Unknown identity and wrong secret both read as a credential failure at
    /// the boundary; the distinct codes stay available to callers and tests.
    pub fn verify(&self, identity: &str, secret: &str) -> AppResult<Principal> {
        let identity = normalize_identity(identity);
        let row = {
            let conn = self.store.0.lock();
            conn.query_row(
                "SELECT user_id, secret_hash FROM users WHERE identity = ?1",
                params![identity],
                |r| Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?)),
            )
            .optional()?
        };
        let Some((id, secret_hash)) = row else {
            debug!("verify failed: unknown identity '{identity}'");
            return Err(AppError::auth("unknown_identity", "invalid credentials"));
        };
        if !verify_secret(&secret_hash, secret) {
            debug!("verify failed: secret mismatch for '{identity}'");
            return Err(AppError::auth("invalid_secret", "invalid credentials"));
        }
        Ok(Principal { id, identity })
    }
}
