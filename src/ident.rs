//! Identity normalization and tenant namespace addressing
//! -------------------------------------------------------
//! Single source of truth for turning a principal identity into the name of
//! its isolated task table. Identities are user-chosen wire text, so they are
//! validated against a strict charset at registration and additionally quoted
//! as SQL identifiers on every use. A raw identity never reaches a statement
//! unquoted.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AppError, AppResult};

/// Lowercase letter start, then letters/digits/underscore, 3..=32 chars total.
static IDENTITY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]{2,31}$").expect("identity regex"));

/// Normalize an identity for case-insensitive matching: trim and lowercase.
pub fn normalize_identity(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// Normalize and validate an identity. Only validated identities may ever be
/// used to derive a namespace name.
pub fn validate_identity(raw: &str) -> AppResult<String> {
    let ident = normalize_identity(raw);
    if IDENTITY_RE.is_match(&ident) {
        Ok(ident)
    } else {
        Err(AppError::user(
            "invalid_identity",
            "identity must be 3-32 chars: lowercase letter first, then letters, digits or underscore",
        ))
    }
}

/// Quote a name as a SQL identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// The quoted table name holding one principal's tasks. The `tasks_` prefix
/// keeps tenant tables out of the way of the `users` catalog table.
pub fn namespace_table(identity: &str) -> String {
    quote_ident(&format!("tasks_{identity}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_names_and_normalizes_case() {
        assert_eq!(validate_identity("Alice").unwrap(), "alice");
        assert_eq!(validate_identity("  bob_99 ").unwrap(), "bob_99");
    }

    #[test]
    fn rejects_hostile_or_malformed_names() {
        for bad in ["", "ab", "1abc", "a b", "alice;drop", "users\"--", "café", &"x".repeat(40)] {
            assert!(validate_identity(bad).is_err(), "expected rejection for {bad:?}");
        }
    }

    #[test]
    fn namespace_name_is_quoted_and_prefixed() {
        assert_eq!(namespace_table("alice"), "\"tasks_alice\"");
        // Even a quote smuggled past validation could not change statement shape.
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
