//! Credential and session lifecycle tests: registration, verification,
//! token issuance and the failure paths a client can trigger.

use std::time::Duration;

use anyhow::Result;
use tempfile::tempdir;

use tasknest::identity::{AuthorizationGate, Sessions};
use tasknest::security::CredentialStore;
use tasknest::storage::{SharedStore, TenantTasks};

fn sessions() -> Sessions {
    Sessions::new(b"integration-test-key".to_vec(), Duration::from_secs(600))
}

#[test]
fn register_then_verify_positive_and_negative() -> Result<()> {
    let store = SharedStore::open_in_memory()?;
    let creds = CredentialStore::new(store);

    let id = creds.register("alice", "s3cret")?;
    assert!(id > 0);

    let principal = creds.verify("alice", "s3cret")?;
    assert_eq!(principal.id, id);
    assert_eq!(principal.identity, "alice");

    let wrong = creds.verify("alice", "wrong").unwrap_err();
    assert_eq!(wrong.code_str(), "invalid_secret");
    assert_eq!(wrong.http_status(), 401);

    let unknown = creds.verify("mallory", "s3cret").unwrap_err();
    assert_eq!(unknown.code_str(), "unknown_identity");
    assert_eq!(unknown.http_status(), 401);
    Ok(())
}

#[test]
fn duplicate_registration_conflicts() -> Result<()> {
    let store = SharedStore::open_in_memory()?;
    let creds = CredentialStore::new(store);

    creds.register("alice", "s3cret")?;
    let err = creds.register("alice", "other").unwrap_err();
    assert_eq!(err.code_str(), "duplicate_identity");
    assert_eq!(err.http_status(), 409);

    // The original secret still verifies; the failed attempt changed nothing.
    assert!(creds.verify("alice", "s3cret").is_ok());
    Ok(())
}

#[test]
fn registration_rejects_bad_input() -> Result<()> {
    let store = SharedStore::open_in_memory()?;
    let creds = CredentialStore::new(store);

    assert_eq!(creds.register("a b", "pw").unwrap_err().http_status(), 400);
    assert_eq!(creds.register("alice;drop", "pw").unwrap_err().http_status(), 400);
    assert_eq!(creds.register("alice", "").unwrap_err().code_str(), "missing_secret");
    Ok(())
}

#[test]
fn registration_is_atomic_with_provisioning() -> Result<()> {
    let store = SharedStore::open_in_memory()?;
    let creds = CredentialStore::new(store.clone());
    let tenants = TenantTasks::new(store);

    // Occupy the namespace so provisioning inside register must fail.
    tenants.provision("alice")?;
    let err = creds.register("alice", "s3cret").unwrap_err();
    assert_eq!(err.code_str(), "namespace_conflict");

    // The identity insert rolled back with it: no half-registered principal.
    let verify = creds.verify("alice", "s3cret").unwrap_err();
    assert_eq!(verify.code_str(), "unknown_identity");
    Ok(())
}

#[test]
fn login_flow_yields_gate_admitting_token() -> Result<()> {
    let tmp = tempdir()?;
    let store = SharedStore::open(tmp.path().join("tasks.db"))?;
    let creds = CredentialStore::new(store);
    let sessions = sessions();
    let gate = AuthorizationGate::new(sessions.clone());

    creds.register("alice", "s3cret")?;
    let principal = creds.verify("alice", "s3cret")?;
    let token = sessions.issue_now(&principal.identity);

    let claims = gate.admit(Some(&token), "alice").expect("own token must admit");
    assert_eq!(claims.identity, "alice");
    Ok(())
}

#[test]
fn gate_denies_foreign_missing_and_forged_tokens() -> Result<()> {
    let sessions = sessions();
    let gate = AuthorizationGate::new(sessions.clone());

    let token = sessions.issue_now("alice");

    // alice's token never opens bob's namespace.
    let err = gate.admit(Some(&token), "bob").unwrap_err();
    assert_eq!(err.code_str(), "identity_mismatch");
    assert_eq!(err.http_status(), 401);

    assert_eq!(gate.admit(None, "alice").unwrap_err().code_str(), "missing_token");

    let foreign = Sessions::new(b"attacker-key".to_vec(), Duration::from_secs(600));
    let forged = foreign.issue_now("alice");
    assert_eq!(gate.admit(Some(&forged), "alice").unwrap_err().code_str(), "malformed_token");
    Ok(())
}
