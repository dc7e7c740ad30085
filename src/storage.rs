//!
//! tasknest storage module
//! -----------------------
//! SQLite-backed persistence. The layout is one `users` catalog table plus one
//! task table per registered principal (see `crate::ident::namespace_table`).
//! All data access goes through parameterized statements; tenant table names
//! are derived only from validated identities and quoted on every use.
//!
//! The public API centers around `SharedStore`, a single connection behind a
//! `parking_lot::Mutex` shared via `Arc`. Guards are never held across await
//! points; per-statement atomicity comes from the engine.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::info;

pub mod tasks;
pub use tasks::{TaskField, TaskRecord, TenantTasks};

/// Thread-safe handle to the process-wide SQLite connection.
#[derive(Clone)]
pub struct SharedStore(pub Arc<Mutex<Connection>>);

impl SharedStore {
    /// Open (or create) the database file and ensure the catalog schema.
    /// Failure here is fatal to the process.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        bootstrap(&conn)?;
        info!("storage ready at {}", path.display());
        Ok(SharedStore(Arc::new(Mutex::new(conn))))
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        bootstrap(&conn)?;
        Ok(SharedStore(Arc::new(Mutex::new(conn))))
    }
}

fn bootstrap(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         CREATE TABLE IF NOT EXISTS users (
             user_id     INTEGER PRIMARY KEY,
             identity    TEXT NOT NULL UNIQUE,
             secret_hash TEXT NOT NULL,
             created_at  INTEGER NOT NULL
         );",
    )
    .context("failed to bootstrap catalog schema")?;
    Ok(())
}
