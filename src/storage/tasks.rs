//! Per-tenant task storage.
//!
//! Every operation takes the *authorized* identity (the one the gate admitted,
//! never raw path text) and addresses exactly one tenant table. Task ids are
//! namespace-local rowids; they are only unique within one tenant's table.

use std::collections::BTreeSet;

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::SharedStore;
use crate::error::{AppError, AppResult};
use crate::ident::namespace_table;

/// One to-do entry. `id` is assigned by the store on insert and ignored on
/// input payloads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskRecord {
    #[serde(default)]
    pub id: i64,
    pub body: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub done: bool,
}

/// Whitelisted filterable attributes. Column names come from this enum only,
/// so a field name from the wire can never reach a statement as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskField {
    Project,
    Context,
    Date,
}

impl TaskField {
    pub fn parse(name: &str) -> AppResult<Self> {
        match name {
            "project" => Ok(TaskField::Project),
            "context" => Ok(TaskField::Context),
            "date" => Ok(TaskField::Date),
            _ => Err(AppError::not_found("invalid_field", "no such task field")),
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            TaskField::Project => "project",
            TaskField::Context => "context",
            TaskField::Date => "date",
        }
    }
}

/// Calendar-day precision for date values.
const DATE_LEN: usize = 10;

fn truncate_date(value: &str) -> String {
    value.chars().take(DATE_LEN).collect()
}

/// Drop empty strings and clamp dates to `YYYY-MM-DD` before they hit storage.
fn normalize_date(date: Option<String>) -> Option<String> {
    let d = date?.trim().to_string();
    if d.is_empty() {
        None
    } else {
        Some(truncate_date(&d))
    }
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRecord> {
    Ok(TaskRecord {
        id: row.get(0)?,
        body: row.get(1)?,
        date: row.get(2)?,
        project: row.get(3)?,
        context: row.get(4)?,
        done: row.get(5)?,
    })
}

const TASK_COLUMNS: &str = "task_id, body, date, project, context, done";

/// Create the task table for `identity` on the given connection. Shared by
/// standalone provisioning and by registration, which runs it inside the same
/// transaction as the identity insert.
pub fn provision_with(conn: &Connection, identity: &str) -> AppResult<()> {
    let exists: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1",
            params![format!("tasks_{identity}")],
            |r| r.get(0),
        )
        .optional()?;
    if exists.is_some() {
        return Err(AppError::conflict("namespace_conflict", "namespace already provisioned"));
    }
    let ddl = format!(
        "CREATE TABLE {} (
             task_id  INTEGER PRIMARY KEY AUTOINCREMENT,
             body     TEXT NOT NULL,
             date     TEXT,
             project  TEXT,
             context  TEXT,
             done     INTEGER NOT NULL DEFAULT 0
         )",
        namespace_table(identity)
    );
    conn.execute(&ddl, [])?;
    Ok(())
}

/// CRUD over one principal's isolated task collection.
#[derive(Clone)]
pub struct TenantTasks {
    store: SharedStore,
}

impl TenantTasks {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Create the isolated storage region for `identity`.
    pub fn provision(&self, identity: &str) -> AppResult<()> {
        let conn = self.store.0.lock();
        provision_with(&conn, identity)
    }

    /// Full scan of the namespace; storage order, empty when none.
    pub fn list(&self, identity: &str) -> AppResult<Vec<TaskRecord>> {
        let conn = self.store.0.lock();
        let sql = format!("SELECT {TASK_COLUMNS} FROM {}", namespace_table(identity));
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_task)?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?);
        }
        Ok(tasks)
    }

    /// Insert a task and return it with its assigned namespace-local id.
    pub fn insert(&self, identity: &str, record: &TaskRecord) -> AppResult<TaskRecord> {
        if record.body.trim().is_empty() {
            return Err(AppError::user("missing_body", "task body is required"));
        }
        let date = normalize_date(record.date.clone());
        let conn = self.store.0.lock();
        let sql = format!(
            "INSERT INTO {} (body, date, project, context, done) VALUES (?1, ?2, ?3, ?4, ?5)",
            namespace_table(identity)
        );
        conn.execute(
            &sql,
            params![record.body, date, record.project, record.context, record.done],
        )?;
        Ok(TaskRecord {
            id: conn.last_insert_rowid(),
            body: record.body.clone(),
            date,
            project: record.project.clone(),
            context: record.context.clone(),
            done: record.done,
        })
    }

    pub fn get(&self, identity: &str, id: i64) -> AppResult<TaskRecord> {
        let conn = self.store.0.lock();
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM {} WHERE task_id = ?1",
            namespace_table(identity)
        );
        conn.query_row(&sql, params![id], row_to_task)
            .optional()?
            .ok_or_else(|| AppError::not_found("task_not_found", "no task with that id"))
    }

    /// Replace all mutable attributes of the task at `id`. Zero affected rows
    /// is reported as not-found, never as a silent no-op.
    pub fn update(&self, identity: &str, id: i64, record: &TaskRecord) -> AppResult<()> {
        if record.body.trim().is_empty() {
            return Err(AppError::user("missing_body", "task body is required"));
        }
        let date = normalize_date(record.date.clone());
        let conn = self.store.0.lock();
        let sql = format!(
            "UPDATE {} SET body = ?1, date = ?2, project = ?3, context = ?4, done = ?5 WHERE task_id = ?6",
            namespace_table(identity)
        );
        let affected = conn.execute(
            &sql,
            params![record.body, date, record.project, record.context, record.done, id],
        )?;
        if affected == 0 {
            return Err(AppError::not_found("task_not_found", "no task with that id"));
        }
        Ok(())
    }

    pub fn remove(&self, identity: &str, id: i64) -> AppResult<()> {
        let conn = self.store.0.lock();
        let sql = format!("DELETE FROM {} WHERE task_id = ?1", namespace_table(identity));
        let affected = conn.execute(&sql, params![id])?;
        if affected == 0 {
            return Err(AppError::not_found("task_not_found", "no task with that id"));
        }
        Ok(())
    }

    /// Distinct non-empty values of one whitelisted attribute. Dates are
    /// clamped to calendar-day precision.
    pub fn distinct_values(&self, identity: &str, field: TaskField) -> AppResult<Vec<String>> {
        let conn = self.store.0.lock();
        let sql = format!(
            "SELECT DISTINCT {} FROM {}",
            field.column(),
            namespace_table(identity)
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |r| r.get::<_, Option<String>>(0))?;
        let mut values = BTreeSet::new();
        for row in rows {
            let Some(mut value) = row? else { continue };
            if field == TaskField::Date {
                value = truncate_date(&value);
            }
            if !value.is_empty() {
                values.insert(value);
            }
        }
        Ok(values.into_iter().collect())
    }

    /// Equality filter on one whitelisted attribute.
    pub fn find_by_field(&self, identity: &str, field: TaskField, value: &str) -> AppResult<Vec<TaskRecord>> {
        let conn = self.store.0.lock();
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM {} WHERE {} = ?1",
            namespace_table(identity),
            field.column()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![value], row_to_task)?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?);
        }
        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_whitelist() {
        assert_eq!(TaskField::parse("project").unwrap(), TaskField::Project);
        assert_eq!(TaskField::parse("context").unwrap(), TaskField::Context);
        assert_eq!(TaskField::parse("date").unwrap(), TaskField::Date);
        let err = TaskField::parse("body").unwrap_err();
        assert_eq!(err.code_str(), "invalid_field");
        assert!(TaskField::parse("task_id; DROP TABLE users").is_err());
    }

    #[test]
    fn date_normalization() {
        assert_eq!(normalize_date(Some("2026-08-23T12:00:00".into())), Some("2026-08-23".into()));
        assert_eq!(normalize_date(Some("  ".into())), None);
        assert_eq!(normalize_date(None), None);
    }
}
