//! SQLite-backed resource store

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension};
use tokio::sync::Mutex;

use super::{record_op, ResourceStore};
use crate::resource::{fold, now, ListFilter, Resource, ResourcePatch};
use crate::{Error, Result};

/// SQL function applying the same case folding as the in-process filter.
/// SQLite's own LOWER() only folds ASCII.
const FOLD_FN: &str = "larder_fold";

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS resources (
        id          TEXT PRIMARY KEY,
        data        TEXT NOT NULL,
        owner       TEXT,
        tag         TEXT,
        public      INTEGER NOT NULL DEFAULT 0,
        created_at  TEXT NOT NULL,
        updated_at  TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_resources_owner ON resources(owner);
    DROP INDEX IF EXISTS idx_resources_owner_tag;
"#;

/// Relational store: one row per resource, the full record as JSON in `data`
/// plus denormalized `owner`, `tag` and `public` columns for filtering.
pub struct RelationalStore {
    conn: Mutex<Connection>,
}

impl RelationalStore {
    /// Open (or create) a database file at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| Error::BackendUnavailable(e.to_string()))?;
            }
        }

        let conn = Connection::open(path)?;

        // WAL mode + performance pragmas
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA temp_store=MEMORY;",
        )?;

        Self::init(conn)
    }

    /// Private in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA temp_store=MEMORY;")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        conn.create_scalar_function(
            FOLD_FN,
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| {
                let value: Option<String> = ctx.get(0)?;
                Ok(value.map(|v| fold(&v)))
            },
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

/// Fixed-width timestamp so the TEXT column sorts chronologically.
fn sortable(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Escape LIKE wildcards; the pattern is used with `ESCAPE '\'`.
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// WHERE clause and positional parameters for a filter.
fn where_clause(filter: &ListFilter) -> (String, Vec<String>) {
    let mut clauses = Vec::new();
    let mut values = Vec::new();

    if let Some(owner) = filter.owner() {
        values.push(owner.to_string());
        clauses.push(format!("owner = ?{}", values.len()));
    }
    if filter.public_only() {
        clauses.push("public = 1".to_string());
    }
    if let Some(tag) = filter.tag() {
        values.push(tag.to_string());
        let n = values.len();
        clauses.push(format!(
            "({f}(tag) = ?{n} OR EXISTS (SELECT 1 FROM json_each(resources.data, '$.tags') AS t WHERE {f}(t.value) = ?{n}))",
            f = FOLD_FN,
            n = n
        ));
    }
    if let Some(query) = filter.query() {
        values.push(like_pattern(query));
        clauses.push(format!(
            "{}(data) LIKE ?{} ESCAPE '\\'",
            FOLD_FN,
            values.len()
        ));
    }

    if clauses.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), values)
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation)
}

fn select_data(conn: &Connection, id: &str) -> Result<Option<Resource>> {
    let data: Option<String> = conn
        .query_row(
            "SELECT data FROM resources WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    data.map(|d| serde_json::from_str(&d).map_err(Error::from))
        .transpose()
}

#[async_trait]
impl ResourceStore for RelationalStore {
    async fn create(&self, resource: Resource) -> Result<Resource> {
        record_op("relational", "create");
        let conn = self.conn.lock().await;
        let data = resource.to_json()?;

        let inserted = conn.execute(
            r#"
            INSERT INTO resources (id, data, owner, tag, public, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                &resource.id,
                &data,
                &resource.owner,
                &resource.tag,
                resource.public,
                sortable(&resource.created_at),
                sortable(&resource.updated_at),
            ],
        );

        match inserted {
            Ok(_) => Ok(resource),
            Err(e) if is_constraint_violation(&e) => Err(Error::DuplicateId(resource.id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, id: &str) -> Result<Option<Resource>> {
        record_op("relational", "get");
        let conn = self.conn.lock().await;
        select_data(&conn, id)
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<Resource>> {
        record_op("relational", "list");
        let (clause, values) = where_clause(filter);
        let sql = format!(
            "SELECT data FROM resources{} ORDER BY created_at ASC, id ASC",
            clause
        );
        tracing::debug!(sql = %sql, "relational list");

        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(values.iter()))?;

        let mut resources = Vec::new();
        while let Some(row) = rows.next()? {
            let data: String = row.get(0)?;
            resources.push(serde_json::from_str(&data)?);
        }
        Ok(resources)
    }

    async fn update(&self, id: &str, patch: ResourcePatch) -> Result<Option<Resource>> {
        record_op("relational", "update");
        let conn = self.conn.lock().await;

        let Some(mut resource) = select_data(&conn, id)? else {
            return Ok(None);
        };
        resource.apply(patch, now());
        let data = resource.to_json()?;

        conn.execute(
            r#"
            UPDATE resources
            SET data = ?1, owner = ?2, tag = ?3, public = ?4, updated_at = ?5
            WHERE id = ?6
            "#,
            params![
                &data,
                &resource.owner,
                &resource.tag,
                resource.public,
                sortable(&resource.updated_at),
                id
            ],
        )?;

        Ok(Some(resource))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        record_op("relational", "delete");
        let conn = self.conn.lock().await;
        let deleted = conn.execute("DELETE FROM resources WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    fn backend_name(&self) -> &'static str {
        "relational"
    }
}
