//! Local `SQLite` backend.
//!
//! Behaves like the hosted backend: same collection names, server-assigned
//! ids and timestamps, parents embedded into list rows to the kind's join
//! depth, and not-found reported for updates and deletes that touch no row.
//! Queries run on the blocking pool so callers stay responsive.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, Params, Statement};
use serde_json::{Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use super::{ensure_kind, TableGateway};
use crate::error::{Error, Result};
use crate::kind::{Join, MasterKind};
use crate::record::{MasterPayload, MasterRecord};

type Row = Map<String, Value>;

/// Gateway over a local `SQLite` database.
#[derive(Debug)]
pub struct SqliteGateway {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteGateway {
    /// Open or create the database at `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or its schema set up.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| Error::internal("database connection lock poisoned"))?;
            f(&guard)
        })
        .await
        .map_err(|e| Error::internal(format!("database task failed: {e}")))?
    }
}

#[async_trait]
impl TableGateway for SqliteGateway {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn list(&self, kind: MasterKind) -> Result<Vec<MasterRecord>> {
        let records = self.with_conn(move |conn| list_rows(conn, kind)).await?;
        debug!("Fetched {} rows from {}", records.len(), kind.collection());
        Ok(records)
    }

    async fn create(&self, kind: MasterKind, payload: &MasterPayload) -> Result<MasterRecord> {
        ensure_kind(kind, payload)?;
        let body = payload_object(kind, payload)?;
        let record = self.with_conn(move |conn| insert_row(conn, kind, body)).await?;
        debug!("Inserted {} into {}", record.id, kind.collection());
        Ok(record)
    }

    async fn update(
        &self,
        kind: MasterKind,
        id: &str,
        payload: &MasterPayload,
    ) -> Result<MasterRecord> {
        ensure_kind(kind, payload)?;
        let body = payload_object(kind, payload)?;
        let id = id.to_string();
        self.with_conn(move |conn| update_row(conn, kind, &id, body))
            .await
    }

    async fn delete(&self, kind: MasterKind, id: &str) -> Result<()> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let sql = format!("DELETE FROM {} WHERE id = ?1", quote(&kind.collection()));
            if conn.execute(&sql, [&id])? == 0 {
                return Err(Error::not_found(kind, id));
            }
            debug!("Deleted {} from {}", id, kind.collection());
            Ok(())
        })
        .await
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn payload_object(kind: MasterKind, payload: &MasterPayload) -> Result<Row> {
    match payload.to_value() {
        Value::Object(object) => Ok(object),
        _ => Err(Error::malformed(kind, "payload is not an object")),
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}

fn to_sql(value: Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(b)),
        Value::Number(n) => n
            .as_i64()
            .map_or_else(|| SqlValue::Real(n.as_f64().unwrap_or_default()), SqlValue::Integer),
        Value::String(s) => SqlValue::Text(s),
        other => SqlValue::Text(other.to_string()),
    }
}

fn query_rows<P: Params>(stmt: &mut Statement<'_>, params: P) -> Result<Vec<Row>> {
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let rows = stmt
        .query_map(params, |row| {
            let mut object = Row::new();
            for (i, name) in names.iter().enumerate() {
                object.insert(name.clone(), to_json(row.get_ref(i)?));
            }
            Ok(object)
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn find_row(conn: &Connection, kind: MasterKind, id: &str) -> Result<Option<Row>> {
    let sql = format!("SELECT * FROM {} WHERE id = ?1", quote(&kind.collection()));
    let mut stmt = conn.prepare(&sql)?;
    Ok(query_rows(&mut stmt, [id])?.into_iter().next())
}

fn list_rows(conn: &Connection, kind: MasterKind) -> Result<Vec<MasterRecord>> {
    let sql = format!(
        "SELECT * FROM {} ORDER BY created_at DESC, rowid DESC",
        quote(&kind.collection())
    );
    let mut stmt = conn.prepare(&sql)?;
    let joins = kind.joins();
    query_rows(&mut stmt, [])?
        .into_iter()
        .map(|mut row| {
            embed_parents(conn, &mut row, &joins)?;
            MasterRecord::from_value(kind, Value::Object(row))
        })
        .collect()
}

/// Add one key per join holding the parent's name (and nested parents), or null.
fn embed_parents(conn: &Connection, row: &mut Row, joins: &[Join]) -> Result<()> {
    for join in joins {
        let parent = match row.get(&join.parent.foreign_key()) {
            Some(Value::String(id)) => find_row(conn, join.parent, id)?,
            _ => None,
        };
        let embedded = match parent {
            Some(mut parent) => {
                embed_parents(conn, &mut parent, &join.nested)?;
                let mut projected = Row::new();
                projected.insert(
                    "name".to_string(),
                    parent.remove("name").unwrap_or(Value::Null),
                );
                for nested in &join.nested {
                    projected.insert(
                        nested.field().to_string(),
                        parent.remove(nested.field()).unwrap_or(Value::Null),
                    );
                }
                Value::Object(projected)
            }
            None => Value::Null,
        };
        row.insert(join.field().to_string(), embedded);
    }
    Ok(())
}

fn insert_row(conn: &Connection, kind: MasterKind, mut body: Row) -> Result<MasterRecord> {
    let id = Uuid::new_v4().to_string();
    let timestamp = now();
    body.insert("id".to_string(), Value::String(id.clone()));
    body.insert("created_at".to_string(), Value::String(timestamp.clone()));
    body.insert("updated_at".to_string(), Value::String(timestamp));

    let columns: Vec<String> = body.keys().map(|k| quote(k)).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote(&kind.collection()),
        columns.join(", "),
        placeholders.join(", ")
    );
    conn.execute(&sql, params_from_iter(body.into_iter().map(|(_, v)| to_sql(v))))?;

    let row = find_row(conn, kind, &id)?
        .ok_or_else(|| Error::internal(format!("inserted row {id} not found")))?;
    MasterRecord::from_value(kind, Value::Object(row))
}

fn update_row(conn: &Connection, kind: MasterKind, id: &str, mut body: Row) -> Result<MasterRecord> {
    body.insert("updated_at".to_string(), Value::String(now()));

    let assignments: Vec<String> = body
        .keys()
        .enumerate()
        .map(|(i, key)| format!("{} = ?{}", quote(key), i + 1))
        .collect();
    let sql = format!(
        "UPDATE {} SET {} WHERE id = ?{}",
        quote(&kind.collection()),
        assignments.join(", "),
        assignments.len() + 1
    );
    let params = body
        .into_iter()
        .map(|(_, v)| to_sql(v))
        .chain(std::iter::once(SqlValue::Text(id.to_string())));
    if conn.execute(&sql, params_from_iter(params))? == 0 {
        return Err(Error::not_found(kind, id));
    }

    let row = find_row(conn, kind, id)?.ok_or_else(|| Error::not_found(kind, id))?;
    MasterRecord::from_value(kind, Value::Object(row))
}
