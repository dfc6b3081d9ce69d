//! # SQLite Persistence Gateway
//!
//! `SqliteProvider` is the only component that talks to the database. It hands
//! out parameterized `query`/`query_one`/`execute` calls and a `Transaction`
//! scope. Both implement [`Executor`] so service helpers can run unchanged
//! inside or outside a transaction.

use crate::errors::KbError;
use crate::types::{parse_ts, UserSummary};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{
    fmt::{self, Debug},
    sync::Arc,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use turso::{Connection, Database, Row, Value};

pub mod sql;

/// The roles every installation starts with.
pub const SEEDED_ROLES: [&str; 4] = ["viewer", "contributor", "admin", "super_admin"];

/// A provider for interacting with a local SQLite database using Turso.
///
/// Cloning shares the underlying database and the write lock, so clones of an
/// in-memory provider see the same data. SQLite admits one writer at a time;
/// every write and every transaction goes through `write_lock` so concurrent
/// requests queue instead of failing with a busy error.
#[derive(Clone)]
pub struct SqliteProvider {
    /// The Turso database instance. It's cloneable and thread-safe.
    pub db: Database,
    write_lock: Arc<Mutex<()>>,
}

impl SqliteProvider {
    /// Opens (or creates) the database at `db_path`. Use ":memory:" for an
    /// isolated in-memory database.
    pub async fn new(db_path: &str) -> Result<Self, KbError> {
        let db = turso::Builder::new_local(db_path).build().await?;

        // Use `query` for PRAGMA statements that return a value to avoid "unexpected row" errors.
        let conn = db.connect()?;
        conn.query("PRAGMA journal_mode=WAL;", ()).await?;

        Ok(Self {
            db,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn connect(&self) -> Result<Connection, KbError> {
        Ok(self.db.connect()?)
    }

    /// Ensures that all tables exist and the base roles are seeded.
    /// Idempotent; called on every startup.
    pub async fn initialize_schema(&self) -> Result<(), KbError> {
        let _guard = self.write_lock.lock().await;
        let conn = self.connect()?;

        for statement in sql::ALL_TABLE_CREATION_SQL {
            conn.execute(statement, ()).await?;
        }

        for role in SEEDED_ROLES {
            let exists = run_query(
                &conn,
                "SELECT id FROM roles WHERE name = ?",
                vec![Value::Text(role.to_string())],
            )
            .await?;
            if exists.is_empty() {
                conn.execute(
                    "INSERT INTO roles (id, name) VALUES (?, ?)",
                    turso::params![crate::types::new_id(), role],
                )
                .await?;
                info!(role, "Seeded role");
            }
        }
        Ok(())
    }

    /// Opens a transaction. The write lock is held until the transaction is
    /// committed or rolled back, so statements issued through the provider
    /// itself from inside the same task would deadlock; use the transaction.
    pub async fn begin(&self) -> Result<Transaction, KbError> {
        let guard = self.write_lock.clone().lock_owned().await;
        let conn = self.connect()?;
        conn.execute("BEGIN TRANSACTION", ()).await?;
        Ok(Transaction {
            conn,
            _guard: guard,
        })
    }

    /// Takes the write lock for code that writes through its own connection
    /// (the user directory). Hold it for the whole write.
    pub async fn exclusive(&self) -> OwnedMutexGuard<()> {
        self.write_lock.clone().lock_owned().await
    }
}

impl Debug for SqliteProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteProvider").finish_non_exhaustive()
    }
}

impl AsRef<Database> for SqliteProvider {
    fn as_ref(&self) -> &Database {
        &self.db
    }
}

/// Anything that can run parameterized statements.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn query(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Row>, KbError>;

    async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<u64, KbError>;

    async fn query_one(&self, sql: &str, params: Vec<Value>) -> Result<Option<Row>, KbError> {
        Ok(self.query(sql, params).await?.into_iter().next())
    }
}

#[async_trait]
impl Executor for SqliteProvider {
    async fn query(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Row>, KbError> {
        let conn = self.connect()?;
        run_query(&conn, sql, params).await
    }

    async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<u64, KbError> {
        let _guard = self.write_lock.lock().await;
        let conn = self.connect()?;
        run_execute(&conn, sql, params).await
    }
}

/// A unit of work grouped under one commit or rollback.
pub struct Transaction {
    conn: Connection,
    _guard: OwnedMutexGuard<()>,
}

impl Transaction {
    pub async fn commit(self) -> Result<(), KbError> {
        self.conn.execute("COMMIT", ()).await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<(), KbError> {
        self.conn.execute("ROLLBACK", ()).await?;
        Ok(())
    }

    /// Commits when `result` is `Ok`, rolls back otherwise, and hands the
    /// result back. A failed rollback is logged; the original error wins.
    pub async fn finish<T>(self, result: Result<T, KbError>) -> Result<T, KbError> {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = self.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                Err(e)
            }
        }
    }
}

#[async_trait]
impl Executor for Transaction {
    async fn query(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Row>, KbError> {
        run_query(&self.conn, sql, params).await
    }

    async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<u64, KbError> {
        run_execute(&self.conn, sql, params).await
    }
}

async fn run_query(conn: &Connection, sql: &str, params: Vec<Value>) -> Result<Vec<Row>, KbError> {
    debug!(sql = %sql, "--> Executing SQLite query");
    let mut rows = if params.is_empty() {
        conn.query(sql, ()).await?
    } else {
        conn.query(sql, params).await?
    };
    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        out.push(row);
    }
    Ok(out)
}

async fn run_execute(conn: &Connection, sql: &str, params: Vec<Value>) -> Result<u64, KbError> {
    debug!(sql = %sql, "--> Executing SQLite statement");
    let affected = if params.is_empty() {
        conn.execute(sql, ()).await?
    } else {
        conn.execute(sql, params).await?
    };
    Ok(affected)
}

/// Constructors for statement parameters.
pub mod value {
    use turso::Value;

    pub fn text(s: impl Into<String>) -> Value {
        Value::Text(s.into())
    }

    pub fn opt_text<S: Into<String>>(s: Option<S>) -> Value {
        s.map(|s| Value::Text(s.into())).unwrap_or(Value::Null)
    }

    pub fn int(i: i64) -> Value {
        Value::Integer(i)
    }

    pub fn flag(b: bool) -> Value {
        Value::Integer(i64::from(b))
    }

    pub fn opt_json(v: Option<&serde_json::Value>) -> Value {
        v.map(|v| Value::Text(v.to_string())).unwrap_or(Value::Null)
    }
}

/// Typed accessors over a result row.
pub trait RowExt {
    fn text(&self, idx: usize) -> Result<String, KbError>;
    fn opt_text(&self, idx: usize) -> Result<Option<String>, KbError>;
    fn int(&self, idx: usize) -> Result<i64, KbError>;
    fn flag(&self, idx: usize) -> Result<bool, KbError>;

    fn ts(&self, idx: usize) -> Result<DateTime<Utc>, KbError> {
        parse_ts(&self.text(idx)?)
    }

    fn opt_ts(&self, idx: usize) -> Result<Option<DateTime<Utc>>, KbError> {
        self.opt_text(idx)?.map(|s| parse_ts(&s)).transpose()
    }

    fn opt_json(&self, idx: usize) -> Result<Option<serde_json::Value>, KbError> {
        match self.opt_text(idx)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Reads `{id, name, email}` from three consecutive columns of a LEFT
    /// JOIN, returning `None` when the join found no user.
    fn opt_user(&self, idx: usize) -> Result<Option<UserSummary>, KbError> {
        match (self.opt_text(idx)?, self.opt_text(idx + 2)?) {
            (Some(id), Some(email)) => Ok(Some(UserSummary {
                id,
                name: self.opt_text(idx + 1)?,
                email,
            })),
            _ => Ok(None),
        }
    }
}

impl RowExt for Row {
    fn text(&self, idx: usize) -> Result<String, KbError> {
        match self.get_value(idx)? {
            Value::Text(s) => Ok(s),
            Value::Integer(i) => Ok(i.to_string()),
            other => Err(KbError::DataIntegrity(format!(
                "Expected text in column {idx}, found {other:?}"
            ))),
        }
    }

    fn opt_text(&self, idx: usize) -> Result<Option<String>, KbError> {
        match self.get_value(idx)? {
            Value::Null => Ok(None),
            Value::Text(s) => Ok(Some(s)),
            Value::Integer(i) => Ok(Some(i.to_string())),
            other => Err(KbError::DataIntegrity(format!(
                "Expected nullable text in column {idx}, found {other:?}"
            ))),
        }
    }

    fn int(&self, idx: usize) -> Result<i64, KbError> {
        match self.get_value(idx)? {
            Value::Integer(i) => Ok(i),
            Value::Real(f) => Ok(f as i64),
            Value::Null => Ok(0),
            other => Err(KbError::DataIntegrity(format!(
                "Expected integer in column {idx}, found {other:?}"
            ))),
        }
    }

    fn flag(&self, idx: usize) -> Result<bool, KbError> {
        Ok(self.int(idx)? != 0)
    }
}
