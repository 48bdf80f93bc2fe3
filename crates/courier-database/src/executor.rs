//! Async SQLite executor using a dedicated background thread.
//!
//! This module provides an async-friendly interface to SQLite that:
//! - Uses a single dedicated thread for all SQLite operations
//! - Sends queries through a channel (non-blocking from caller's perspective)
//! - Keeps the Tokio runtime free for other async work
//!
//! Every handler task in a process shares one `AsyncDatabase` clone, so a
//! read-modify-write submitted as a single closure can never interleave with
//! another one. Across processes, [`AsyncDatabase::call_mut`] closures take
//! an immediate transaction and `busy_timeout` makes competitors wait.
//!
//! # Example
//!
//! ```ignore
//! let db = AsyncDatabase::open(path).await?;
//!
//! let rows = db.call(|conn| queries::list_usage_records(conn, 100)).await?;
//! ```

use crate::{migrations, DatabaseError, DatabaseResult};
use std::path::Path;
use tokio_rusqlite::Connection;
use tracing::{debug, info};

const PRAGMAS: &str = "
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous = NORMAL;
    PRAGMA foreign_keys = ON;
    PRAGMA temp_store = MEMORY;
    PRAGMA busy_timeout = 5000;
";

/// Convert a tokio_rusqlite::Error to DatabaseError.
fn from_tokio_rusqlite(e: tokio_rusqlite::Error) -> DatabaseError {
    match e {
        tokio_rusqlite::Error::Rusqlite(e) => DatabaseError::Sqlite(e),
        tokio_rusqlite::Error::Close(_) => {
            DatabaseError::Connection("Connection closed".to_string())
        }
        other => DatabaseError::Connection(other.to_string()),
    }
}

/// Async SQLite database with a dedicated executor thread.
///
/// All operations are sent to a single background thread via channel.
/// This avoids blocking the Tokio runtime and provides predictable
/// query ordering (FIFO).
#[derive(Clone)]
pub struct AsyncDatabase {
    conn: Connection,
    path: String,
}

impl AsyncDatabase {
    /// Open a database at the given path.
    ///
    /// This will:
    /// - Create the database file if it doesn't exist
    /// - Enable WAL mode and a busy timeout
    /// - Run any pending migrations
    /// - Start the dedicated executor thread
    pub async fn open(path: &Path) -> DatabaseResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let path_str = path.to_string_lossy().to_string();

        info!(path = %path_str, "Opening async database");

        let conn = Connection::open(&path_str)
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        let db = Self {
            conn,
            path: path_str,
        };
        db.initialize(PRAGMAS).await?;

        info!(path = %db.path, "Async database initialized with WAL mode");
        Ok(db)
    }

    /// Open an in-memory database (tests, single-shot tooling).
    pub async fn open_in_memory() -> DatabaseResult<Self> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        let db = Self {
            conn,
            path: ":memory:".to_string(),
        };
        // WAL mode doesn't apply to in-memory databases
        db.initialize("PRAGMA foreign_keys = ON;").await?;
        Ok(db)
    }

    async fn initialize(&self, pragmas: &'static str) -> DatabaseResult<()> {
        self.call_sqlite(move |conn| conn.execute_batch(pragmas))
            .await?;
        self.call(|conn| migrations::run_migrations(conn)).await
    }

    /// Execute a closure on the database connection.
    ///
    /// The closure runs on the dedicated SQLite thread. The caller's async
    /// task is parked (not blocked) until the result is ready.
    ///
    /// Inside the closure, only SQL queries and lightweight row mapping
    /// belong; anything slower starves every other caller.
    pub async fn call<F, T>(&self, f: F) -> DatabaseResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> DatabaseResult<T> + Send + 'static,
        T: Send + 'static,
    {
        // Our DatabaseResult rides inside tokio_rusqlite's Ok variant.
        let outer_result = self.conn.call(move |conn| Ok(f(conn))).await;

        match outer_result {
            Ok(inner) => inner,
            Err(e) => Err(from_tokio_rusqlite(e)),
        }
    }

    /// Execute a closure that needs a mutable connection (transactions).
    pub async fn call_mut<F, T>(&self, f: F) -> DatabaseResult<T>
    where
        F: FnOnce(&mut rusqlite::Connection) -> DatabaseResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let outer_result = self.conn.call(move |conn| Ok(f(conn))).await;

        match outer_result {
            Ok(inner) => inner,
            Err(e) => Err(from_tokio_rusqlite(e)),
        }
    }

    /// Execute a closure that returns a rusqlite::Result.
    pub async fn call_sqlite<F, T>(&self, f: F) -> DatabaseResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.conn
            .call(move |conn| Ok(f(conn)?))
            .await
            .map_err(from_tokio_rusqlite)
    }

    /// Get the database file path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Check if the database is healthy by executing a simple query.
    pub async fn health_check(&self) -> DatabaseResult<()> {
        self.call_sqlite(|conn| conn.execute_batch("SELECT 1"))
            .await?;
        debug!("Database health check passed");
        Ok(())
    }

    /// Close the database connection after pending operations finish.
    pub async fn close(self) -> DatabaseResult<()> {
        self.conn
            .close()
            .await
            .map_err(|e| DatabaseError::Connection(format!("Failed to close database: {:?}", e)))?;
        info!(path = %self.path, "Database closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_async_database_open() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("test.db");

        let db = AsyncDatabase::open(&db_path).await.unwrap();
        assert!(db.health_check().await.is_ok());
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn test_close_then_reopen_keeps_data() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("close.db");

        let db = AsyncDatabase::open(&db_path).await.unwrap();
        db.call_sqlite(|conn| conn.execute_batch("CREATE TABLE kept (id INTEGER PRIMARY KEY)"))
            .await
            .unwrap();
        db.close().await.unwrap();

        let db = AsyncDatabase::open(&db_path).await.unwrap();
        let count: i64 = db
            .call_sqlite(|conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE name = 'kept'",
                    [],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_open_in_memory_runs_migrations() {
        let db = AsyncDatabase::open_in_memory().await.unwrap();
        let tables: Vec<String> = db
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                )?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .unwrap();

        assert!(tables.contains(&"abuse_records".to_string()));
        assert!(tables.contains(&"warned_senders".to_string()));
        assert!(tables.contains(&"usage_records".to_string()));
    }

    #[tokio::test]
    async fn test_concurrent_read_modify_write_is_serialized() {
        let dir = tempdir().unwrap();
        let db = AsyncDatabase::open(&dir.path().join("counter.db"))
            .await
            .unwrap();

        db.call_sqlite(|conn| {
            conn.execute_batch(
                "CREATE TABLE counter (id INTEGER PRIMARY KEY, val INTEGER);
                 INSERT INTO counter (val) VALUES (0);",
            )
        })
        .await
        .unwrap();

        let mut handles = vec![];
        for _ in 0..20 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                db.call_mut(|conn| {
                    let tx = conn.transaction()?;
                    let val: i64 =
                        tx.query_row("SELECT val FROM counter WHERE id = 1", [], |r| r.get(0))?;
                    tx.execute("UPDATE counter SET val = ?1 WHERE id = 1", [val + 1])?;
                    tx.commit()?;
                    Ok(())
                })
                .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let count: i64 = db
            .call_sqlite(|conn| conn.query_row("SELECT val FROM counter WHERE id = 1", [], |r| r.get(0)))
            .await
            .unwrap();
        assert_eq!(count, 20);
    }
}
