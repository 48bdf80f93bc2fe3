//! Database migrations.
//!
//! Migrations are run in order and tracked in the `migrations` table.

use crate::DatabaseResult;
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version.
pub const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> DatabaseResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM migrations",
        [],
        |row| row.get(0),
    )?;

    if current_version >= CURRENT_VERSION {
        debug!(current_version, "Schema up to date");
        return Ok(());
    }

    info!(current_version, target_version = CURRENT_VERSION, "Running migrations");

    if current_version < 1 {
        migrate_v1_trust_state(conn)?;
    }
    if current_version < 2 {
        migrate_v2_usage_records(conn)?;
    }

    info!("Migrations complete");
    Ok(())
}

fn record_migration(conn: &Connection, version: i32, name: &str) -> DatabaseResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO migrations (version, name) VALUES (?1, ?2)",
        rusqlite::params![version, name],
    )?;
    debug!(version, name, "Migration applied");
    Ok(())
}

/// V1: abuse records and warned-sender markers.
fn migrate_v1_trust_state(conn: &Connection) -> DatabaseResult<()> {
    info!("Applying migration v1: trust state");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS abuse_records (
            user_hash TEXT NOT NULL,
            service TEXT NOT NULL,
            request_count INTEGER NOT NULL DEFAULT 0,
            blocked INTEGER NOT NULL DEFAULT 0,
            last_request_at INTEGER NOT NULL,
            PRIMARY KEY (user_hash, service)
        );

        CREATE INDEX IF NOT EXISTS idx_abuse_records_blocked
            ON abuse_records(blocked);

        CREATE TABLE IF NOT EXISTS warned_senders (
            user_hash TEXT NOT NULL,
            service TEXT NOT NULL,
            warned_at INTEGER NOT NULL,
            PRIMARY KEY (user_hash, service)
        );
        ",
    )?;

    record_migration(conn, 1, "trust_state")
}

/// V2: append-only usage records for operational reporting.
fn migrate_v2_usage_records(conn: &Connection) -> DatabaseResult<()> {
    info!("Applying migration v2: usage records");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS usage_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            request_type TEXT,
            os TEXT,
            locale TEXT,
            channel TEXT NOT NULL,
            status TEXT NOT NULL,
            diagnostic_ref TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_usage_records_date
            ON usage_records(date);
        CREATE INDEX IF NOT EXISTS idx_usage_records_status
            ON usage_records(status);
        ",
    )?;

    record_migration(conn, 2, "usage_records")
}
