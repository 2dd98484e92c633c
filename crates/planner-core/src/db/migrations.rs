//! Database migrations

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::error::Result;
use crate::models::Collection;

/// Current schema version
const CURRENT_VERSION: i32 = 1;

/// Run all pending migrations
pub fn run(conn: &mut Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get::<_, Option<i32>>(0)
        })
        .optional()?
        .flatten()
        .unwrap_or(0);

    Ok(version)
}

/// Migration to version 1: per-collection document tables and timestamp clock
fn migrate_v1(conn: &mut Connection) -> Result<()> {
    // Another server process may be migrating the same file right now
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    if get_version(&tx)? >= 1 {
        return Ok(());
    }

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );
        CREATE TABLE IF NOT EXISTS sync_clock (
            collection TEXT PRIMARY KEY,
            last_timestamp INTEGER NOT NULL
        );",
    )?;

    for collection in Collection::ALL {
        let table = collection.as_str();
        tx.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                primary_key TEXT PRIMARY KEY,
                server_timestamp INTEGER NOT NULL,
                deleted INTEGER NOT NULL DEFAULT 0,
                body TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_{table}_checkpoint
                ON {table}(server_timestamp, primary_key);"
        ))?;
    }

    tx.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        params![1],
    )?;
    tx.commit()?;

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}
