//! Document store implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use super::Database;
use crate::error::Result;
use crate::models::{Document, Schema};
use crate::sync::{resolve, AssumedMasterState, Checkpoint, ConflictReason, Resolution, ServerTimestamp};

/// Result of a conditional write
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome<T> {
    /// The new state was stored with a fresh server timestamp
    Written(Document<T>),
    /// Storage was left untouched; `current` is the authoritative state
    Conflict {
        current: Option<Document<T>>,
        reason: ConflictReason,
    },
}

/// Trait for per-collection document storage.
///
/// Rows are never physically deleted: `_deleted = true` is stored like any
/// other field and keeps flowing to pull.
pub trait DocumentStore {
    /// Get a document by primary key, tombstones included
    fn read<T: Schema>(&self, primary_key: &str) -> Result<Option<Document<T>>>;

    /// Insert or replace a document unconditionally, assigning a fresh timestamp
    fn write<T: Schema>(&self, document: &Document<T>) -> Result<Document<T>>;

    /// Documents strictly after `checkpoint` in `(server_timestamp, primary_key)`
    /// order, at most `limit` of them
    fn query_after<T: Schema>(
        &self,
        checkpoint: Option<&Checkpoint>,
        limit: usize,
    ) -> Result<Vec<Document<T>>>;

    /// Atomically compare the stored state against `assumed` and write
    /// `new_state` only if the conflict resolver accepts it
    fn compare_and_write<T: Schema>(
        &self,
        new_state: &Document<T>,
        assumed: &AssumedMasterState<T>,
    ) -> Result<WriteOutcome<T>>;
}

/// `SQLite` implementation of `DocumentStore`
#[derive(Debug, Clone)]
pub struct SqliteDocumentStore {
    db: Database,
}

impl SqliteDocumentStore {
    /// Create a new store over the given database
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    pub const fn database(&self) -> &Database {
        &self.db
    }

    /// Read a row inside whatever transaction `conn` is in
    fn read_row<T: Schema>(conn: &Connection, primary_key: &str) -> Result<Option<Document<T>>> {
        let table = T::COLLECTION.as_str();
        let row = conn
            .query_row(
                &format!(
                    "SELECT server_timestamp, deleted, body FROM {table} WHERE primary_key = ?1"
                ),
                params![primary_key],
                Self::row_parts,
            )
            .optional()?;

        row.map(|(server_timestamp, deleted, body)| Self::decode(server_timestamp, deleted, &body))
            .transpose()
    }

    /// Allocate the next timestamp for a collection and store the row.
    ///
    /// Must run inside an immediate transaction so the clock read-modify-write
    /// and the row upsert commit together.
    fn write_row<T: Schema>(conn: &Connection, document: &Document<T>) -> Result<Document<T>> {
        let collection = T::COLLECTION;
        let now = chrono::Utc::now().timestamp_millis();
        let server_timestamp: i64 = conn.query_row(
            "INSERT INTO sync_clock (collection, last_timestamp) VALUES (?1, ?2)
             ON CONFLICT(collection) DO UPDATE
             SET last_timestamp = MAX(excluded.last_timestamp, sync_clock.last_timestamp + 1)
             RETURNING last_timestamp",
            params![collection.as_str(), now],
            |row| row.get(0),
        )?;

        let body = serde_json::to_string(&document.data)?;
        let table = collection.as_str();
        conn.execute(
            &format!(
                "INSERT INTO {table} (primary_key, server_timestamp, deleted, body)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(primary_key) DO UPDATE SET
                     server_timestamp = excluded.server_timestamp,
                     deleted = excluded.deleted,
                     body = excluded.body"
            ),
            params![document.primary_key(), server_timestamp, document.deleted, body],
        )?;

        Ok(Document {
            data: document.data.clone(),
            deleted: document.deleted,
            server_timestamp: Some(ServerTimestamp::new(server_timestamp)),
        })
    }

    /// `(server_timestamp, deleted, body)` of a selected row
    fn row_parts(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, bool, String)> {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
    }

    fn decode<T: Schema>(server_timestamp: i64, deleted: bool, body: &str) -> Result<Document<T>> {
        Ok(Document {
            data: serde_json::from_str(body)?,
            deleted,
            server_timestamp: Some(ServerTimestamp::new(server_timestamp)),
        })
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn read<T: Schema>(&self, primary_key: &str) -> Result<Option<Document<T>>> {
        let conn = self.db.connect()?;
        Self::read_row(&conn, primary_key)
    }

    fn write<T: Schema>(&self, document: &Document<T>) -> Result<Document<T>> {
        let mut conn = self.db.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let stored = Self::write_row(&tx, document)?;
        tx.commit()?;
        Ok(stored)
    }

    fn query_after<T: Schema>(
        &self,
        checkpoint: Option<&Checkpoint>,
        limit: usize,
    ) -> Result<Vec<Document<T>>> {
        let conn = self.db.connect()?;
        let table = T::COLLECTION.as_str();
        let limit = limit as i64;

        let rows = if let Some(checkpoint) = checkpoint {
            let mut stmt = conn.prepare(&format!(
                "SELECT server_timestamp, deleted, body
                 FROM {table}
                 WHERE server_timestamp > ?1
                    OR (server_timestamp = ?1 AND primary_key > ?2)
                 ORDER BY server_timestamp ASC, primary_key ASC
                 LIMIT ?3"
            ))?;
            let rows = stmt
                .query_map(
                    params![
                        checkpoint.server_timestamp.value(),
                        checkpoint.primary_key,
                        limit
                    ],
                    Self::row_parts,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        } else {
            let mut stmt = conn.prepare(&format!(
                "SELECT server_timestamp, deleted, body
                 FROM {table}
                 ORDER BY server_timestamp ASC, primary_key ASC
                 LIMIT ?1"
            ))?;
            let rows = stmt
                .query_map(params![limit], Self::row_parts)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        rows.into_iter()
            .map(|(server_timestamp, deleted, body)| Self::decode(server_timestamp, deleted, &body))
            .collect()
    }

    fn compare_and_write<T: Schema>(
        &self,
        new_state: &Document<T>,
        assumed: &AssumedMasterState<T>,
    ) -> Result<WriteOutcome<T>> {
        let mut conn = self.db.connect()?;
        // IMMEDIATE takes the write lock up front, so no other writer can
        // change the row between the comparison and the write.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current = Self::read_row::<T>(&tx, new_state.primary_key())?;

        match resolve(current.as_ref(), assumed) {
            Resolution::Apply => {
                let stored = Self::write_row(&tx, new_state)?;
                tx.commit()?;
                Ok(WriteOutcome::Written(stored))
            }
            Resolution::Conflict(reason) => {
                tx.rollback()?;
                Ok(WriteOutcome::Conflict { current, reason })
            }
        }
    }
}
