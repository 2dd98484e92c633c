//! Database connection management

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;

use super::migrations;
use crate::error::{Error, Result};

/// Default time a writer waits for the database write lock
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to an on-disk `SQLite` database.
///
/// Cheap to clone: it only carries the path and connection settings. Every
/// operation opens its own connection, so concurrent requests (and separate
/// server processes sharing the file) coordinate through `SQLite` locking.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
    busy_timeout: Duration,
}

impl Database {
    /// Open the database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_busy_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open with an explicit busy timeout for lock contention
    pub fn open_with_busy_timeout(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.as_os_str().is_empty() {
            return Err(Error::invalid_input("Database path must not be empty"));
        }
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let database = Self { path, busy_timeout };
        let mut conn = database.connect()?;
        migrations::run(&mut conn)?;
        tracing::debug!(path = %database.path.display(), "Opened planner database");
        Ok(database)
    }

    /// Open a new configured connection
    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        self.configure(&conn)?;
        Ok(conn)
    }

    /// Configure `SQLite` for concurrent readers and a single queued writer
    fn configure(&self, conn: &Connection) -> Result<()> {
        conn.busy_timeout(self.busy_timeout)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
