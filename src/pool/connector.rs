//! Connection Factories
//!
//! Opens and closes the backing-store handles lent out by the pool.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;
use tracing::{debug, warn};

/// Boxed error returned by connection factories.
pub type ConnectError = Box<dyn std::error::Error + Send + Sync>;

// == Connection Factory ==
/// Produces the connections a [`ConnectionPool`](super::ConnectionPool) manages.
pub trait ConnectionFactory: Send + Sync + 'static {
    type Connection: Send + 'static;

    /// Opens a new connection. Called from a blocking worker thread.
    fn connect(&self) -> Result<Self::Connection, ConnectError>;

    /// Closes a connection the pool is done with.
    fn close(&self, conn: Self::Connection) {
        drop(conn);
    }
}

// == SQLite Connector ==
/// Opens SQLite connections to one database file.
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: Duration::from_millis(10_000),
        }
    }

    /// How long a connection waits on a locked database before failing.
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConnectionFactory for SqliteConnector {
    type Connection = Connection;

    fn connect(&self) -> Result<Connection, ConnectError> {
        let conn = Connection::open(&self.path)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "temp_store", "memory")?;
        conn.busy_timeout(self.busy_timeout)?;

        debug!(path = %self.path.display(), "Opened SQLite connection");
        Ok(conn)
    }

    fn close(&self, conn: Connection) {
        if let Err((_, e)) = conn.close() {
            warn!(path = %self.path.display(), error = %e, "Failed to close SQLite connection");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_connector_opens_wal_database() {
        let dir = tempfile::tempdir().unwrap();
        let connector = SqliteConnector::new(dir.path().join("test.db"));

        let conn = connector.connect().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");

        connector.close(conn);
    }

    #[test]
    fn test_sqlite_connector_applies_busy_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("busy.db");
        let connector = SqliteConnector::new(&path).with_busy_timeout(Duration::from_millis(250));
        assert_eq!(connector.path(), path.as_path());

        let conn = connector.connect().unwrap();
        let timeout: i64 = conn
            .query_row("PRAGMA busy_timeout", [], |row| row.get(0))
            .unwrap();
        assert_eq!(timeout, 250);
    }

    #[test]
    fn test_sqlite_connector_reports_open_failure() {
        let dir = tempfile::tempdir().unwrap();
        // A directory that does not exist cannot hold the database file
        let connector = SqliteConnector::new(dir.path().join("missing").join("test.db"));

        assert!(connector.connect().is_err());
    }
}
