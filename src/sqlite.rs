//! SQLite connection handling.

use std::path::PathBuf;
use std::time::Duration;

use rusqlite::Connection;
use tracing::debug;

use crate::config::StorageConfig;
use crate::error::{Result, StorageError};

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionTarget {
    File(PathBuf),
    InMemory,
}

impl ConnectionTarget {
    pub fn from_config(config: &StorageConfig) -> Self {
        match &config.path {
            Some(path) => Self::File(path.clone()),
            None => Self::InMemory,
        }
    }
}

/// Opens and configures a connection for `config`.
pub fn open(config: &StorageConfig) -> Result<Connection> {
    let target = ConnectionTarget::from_config(config);
    let conn = match &target {
        ConnectionTarget::File(path) => Connection::open(path)?,
        ConnectionTarget::InMemory => Connection::open_in_memory()?,
    };
    configure(&conn, config, &target)?;
    debug!(db = ?target, "sqlite connection established");
    Ok(conn)
}

fn configure(conn: &Connection, config: &StorageConfig, target: &ConnectionTarget) -> Result<()> {
    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    if config.wal && matches!(target, ConnectionTarget::File(_)) {
        // journal_mode returns the resulting mode as a row
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        debug!(mode = %mode, "journal mode set");
    }
    Ok(())
}

/// Lifecycle of the storage's single connection.
#[derive(Debug)]
pub(crate) enum ConnectionState {
    /// Not connected yet; connects on first use.
    Pending,
    Open(Connection),
    Closed,
}

impl ConnectionState {
    /// Returns the live connection, establishing it if still pending.
    pub(crate) fn connection(&mut self, config: &StorageConfig) -> Result<&mut Connection> {
        if matches!(self, Self::Pending) {
            *self = Self::Open(open(config)?);
        }
        match self {
            Self::Open(conn) => Ok(conn),
            Self::Pending | Self::Closed => Err(StorageError::Closed),
        }
    }

    /// Closes the connection. Returns false if it was already closed.
    pub(crate) fn close(&mut self) -> Result<bool> {
        match std::mem::replace(self, Self::Closed) {
            Self::Open(conn) => {
                conn.close().map_err(|(_, e)| StorageError::from(e))?;
                Ok(true)
            }
            Self::Pending => Ok(true),
            Self::Closed => Ok(false),
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_connects_on_first_use() {
        let config = StorageConfig::in_memory();
        let mut state = ConnectionState::Pending;
        let conn = state.connection(&config).expect("connect");
        let one: i64 = conn.query_row("SELECT 1", [], |row| row.get(0)).expect("query");
        assert_eq!(one, 1);
        assert!(matches!(state, ConnectionState::Open(_)));
    }

    #[test]
    fn closed_state_rejects_use() {
        let config = StorageConfig::in_memory();
        let mut state = ConnectionState::Pending;
        state.connection(&config).expect("connect");
        assert!(state.close().expect("close"));
        assert!(!state.close().expect("close twice"));
        assert!(matches!(state.connection(&config), Err(StorageError::Closed)));
        assert!(state.is_closed());
    }

    #[test]
    fn file_database_uses_wal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = StorageConfig::file(dir.path().join("wal.db"));
        let conn = open(&config).expect("open");
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .expect("pragma");
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn target_follows_config_path() {
        assert_eq!(
            ConnectionTarget::from_config(&StorageConfig::in_memory()),
            ConnectionTarget::InMemory
        );
        assert_eq!(
            ConnectionTarget::from_config(&StorageConfig::file("a.db")),
            ConnectionTarget::File(PathBuf::from("a.db"))
        );
    }
}
