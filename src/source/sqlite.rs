//! SQLite connection to the catalog source.
//!
//! Every batch read runs inside its own deferred transaction so one batch
//! sees a consistent snapshot. A failing read drops the transaction, which
//! rolls it back, and the error is classified for the orchestrator.

use crate::error::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, OpenFlags, Transaction};
use std::path::Path;
use std::time::Duration;

/// Read-only handle on the catalog source.
#[derive(Debug)]
pub struct SourceStore {
    conn: Connection,
}

impl SourceStore {
    /// Open a source database read-only with the default busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the database does not exist or cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a source database read-only with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the database does not exist or cannot be opened.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        if let Some(timeout) = timeout_ms {
            conn.busy_timeout(Duration::from_millis(timeout))?;
        } else {
            // Default 5 second timeout
            conn.busy_timeout(Duration::from_secs(5))?;
        }

        Ok(Self { conn })
    }

    /// Wrap an existing connection (fixtures and in-memory databases).
    #[must_use]
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// Get a reference to the underlying connection.
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run `read` inside a read transaction, classifying failures against
    /// `relation`.
    pub(crate) fn read<T, F>(&self, relation: &str, read: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> rusqlite::Result<T>,
    {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| classify(relation, e))?;
        let value = read(&tx).map_err(|e| classify(relation, e))?;
        tx.commit().map_err(|e| classify(relation, e))?;
        Ok(value)
    }
}

/// Map a driver error onto the sync error taxonomy.
///
/// Busy/locked databases are transient; conversion and constraint failures
/// mean a malformed row; everything else is a plain source error.
pub(crate) fn classify(relation: &str, err: rusqlite::Error) -> Error {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if matches!(
                failure.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            ) =>
        {
            Error::SourceUnavailable(format!("{relation}: {err}"))
        }
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            Error::integrity(relation, &err)
        }
        rusqlite::Error::FromSqlConversionFailure(..)
        | rusqlite::Error::InvalidColumnType(..)
        | rusqlite::Error::IntegralValueOutOfRange(..) => Error::integrity(relation, &err),
        _ => Error::Source(err),
    }
}

/// SQLite expression normalizing a revision column to RFC 3339 with millis.
pub(crate) fn revision_expr(column: &str) -> String {
    format!("strftime('%Y-%m-%dT%H:%M:%fZ', {column})")
}

/// Read a column rendered by `revision_expr` as a UTC timestamp.
pub(crate) fn get_revision(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Format a watermark the way `revision_expr` renders revisions.
pub(crate) fn sql_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
