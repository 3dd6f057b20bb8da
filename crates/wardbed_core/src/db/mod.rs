//! SQLite storage bootstrap and schema migration entry points.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the ward bed core.
//! - Apply schema migrations in deterministic order.
//! - Classify lock contention so upper layers can report `LockTimeout`.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Core code must not read/write bed or assignment rows before migrations succeed.
//! - Every write path runs inside a `BEGIN IMMEDIATE` transaction, which holds
//!   the database writer lock until commit or rollback.

use rusqlite::ErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    InvalidConfig(String),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::InvalidConfig(message) => write!(f, "invalid core config: {message}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::InvalidConfig(_) => None,
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Returns whether `err` means the writer lock could not be taken within the
/// connection busy timeout.
pub fn is_lock_contention(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

/// Converts an `i64` flag column into a bool, rejecting anything but 0/1.
pub(crate) fn int_to_bool(value: i64, column: &str) -> Result<bool, String> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(format!("invalid flag value `{other}` in {column}")),
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::{bool_to_int, int_to_bool, is_lock_contention};
    use rusqlite::ffi;

    #[test]
    fn busy_and_locked_codes_count_as_contention() {
        let busy = rusqlite::Error::SqliteFailure(ffi::Error::new(ffi::SQLITE_BUSY), None);
        let locked = rusqlite::Error::SqliteFailure(ffi::Error::new(ffi::SQLITE_LOCKED), None);
        let constraint =
            rusqlite::Error::SqliteFailure(ffi::Error::new(ffi::SQLITE_CONSTRAINT), None);

        assert!(is_lock_contention(&busy));
        assert!(is_lock_contention(&locked));
        assert!(!is_lock_contention(&constraint));
        assert!(!is_lock_contention(&rusqlite::Error::QueryReturnedNoRows));
    }

    #[test]
    fn flag_columns_reject_out_of_range_values() {
        assert_eq!(int_to_bool(0, "beds.occupied"), Ok(false));
        assert_eq!(int_to_bool(bool_to_int(true), "beds.occupied"), Ok(true));
        let err = int_to_bool(7, "beds.occupied").unwrap_err();
        assert!(err.contains("beds.occupied"));
    }
}
