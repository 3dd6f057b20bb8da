//! Bed registry contracts and SQLite implementation.
//!
//! # Responsibility
//! - Hold the canonical list of beds and their occupancy flags.
//! - Enforce sequential provisioning (`MAX(number) + 1`, starting at 1).
//! - Guard deletion against in-use beds.
//!
//! # Invariants
//! - Registered numbers always form the contiguous range `1..=max`.
//! - Read-max and insert run in one IMMEDIATE transaction, so concurrent
//!   registrations never receive the same number.
//! - Occupancy is written only through `write_occupancy`, which is reserved
//!   for the occupancy synchronizer.

use crate::db::migrations::latest_version;
use crate::db::{bool_to_int, int_to_bool, is_lock_contention, DbError};
use crate::model::bed::{next_bed_number, Bed, BedNumber};
use log::{debug, info, warn};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors from bed registry and occupancy operations.
#[derive(Debug)]
pub enum RegistryError {
    /// Registration or deletion would break the contiguous `1..=max` range.
    SequenceViolation {
        expected: BedNumber,
        actual: BedNumber,
    },
    /// Operation targets a number that is not registered.
    UnknownBed(BedNumber),
    /// Delete attempted while the bed is occupied.
    BedOccupied(BedNumber),
    /// Writer lock was not acquired within the configured timeout.
    LockTimeout,
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    Db(DbError),
    InvalidData(String),
}

impl RegistryError {
    /// Returns whether retrying the same call with backoff may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout)
    }
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SequenceViolation { expected, actual } => write!(
                f,
                "bed sequence violation: expected bed {expected}, got {actual}"
            ),
            Self::UnknownBed(number) => write!(f, "bed not registered: {number}"),
            Self::BedOccupied(number) => write!(f, "bed is occupied: {number}"),
            Self::LockTimeout => write!(f, "timed out waiting for bed registry lock"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "bed registry requires schema version {expected_version}, got {actual_version}"
            ),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted bed data: {message}"),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RegistryError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::Sqlite(err) => Self::from(err),
            other => Self::Db(other),
        }
    }
}

impl From<rusqlite::Error> for RegistryError {
    fn from(value: rusqlite::Error) -> Self {
        if is_lock_contention(&value) {
            return Self::LockTimeout;
        }
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for the bed registry.
///
/// Occupancy is read-only here; `OccupancySynchronizer` is its only writer.
pub trait BedRegistry {
    /// Appends the next bed (`MAX + 1`, or 1 when empty) and returns its number.
    fn register_bed(&self) -> RegistryResult<BedNumber>;
    /// Appends a bed with a caller-supplied number, which must equal `MAX + 1`.
    fn register_bed_with_number(&self, number: BedNumber) -> RegistryResult<BedNumber>;
    /// Deletes the last bed. Fails while it is occupied.
    fn delete_bed(&self, number: BedNumber) -> RegistryResult<()>;
    /// Returns the occupancy flag of one registered bed.
    fn get_occupancy(&self, number: BedNumber) -> RegistryResult<bool>;
    /// Loads one bed, if registered.
    fn get_bed(&self, number: BedNumber) -> RegistryResult<Option<Bed>>;
    /// Lists all beds ascending by number.
    fn list_beds(&self) -> RegistryResult<Vec<Bed>>;
}

/// SQLite-backed bed registry.
pub struct SqliteBedRegistry<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteBedRegistry<'conn> {
    /// Creates registry from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RegistryResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl BedRegistry for SqliteBedRegistry<'_> {
    fn register_bed(&self) -> RegistryResult<BedNumber> {
        let tx = begin_immediate(self.conn)?;
        let number = next_bed_number(current_max(&tx)?);
        insert_bed(&tx, number)?;
        tx.commit()?;

        info!("event=bed_register module=repo status=ok bed_number={number}");
        Ok(number)
    }

    fn register_bed_with_number(&self, number: BedNumber) -> RegistryResult<BedNumber> {
        let tx = begin_immediate(self.conn)?;
        let expected = next_bed_number(current_max(&tx)?);
        if number != expected {
            warn!(
                "event=bed_register module=repo status=error error_code=sequence_violation expected={expected} actual={number}"
            );
            return Err(RegistryError::SequenceViolation {
                expected,
                actual: number,
            });
        }
        insert_bed(&tx, number)?;
        tx.commit()?;

        info!("event=bed_register module=repo status=ok mode=explicit bed_number={number}");
        Ok(number)
    }

    fn delete_bed(&self, number: BedNumber) -> RegistryResult<()> {
        let tx = begin_immediate(self.conn)?;
        let bed = load_bed(&tx, number)?.ok_or(RegistryError::UnknownBed(number))?;
        if bed.occupied {
            warn!(
                "event=bed_delete module=repo status=error error_code=bed_occupied bed_number={number}"
            );
            return Err(RegistryError::BedOccupied(number));
        }
        if let Some(max) = current_max(&tx)?.filter(|max| *max != number) {
            warn!(
                "event=bed_delete module=repo status=error error_code=sequence_violation expected={max} actual={number}"
            );
            return Err(RegistryError::SequenceViolation {
                expected: max,
                actual: number,
            });
        }

        tx.execute("DELETE FROM beds WHERE number = ?1;", [number])?;
        tx.commit()?;

        info!("event=bed_delete module=repo status=ok bed_number={number}");
        Ok(())
    }

    fn get_occupancy(&self, number: BedNumber) -> RegistryResult<bool> {
        load_bed(self.conn, number)?
            .map(|bed| bed.occupied)
            .ok_or(RegistryError::UnknownBed(number))
    }

    fn get_bed(&self, number: BedNumber) -> RegistryResult<Option<Bed>> {
        load_bed(self.conn, number)
    }

    fn list_beds(&self) -> RegistryResult<Vec<Bed>> {
        let mut stmt = self.conn.prepare(
            "SELECT number, occupied
             FROM beds
             ORDER BY number ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut beds = Vec::new();
        while let Some(row) = rows.next()? {
            beds.push(parse_bed_row(row)?);
        }
        Ok(beds)
    }
}

/// Sets the occupancy flag of one bed inside the caller's transaction.
///
/// Returns whether the stored value changed. An unchanged value is not
/// rewritten.
pub(crate) fn write_occupancy(
    conn: &Connection,
    number: BedNumber,
    occupied: bool,
) -> RegistryResult<bool> {
    let current = load_bed(conn, number)?.ok_or(RegistryError::UnknownBed(number))?;
    if current.occupied == occupied {
        return Ok(false);
    }

    conn.execute(
        "UPDATE beds
         SET occupied = ?2,
             updated_at = (strftime('%s', 'now') * 1000)
         WHERE number = ?1;",
        params![number, bool_to_int(occupied)],
    )?;
    debug!("event=occupancy_write module=repo status=ok bed_number={number} occupied={occupied}");
    Ok(true)
}

/// Starts the IMMEDIATE transaction that serves as the registry write lock.
pub(crate) fn begin_immediate(conn: &Connection) -> RegistryResult<Transaction<'_>> {
    Transaction::new_unchecked(conn, TransactionBehavior::Immediate).map_err(|err| {
        if is_lock_contention(&err) {
            warn!("event=registry_lock module=repo status=error error_code=lock_timeout");
        }
        RegistryError::from(err)
    })
}

pub(crate) fn ensure_connection_ready(conn: &Connection) -> RegistryResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RegistryError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}

fn current_max(conn: &Connection) -> RegistryResult<Option<BedNumber>> {
    let max = conn.query_row("SELECT MAX(number) FROM beds;", [], |row| {
        row.get::<_, Option<BedNumber>>(0)
    })?;
    Ok(max)
}

fn insert_bed(conn: &Connection, number: BedNumber) -> RegistryResult<()> {
    let bed = Bed::new(number);
    conn.execute(
        "INSERT INTO beds (number, occupied) VALUES (?1, ?2);",
        params![bed.number, bool_to_int(bed.occupied)],
    )?;
    Ok(())
}

fn load_bed(conn: &Connection, number: BedNumber) -> RegistryResult<Option<Bed>> {
    let mut stmt = conn.prepare(
        "SELECT number, occupied
         FROM beds
         WHERE number = ?1;",
    )?;
    let mut rows = stmt.query([number])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_bed_row(row)?));
    }
    Ok(None)
}

fn parse_bed_row(row: &Row<'_>) -> RegistryResult<Bed> {
    let number: BedNumber = row.get("number")?;
    let occupied =
        int_to_bool(row.get("occupied")?, "beds.occupied").map_err(RegistryError::InvalidData)?;
    Ok(Bed { number, occupied })
}
