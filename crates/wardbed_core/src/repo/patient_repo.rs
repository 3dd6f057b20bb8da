//! Patient assignment repository.
//!
//! # Responsibility
//! - Own the bed reference of each patient record (`patients.bed_number`).
//! - Notify the assignment listener on every bed reference change, inside the
//!   same transaction as the change.
//! - Answer "does any live patient reference bed N?" for the synchronizer.
//!
//! # Invariants
//! - Every write path in this file goes through `apply_change`.
//! - At most one live patient references a bed; a second claimant gets
//!   `BedAlreadyAssigned`.
//! - A listener failure rolls back the assignment write.

use crate::db::{bool_to_int, int_to_bool, DbError};
use crate::model::assignment::{Assignment, AssignmentChange, PatientId};
use crate::model::bed::BedNumber;
use crate::occupancy::{AssignmentListener, AssignmentSource, OccupancySynchronizer};
use crate::repo::bed_repo::{
    begin_immediate, ensure_connection_ready, RegistryError, RegistryResult,
};
use log::{info, warn};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type AssignmentResult<T> = Result<T, AssignmentError>;

/// `(old_bed, new_bed)` produced by one write path.
type BedTransition = (Option<BedNumber>, Option<BedNumber>);

/// Errors from patient assignment writes.
#[derive(Debug)]
pub enum AssignmentError {
    /// Target patient does not exist or is soft-deleted.
    PatientNotFound(PatientId),
    /// A record with this id already exists.
    DuplicatePatient(PatientId),
    /// Another live patient already holds the bed.
    BedAlreadyAssigned(BedNumber),
    /// Registry or synchronizer failure; the change was rolled back.
    Registry(RegistryError),
    InvalidData(String),
}

impl AssignmentError {
    /// Returns whether retrying the same call with backoff may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Registry(err) if err.is_retryable())
    }
}

impl Display for AssignmentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PatientNotFound(id) => write!(f, "patient not found: {id}"),
            Self::DuplicatePatient(id) => write!(f, "patient already exists: {id}"),
            Self::BedAlreadyAssigned(number) => {
                write!(f, "bed {number} is already assigned to another patient")
            }
            Self::Registry(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted patient data: {message}"),
        }
    }
}

impl Error for AssignmentError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Registry(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RegistryError> for AssignmentError {
    fn from(value: RegistryError) -> Self {
        Self::Registry(value)
    }
}

impl From<DbError> for AssignmentError {
    fn from(value: DbError) -> Self {
        Self::Registry(value.into())
    }
}

impl From<rusqlite::Error> for AssignmentError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Registry(value.into())
    }
}

/// Repository interface for the bed-relevant part of patient records.
pub trait PatientRepository {
    /// Creates a patient record, optionally already holding a bed.
    fn create_patient(
        &self,
        patient_id: PatientId,
        bed: Option<BedNumber>,
    ) -> AssignmentResult<Assignment>;
    /// Sets, changes or clears the bed reference of a live patient.
    fn set_bed(
        &self,
        patient_id: PatientId,
        bed: Option<BedNumber>,
    ) -> AssignmentResult<AssignmentChange>;
    /// Tombstones a patient record and releases its bed.
    fn soft_delete_patient(&self, patient_id: PatientId) -> AssignmentResult<AssignmentChange>;
    /// Loads one patient projection with optional deleted-row visibility.
    fn get_assignment(
        &self,
        patient_id: PatientId,
        include_deleted: bool,
    ) -> AssignmentResult<Option<Assignment>>;
}

/// SQLite-backed patient repository that drives an assignment listener.
pub struct SqlitePatientRepository<'conn, L: AssignmentListener = OccupancySynchronizer> {
    conn: &'conn Connection,
    listener: L,
}

impl<'conn> SqlitePatientRepository<'conn, OccupancySynchronizer> {
    /// Creates repository wired to the occupancy synchronizer.
    pub fn try_new(conn: &'conn Connection) -> AssignmentResult<Self> {
        Self::with_listener(conn, OccupancySynchronizer::new())
    }
}

impl<'conn, L: AssignmentListener> SqlitePatientRepository<'conn, L> {
    /// Creates repository with a caller-provided listener.
    pub fn with_listener(conn: &'conn Connection, listener: L) -> AssignmentResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn, listener })
    }

    /// Runs one bed reference change: guard, write, notify, commit.
    fn apply_change(
        &self,
        patient_id: PatientId,
        write: impl FnOnce(&Connection, Option<BedNumber>) -> AssignmentResult<BedTransition>,
    ) -> AssignmentResult<AssignmentChange> {
        let tx = begin_immediate(self.conn)?;
        let current = load_assignment(&tx, patient_id, true)?;
        let old_bed = current.and_then(|row| if row.is_deleted { None } else { row.bed_number });

        let (old_bed, new_bed) = write(&*tx, old_bed)?;
        if let Some(bed) = new_bed.filter(|bed| Some(*bed) != old_bed) {
            if let Some(holder) = live_holder(&tx, bed)?.filter(|holder| *holder != patient_id) {
                warn!(
                    "event=assignment_change module=repo status=error error_code=bed_already_assigned bed_number={bed} holder={holder}"
                );
                return Err(AssignmentError::BedAlreadyAssigned(bed));
            }
        }
        tx.execute(
            "UPDATE patients
             SET bed_number = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE patient_uuid = ?1;",
            params![patient_id.to_string(), new_bed],
        )?;

        let change = AssignmentChange::new(patient_id, old_bed, new_bed);
        self.listener.on_assignment_changed(&tx, &change)?;
        tx.commit()?;

        info!(
            "event=assignment_change module=repo status=ok patient_id={} old_bed={:?} new_bed={:?}",
            patient_id, old_bed, new_bed
        );
        Ok(change)
    }
}

impl<L: AssignmentListener> PatientRepository for SqlitePatientRepository<'_, L> {
    fn create_patient(
        &self,
        patient_id: PatientId,
        bed: Option<BedNumber>,
    ) -> AssignmentResult<Assignment> {
        self.apply_change(patient_id, |conn, _| {
            if load_assignment(conn, patient_id, true)?.is_some() {
                return Err(AssignmentError::DuplicatePatient(patient_id));
            }
            conn.execute(
                "INSERT INTO patients (patient_uuid, bed_number, is_deleted)
                 VALUES (?1, NULL, ?2);",
                params![patient_id.to_string(), bool_to_int(false)],
            )?;
            Ok((None, bed))
        })?;

        Ok(Assignment {
            patient_id,
            bed_number: bed,
            is_deleted: false,
        })
    }

    fn set_bed(
        &self,
        patient_id: PatientId,
        bed: Option<BedNumber>,
    ) -> AssignmentResult<AssignmentChange> {
        self.apply_change(patient_id, |conn, old_bed| {
            ensure_live_patient(conn, patient_id)?;
            Ok((old_bed, bed))
        })
    }

    fn soft_delete_patient(&self, patient_id: PatientId) -> AssignmentResult<AssignmentChange> {
        self.apply_change(patient_id, |conn, old_bed| {
            ensure_live_patient(conn, patient_id)?;
            conn.execute(
                "UPDATE patients
                 SET is_deleted = 1,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE patient_uuid = ?1;",
                [patient_id.to_string()],
            )?;
            Ok((old_bed, None))
        })
    }

    fn get_assignment(
        &self,
        patient_id: PatientId,
        include_deleted: bool,
    ) -> AssignmentResult<Option<Assignment>> {
        load_assignment(self.conn, patient_id, include_deleted)
    }
}

/// Assignment query bound to one connection or open transaction.
pub struct SqliteAssignmentSource<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAssignmentSource<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl AssignmentSource for SqliteAssignmentSource<'_> {
    fn has_live_assignment(&self, bed: BedNumber) -> RegistryResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM patients
                WHERE bed_number = ?1
                  AND is_deleted = 0
            );",
            [bed],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}

fn ensure_live_patient(conn: &Connection, patient_id: PatientId) -> AssignmentResult<()> {
    match load_assignment(conn, patient_id, false)? {
        Some(_) => Ok(()),
        None => Err(AssignmentError::PatientNotFound(patient_id)),
    }
}

fn live_holder(conn: &Connection, bed: BedNumber) -> AssignmentResult<Option<PatientId>> {
    let holder: Option<String> = conn
        .query_row(
            "SELECT patient_uuid
             FROM patients
             WHERE bed_number = ?1
               AND is_deleted = 0
             LIMIT 1;",
            [bed],
            |row| row.get(0),
        )
        .optional()?;
    holder.map(|value| parse_patient_id(&value)).transpose()
}

fn load_assignment(
    conn: &Connection,
    patient_id: PatientId,
    include_deleted: bool,
) -> AssignmentResult<Option<Assignment>> {
    let mut stmt = conn.prepare(
        "SELECT patient_uuid, bed_number, is_deleted
         FROM patients
         WHERE patient_uuid = ?1
           AND (?2 = 1 OR is_deleted = 0);",
    )?;
    let mut rows = stmt.query(params![patient_id.to_string(), bool_to_int(include_deleted)])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_assignment_row(row)?));
    }
    Ok(None)
}

fn parse_assignment_row(row: &Row<'_>) -> AssignmentResult<Assignment> {
    let uuid_text: String = row.get("patient_uuid")?;
    let is_deleted = int_to_bool(row.get("is_deleted")?, "patients.is_deleted")
        .map_err(AssignmentError::InvalidData)?;
    Ok(Assignment {
        patient_id: parse_patient_id(&uuid_text)?,
        bed_number: row.get("bed_number")?,
        is_deleted,
    })
}

fn parse_patient_id(value: &str) -> AssignmentResult<PatientId> {
    Uuid::parse_str(value).map_err(|_| {
        AssignmentError::InvalidData(format!("invalid uuid `{value}` in patients.patient_uuid"))
    })
}
