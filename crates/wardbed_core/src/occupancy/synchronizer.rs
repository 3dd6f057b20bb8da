//! Occupancy synchronizer.
//!
//! Keeps the derived `occupied` flag of each bed in step with the live
//! assignment set. The synchronizer holds no state and never caches registry
//! rows; every call re-reads the source of truth.

use crate::model::assignment::AssignmentChange;
use crate::model::bed::BedNumber;
use crate::repo::bed_repo::{begin_immediate, write_occupancy, RegistryResult};
use crate::repo::patient_repo::SqliteAssignmentSource;
use log::{debug, error};
use rusqlite::Connection;
use uuid::Uuid;

/// Read-only query capability provided by the patient-record owner.
pub trait AssignmentSource {
    /// Returns whether any live patient record currently references `bed`.
    fn has_live_assignment(&self, bed: BedNumber) -> RegistryResult<bool>;
}

/// Callback invoked after a patient's bed reference is persisted but before
/// the enclosing transaction commits.
///
/// `conn` is the open transaction of the triggering write. An error must abort
/// that transaction.
pub trait AssignmentListener {
    fn on_assignment_changed(
        &self,
        conn: &Connection,
        change: &AssignmentChange,
    ) -> RegistryResult<()>;
}

/// Recomputed occupancy of one bed touched by a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BedOccupancy {
    pub bed_number: BedNumber,
    pub occupied: bool,
    /// Whether the stored flag was rewritten.
    pub changed: bool,
}

/// Restores the occupancy invariant for beds touched by assignment changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct OccupancySynchronizer;

impl OccupancySynchronizer {
    pub fn new() -> Self {
        Self
    }

    /// Recomputes occupancy for `{old_bed, new_bed}` in a transaction of its own.
    ///
    /// Used for repair and for callers that changed assignments outside of
    /// `PatientRepository`. Idempotent.
    pub fn sync_transition(
        &self,
        conn: &Connection,
        old_bed: Option<BedNumber>,
        new_bed: Option<BedNumber>,
    ) -> RegistryResult<Vec<BedOccupancy>> {
        let change = AssignmentChange::new(Uuid::nil(), old_bed, new_bed);
        let tx = begin_immediate(conn)?;
        let outcome = self.recompute(&tx, &SqliteAssignmentSource::new(&tx), &change)?;
        tx.commit()?;
        Ok(outcome)
    }

    /// Recomputes occupancy for every bed touched by `change` on `conn`.
    ///
    /// `conn` must already be inside a write transaction; beds are visited in
    /// ascending order.
    pub fn recompute(
        &self,
        conn: &Connection,
        source: &impl AssignmentSource,
        change: &AssignmentChange,
    ) -> RegistryResult<Vec<BedOccupancy>> {
        let mut outcome = Vec::with_capacity(2);
        for bed_number in change.affected_beds() {
            let occupied = source.has_live_assignment(bed_number)?;
            let changed = match write_occupancy(conn, bed_number, occupied) {
                Ok(changed) => changed,
                Err(err) => {
                    error!(
                        "event=occupancy_sync module=occupancy status=error patient_id={} bed_number={} error={}",
                        change.patient_id, bed_number, err
                    );
                    return Err(err);
                }
            };
            outcome.push(BedOccupancy {
                bed_number,
                occupied,
                changed,
            });
        }

        debug!(
            "event=occupancy_sync module=occupancy status=ok patient_id={} old_bed={:?} new_bed={:?} beds={}",
            change.patient_id,
            change.old_bed,
            change.new_bed,
            outcome.len()
        );
        Ok(outcome)
    }
}

impl AssignmentListener for OccupancySynchronizer {
    fn on_assignment_changed(
        &self,
        conn: &Connection,
        change: &AssignmentChange,
    ) -> RegistryResult<()> {
        self.recompute(conn, &SqliteAssignmentSource::new(conn), change)?;
        Ok(())
    }
}
