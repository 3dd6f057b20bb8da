//! Ward use-case service.
//!
//! # Responsibility
//! - Provide stable entry points for bed provisioning and patient moves.
//! - Delegate persistence and occupancy upkeep to repository implementations.
//!
//! # Invariants
//! - Service APIs never write occupancy directly; it changes only as a
//!   consequence of patient repository writes.
//! - Bulk seeding goes through `register_bed` one bed at a time.

use crate::model::assignment::{Assignment, AssignmentChange, PatientId};
use crate::model::bed::{Bed, BedNumber};
use crate::repo::bed_repo::{BedRegistry, RegistryResult};
use crate::repo::patient_repo::{AssignmentResult, PatientRepository};
use log::info;

/// Use-case service wrapper over the bed registry and patient assignments.
pub struct WardService<B: BedRegistry, P: PatientRepository> {
    beds: B,
    patients: P,
}

impl<B: BedRegistry, P: PatientRepository> WardService<B, P> {
    /// Creates a service using the provided repository implementations.
    pub fn new(beds: B, patients: P) -> Self {
        Self { beds, patients }
    }

    /// Registers the next bed in sequence.
    pub fn register_bed(&self) -> RegistryResult<BedNumber> {
        self.beds.register_bed()
    }

    /// Registers `count` beds by repeated sequential registration.
    ///
    /// Stops at the first failure; beds registered before it stay registered.
    pub fn seed_beds(&self, count: u32) -> RegistryResult<Vec<BedNumber>> {
        let mut numbers = Vec::with_capacity(count as usize);
        for _ in 0..count {
            numbers.push(self.beds.register_bed()?);
        }
        info!(
            "event=bed_seed module=service status=ok count={} last_bed={:?}",
            count,
            numbers.last()
        );
        Ok(numbers)
    }

    /// Deletes the last bed when no patient holds it.
    pub fn delete_bed(&self, number: BedNumber) -> RegistryResult<()> {
        self.beds.delete_bed(number)
    }

    /// Returns the occupancy flag of one bed.
    pub fn occupancy(&self, number: BedNumber) -> RegistryResult<bool> {
        self.beds.get_occupancy(number)
    }

    /// Lists all beds ascending by number.
    pub fn list_beds(&self) -> RegistryResult<Vec<Bed>> {
        self.beds.list_beds()
    }

    /// Creates a patient record holding `bed`.
    pub fn admit(&self, patient_id: PatientId, bed: BedNumber) -> AssignmentResult<Assignment> {
        self.patients.create_patient(patient_id, Some(bed))
    }

    /// Creates a patient record without a bed.
    pub fn register_patient(&self, patient_id: PatientId) -> AssignmentResult<Assignment> {
        self.patients.create_patient(patient_id, None)
    }

    /// Moves a live patient to `bed` (or assigns one if they had none).
    pub fn move_patient(
        &self,
        patient_id: PatientId,
        bed: BedNumber,
    ) -> AssignmentResult<AssignmentChange> {
        self.patients.set_bed(patient_id, Some(bed))
    }

    /// Clears a live patient's bed reference and keeps the record.
    pub fn clear_assignment(&self, patient_id: PatientId) -> AssignmentResult<AssignmentChange> {
        self.patients.set_bed(patient_id, None)
    }

    /// Tombstones the patient record and releases its bed.
    pub fn discharge(&self, patient_id: PatientId) -> AssignmentResult<AssignmentChange> {
        self.patients.soft_delete_patient(patient_id)
    }

    /// Loads a live patient's assignment.
    pub fn assignment(&self, patient_id: PatientId) -> AssignmentResult<Option<Assignment>> {
        self.patients.get_assignment(patient_id, false)
    }
}
