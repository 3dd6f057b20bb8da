//! Patient-to-bed assignment projection and transition events.
//!
//! # Responsibility
//! - Describe the only part of the patient record the core reads: its bed.
//! - Describe one `(old, new)` bed transition and the beds it touches.
//!
//! # Invariants
//! - At most one live assignment references a given bed.
//! - `AssignmentChange::affected_beds` never contains duplicates.

use crate::model::bed::BedNumber;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of the external patient record.
pub type PatientId = Uuid;

/// Bed-relevant projection of one patient record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub patient_id: PatientId,
    /// `None` when the patient currently holds no bed.
    pub bed_number: Option<BedNumber>,
    /// Soft delete tombstone. Deleted rows never count as live.
    pub is_deleted: bool,
}

impl Assignment {
    /// Returns whether this row counts toward occupancy of its bed.
    pub fn is_live(&self) -> bool {
        !self.is_deleted && self.bed_number.is_some()
    }
}

/// One observed change of a patient's bed reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentChange {
    pub patient_id: PatientId,
    pub old_bed: Option<BedNumber>,
    pub new_bed: Option<BedNumber>,
}

impl AssignmentChange {
    pub fn new(
        patient_id: PatientId,
        old_bed: Option<BedNumber>,
        new_bed: Option<BedNumber>,
    ) -> Self {
        Self {
            patient_id,
            old_bed,
            new_bed,
        }
    }

    /// Beds whose occupancy must be recomputed: `{old, new} \ {None}`, deduplicated.
    ///
    /// Returned in ascending order so that callers touching two beds always
    /// visit them in the same order.
    pub fn affected_beds(&self) -> Vec<BedNumber> {
        let mut beds: Vec<BedNumber> = [self.old_bed, self.new_bed].into_iter().flatten().collect();
        beds.sort_unstable();
        beds.dedup();
        beds
    }

    /// Returns whether the bed reference is unchanged.
    pub fn is_noop(&self) -> bool {
        self.old_bed == self.new_bed
    }
}
