//! Bed registry model.
//!
//! # Invariants
//! - `number` is positive and immutable once registered.
//! - `occupied` mirrors whether any live assignment references the bed.

use serde::{Deserialize, Serialize};

/// Business key of a registered bed. Always `>= 1`.
pub type BedNumber = u32;

/// First number handed out by an empty registry.
pub const FIRST_BED_NUMBER: BedNumber = 1;

/// One row of the bed registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bed {
    pub number: BedNumber,
    /// Derived from live assignments; refreshed by the occupancy synchronizer.
    pub occupied: bool,
}

impl Bed {
    /// Creates a freshly registered, unoccupied bed.
    pub fn new(number: BedNumber) -> Self {
        Self {
            number,
            occupied: false,
        }
    }
}

/// Returns the number the registry must hand out after `current_max`.
///
/// `None` represents an empty registry.
pub fn next_bed_number(current_max: Option<BedNumber>) -> BedNumber {
    current_max.map_or(FIRST_BED_NUMBER, |max| max.saturating_add(1))
}
