//! Occupancy maintenance for the bed registry.
//!
//! # Responsibility
//! - Define the callback contract patient-record writers must invoke on every
//!   bed reference change (`AssignmentListener`).
//! - Define the read-only query the core consumes from those writers
//!   (`AssignmentSource`).
//! - Recompute `beds.occupied` for every bed touched by a change.
//!
//! # Invariants
//! - After every committed assignment change, `occupied(b)` equals
//!   "some live assignment references `b`" for every registered bed.
//! - Recompute and write run inside the transaction of the triggering change.

mod synchronizer;

pub use synchronizer::{
    AssignmentListener, AssignmentSource, BedOccupancy, OccupancySynchronizer,
};
