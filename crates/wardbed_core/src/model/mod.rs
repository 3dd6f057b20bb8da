//! Domain model for the ward bed core.
//!
//! # Responsibility
//! - Define bed registry records and the assignment projection of patients.
//! - Define the assignment transition event shared by repositories and the
//!   occupancy synchronizer.
//!
//! # Invariants
//! - Bed numbers form the contiguous range `1..=max`.
//! - `Bed::occupied` is derived; no client-facing API writes it.

pub mod assignment;
pub mod bed;
