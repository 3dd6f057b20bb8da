//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for beds and patients.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Every write opens its own IMMEDIATE transaction and commits before returning.
//! - Repository APIs return semantic errors (`UnknownBed`, `PatientNotFound`, ...)
//!   in addition to DB transport errors.

pub mod bed_repo;
pub mod patient_repo;
