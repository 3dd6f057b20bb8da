//! Ward bed registry and occupancy core.
//! This crate is the single source of truth for bed sequence and occupancy invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod occupancy;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::assignment::{Assignment, AssignmentChange, PatientId};
pub use model::bed::{Bed, BedNumber};
pub use occupancy::{AssignmentListener, AssignmentSource, BedOccupancy, OccupancySynchronizer};
pub use repo::bed_repo::{BedRegistry, RegistryError, RegistryResult, SqliteBedRegistry};
pub use repo::patient_repo::{
    AssignmentError, AssignmentResult, PatientRepository, SqliteAssignmentSource,
    SqlitePatientRepository,
};
pub use service::ward_service::WardService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
