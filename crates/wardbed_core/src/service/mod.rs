//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate registry and patient repositories into ward-level operations.
//! - Keep callers decoupled from storage details.

pub mod ward_service;
