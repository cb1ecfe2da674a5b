//! Parse-quality assurance domain logic.
//!
//! Pure functions and types shared by the persistence, pipeline, and API
//! crates. Nothing in here performs I/O.

pub mod analysis_status;
pub mod canonical;
pub mod diff;
pub mod error;
pub mod file_type;
pub mod hashing;
pub mod quality_gate;
pub mod remediation;
pub mod scoring;
pub mod severity;
pub mod trends;
pub mod types;
