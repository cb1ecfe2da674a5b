//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - Create DTOs for inserts
//! - Update DTOs (all `Option` fields) for patches, where the entity is mutable

pub mod analysis_run;
pub mod archived_file;
pub mod dashboard;
pub mod diff_finding;
pub mod remediation;
pub mod threshold;
