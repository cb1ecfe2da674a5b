pub mod analysis;
pub mod archive;
pub mod dashboard;
pub mod thresholds;
