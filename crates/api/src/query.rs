//! Shared query parameter types for API handlers.

use serde::Deserialize;

/// Default and maximum page sizes for list endpoints.
pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 200;

/// `?limit=` for list endpoints.
#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<i64>,
}

/// Clamp a requested page size into `1..=MAX_LIMIT`.
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// `?file_type=&limit=` for a device's analysis history.
#[derive(Debug, Deserialize)]
pub struct DeviceHistoryParams {
    pub file_type: Option<String>,
    pub limit: Option<i64>,
}

/// `?days=` for the trend series.
#[derive(Debug, Deserialize)]
pub struct TrendParams {
    pub days: Option<u32>,
}
