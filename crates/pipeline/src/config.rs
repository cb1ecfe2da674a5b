//! Analysis pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use pqa_core::remediation::{DEFAULT_COOLDOWN_SECS, DEFAULT_TOP_FINDINGS};
use pqa_core::scoring::{ScoringWeights, DEFAULT_INTEGRITY_WEIGHT, DEFAULT_STRUCTURAL_WEIGHT};
use pqa_core::severity::{SeverityRuleSpec, SeverityTable, DEFAULT_MAJOR_CHANGE_RATIO};
use pqa_core::trends::DEFAULT_WINDOW_DAYS;
use pqa_events::delivery::ticket::DEFAULT_RETRY_DELAYS_SECS;

/// Errors raised while turning configuration into policy objects.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read severity table {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid severity table {path}: {message}")]
    Invalid { path: PathBuf, message: String },

    #[error("Invalid scoring policy: {0}")]
    Policy(String),
}

/// Pipeline configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Analyses executing at once.
    pub workers: usize,
    /// Analyses allowed to wait for a worker before submissions are refused.
    pub queue_limit: usize,
    /// Time budget for archive read, reconstruction, and diff of one run.
    pub analysis_timeout: Duration,
    pub ticket_cooldown: Duration,
    pub top_findings: usize,
    pub trend_window_days: u32,
    /// Sleep after each failed ticket attempt.
    pub ticket_retry_delays: Vec<Duration>,
    pub structural_weight: f64,
    pub integrity_weight: f64,
    pub major_change_ratio: f64,
    /// Optional JSON file of severity rules replacing the built-in table.
    pub severity_table_path: Option<PathBuf>,
    pub blob_root: PathBuf,
    pub parser_url: String,
    pub ticket_url: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_limit: 64,
            analysis_timeout: Duration::from_secs(120),
            ticket_cooldown: Duration::from_secs(DEFAULT_COOLDOWN_SECS),
            top_findings: DEFAULT_TOP_FINDINGS,
            trend_window_days: DEFAULT_WINDOW_DAYS,
            ticket_retry_delays: DEFAULT_RETRY_DELAYS_SECS
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
            structural_weight: DEFAULT_STRUCTURAL_WEIGHT,
            integrity_weight: DEFAULT_INTEGRITY_WEIGHT,
            major_change_ratio: DEFAULT_MAJOR_CHANGE_RATIO,
            severity_table_path: None,
            blob_root: PathBuf::from("./data/archive"),
            parser_url: "http://localhost:8081".into(),
            ticket_url: "http://localhost:8082/tickets".into(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                         |
    /// |--------------------------------|---------------------------------|
    /// | `PQA_WORKERS`                  | `4`                             |
    /// | `PQA_QUEUE_LIMIT`              | `64`                            |
    /// | `PQA_ANALYSIS_TIMEOUT_SECS`    | `120`                           |
    /// | `PQA_TICKET_COOLDOWN_SECS`     | `86400`                         |
    /// | `PQA_TOP_FINDINGS`             | `10`                            |
    /// | `PQA_TREND_WINDOW_DAYS`        | `30`                            |
    /// | `PQA_TICKET_RETRY_DELAYS_SECS` | `1,2,4`                         |
    /// | `PQA_WEIGHT_STRUCTURAL`        | `0.4`                           |
    /// | `PQA_WEIGHT_INTEGRITY`         | `0.6`                           |
    /// | `PQA_MAJOR_CHANGE_RATIO`       | `0.1`                           |
    /// | `PQA_SEVERITY_TABLE_PATH`      | unset (built-in table)          |
    /// | `PQA_BLOB_ROOT`                | `./data/archive`                |
    /// | `PQA_PARSER_URL`               | `http://localhost:8081`         |
    /// | `PQA_TICKET_URL`               | `http://localhost:8082/tickets` |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let workers: usize = env_parse("PQA_WORKERS", defaults.workers);
        let queue_limit: usize = env_parse("PQA_QUEUE_LIMIT", defaults.queue_limit);
        let analysis_timeout = Duration::from_secs(env_parse(
            "PQA_ANALYSIS_TIMEOUT_SECS",
            defaults.analysis_timeout.as_secs(),
        ));
        let ticket_cooldown = Duration::from_secs(env_parse(
            "PQA_TICKET_COOLDOWN_SECS",
            defaults.ticket_cooldown.as_secs(),
        ));

        let ticket_retry_delays = match std::env::var("PQA_TICKET_RETRY_DELAYS_SECS") {
            Ok(raw) => parse_delays(&raw)
                .expect("PQA_TICKET_RETRY_DELAYS_SECS must be comma-separated u64 seconds"),
            Err(_) => defaults.ticket_retry_delays,
        };

        Self {
            workers: workers.max(1),
            queue_limit,
            analysis_timeout,
            ticket_cooldown,
            top_findings: env_parse("PQA_TOP_FINDINGS", defaults.top_findings),
            trend_window_days: env_parse("PQA_TREND_WINDOW_DAYS", defaults.trend_window_days),
            ticket_retry_delays,
            structural_weight: env_parse("PQA_WEIGHT_STRUCTURAL", defaults.structural_weight),
            integrity_weight: env_parse("PQA_WEIGHT_INTEGRITY", defaults.integrity_weight),
            major_change_ratio: env_parse("PQA_MAJOR_CHANGE_RATIO", defaults.major_change_ratio),
            severity_table_path: std::env::var("PQA_SEVERITY_TABLE_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            blob_root: std::env::var("PQA_BLOB_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.blob_root),
            parser_url: std::env::var("PQA_PARSER_URL").unwrap_or(defaults.parser_url),
            ticket_url: std::env::var("PQA_TICKET_URL").unwrap_or(defaults.ticket_url),
        }
    }

    /// Validated scoring weights.
    pub fn scoring_weights(&self) -> Result<ScoringWeights, ConfigError> {
        ScoringWeights::new(self.structural_weight, self.integrity_weight)
            .map_err(|e| ConfigError::Policy(e.to_string()))
    }

    /// The severity table: the JSON rule file when configured, else the
    /// built-in table. Either way the configured change ratio applies.
    pub fn severity_table(&self) -> Result<SeverityTable, ConfigError> {
        let Some(path) = &self.severity_table_path else {
            return SeverityTable::default()
                .with_major_change_ratio(self.major_change_ratio)
                .map_err(|e| ConfigError::Policy(e.to_string()));
        };

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let specs: Vec<SeverityRuleSpec> =
            serde_json::from_str(&raw).map_err(|e| ConfigError::Invalid {
                path: path.clone(),
                message: e.to_string(),
            })?;
        SeverityTable::from_specs(&specs, self.major_change_ratio).map_err(|e| {
            ConfigError::Invalid {
                path: path.clone(),
                message: e.to_string(),
            }
        })
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("{name} has an invalid value: {raw}")),
        Err(_) => default,
    }
}

/// Parse a comma-separated list of whole seconds. An empty string means no
/// retries.
pub fn parse_delays(raw: &str) -> Result<Vec<Duration>, std::num::ParseIntError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u64>().map(Duration::from_secs))
        .collect()
}
