//! Finding severities and the ordered field-severity table.
//!
//! The table is an explicit list of `(matcher, severity)` rules evaluated in
//! order; the first rule whose matcher accepts a path decides that field's
//! base severity. Paths no rule matches fall back to the table default.
//! Classification is a pure function of the path (and, for changes, the two
//! values), so each rule can be tested on its own.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::canonical::{is_formatting_only, leaf_key, parse_numeric};
use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Severity of a single diff finding, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Cosmetic,
    Minor,
    Major,
    Critical,
}

/// All severities, least severe first.
pub const ALL_SEVERITIES: &[Severity] = &[
    Severity::Cosmetic,
    Severity::Minor,
    Severity::Major,
    Severity::Critical,
];

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cosmetic => "cosmetic",
            Self::Minor => "minor",
            Self::Major => "major",
            Self::Critical => "critical",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "cosmetic" => Ok(Self::Cosmetic),
            "minor" => Ok(Self::Minor),
            "major" => Ok(Self::Major),
            "critical" => Ok(Self::Critical),
            other => Err(CoreError::Validation(format!(
                "Unknown severity '{other}'. Must be one of: cosmetic, minor, major, critical"
            ))),
        }
    }

    /// One level more severe; `Critical` stays `Critical`.
    pub fn escalate(self) -> Self {
        match self {
            Self::Cosmetic => Self::Minor,
            Self::Minor => Self::Major,
            Self::Major | Self::Critical => Self::Critical,
        }
    }

    /// Whether findings of this severity count towards data loss.
    pub fn is_data_loss(self) -> bool {
        self >= Self::Major
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// How a rule selects paths.
#[derive(Debug, Clone)]
pub enum PathMatcher {
    /// Last path segment equals the key, ignoring ASCII case.
    Key(String),
    /// Whole path starts with the prefix.
    Prefix(String),
    /// Whole path matches the regular expression.
    Regex(Regex),
}

impl PathMatcher {
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Key(key) => leaf_key(path).eq_ignore_ascii_case(key),
            Self::Prefix(prefix) => path.starts_with(prefix.as_str()),
            Self::Regex(re) => re.is_match(path),
        }
    }
}

/// One entry of the severity table.
#[derive(Debug, Clone)]
pub struct SeverityRule {
    pub matcher: PathMatcher,
    pub severity: Severity,
}

/// Serialized form of a rule, as stored in a severity table JSON file.
///
/// ```json
/// { "match": "key", "value": "VendorNumber", "severity": "critical" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeverityRuleSpec {
    #[serde(rename = "match")]
    pub match_kind: MatchKind,
    pub value: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Key,
    Prefix,
    Regex,
}

impl SeverityRule {
    /// Build a rule from its serialized form, compiling regexes up front.
    pub fn from_spec(spec: &SeverityRuleSpec) -> Result<Self, CoreError> {
        if spec.value.is_empty() {
            return Err(CoreError::Validation(
                "Severity rule value must not be empty".to_string(),
            ));
        }
        let matcher = match spec.match_kind {
            MatchKind::Key => PathMatcher::Key(spec.value.clone()),
            MatchKind::Prefix => PathMatcher::Prefix(spec.value.clone()),
            MatchKind::Regex => PathMatcher::Regex(Regex::new(&spec.value).map_err(|e| {
                CoreError::Validation(format!("Invalid severity rule regex '{}': {e}", spec.value))
            })?),
        };
        Ok(Self {
            matcher,
            severity: spec.severity,
        })
    }

    fn key(key: &str, severity: Severity) -> Self {
        Self {
            matcher: PathMatcher::Key(key.to_string()),
            severity,
        }
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Relative numeric change above which a non-critical change becomes major.
pub const DEFAULT_MAJOR_CHANGE_RATIO: f64 = 0.1;

/// Identity fields: a device cannot be matched without them.
const CRITICAL_KEYS: &[&str] = &[
    "VendorNumber",
    "VendorID",
    "VendorName",
    "VendCode",
    "ProductNumber",
    "ProductCode",
    "ProductID",
    "ProdCode",
    "DeviceType",
    "ProdType",
];

/// Revision fields: wrong values select the wrong firmware profile.
const MAJOR_KEYS: &[&str] = &[
    "RevisionNumber",
    "RevisionNo",
    "MajRev",
    "MinRev",
    "OrderCode",
];

/// Free-text and bookkeeping fields.
const COSMETIC_KEYS: &[&str] = &[
    "Description",
    "Descr",
    "HelpString",
    "CreatedBy",
    "ModifiedBy",
    "CreationDate",
    "CreationTime",
    "ModificationDate",
    "ModificationTime",
];

/// Ordered, first-match-wins severity table.
#[derive(Debug, Clone)]
pub struct SeverityTable {
    rules: Vec<SeverityRule>,
    default_severity: Severity,
    major_change_ratio: f64,
}

impl Default for SeverityTable {
    fn default() -> Self {
        let mut rules: Vec<SeverityRule> = CRITICAL_KEYS
            .iter()
            .map(|k| SeverityRule::key(k, Severity::Critical))
            .collect();
        rules.extend(MAJOR_KEYS.iter().map(|k| SeverityRule::key(k, Severity::Major)));
        rules.extend(
            COSMETIC_KEYS
                .iter()
                .map(|k| SeverityRule::key(k, Severity::Cosmetic)),
        );
        rules.push(SeverityRule {
            matcher: PathMatcher::Prefix("Comments/".to_string()),
            severity: Severity::Cosmetic,
        });
        Self {
            rules,
            default_severity: Severity::Minor,
            major_change_ratio: DEFAULT_MAJOR_CHANGE_RATIO,
        }
    }
}

impl SeverityTable {
    pub fn new(
        rules: Vec<SeverityRule>,
        default_severity: Severity,
        major_change_ratio: f64,
    ) -> Result<Self, CoreError> {
        if !major_change_ratio.is_finite() || major_change_ratio < 0.0 {
            return Err(CoreError::Validation(format!(
                "major_change_ratio must be a non-negative number, got {major_change_ratio}"
            )));
        }
        Ok(Self {
            rules,
            default_severity,
            major_change_ratio,
        })
    }

    /// Build a table from serialized rules (e.g. a JSON configuration file).
    pub fn from_specs(
        specs: &[SeverityRuleSpec],
        major_change_ratio: f64,
    ) -> Result<Self, CoreError> {
        let rules = specs
            .iter()
            .map(SeverityRule::from_spec)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(rules, Severity::Minor, major_change_ratio)
    }

    /// Replace the numeric escalation ratio, keeping the rules.
    pub fn with_major_change_ratio(self, ratio: f64) -> Result<Self, CoreError> {
        Self::new(self.rules, self.default_severity, ratio)
    }

    pub fn rules(&self) -> &[SeverityRule] {
        &self.rules
    }

    /// Base severity of the field at `path`: the first matching rule wins.
    pub fn base_severity(&self, path: &str) -> Severity {
        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(path))
            .map(|rule| rule.severity)
            .unwrap_or(self.default_severity)
    }

    /// Severity of a value present on both sides but different.
    ///
    /// - formatting-only differences are cosmetic, whatever the field;
    /// - critical fields stay critical;
    /// - numeric changes larger than the configured ratio are at least major;
    /// - otherwise the field's base severity applies.
    pub fn classify_change(&self, path: &str, original: &str, reconstructed: &str) -> Severity {
        if is_formatting_only(original, reconstructed) {
            return Severity::Cosmetic;
        }
        let base = self.base_severity(path);
        if base == Severity::Critical || base == Severity::Cosmetic {
            return base;
        }
        match (parse_numeric(original), parse_numeric(reconstructed)) {
            (Some(a), Some(b)) if relative_change(a, b) > self.major_change_ratio => {
                base.max(Severity::Major)
            }
            _ => base,
        }
    }

    /// Severity of a value present only in the original: one level above base.
    pub fn classify_removal(&self, path: &str) -> Severity {
        self.base_severity(path).escalate()
    }

    /// Severity of a value present only in the reconstruction.
    pub fn classify_addition(&self, _path: &str) -> Severity {
        Severity::Minor
    }
}

/// Relative change between two numbers, using the larger magnitude as base.
fn relative_change(a: f64, b: f64) -> f64 {
    let scale = a.abs().max(b.abs());
    if scale == 0.0 {
        0.0
    } else {
        (a - b).abs() / scale
    }
}
