//! Differential analysis between an original document and its reconstruction.
//!
//! Two modes:
//!
//! - [`analyze_documents`] walks two canonical documents in lexicographic path
//!   order and classifies every path with the [`SeverityTable`].
//! - [`analyze_bytes`] is the reduced-confidence fallback used when either side
//!   could not be canonicalized. It compares non-blank lines and skips field
//!   classification entirely.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::canonical::{normalize_whitespace, CanonicalDocument};
use crate::severity::{Severity, SeverityTable};

// ---------------------------------------------------------------------------
// DiffStatus
// ---------------------------------------------------------------------------

/// The status of a path in a diff comparison.
///
/// - `Added`     -- present only in the reconstruction.
/// - `Removed`   -- present only in the original.
/// - `Changed`   -- present in both sides but with different values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffStatus {
    Added,
    Removed,
    Changed,
}

impl DiffStatus {
    /// String representation for display, logging, and database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Changed => "changed",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "added" => Some(Self::Added),
            "removed" => Some(Self::Removed),
            "changed" => Some(Self::Changed),
            _ => None,
        }
    }
}

impl std::fmt::Display for DiffStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Findings
// ---------------------------------------------------------------------------

/// A single difference between original and reconstruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Canonical path, or `line:N` in reduced-confidence mode.
    pub location: String,
    pub severity: Severity,
    pub status: DiffStatus,
    pub description: String,
    pub original_value: Option<String>,
    pub reconstructed_value: Option<String>,
}

impl Finding {
    /// Whether this finding represents lost or changed original data.
    pub fn is_data_loss(&self) -> bool {
        matches!(self.status, DiffStatus::Changed | DiffStatus::Removed)
            && self.severity.is_data_loss()
    }
}

/// Raw finding counts per severity tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub cosmetic: u32,
    pub minor: u32,
    pub major: u32,
    pub critical: u32,
}

impl SeverityCounts {
    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Cosmetic => self.cosmetic += 1,
            Severity::Minor => self.minor += 1,
            Severity::Major => self.major += 1,
            Severity::Critical => self.critical += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.cosmetic + self.minor + self.major + self.critical
    }
}

/// Result of comparing an original with its reconstruction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffOutcome {
    /// Findings in path order (document mode) or line order (byte mode).
    pub findings: Vec<Finding>,
    pub counts: SeverityCounts,
    /// Leaves (or non-blank lines) in the original.
    pub original_leaf_count: usize,
    /// Leaves (or non-blank lines) in the reconstruction.
    pub reconstructed_leaf_count: usize,
    /// Paths present on both sides, equal or not.
    pub shared_paths: usize,
    /// Size of the union of both path sets.
    pub union_paths: usize,
    /// Set when the byte-level fallback produced this outcome.
    pub reduced_confidence: bool,
}

impl DiffOutcome {
    fn push(&mut self, finding: Finding) {
        self.counts.record(finding.severity);
        self.findings.push(finding);
    }

    /// Number of findings that count towards data loss.
    pub fn data_loss_findings(&self) -> usize {
        self.findings.iter().filter(|f| f.is_data_loss()).count()
    }

    pub fn has_critical(&self) -> bool {
        self.counts.critical > 0
    }
}

// ---------------------------------------------------------------------------
// Document mode
// ---------------------------------------------------------------------------

/// Compare two canonical documents path by path.
pub fn analyze_documents(
    original: &CanonicalDocument,
    reconstructed: &CanonicalDocument,
    table: &SeverityTable,
) -> DiffOutcome {
    let mut outcome = DiffOutcome {
        original_leaf_count: original.len(),
        reconstructed_leaf_count: reconstructed.len(),
        ..DiffOutcome::default()
    };

    let mut left = original.iter().peekable();
    let mut right = reconstructed.iter().peekable();

    loop {
        let step = match (left.peek(), right.peek()) {
            (None, None) => break,
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (Some((lp, _)), Some((rp, _))) => lp.cmp(rp),
        };

        outcome.union_paths += 1;
        match step {
            std::cmp::Ordering::Equal => {
                let (path, orig) = left.next().unwrap_or_default();
                let (_, recon) = right.next().unwrap_or_default();
                outcome.shared_paths += 1;
                if orig != recon {
                    let severity = table.classify_change(path, orig, recon);
                    let description = if severity == Severity::Cosmetic {
                        "Formatting differs; value is equivalent".to_string()
                    } else {
                        format!("Value changed from '{orig}' to '{recon}'")
                    };
                    outcome.push(Finding {
                        location: path.to_string(),
                        severity,
                        status: DiffStatus::Changed,
                        description,
                        original_value: Some(orig.to_string()),
                        reconstructed_value: Some(recon.to_string()),
                    });
                }
            }
            std::cmp::Ordering::Less => {
                let (path, orig) = left.next().unwrap_or_default();
                outcome.push(Finding {
                    location: path.to_string(),
                    severity: table.classify_removal(path),
                    status: DiffStatus::Removed,
                    description: "Field missing from reconstruction".to_string(),
                    original_value: Some(orig.to_string()),
                    reconstructed_value: None,
                });
            }
            std::cmp::Ordering::Greater => {
                let (path, recon) = right.next().unwrap_or_default();
                outcome.push(Finding {
                    location: path.to_string(),
                    severity: table.classify_addition(path),
                    status: DiffStatus::Added,
                    description: "Unexpected field in reconstruction".to_string(),
                    original_value: None,
                    reconstructed_value: Some(recon.to_string()),
                });
            }
        }
    }

    outcome
}

// ---------------------------------------------------------------------------
// Byte mode (reduced confidence)
// ---------------------------------------------------------------------------

/// Compare raw bytes line by line when canonicalization is unavailable.
///
/// Lines are matched as a multiset keyed by whitespace-normalized content, so
/// reordering is tolerated. Matched lines whose raw text differs are cosmetic;
/// unmatched original lines are major losses; unmatched reconstruction lines
/// are minor additions.
pub fn analyze_bytes(original: &[u8], reconstructed: &[u8]) -> DiffOutcome {
    let original_text = String::from_utf8_lossy(original);
    let reconstructed_text = String::from_utf8_lossy(reconstructed);

    let original_lines = non_blank_lines(&original_text);
    let reconstructed_lines = non_blank_lines(&reconstructed_text);

    let mut outcome = DiffOutcome {
        original_leaf_count: original_lines.len(),
        reconstructed_leaf_count: reconstructed_lines.len(),
        reduced_confidence: true,
        ..DiffOutcome::default()
    };

    let mut buckets: HashMap<String, VecDeque<(usize, &str)>> = HashMap::new();
    for &(line_no, raw) in &reconstructed_lines {
        buckets
            .entry(normalize_whitespace(raw))
            .or_default()
            .push_back((line_no, raw));
    }

    for &(line_no, raw) in &original_lines {
        let matched = buckets
            .get_mut(&normalize_whitespace(raw))
            .and_then(VecDeque::pop_front);
        match matched {
            Some((_, recon_raw)) => {
                outcome.shared_paths += 1;
                if recon_raw != raw {
                    outcome.push(Finding {
                        location: format!("line:{line_no}"),
                        severity: Severity::Cosmetic,
                        status: DiffStatus::Changed,
                        description: "Whitespace differs".to_string(),
                        original_value: Some(raw.to_string()),
                        reconstructed_value: Some(recon_raw.to_string()),
                    });
                }
            }
            None => outcome.push(Finding {
                location: format!("line:{line_no}"),
                severity: Severity::Major,
                status: DiffStatus::Removed,
                description: "Line missing from reconstruction".to_string(),
                original_value: Some(raw.to_string()),
                reconstructed_value: None,
            }),
        }
    }

    let mut leftovers: Vec<(usize, &str)> = buckets.into_values().flatten().collect();
    leftovers.sort_by_key(|(line_no, _)| *line_no);
    for (line_no, raw) in leftovers {
        outcome.push(Finding {
            location: format!("reconstruction:line:{line_no}"),
            severity: Severity::Minor,
            status: DiffStatus::Added,
            description: "Unexpected line in reconstruction".to_string(),
            original_value: None,
            reconstructed_value: Some(raw.to_string()),
        });
    }

    let removed = outcome
        .findings
        .iter()
        .filter(|f| f.status == DiffStatus::Removed)
        .count();
    let added = outcome
        .findings
        .iter()
        .filter(|f| f.status == DiffStatus::Added)
        .count();
    outcome.union_paths = outcome.shared_paths + removed + added;
    outcome
}

/// 1-based line numbers with their raw text, skipping blank lines.
fn non_blank_lines(text: &str) -> Vec<(usize, &str)> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| (i + 1, line))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::Leaf;

    fn doc(pairs: &[(&str, &str)]) -> CanonicalDocument {
        CanonicalDocument::from_leaves(pairs.iter().map(|(p, v)| Leaf::new(*p, *v))).unwrap()
    }

    // -- DiffStatus -----------------------------------------------------------

    #[test]
    fn as_str_returns_correct_strings() {
        assert_eq!(DiffStatus::Added.as_str(), "added");
        assert_eq!(DiffStatus::Removed.as_str(), "removed");
        assert_eq!(DiffStatus::Changed.as_str(), "changed");
        assert_eq!(DiffStatus::from_name("removed"), Some(DiffStatus::Removed));
        assert_eq!(DiffStatus::from_name("gone"), None);
    }

    // -- analyze_documents ----------------------------------------------------

    #[test]
    fn identical_documents_have_no_findings() {
        let a = doc(&[("DeviceInfo/VendorNumber", "0x100"), ("Objects/1000/Name", "Type")]);
        let outcome = analyze_documents(&a, &a.clone(), &SeverityTable::default());
        assert!(outcome.findings.is_empty());
        assert_eq!(outcome.shared_paths, 2);
        assert_eq!(outcome.union_paths, 2);
        assert!(!outcome.reduced_confidence);
    }

    #[test]
    fn three_way_classification() {
        let original = doc(&[
            ("A/Kept", "1"),
            ("A/Changed", "x"),
            ("A/Lost", "y"),
        ]);
        let reconstructed = doc(&[
            ("A/Kept", "1"),
            ("A/Changed", "z"),
            ("A/Extra", "w"),
        ]);
        let outcome = analyze_documents(&original, &reconstructed, &SeverityTable::default());

        assert_eq!(outcome.shared_paths, 2);
        assert_eq!(outcome.union_paths, 4);
        let by_path: HashMap<_, _> = outcome
            .findings
            .iter()
            .map(|f| (f.location.as_str(), f))
            .collect();
        assert_eq!(by_path["A/Changed"].status, DiffStatus::Changed);
        assert_eq!(by_path["A/Changed"].severity, Severity::Minor);
        assert_eq!(by_path["A/Lost"].status, DiffStatus::Removed);
        assert_eq!(by_path["A/Lost"].severity, Severity::Major);
        assert_eq!(by_path["A/Extra"].status, DiffStatus::Added);
        assert_eq!(by_path["A/Extra"].severity, Severity::Minor);
    }

    #[test]
    fn findings_are_in_lexicographic_order() {
        let original = doc(&[("c", "1"), ("a", "1"), ("b", "1")]);
        let reconstructed = doc(&[("b", "2"), ("d", "1")]);
        let outcome = analyze_documents(&original, &reconstructed, &SeverityTable::default());
        let paths: Vec<_> = outcome.findings.iter().map(|f| f.location.as_str()).collect();
        assert_eq!(paths, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn lost_critical_field_is_critical() {
        let original = doc(&[("DeviceInfo/ProductCode", "0x42"), ("X/Y", "1")]);
        let reconstructed = doc(&[("X/Y", "1")]);
        let outcome = analyze_documents(&original, &reconstructed, &SeverityTable::default());
        assert!(outcome.has_critical());
        assert_eq!(outcome.counts.critical, 1);
        assert_eq!(outcome.data_loss_findings(), 1);
    }

    #[test]
    fn counts_track_findings() {
        let original = doc(&[("A/One", "a  b"), ("A/Two", "1")]);
        let reconstructed = doc(&[("A/One", "a b")]);
        let outcome = analyze_documents(&original, &reconstructed, &SeverityTable::default());
        assert_eq!(outcome.counts.cosmetic, 1);
        assert_eq!(outcome.counts.major, 1);
        assert_eq!(outcome.counts.total() as usize, outcome.findings.len());
    }

    #[test]
    fn added_findings_do_not_count_as_loss() {
        let original = doc(&[("A", "1")]);
        let reconstructed = doc(&[("A", "1"), ("DeviceInfo/VendorNumber", "5")]);
        let outcome = analyze_documents(&original, &reconstructed, &SeverityTable::default());
        assert_eq!(outcome.data_loss_findings(), 0);
    }

    #[test]
    fn empty_documents() {
        let outcome = analyze_documents(
            &CanonicalDocument::default(),
            &CanonicalDocument::default(),
            &SeverityTable::default(),
        );
        assert_eq!(outcome.union_paths, 0);
        assert!(outcome.findings.is_empty());
    }

    // -- analyze_bytes --------------------------------------------------------

    #[test]
    fn identical_bytes_have_no_findings() {
        let text = b"[DeviceInfo]\nVendorName=Acme\n\nProductName=Drive\n";
        let outcome = analyze_bytes(text, text);
        assert!(outcome.reduced_confidence);
        assert!(outcome.findings.is_empty());
        assert_eq!(outcome.original_leaf_count, 3);
        assert_eq!(outcome.shared_paths, 3);
        assert_eq!(outcome.union_paths, 3);
    }

    #[test]
    fn byte_mode_classifies_lines() {
        let original = b"a=1\nb = 2\nc=3\n";
        let reconstructed = b"b  =  2\na=1\nd=4\n";
        let outcome = analyze_bytes(original, reconstructed);

        assert_eq!(outcome.shared_paths, 2);
        assert_eq!(outcome.union_paths, 4);
        assert_eq!(outcome.counts.cosmetic, 1);
        assert_eq!(outcome.counts.major, 1);
        assert_eq!(outcome.counts.minor, 1);

        let removed = outcome
            .findings
            .iter()
            .find(|f| f.status == DiffStatus::Removed)
            .unwrap();
        assert_eq!(removed.location, "line:3");
        let added = outcome
            .findings
            .iter()
            .find(|f| f.status == DiffStatus::Added)
            .unwrap();
        assert_eq!(added.location, "reconstruction:line:3");
    }

    #[test]
    fn duplicate_lines_are_matched_as_multiset() {
        let original = b"x\nx\nx\n";
        let reconstructed = b"x\n";
        let outcome = analyze_bytes(original, reconstructed);
        assert_eq!(outcome.shared_paths, 1);
        assert_eq!(outcome.data_loss_findings(), 2);
    }
}
