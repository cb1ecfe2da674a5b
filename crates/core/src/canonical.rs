//! Canonical leaf-path/value documents.
//!
//! Both grammars are flattened by their parser into `(path, value)` leaves so
//! that originals and reconstructions can be compared without knowing which
//! grammar produced them. Paths are `/`-separated (e.g.
//! `DeviceInfo/VendorNumber`); the parser owns how a grammar maps onto them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Separator between path segments.
pub const PATH_SEPARATOR: char = '/';

/// A single `(path, value)` leaf as returned by a parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaf {
    pub path: String,
    pub value: String,
}

impl Leaf {
    pub fn new(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
        }
    }
}

/// A flattened document, keyed and iterated in lexicographic path order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalDocument {
    leaves: BTreeMap<String, String>,
}

impl CanonicalDocument {
    /// Build a document from parser leaves.
    ///
    /// Empty paths and duplicate paths are rejected: either means the parser
    /// did not produce a canonical form and the document cannot be compared
    /// leaf by leaf.
    pub fn from_leaves<I>(leaves: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = Leaf>,
    {
        let mut map = BTreeMap::new();
        for leaf in leaves {
            if leaf.path.trim().is_empty() {
                return Err(CoreError::Validation(
                    "Canonical leaf has an empty path".to_string(),
                ));
            }
            if map.insert(leaf.path.clone(), leaf.value).is_some() {
                return Err(CoreError::Validation(format!(
                    "Duplicate canonical path '{}'",
                    leaf.path
                )));
            }
        }
        Ok(Self { leaves: map })
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.leaves.get(path).map(String::as_str)
    }

    /// Iterate leaves in lexicographic path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.leaves.iter().map(|(p, v)| (p.as_str(), v.as_str()))
    }
}

/// Last segment of a canonical path (`"DeviceInfo/VendorNumber"` -> `"VendorNumber"`).
pub fn leaf_key(path: &str) -> &str {
    path.rsplit(PATH_SEPARATOR).next().unwrap_or(path)
}

/// Collapse runs of whitespace into a single space and trim both ends.
pub fn normalize_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a numeric leaf value.
///
/// Accepts decimal integers, floats, and `0x`-prefixed hexadecimal (common in
/// section/key-value device files). Returns `None` for anything else.
pub fn parse_numeric(value: &str) -> Option<f64> {
    let v = value.trim();
    if v.is_empty() {
        return None;
    }
    let (negative, digits) = match v.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, v),
    };
    let parsed = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16).ok().map(|n| n as f64)
    } else {
        digits.parse::<f64>().ok().filter(|n| n.is_finite())
    }?;
    Some(if negative { -parsed } else { parsed })
}

/// Whether two values differ only in formatting.
///
/// True when they are identical after whitespace normalization, or when both
/// parse to the same number (`"0x10"` and `"16"`, `"1.0"` and `"1"`).
pub fn is_formatting_only(a: &str, b: &str) -> bool {
    if normalize_whitespace(a) == normalize_whitespace(b) {
        return true;
    }
    match (parse_numeric(a), parse_numeric(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- CanonicalDocument ----------------------------------------------------

    #[test]
    fn leaves_are_ordered_lexicographically() {
        let doc = CanonicalDocument::from_leaves(vec![
            Leaf::new("b/x", "2"),
            Leaf::new("a/y", "1"),
            Leaf::new("a/b", "0"),
        ])
        .unwrap();
        let paths: Vec<_> = doc.iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["a/b", "a/y", "b/x"]);
        assert_eq!(doc.len(), 3);
        assert_eq!(doc.get("a/y"), Some("1"));
    }

    #[test]
    fn duplicate_path_rejected() {
        let result = CanonicalDocument::from_leaves(vec![
            Leaf::new("DeviceInfo/VendorName", "Acme"),
            Leaf::new("DeviceInfo/VendorName", "Other"),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn empty_path_rejected() {
        assert!(CanonicalDocument::from_leaves(vec![Leaf::new("  ", "x")]).is_err());
    }

    // -- leaf_key -------------------------------------------------------------

    #[test]
    fn leaf_key_returns_last_segment() {
        assert_eq!(leaf_key("DeviceInfo/VendorNumber"), "VendorNumber");
        assert_eq!(leaf_key("VendorNumber"), "VendorNumber");
    }

    // -- formatting -----------------------------------------------------------

    #[test]
    fn whitespace_only_difference_is_formatting() {
        assert!(is_formatting_only("Acme  Corp ", " Acme Corp"));
        assert!(is_formatting_only("a\tb", "a b"));
    }

    #[test]
    fn hex_and_decimal_are_formatting() {
        assert!(is_formatting_only("0x10", "16"));
        assert!(is_formatting_only("1.0", "1"));
        assert!(!is_formatting_only("0x10", "17"));
    }

    #[test]
    fn real_text_change_is_not_formatting() {
        assert!(!is_formatting_only("Acme", "Acne"));
    }

    #[test]
    fn parse_numeric_variants() {
        assert_eq!(parse_numeric("42"), Some(42.0));
        assert_eq!(parse_numeric("-0x0A"), Some(-10.0));
        assert_eq!(parse_numeric("2.5"), Some(2.5));
        assert_eq!(parse_numeric("abc"), None);
        assert_eq!(parse_numeric(""), None);
        assert_eq!(parse_numeric("NaN"), None);
    }
}
