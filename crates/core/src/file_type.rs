//! Device-description file types accepted by the archive and analyzer.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The two device-description grammars the platform ingests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    /// Section/key-value grammar (`[Section]` headers with `Key=Value` lines).
    Eds,
    /// Tag-based hierarchical grammar.
    Xdd,
}

/// All supported file types, in display order.
pub const ALL_FILE_TYPES: &[FileType] = &[FileType::Eds, FileType::Xdd];

impl FileType {
    /// Parse from the database / URL representation.
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "eds" => Ok(Self::Eds),
            "xdd" => Ok(Self::Xdd),
            other => Err(CoreError::Validation(format!(
                "Unknown file type '{other}'. Must be one of: eds, xdd"
            ))),
        }
    }

    /// Database / URL value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eds => "eds",
            Self::Xdd => "xdd",
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Eds => "Electronic Data Sheet (section/key-value)",
            Self::Xdd => "XML Device Description (tag-based)",
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FileType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_name_accepts_known_types() {
        assert_eq!(FileType::from_name("eds").unwrap(), FileType::Eds);
        assert_eq!(FileType::from_name("xdd").unwrap(), FileType::Xdd);
    }

    #[test]
    fn from_name_rejects_unknown() {
        assert!(FileType::from_name("xml").is_err());
        assert!(FileType::from_name("EDS").is_err());
        assert!(FileType::from_name("").is_err());
    }

    #[test]
    fn as_str_matches_serde_representation() {
        for ft in ALL_FILE_TYPES {
            let json = serde_json::to_string(ft).unwrap();
            assert_eq!(json, format!("\"{}\"", ft.as_str()));
        }
    }
}
