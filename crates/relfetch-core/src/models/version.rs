//! Version selection for release lookups.

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Which release a caller asked for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VersionSelector {
    Latest,
    Tag(String),
    /// Nothing was requested; resolves like [`VersionSelector::Latest`].
    #[default]
    Unspecified,
}

impl VersionSelector {
    pub fn tag(tag: impl Into<String>) -> Self {
        VersionSelector::Tag(tag.into())
    }

    /// Collapse `Unspecified` into `Latest`.
    pub fn resolved(&self) -> Self {
        match self {
            VersionSelector::Unspecified => VersionSelector::Latest,
            other => other.clone(),
        }
    }

    pub fn is_latest(&self) -> bool {
        matches!(self, VersionSelector::Latest | VersionSelector::Unspecified)
    }
}

impl FromStr for VersionSelector {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match s {
            "" => VersionSelector::Unspecified,
            "latest" => VersionSelector::Latest,
            tag => VersionSelector::Tag(tag.to_string()),
        })
    }
}

impl From<Option<&str>> for VersionSelector {
    fn from(value: Option<&str>) -> Self {
        match value {
            Some(s) => s.parse().unwrap_or_default(),
            None => VersionSelector::Unspecified,
        }
    }
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSelector::Latest | VersionSelector::Unspecified => write!(f, "latest"),
            VersionSelector::Tag(tag) => write!(f, "{}", tag),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("latest".parse::<VersionSelector>().unwrap(), VersionSelector::Latest);
        assert_eq!("".parse::<VersionSelector>().unwrap(), VersionSelector::Unspecified);
        assert_eq!(
            " v1.0.0 ".parse::<VersionSelector>().unwrap(),
            VersionSelector::tag("v1.0.0")
        );
    }

    #[test]
    fn test_unspecified_resolves_to_latest() {
        assert_eq!(VersionSelector::default(), VersionSelector::Unspecified);
        assert_eq!(VersionSelector::Unspecified.resolved(), VersionSelector::Latest);
        assert_eq!(
            VersionSelector::tag("v2.0.0").resolved(),
            VersionSelector::tag("v2.0.0")
        );
        assert!(VersionSelector::from(None).is_latest());
    }

    #[test]
    fn test_display() {
        assert_eq!(VersionSelector::Unspecified.to_string(), "latest");
        assert_eq!(VersionSelector::tag("v1.4.0").to_string(), "v1.4.0");
    }
}
