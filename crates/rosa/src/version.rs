//! Minimal semantic version handling for cluster and CLI versions.

use std::fmt;
use std::str::FromStr;

/// A `major.minor.patch` version. Pre-release and build suffixes are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    /// Create a version from its parts.
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// The `major.minor` form used to key account roles.
    #[must_use]
    pub fn major_minor(&self) -> String {
        format!("{}.{}", self.major, self.minor)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Error returned when a version string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid semantic version: {0:?}")]
pub struct ParseVersionError(String);

impl FromStr for Version {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseVersionError(s.to_string());
        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let core = trimmed
            .split(['-', '+'])
            .next()
            .filter(|c| !c.is_empty())
            .ok_or_else(invalid)?;

        let mut parts = core.split('.');
        let mut next = |required: bool| -> Result<u64, ParseVersionError> {
            match parts.next() {
                Some(p) => p.parse().map_err(|_| invalid()),
                None if required => Err(invalid()),
                None => Ok(0),
            }
        };

        let major = next(true)?;
        let minor = next(false)?;
        let patch = next(false)?;
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self::new(major, minor, patch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_version() {
        let v: Version = "4.12.6".parse().unwrap();
        assert_eq!(v, Version::new(4, 12, 6));
        assert_eq!(v.major_minor(), "4.12");
    }

    #[test]
    fn test_parse_partial_and_prefixed_versions() {
        assert_eq!("v1.2".parse::<Version>().unwrap(), Version::new(1, 2, 0));
        assert_eq!("4".parse::<Version>().unwrap(), Version::new(4, 0, 0));
        assert_eq!(
            "4.13.0-rc.2".parse::<Version>().unwrap(),
            Version::new(4, 13, 0)
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<Version>().is_err());
        assert!("latest".parse::<Version>().is_err());
        assert!("1.2.3.4".parse::<Version>().is_err());
    }

    #[test]
    fn test_ordering() {
        let min: Version = "1.2.22".parse().unwrap();
        assert!("1.2.23".parse::<Version>().unwrap() >= min);
        assert!("1.3.0".parse::<Version>().unwrap() >= min);
        assert!("1.2.9".parse::<Version>().unwrap() < min);
    }
}
