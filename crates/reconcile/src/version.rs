//! Two-part snapshot version labels.
//!
//! Labels look like `major.minor`. The minor component counts 0 through 9;
//! after 9 the major component increments and minor resets to 0.

use std::fmt;
use std::str::FromStr;

/// A `major.minor` version label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

/// A version label that could not be parsed or advanced
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    #[error("invalid version label '{label}' (expected major.minor)")]
    Malformed { label: String },

    #[error("version {label} has no successor")]
    Exhausted { label: String },
}

impl Version {
    pub const INITIAL: Self = Self { major: 1, minor: 0 };

    #[must_use]
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// The version following `current`, or `1.0` when there is none.
    pub fn next(current: Option<&Self>) -> Result<Self, VersionError> {
        let Some(v) = current else {
            return Ok(Self::INITIAL);
        };
        let next = if v.minor == 9 {
            v.major.checked_add(1).map(|major| Self::new(major, 0))
        } else {
            v.minor.checked_add(1).map(|minor| Self::new(v.major, minor))
        };
        next.ok_or_else(|| VersionError::Exhausted {
            label: v.to_string(),
        })
    }
}

/// String form of [`Version::next`].
pub fn next_label(current: Option<&str>) -> Result<String, VersionError> {
    let current = current
        .filter(|s| !s.is_empty())
        .map(str::parse::<Version>)
        .transpose()?;
    Ok(Version::next(current.as_ref())?.to_string())
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || VersionError::Malformed {
            label: s.to_string(),
        };
        let (major, minor) = s.split_once('.').ok_or_else(err)?;
        let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if !digits(major) || !digits(minor) {
            return Err(err());
        }
        Ok(Self {
            major: major.parse().map_err(|_| err())?,
            minor: minor.parse().map_err(|_| err())?,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
