use crate::error::{CdError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A three-part `MAJOR.MINOR.PATCH` package version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Increment the patch component only. There is no carry into minor,
    /// so a patch already at `u64::MAX` cannot be bumped.
    pub fn bump_patch(self) -> Result<Self> {
        let patch = self
            .patch
            .checked_add(1)
            .ok_or_else(|| CdError::InvalidVersion(self.to_string()))?;
        Ok(Self { patch, ..self })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = CdError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || CdError::InvalidVersion(s.to_string());

        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 {
            return Err(invalid());
        }
        // u64::from_str accepts a leading '+', which is not a version digit.
        let component = |p: &str| -> Result<u64> {
            if p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            p.parse().map_err(|_| invalid())
        };

        Ok(Self {
            major: component(parts[0])?,
            minor: component(parts[1])?,
            patch: component(parts[2])?,
        })
    }
}

/// Parse `version`, increment its patch component and format it back.
pub fn bump_version(version: &str) -> Result<String> {
    Ok(version.parse::<Version>()?.bump_patch()?.to_string())
}
