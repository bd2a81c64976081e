use crate::error::{ReleaseError, Result};
use std::fmt;

/// Semantic version representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    /// Create a new version
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Version {
            major,
            minor,
            patch,
        }
    }

    /// Parse a version string (e.g., "1.2.3" or "v1.2.3").
    ///
    /// Pre-release and build metadata are rejected: the version marker must
    /// hold a plain X.Y.Z triple for the bump to stay mechanical.
    pub fn parse(value: &str) -> Result<Self> {
        let clean = value
            .trim()
            .trim_start_matches('v')
            .trim_start_matches('V');

        let parsed = semver::Version::parse(clean).map_err(|e| {
            ReleaseError::version(format!("Invalid version '{}': {}", value, e))
        })?;

        if !parsed.pre.is_empty() || !parsed.build.is_empty() {
            return Err(ReleaseError::version(format!(
                "Invalid version '{}': pre-release or build metadata is not supported",
                value
            )));
        }

        Ok(Version {
            major: parsed.major,
            minor: parsed.minor,
            patch: parsed.patch,
        })
    }

    /// Successor version for the given bump kind
    pub fn bump(&self, kind: BumpKind) -> Self {
        match kind {
            BumpKind::Major => Version {
                major: self.major + 1,
                minor: 0,
                patch: 0,
            },
            BumpKind::Minor => Version {
                major: self.major,
                minor: self.minor + 1,
                patch: 0,
            },
            BumpKind::Patch => Version {
                major: self.major,
                minor: self.minor,
                patch: self.patch + 1,
            },
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Version bump severity. Totally ordered; concurrent contributions combine
/// by taking the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BumpKind {
    Patch,
    Minor,
    Major,
}

impl BumpKind {
    /// Map a single label name to a bump kind, if it is a release label
    pub fn from_label(label: &str) -> Option<BumpKind> {
        match label {
            "patch" => Some(BumpKind::Patch),
            "minor" => Some(BumpKind::Minor),
            "major" => Some(BumpKind::Major),
            _ => None,
        }
    }

    /// Combined bump for a label set. An issue carrying several release
    /// labels contributes its largest one; no release label means no bump.
    pub fn from_labels<'a, I>(labels: I) -> Option<BumpKind>
    where
        I: IntoIterator<Item = &'a str>,
    {
        labels.into_iter().filter_map(Self::from_label).max()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BumpKind::Patch => "patch",
            BumpKind::Minor => "minor",
            BumpKind::Major => "major",
        }
    }
}

impl fmt::Display for BumpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
