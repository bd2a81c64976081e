//! The tracked version marker: a literal `key = "X.Y.Z"` assignment in a
//! designated file. The value is read and rewritten by exact textual
//! substitution only; the file is never evaluated.

use crate::domain::Version;
use crate::error::{ReleaseError, Result};
use regex::Regex;

pub struct VersionMarker {
    path: String,
    key: String,
}

impl VersionMarker {
    pub fn new(path: impl Into<String>, key: impl Into<String>) -> Self {
        VersionMarker {
            path: path.into(),
            key: key.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn pattern(&self) -> Result<Regex> {
        // Anchored to line start so e.g. a dependency's `version = "..."`
        // inside a table entry never matches.
        let pattern = format!(
            r#"(?m)^({}\s*=\s*")([^"\r\n]+)(")"#,
            regex::escape(&self.key)
        );
        Regex::new(&pattern).map_err(|e| {
            ReleaseError::marker(&self.path, format!("invalid marker pattern: {}", e))
        })
    }

    /// Extract the current version from the file contents
    pub fn current_version(&self, contents: &str) -> Result<Version> {
        let pattern = self.pattern()?;
        let captures = pattern.captures(contents).ok_or_else(|| {
            ReleaseError::marker(
                &self.path,
                format!("no '{} = \"...\"' assignment found", self.key),
            )
        })?;
        let value = &captures[2];
        Version::parse(value)
            .map_err(|e| ReleaseError::marker(&self.path, format!("'{}': {}", value, e)))
    }

    /// Rewrite the marker to the next version, leaving the rest of the file
    /// byte-identical. Only the first assignment is touched.
    pub fn rewrite(&self, contents: &str, next: &Version) -> Result<String> {
        let pattern = self.pattern()?;
        let captures = pattern.captures(contents).ok_or_else(|| {
            ReleaseError::marker(
                &self.path,
                format!("no '{} = \"...\"' assignment found", self.key),
            )
        })?;
        let value = captures.get(2).ok_or_else(|| {
            ReleaseError::marker(&self.path, "marker pattern matched without a value")
        })?;
        let mut rewritten = String::with_capacity(contents.len());
        rewritten.push_str(&contents[..value.start()]);
        rewritten.push_str(&next.to_string());
        rewritten.push_str(&contents[value.end()..]);
        Ok(rewritten)
    }
}
