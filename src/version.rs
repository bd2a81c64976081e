//! Next-version computation from classified commits.

use crate::domain::{BumpKind, ClassifiedCommit, Version};
use crate::error::{ReleaseError, Result};
use std::collections::HashSet;

/// Compute the next version for a set of classified commits.
///
/// Only issues carrying a release label participate. They are ordered by
/// issue creation time ascending (commit order is irrelevant here; two
/// commits may reference issues opened in the opposite order), each issue's
/// bump folds into a running maximum, and a single successor step of that
/// maximum is applied to `current`.
///
/// An empty participating set is a hard failure: no version can be
/// determined, and the caller must abort rather than skip.
pub fn compute_next_version(
    current: &Version,
    sha: &str,
    entries: &[ClassifiedCommit],
) -> Result<Version> {
    let mut seen = HashSet::new();
    let mut labeled: Vec<(chrono::DateTime<chrono::Utc>, u64, BumpKind)> = entries
        .iter()
        .filter_map(|entry| {
            let issue = entry.issue.as_ref()?;
            let bump = issue.bump()?;
            Some((issue.created_at, issue.number, bump))
        })
        .filter(|(_, number, _)| seen.insert(*number))
        .collect();

    if labeled.is_empty() {
        return Err(ReleaseError::NoReleaseLabel {
            sha: sha.to_string(),
        });
    }

    labeled.sort_by_key(|(created_at, number, _)| (*created_at, *number));

    let mut combined = BumpKind::Patch;
    for (_, number, bump) in &labeled {
        combined = combined.max(*bump);
        log::debug!("issue #{} contributes a {} bump", number, bump);
    }

    let next = current.bump(combined);
    log::debug!("next version for {}: {} -> {}", sha, current, next);
    Ok(next)
}
