//! Host abstraction layer
//!
//! This module provides trait-based abstractions over the external VCS host
//! and issue tracker, allowing for multiple implementations including the
//! real GitHub REST backend and an in-memory implementation for testing.
//!
//! Most code should depend on the [VcsHost] and [IssueTracker] traits rather
//! than concrete implementations.
//!
//! Branch refs are never cached: every read that informs a decision is a
//! fresh host call, and the only serialization primitive is the
//! fast-forward-only ref update, whose rejection is a normal control-flow
//! outcome ([RefUpdate::Rejected]), never an error.

pub mod github;
pub mod memory;

pub use github::GithubHost;
pub use memory::MemoryHost;

use crate::domain::{Commit, Issue, PullRequest};
use crate::error::Result;

/// A release as recorded by the host: a tag pointing at a commit.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseRecord {
    pub tag: String,
    pub sha: String,
    pub url: String,
}

/// Outcome of a conditional ref update. Host failures are reported through
/// `Err`; a lost fast-forward race is `Rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefUpdate {
    Updated,
    Rejected,
}

/// Outcome of a release creation attempt
#[derive(Debug, Clone, PartialEq)]
pub enum CreatedRelease {
    Created(ReleaseRecord),
    AlreadyExists(ReleaseRecord),
}

impl CreatedRelease {
    pub fn record(self) -> ReleaseRecord {
        match self {
            CreatedRelease::Created(r) | CreatedRelease::AlreadyExists(r) => r,
        }
    }

    pub fn already_existed(&self) -> bool {
        matches!(self, CreatedRelease::AlreadyExists(_))
    }
}

/// Outcome of an asset upload attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetUpload {
    Uploaded,
    AlreadyExists,
}

/// Read and mutate the hosted repository.
///
/// All implementors must be `Send + Sync`. Methods return
/// [crate::error::Result], mapping backend failures to
/// [crate::error::ReleaseError::Host] with an appropriate
/// [crate::error::HostErrorKind].
pub trait VcsHost: Send + Sync {
    /// Fetch a commit by sha
    fn get_commit(&self, sha: &str) -> Result<Commit>;

    /// Current tip sha of a branch
    fn branch_head(&self, branch: &str) -> Result<String>;

    /// Fetch file contents as they exist at a ref (branch name or sha)
    fn get_file(&self, reference: &str, path: &str) -> Result<String>;

    /// Create a commit replacing one file, parented on exactly `parent_sha`.
    ///
    /// No ref is moved; the commit floats until a ref update points at it.
    fn create_commit(
        &self,
        parent_sha: &str,
        path: &str,
        contents: &str,
        message: &str,
    ) -> Result<Commit>;

    /// Point a branch at a commit. With `fast_forward_only`, the update is
    /// accepted only if the new sha's history extends the current tip;
    /// otherwise the host rejects it and `Ok(RefUpdate::Rejected)` is
    /// returned. A missing branch is created.
    fn update_ref(&self, branch: &str, sha: &str, fast_forward_only: bool) -> Result<RefUpdate>;

    /// All releases known to the host
    fn list_releases(&self) -> Result<Vec<ReleaseRecord>>;

    /// Fetch a release by tag, if it exists
    fn get_release(&self, tag: &str) -> Result<Option<ReleaseRecord>>;

    /// Create a release for the tag at the given commit. A concurrent
    /// creation of the same tag yields `AlreadyExists` with the winner's
    /// record.
    fn create_release(&self, tag: &str, sha: &str, notes: &str) -> Result<CreatedRelease>;

    /// Replace the release notes of an existing release
    fn update_release_notes(&self, tag: &str, notes: &str) -> Result<()>;

    /// Attach an asset to an existing release. Uploading a name that is
    /// already present yields `AlreadyExists`.
    fn upload_asset(&self, tag: &str, name: &str, contents: &[u8]) -> Result<AssetUpload>;
}

/// Read issues and pull requests, and close issues on release.
pub trait IssueTracker: Send + Sync {
    /// Fetch an issue by number. Returns `None` when the number does not
    /// name an issue (including when it names a pull request instead).
    fn get_issue(&self, number: u64) -> Result<Option<Issue>>;

    /// Fetch a pull request by number, if it exists
    fn get_pull_request(&self, number: u64) -> Result<Option<PullRequest>>;

    /// Close an issue, attaching the comment unless an identical comment is
    /// already present. Closing an already-closed issue succeeds.
    fn close_issue(&self, number: u64, comment: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ReleaseRecord {
        ReleaseRecord {
            tag: "1.2.3".to_string(),
            sha: "abc".to_string(),
            url: "https://example.test/releases/1.2.3".to_string(),
        }
    }

    #[test]
    fn test_created_release_record() {
        assert_eq!(CreatedRelease::Created(record()).record(), record());
        assert_eq!(CreatedRelease::AlreadyExists(record()).record(), record());
    }

    #[test]
    fn test_created_release_already_existed() {
        assert!(!CreatedRelease::Created(record()).already_existed());
        assert!(CreatedRelease::AlreadyExists(record()).already_existed());
    }
}
