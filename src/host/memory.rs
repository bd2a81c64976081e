use crate::domain::{Commit, Issue, PullRequest};
use crate::error::{HostErrorKind, ReleaseError, Result};
use crate::host::{AssetUpload, CreatedRelease, IssueTracker, RefUpdate, ReleaseRecord, VcsHost};
use chrono::Duration;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct StoredRelease {
    tag: String,
    sha: String,
    notes: String,
    assets: Vec<String>,
}

#[derive(Default)]
struct State {
    commits: HashMap<String, Commit>,
    trees: HashMap<String, HashMap<String, String>>,
    branches: HashMap<String, String>,
    releases: Vec<StoredRelease>,
    issues: HashMap<u64, Issue>,
    pulls: HashMap<u64, PullRequest>,
    comments: HashMap<u64, Vec<String>>,
    generated: u64,
}

/// In-memory host for testing without network access.
///
/// Implements both host traits over a mutable commit graph with real
/// ancestry-checked fast-forward semantics, so race scenarios can be staged
/// deterministically.
pub struct MemoryHost {
    state: Mutex<State>,
}

impl MemoryHost {
    /// Create a new empty host
    pub fn new() -> Self {
        MemoryHost {
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("memory host state poisoned")
    }

    /// Add a commit. Its tree starts as a copy of the first parent's tree.
    pub fn add_commit(&self, commit: Commit) {
        let mut state = self.state();
        let tree = commit
            .first_parent()
            .and_then(|p| state.trees.get(p).cloned())
            .unwrap_or_default();
        state.trees.insert(commit.sha.clone(), tree);
        state.commits.insert(commit.sha.clone(), commit);
    }

    /// Set a file in a commit's tree
    pub fn put_file(&self, sha: &str, path: &str, contents: &str) {
        self.state()
            .trees
            .entry(sha.to_string())
            .or_default()
            .insert(path.to_string(), contents.to_string());
    }

    /// Point a branch at a commit without any fast-forward check
    pub fn set_branch(&self, branch: &str, sha: &str) {
        self.state()
            .branches
            .insert(branch.to_string(), sha.to_string());
    }

    /// Register an issue
    pub fn add_issue(&self, issue: Issue) {
        self.state().issues.insert(issue.number, issue);
    }

    /// Register a pull request
    pub fn add_pull(&self, number: u64, body: &str) {
        self.state().pulls.insert(
            number,
            PullRequest {
                number,
                body: body.to_string(),
            },
        );
    }

    /// Record a pre-existing release, e.g. to stage a release boundary
    pub fn add_release(&self, tag: &str, sha: &str) {
        self.state().releases.push(StoredRelease {
            tag: tag.to_string(),
            sha: sha.to_string(),
            notes: String::new(),
            assets: Vec::new(),
        });
    }

    /// Current tip of a branch, for assertions
    pub fn branch(&self, branch: &str) -> Option<String> {
        self.state().branches.get(branch).cloned()
    }

    /// Notes stored for a release, for assertions
    pub fn release_notes(&self, tag: &str) -> Option<String> {
        self.state()
            .releases
            .iter()
            .find(|r| r.tag == tag)
            .map(|r| r.notes.clone())
    }

    /// Number of releases recorded for a tag, for duplicate checks
    pub fn release_count(&self, tag: &str) -> usize {
        self.state().releases.iter().filter(|r| r.tag == tag).count()
    }

    /// Whether an issue has been closed
    pub fn issue_closed(&self, number: u64) -> bool {
        self.state()
            .issues
            .get(&number)
            .map(|i| i.closed)
            .unwrap_or(false)
    }

    /// Comments recorded against an issue, for assertions
    pub fn comments_for(&self, number: u64) -> Vec<String> {
        self.state()
            .comments
            .get(&number)
            .cloned()
            .unwrap_or_default()
    }

    fn record_for(release: &StoredRelease) -> ReleaseRecord {
        ReleaseRecord {
            tag: release.tag.clone(),
            sha: release.sha.clone(),
            url: format!("https://example.test/releases/{}", release.tag),
        }
    }

    /// Whether `ancestor` is reachable from `descendant` via parent edges
    fn is_ancestor(state: &State, ancestor: &str, descendant: &str) -> bool {
        let mut pending = vec![descendant.to_string()];
        let mut seen = HashSet::new();
        while let Some(sha) = pending.pop() {
            if sha == ancestor {
                return true;
            }
            if !seen.insert(sha.clone()) {
                continue;
            }
            if let Some(commit) = state.commits.get(&sha) {
                pending.extend(commit.parents.iter().cloned());
            }
        }
        false
    }

    fn resolve(state: &State, reference: &str) -> Option<String> {
        if let Some(sha) = state.branches.get(reference) {
            return Some(sha.clone());
        }
        if state.commits.contains_key(reference) {
            return Some(reference.to_string());
        }
        None
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl VcsHost for MemoryHost {
    fn get_commit(&self, sha: &str) -> Result<Commit> {
        self.state().commits.get(sha).cloned().ok_or_else(|| {
            ReleaseError::host(
                "get_commit",
                HostErrorKind::NotFound,
                format!("no commit {}", sha),
            )
        })
    }

    fn branch_head(&self, branch: &str) -> Result<String> {
        self.state().branches.get(branch).cloned().ok_or_else(|| {
            ReleaseError::host(
                "branch_head",
                HostErrorKind::NotFound,
                format!("no branch {}", branch),
            )
        })
    }

    fn get_file(&self, reference: &str, path: &str) -> Result<String> {
        let state = self.state();
        let sha = Self::resolve(&state, reference).ok_or_else(|| {
            ReleaseError::host(
                "get_file",
                HostErrorKind::NotFound,
                format!("no ref {}", reference),
            )
        })?;
        state
            .trees
            .get(&sha)
            .and_then(|tree| tree.get(path))
            .cloned()
            .ok_or_else(|| {
                ReleaseError::host(
                    "get_file",
                    HostErrorKind::NotFound,
                    format!("no file {} at {}", path, reference),
                )
            })
    }

    fn create_commit(
        &self,
        parent_sha: &str,
        path: &str,
        contents: &str,
        message: &str,
    ) -> Result<Commit> {
        let mut state = self.state();
        let parent = state.commits.get(parent_sha).cloned().ok_or_else(|| {
            ReleaseError::host(
                "create_commit",
                HostErrorKind::NotFound,
                format!("no commit {}", parent_sha),
            )
        })?;

        state.generated += 1;
        let sha = format!("{:040x}", state.generated);

        let mut tree = state.trees.get(parent_sha).cloned().unwrap_or_default();
        tree.insert(path.to_string(), contents.to_string());
        state.trees.insert(sha.clone(), tree);

        let commit = Commit::new(
            sha.clone(),
            message,
            vec![parent_sha.to_string()],
            parent.author_date + Duration::seconds(1),
        );
        state.commits.insert(sha, commit.clone());
        Ok(commit)
    }

    fn update_ref(&self, branch: &str, sha: &str, fast_forward_only: bool) -> Result<RefUpdate> {
        let mut state = self.state();
        if !state.commits.contains_key(sha) {
            return Err(ReleaseError::host(
                "update_ref",
                HostErrorKind::NotFound,
                format!("no commit {}", sha),
            ));
        }
        if let Some(tip) = state.branches.get(branch).cloned() {
            if fast_forward_only && tip != sha && !Self::is_ancestor(&state, &tip, sha) {
                return Ok(RefUpdate::Rejected);
            }
        }
        state.branches.insert(branch.to_string(), sha.to_string());
        Ok(RefUpdate::Updated)
    }

    fn list_releases(&self) -> Result<Vec<ReleaseRecord>> {
        Ok(self.state().releases.iter().map(Self::record_for).collect())
    }

    fn get_release(&self, tag: &str) -> Result<Option<ReleaseRecord>> {
        Ok(self
            .state()
            .releases
            .iter()
            .find(|r| r.tag == tag)
            .map(Self::record_for))
    }

    fn create_release(&self, tag: &str, sha: &str, notes: &str) -> Result<CreatedRelease> {
        let mut state = self.state();
        if let Some(existing) = state.releases.iter().find(|r| r.tag == tag) {
            return Ok(CreatedRelease::AlreadyExists(Self::record_for(existing)));
        }
        let release = StoredRelease {
            tag: tag.to_string(),
            sha: sha.to_string(),
            notes: notes.to_string(),
            assets: Vec::new(),
        };
        let record = Self::record_for(&release);
        state.releases.push(release);
        Ok(CreatedRelease::Created(record))
    }

    fn update_release_notes(&self, tag: &str, notes: &str) -> Result<()> {
        let mut state = self.state();
        let release = state
            .releases
            .iter_mut()
            .find(|r| r.tag == tag)
            .ok_or_else(|| {
                ReleaseError::host(
                    "update_release_notes",
                    HostErrorKind::NotFound,
                    format!("no release {}", tag),
                )
            })?;
        release.notes = notes.to_string();
        Ok(())
    }

    fn upload_asset(&self, tag: &str, name: &str, _contents: &[u8]) -> Result<AssetUpload> {
        let mut state = self.state();
        let release = state
            .releases
            .iter_mut()
            .find(|r| r.tag == tag)
            .ok_or_else(|| {
                ReleaseError::host(
                    "upload_asset",
                    HostErrorKind::NotFound,
                    format!("no release {}", tag),
                )
            })?;
        if release.assets.iter().any(|a| a == name) {
            return Ok(AssetUpload::AlreadyExists);
        }
        release.assets.push(name.to_string());
        Ok(AssetUpload::Uploaded)
    }
}

impl IssueTracker for MemoryHost {
    fn get_issue(&self, number: u64) -> Result<Option<Issue>> {
        Ok(self.state().issues.get(&number).cloned())
    }

    fn get_pull_request(&self, number: u64) -> Result<Option<PullRequest>> {
        Ok(self.state().pulls.get(&number).cloned())
    }

    fn close_issue(&self, number: u64, comment: &str) -> Result<()> {
        let mut state = self.state();
        let issue = state.issues.get_mut(&number).ok_or_else(|| {
            ReleaseError::host(
                "close_issue",
                HostErrorKind::NotFound,
                format!("no issue {}", number),
            )
        })?;
        issue.closed = true;
        let comments = state.comments.entry(number).or_default();
        if !comments.iter().any(|c| c == comment) {
            comments.push(comment.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn commit(sha: &str, message: &str, parents: &[&str]) -> Commit {
        Commit::new(
            sha,
            message,
            parents.iter().map(|p| p.to_string()).collect(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_commit_roundtrip() {
        let host = MemoryHost::new();
        host.add_commit(commit("a", "first", &[]));
        assert_eq!(host.get_commit("a").unwrap().message, "first");
        assert!(host.get_commit("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_trees_inherit_from_first_parent() {
        let host = MemoryHost::new();
        host.add_commit(commit("a", "first", &[]));
        host.put_file("a", "Cargo.toml", "version = \"1.0.0\"");
        host.add_commit(commit("b", "second", &["a"]));
        assert_eq!(
            host.get_file("b", "Cargo.toml").unwrap(),
            "version = \"1.0.0\""
        );
    }

    #[test]
    fn test_get_file_by_branch() {
        let host = MemoryHost::new();
        host.add_commit(commit("a", "first", &[]));
        host.put_file("a", "f.txt", "hello");
        host.set_branch("main", "a");
        assert_eq!(host.get_file("main", "f.txt").unwrap(), "hello");
    }

    #[test]
    fn test_create_commit_parents_and_tree() {
        let host = MemoryHost::new();
        host.add_commit(commit("a", "first", &[]));
        host.put_file("a", "Cargo.toml", "version = \"1.0.0\"");
        let created = host
            .create_commit("a", "Cargo.toml", "version = \"1.0.1\"", "Bump version to 1.0.1")
            .unwrap();
        assert_eq!(created.parents, vec!["a".to_string()]);
        assert_eq!(
            host.get_file(&created.sha, "Cargo.toml").unwrap(),
            "version = \"1.0.1\""
        );
    }

    #[test]
    fn test_fast_forward_accepts_descendant() {
        let host = MemoryHost::new();
        host.add_commit(commit("a", "first", &[]));
        host.add_commit(commit("b", "second", &["a"]));
        host.set_branch("main", "a");
        assert_eq!(host.update_ref("main", "b", true).unwrap(), RefUpdate::Updated);
        assert_eq!(host.branch("main"), Some("b".to_string()));
    }

    #[test]
    fn test_fast_forward_rejects_sibling() {
        let host = MemoryHost::new();
        host.add_commit(commit("a", "first", &[]));
        host.add_commit(commit("b", "second", &["a"]));
        host.add_commit(commit("c", "sibling", &["a"]));
        host.set_branch("main", "b");
        assert_eq!(host.update_ref("main", "c", true).unwrap(), RefUpdate::Rejected);
        assert_eq!(host.branch("main"), Some("b".to_string()));
    }

    #[test]
    fn test_forced_update_moves_anywhere() {
        let host = MemoryHost::new();
        host.add_commit(commit("a", "first", &[]));
        host.add_commit(commit("b", "second", &["a"]));
        host.add_commit(commit("c", "sibling", &["a"]));
        host.set_branch("stable", "b");
        assert_eq!(host.update_ref("stable", "c", false).unwrap(), RefUpdate::Updated);
    }

    #[test]
    fn test_update_ref_creates_missing_branch() {
        let host = MemoryHost::new();
        host.add_commit(commit("a", "first", &[]));
        assert_eq!(host.update_ref("stable", "a", false).unwrap(), RefUpdate::Updated);
        assert_eq!(host.branch("stable"), Some("a".to_string()));
    }

    #[test]
    fn test_release_create_is_idempotent() {
        let host = MemoryHost::new();
        host.add_commit(commit("a", "first", &[]));
        let first = host.create_release("1.0.0", "a", "").unwrap();
        assert!(!first.already_existed());
        let second = host.create_release("1.0.0", "a", "").unwrap();
        assert!(second.already_existed());
        assert_eq!(host.release_count("1.0.0"), 1);
    }

    #[test]
    fn test_asset_upload_skips_existing() {
        let host = MemoryHost::new();
        host.add_release("1.0.0", "a");
        assert_eq!(
            host.upload_asset("1.0.0", "pkg.tar.gz", b"bytes").unwrap(),
            AssetUpload::Uploaded
        );
        assert_eq!(
            host.upload_asset("1.0.0", "pkg.tar.gz", b"bytes").unwrap(),
            AssetUpload::AlreadyExists
        );
    }

    #[test]
    fn test_close_issue_dedups_comment() {
        let host = MemoryHost::new();
        host.add_issue(Issue {
            number: 4,
            title: "t".to_string(),
            labels: vec![],
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            closed: false,
            url: "u".to_string(),
        });
        host.close_issue(4, "part of release 1.0.0").unwrap();
        host.close_issue(4, "part of release 1.0.0").unwrap();
        assert!(host.issue_closed(4));
        assert_eq!(host.comments_for(4).len(), 1);
    }
}
