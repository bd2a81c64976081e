//! Changelog construction: walk unreleased history, classify every commit,
//! group the result.

use crate::analyzer::CommitClassifier;
use crate::domain::{ClassifiedCommit, Commit, CommitCategory, Issue};
use crate::error::Result;
use crate::history::HistoryWalk;
use crate::host::{IssueTracker, VcsHost};
use std::collections::HashSet;
use std::fmt::Write;

/// Builds a [Changelog] for a commit.
///
/// The walk starts at the given commit and stops at the first release
/// boundary: a commit that is the tag target of an existing release. The
/// half-open range between boundary and start is the unreleased history,
/// recomputed from host state on every build.
pub struct ChangelogBuilder<'a, H: VcsHost + ?Sized, T: IssueTracker + ?Sized> {
    host: &'a H,
    tracker: &'a T,
}

impl<'a, H: VcsHost + ?Sized, T: IssueTracker + ?Sized> ChangelogBuilder<'a, H, T> {
    pub fn new(host: &'a H, tracker: &'a T) -> Self {
        ChangelogBuilder { host, tracker }
    }

    pub fn build(&self, start_sha: &str) -> Result<Changelog> {
        let boundaries: HashSet<String> = self
            .host
            .list_releases()?
            .into_iter()
            .map(|release| release.sha)
            .collect();

        let classifier = CommitClassifier::new(self.tracker);
        let mut entries = Vec::new();

        for item in HistoryWalk::new(self.host, start_sha) {
            let commit = item?;
            if boundaries.contains(&commit.sha) {
                log::debug!(
                    "release boundary at {}, {} unreleased commits",
                    commit.short_sha(),
                    entries.len()
                );
                break;
            }
            entries.push(classifier.classify(commit)?);
        }

        // Collected newest-first by the walk; presentation and version
        // computation both want oldest-first.
        entries.reverse();
        Ok(Changelog::new(start_sha, entries))
    }
}

/// Classified unreleased history of a commit, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct Changelog {
    sha: String,
    entries: Vec<ClassifiedCommit>,
}

impl Changelog {
    pub fn new(sha: impl Into<String>, entries: Vec<ClassifiedCommit>) -> Self {
        Changelog {
            sha: sha.into(),
            entries,
        }
    }

    /// The commit this changelog was generated for
    pub fn sha(&self) -> &str {
        &self.sha
    }

    /// Full classified history, oldest first
    pub fn entries(&self) -> &[ClassifiedCommit] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Issues of one category, in commit order, each issue once
    fn issues_in(&self, category: CommitCategory) -> Vec<&Issue> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .filter(|entry| entry.category == category)
            .filter_map(|entry| entry.issue.as_ref())
            .filter(|issue| seen.insert(issue.number))
            .collect()
    }

    pub fn features(&self) -> Vec<&Issue> {
        self.issues_in(CommitCategory::Feature)
    }

    pub fn bugs(&self) -> Vec<&Issue> {
        self.issues_in(CommitCategory::Bug)
    }

    pub fn issues(&self) -> Vec<&Issue> {
        self.issues_in(CommitCategory::Issue)
    }

    /// Commits with no issue association, in commit order
    pub fn dangling(&self) -> Vec<&Commit> {
        self.entries
            .iter()
            .filter(|entry| entry.category == CommitCategory::Dangling)
            .map(|entry| &entry.commit)
            .collect()
    }

    /// Issues that carry a release label, each once, in commit order. These
    /// drive the version bump and are closed when the release succeeds.
    pub fn released_issues(&self) -> Vec<&Issue> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .filter_map(|entry| entry.issue.as_ref())
            .filter(|issue| issue.bump().is_some())
            .filter(|issue| seen.insert(issue.number))
            .collect()
    }

    /// Render the changelog as markdown release notes
    pub fn render(&self) -> String {
        let mut output = String::new();

        let sections = [
            ("Features", self.features()),
            ("Bug Fixes", self.bugs()),
            ("Issues", self.issues()),
        ];

        for (title, issues) in sections {
            if issues.is_empty() {
                continue;
            }
            let _ = writeln!(output, "### {}\n", title);
            for issue in issues {
                let _ = writeln!(
                    output,
                    "- {} ([#{}]({}))",
                    issue.title, issue.number, issue.url
                );
            }
            output.push('\n');
        }

        let dangling = self.dangling();
        if !dangling.is_empty() {
            output.push_str("### Dangling Commits\n\n");
            for commit in dangling {
                let _ = writeln!(output, "- {} ({})", commit.summary(), commit.short_sha());
            }
            output.push('\n');
        }

        if output.is_empty() {
            output.push_str("No changes.\n");
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Commit, Issue};
    use crate::host::MemoryHost;
    use chrono::{DateTime, TimeZone, Utc};

    fn date(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn commit(sha: &str, message: &str, parents: &[&str], day: u32) -> Commit {
        Commit::new(
            sha,
            message,
            parents.iter().map(|p| p.to_string()).collect(),
            date(day),
        )
    }

    fn issue(number: u64, labels: &[&str], day: u32) -> Issue {
        Issue {
            number,
            title: format!("Issue {}", number),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            created_at: date(day),
            closed: false,
            url: format!("https://example.test/issues/{}", number),
        }
    }

    /// base (released) <- c1 (bug #10) <- c2 (feature #11) <- c3 (dangling)
    fn fixture() -> MemoryHost {
        let host = MemoryHost::new();
        host.add_commit(commit("base", "Initial import", &[], 1));
        host.add_commit(commit("c1", "Fixes #10", &["base"], 2));
        host.add_commit(commit("c2", "Fixes #11", &["c1"], 3));
        host.add_commit(commit("c3", "Tidy whitespace", &["c2"], 4));
        host.add_issue(issue(10, &["bug", "patch"], 1));
        host.add_issue(issue(11, &["feature", "minor"], 2));
        host.add_release("1.0.0", "base");
        host
    }

    #[test]
    fn test_stops_at_boundary() {
        let host = fixture();
        let changelog = ChangelogBuilder::new(&host, &host).build("c3").unwrap();
        let shas: Vec<&str> = changelog
            .entries()
            .iter()
            .map(|e| e.commit.sha.as_str())
            .collect();
        assert_eq!(shas, vec!["c1", "c2", "c3"]);
    }

    #[test]
    fn test_groups_by_category() {
        let host = fixture();
        let changelog = ChangelogBuilder::new(&host, &host).build("c3").unwrap();
        assert_eq!(changelog.features().len(), 1);
        assert_eq!(changelog.features()[0].number, 11);
        assert_eq!(changelog.bugs().len(), 1);
        assert_eq!(changelog.bugs()[0].number, 10);
        assert!(changelog.issues().is_empty());
        assert_eq!(changelog.dangling().len(), 1);
        assert_eq!(changelog.dangling()[0].sha, "c3");
    }

    #[test]
    fn test_empty_when_start_is_boundary() {
        let host = fixture();
        let changelog = ChangelogBuilder::new(&host, &host).build("base").unwrap();
        assert!(changelog.is_empty());
    }

    #[test]
    fn test_no_boundary_walks_to_root() {
        let host = MemoryHost::new();
        host.add_commit(commit("a", "Fixes #10", &[], 1));
        host.add_commit(commit("b", "Follow-up", &["a"], 2));
        host.add_issue(issue(10, &["bug", "patch"], 1));
        let changelog = ChangelogBuilder::new(&host, &host).build("b").unwrap();
        assert_eq!(changelog.entries().len(), 2);
    }

    #[test]
    fn test_deterministic() {
        let host = fixture();
        let builder = ChangelogBuilder::new(&host, &host);
        assert_eq!(builder.build("c3").unwrap(), builder.build("c3").unwrap());
    }

    #[test]
    fn test_issue_referenced_twice_appears_once() {
        let host = fixture();
        host.add_commit(commit("c4", "Really fixes #10", &["c3"], 5));
        let changelog = ChangelogBuilder::new(&host, &host).build("c4").unwrap();
        assert_eq!(changelog.bugs().len(), 1);
        assert_eq!(changelog.released_issues().len(), 2);
    }

    #[test]
    fn test_released_issues_excludes_unlabeled() {
        let host = fixture();
        host.add_commit(commit("c4", "Fixes #12", &["c3"], 5));
        host.add_issue(issue(12, &["question"], 3));
        let changelog = ChangelogBuilder::new(&host, &host).build("c4").unwrap();
        let numbers: Vec<u64> = changelog.released_issues().iter().map(|i| i.number).collect();
        assert_eq!(numbers, vec![10, 11]);
    }

    #[test]
    fn test_render_sections() {
        let host = fixture();
        let changelog = ChangelogBuilder::new(&host, &host).build("c3").unwrap();
        let md = changelog.render();
        assert!(md.contains("### Features"));
        assert!(md.contains("Issue 11"));
        assert!(md.contains("### Bug Fixes"));
        assert!(md.contains("[#10](https://example.test/issues/10)"));
        assert!(md.contains("### Dangling Commits"));
        assert!(md.contains("Tidy whitespace"));
        assert!(!md.contains("### Issues"));
    }

    #[test]
    fn test_render_empty() {
        let changelog = Changelog::new("abc", vec![]);
        assert_eq!(changelog.render(), "No changes.\n");
    }
}
