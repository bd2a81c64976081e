use crate::analyzer::resolver::ReferenceResolver;
use crate::domain::{ClassifiedCommit, Commit};
use crate::error::Result;
use crate::host::IssueTracker;

/// Classifies commits into changelog categories from issue labels.
///
/// Read-only: labels are fetched, nothing is mutated. A commit whose
/// reference cannot be resolved to an existing issue is dangling.
pub struct CommitClassifier<'a, T: IssueTracker + ?Sized> {
    tracker: &'a T,
}

impl<'a, T: IssueTracker + ?Sized> CommitClassifier<'a, T> {
    pub fn new(tracker: &'a T) -> Self {
        CommitClassifier { tracker }
    }

    pub fn classify(&self, commit: Commit) -> Result<ClassifiedCommit> {
        let resolver = ReferenceResolver::new(self.tracker);
        if let Some(issue_ref) = resolver.resolve(&commit)? {
            if let Some(issue) = self.tracker.get_issue(issue_ref.number)? {
                return Ok(ClassifiedCommit::resolved(commit, issue_ref, issue));
            }
            log::debug!(
                "{}: reference #{} does not name an issue, treating commit as dangling",
                commit.short_sha(),
                issue_ref.number
            );
        }
        Ok(ClassifiedCommit::dangling(commit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CommitCategory, Issue, ResolutionKind};
    use crate::host::MemoryHost;
    use chrono::{TimeZone, Utc};

    fn commit(message: &str) -> Commit {
        Commit::new(
            "abc1234",
            message,
            vec![],
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        )
    }

    fn issue(number: u64, labels: &[&str]) -> Issue {
        Issue {
            number,
            title: format!("Issue {}", number),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            closed: false,
            url: format!("https://example.test/issues/{}", number),
        }
    }

    #[test]
    fn test_feature_label() {
        let host = MemoryHost::new();
        host.add_issue(issue(11, &["feature", "minor"]));
        let classified = CommitClassifier::new(&host)
            .classify(commit("Fixes #11"))
            .unwrap();
        assert_eq!(classified.category, CommitCategory::Feature);
        assert_eq!(
            classified.issue_ref.as_ref().unwrap().kind,
            ResolutionKind::Direct
        );
    }

    #[test]
    fn test_bug_label() {
        let host = MemoryHost::new();
        host.add_issue(issue(10, &["bug", "patch"]));
        let classified = CommitClassifier::new(&host)
            .classify(commit("Fixes #10"))
            .unwrap();
        assert_eq!(classified.category, CommitCategory::Bug);
    }

    #[test]
    fn test_unlabeled_issue_is_plain_issue() {
        let host = MemoryHost::new();
        host.add_issue(issue(12, &[]));
        let classified = CommitClassifier::new(&host)
            .classify(commit("Fixes #12"))
            .unwrap();
        assert_eq!(classified.category, CommitCategory::Issue);
        assert_eq!(classified.bump(), None);
    }

    #[test]
    fn test_no_reference_is_dangling() {
        let host = MemoryHost::new();
        let classified = CommitClassifier::new(&host)
            .classify(commit("Tidy up whitespace"))
            .unwrap();
        assert_eq!(classified.category, CommitCategory::Dangling);
        assert!(classified.issue_ref.is_none());
    }

    #[test]
    fn test_reference_to_missing_issue_is_dangling() {
        let host = MemoryHost::new();
        let classified = CommitClassifier::new(&host)
            .classify(commit("Fixes #404"))
            .unwrap();
        assert_eq!(classified.category, CommitCategory::Dangling);
        assert!(classified.issue.is_none());
        assert!(classified.issue_ref.is_none());
    }

    #[test]
    fn test_pull_request_path() {
        let host = MemoryHost::new();
        host.add_pull(20, "closes #11");
        host.add_issue(issue(11, &["feature", "minor"]));
        let classified = CommitClassifier::new(&host)
            .classify(commit("Merge PR #20"))
            .unwrap();
        assert_eq!(classified.category, CommitCategory::Feature);
        assert_eq!(
            classified.issue_ref.as_ref().unwrap().kind,
            ResolutionKind::ViaPullRequest
        );
    }
}
