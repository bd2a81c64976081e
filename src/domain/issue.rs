use crate::domain::commit::CommitCategory;
use crate::domain::version::BumpKind;
use chrono::{DateTime, Utc};

/// Issue as read from the tracker. Labels drive both the changelog category
/// and the version bump.
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub labels: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub closed: bool,
    pub url: String,
}

impl Issue {
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|l| l == name)
    }

    /// Version bump this issue contributes, if it carries a release label
    pub fn bump(&self) -> Option<BumpKind> {
        BumpKind::from_labels(self.labels.iter().map(String::as_str))
    }

    /// Changelog category. A feature label wins over a bug label; an issue
    /// with neither is a plain issue.
    pub fn category(&self) -> CommitCategory {
        if self.has_label("feature") {
            CommitCategory::Feature
        } else if self.has_label("bug") {
            CommitCategory::Bug
        } else {
            CommitCategory::Issue
        }
    }
}

/// Pull request surface consumed by the resolver: only the description text
/// is needed to chase the originating issue.
#[derive(Debug, Clone, PartialEq)]
pub struct PullRequest {
    pub number: u64,
    pub body: String,
}
