use crate::domain::issue::Issue;
use crate::domain::version::BumpKind;
use chrono::{DateTime, Utc};

/// Immutable commit node as read from the host. The first parent is the
/// mainline parent.
#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    pub sha: String,
    pub message: String,
    pub parents: Vec<String>,
    pub author_date: DateTime<Utc>,
}

impl Commit {
    pub fn new(
        sha: impl Into<String>,
        message: impl Into<String>,
        parents: Vec<String>,
        author_date: DateTime<Utc>,
    ) -> Self {
        Commit {
            sha: sha.into(),
            message: message.into(),
            parents,
            author_date,
        }
    }

    /// Mainline parent, if any
    pub fn first_parent(&self) -> Option<&str> {
        self.parents.first().map(String::as_str)
    }

    /// Shortened sha for display
    pub fn short_sha(&self) -> &str {
        if self.sha.len() > 7 {
            &self.sha[..7]
        } else {
            &self.sha
        }
    }

    /// First line of the commit message
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}

/// How a commit was associated with its issue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionKind {
    /// The commit message references the issue itself
    Direct,
    /// The commit message references a pull request whose description
    /// references the issue
    ViaPullRequest,
}

/// Resolved association between a commit and an issue
#[derive(Debug, Clone, PartialEq)]
pub struct IssueRef {
    pub number: u64,
    pub source_sha: String,
    pub kind: ResolutionKind,
}

/// Changelog category of a commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitCategory {
    Feature,
    Bug,
    Issue,
    Dangling,
}

impl CommitCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitCategory::Feature => "feature",
            CommitCategory::Bug => "bug",
            CommitCategory::Issue => "issue",
            CommitCategory::Dangling => "dangling",
        }
    }
}

/// A commit together with its resolved issue and category.
///
/// The category is `Dangling` exactly when no issue could be resolved, in
/// which case both `issue` and `issue_ref` are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedCommit {
    pub commit: Commit,
    pub issue_ref: Option<IssueRef>,
    pub issue: Option<Issue>,
    pub category: CommitCategory,
}

impl ClassifiedCommit {
    /// Construct a dangling entry for a commit with no issue association
    pub fn dangling(commit: Commit) -> Self {
        ClassifiedCommit {
            commit,
            issue_ref: None,
            issue: None,
            category: CommitCategory::Dangling,
        }
    }

    /// Construct an entry for a commit whose issue resolved successfully
    pub fn resolved(commit: Commit, issue_ref: IssueRef, issue: Issue) -> Self {
        let category = issue.category();
        ClassifiedCommit {
            commit,
            issue_ref: Some(issue_ref),
            issue: Some(issue),
            category,
        }
    }

    /// Bump contributed by this commit's issue, if any
    pub fn bump(&self) -> Option<BumpKind> {
        self.issue.as_ref().and_then(Issue::bump)
    }
}
