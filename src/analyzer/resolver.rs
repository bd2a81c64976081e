use crate::domain::{Commit, IssueRef, ResolutionKind};
use crate::error::Result;
use crate::host::IssueTracker;
use regex::Regex;

/// Resolves the issue a commit refers to.
///
/// Three token shapes are recognized, in decreasing precedence:
///
/// 1. A keyworded issue reference in the commit message ("Fixes #10",
///    "closes #10", "resolved #10").
/// 2. A pull request reference ("Merge pull request #20 ...", "Merge PR
///    #20", or a squash-merge suffix "(#20)"), chased through the tracker
///    to an issue reference inside the pull request description.
/// 3. A bare "#10" anywhere in the message.
///
/// Absence of a reference is a normal outcome, never an error; malformed
/// text simply fails to match.
pub struct ReferenceResolver<'a, T: IssueTracker + ?Sized> {
    tracker: &'a T,
}

fn keyworded_issue(text: &str) -> Option<u64> {
    capture_number(r"(?i)\b(?:close[sd]?|fix(?:es|ed)?|resolve[sd]?)\s+#(\d+)\b", text)
}

fn pull_request_number(message: &str) -> Option<u64> {
    capture_number(r"(?i)\bmerge (?:pull request|pr) #?(\d+)\b", message)
        .or_else(|| capture_number(r"\(#(\d+)\)", message))
}

fn bare_reference(text: &str) -> Option<u64> {
    capture_number(r"#(\d+)\b", text)
}

fn capture_number(pattern: &str, text: &str) -> Option<u64> {
    let re = Regex::new(pattern).ok()?;
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

impl<'a, T: IssueTracker + ?Sized> ReferenceResolver<'a, T> {
    pub fn new(tracker: &'a T) -> Self {
        ReferenceResolver { tracker }
    }

    /// Resolve the issue reference of a commit, if any
    pub fn resolve(&self, commit: &Commit) -> Result<Option<IssueRef>> {
        if let Some(number) = keyworded_issue(&commit.message) {
            log::debug!("{}: direct issue reference #{}", commit.short_sha(), number);
            return Ok(Some(IssueRef {
                number,
                source_sha: commit.sha.clone(),
                kind: ResolutionKind::Direct,
            }));
        }

        if let Some(pr_number) = pull_request_number(&commit.message) {
            if let Some(pull) = self.tracker.get_pull_request(pr_number)? {
                if let Some(number) =
                    keyworded_issue(&pull.body).or_else(|| bare_reference(&pull.body))
                {
                    log::debug!(
                        "{}: issue #{} via pull request #{}",
                        commit.short_sha(),
                        number,
                        pr_number
                    );
                    return Ok(Some(IssueRef {
                        number,
                        source_sha: commit.sha.clone(),
                        kind: ResolutionKind::ViaPullRequest,
                    }));
                }
                log::debug!(
                    "{}: pull request #{} has no issue reference",
                    commit.short_sha(),
                    pr_number
                );
            }
        }

        if let Some(number) = bare_reference(&commit.message) {
            log::debug!("{}: bare issue reference #{}", commit.short_sha(), number);
            return Ok(Some(IssueRef {
                number,
                source_sha: commit.sha.clone(),
                kind: ResolutionKind::Direct,
            }));
        }

        log::debug!("{}: no issue reference found", commit.short_sha());
        Ok(None)
    }
}
