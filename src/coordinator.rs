//! Release orchestration.
//!
//! A single invocation validates the build context, validates the triggering
//! commit, then runs the release sequence. Every mutating sub-step is
//! idempotent: existing results are reused, and the one genuinely serializing
//! step is the fast-forward-only release-branch update. Losing that race is a
//! skip, not a failure, so concurrent invocations converge instead of
//! corrupting branch state.

use crate::analyzer::CommitClassifier;
use crate::changelog::{Changelog, ChangelogBuilder};
use crate::config::Config;
use crate::domain::Version;
use crate::ensure::{ensure, Ensured};
use crate::error::{HostErrorKind, ReleaseError, Result};
use crate::host::{CreatedRelease, IssueTracker, RefUpdate, ReleaseRecord, VcsHost};
use crate::marker::VersionMarker;
use crate::version::compute_next_version;
use std::fmt;

/// Build context handed in by the caller. How it is obtained (CI environment
/// variables, command line) is the binary's concern; the coordinator only
/// consumes it.
#[derive(Debug, Clone, PartialEq)]
pub struct CiContext {
    pub branch: String,
    pub sha: String,
    pub is_pull_request: bool,
    pub is_tag: bool,
}

/// Why an invocation ended without releasing. All of these are successful
/// no-op exits, not failures.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The build is for a pull request
    PullRequestBuild,
    /// The build is for a tag
    TagBuild,
    /// The build branch is not the release branch
    BranchMismatch {
        branch: String,
        release_branch: String,
    },
    /// The triggering commit is not associated with a release-labeled issue
    CommitNotReleaseWorthy { sha: String, detail: String },
    /// Everything up to and including the commit is already released
    NothingUnreleased { sha: String },
    /// Another invocation advanced the release branch first
    Superseded { branch: String, sha: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::PullRequestBuild => write!(f, "build is a pull request build"),
            SkipReason::TagBuild => write!(f, "build is a tag build"),
            SkipReason::BranchMismatch {
                branch,
                release_branch,
            } => write!(
                f,
                "build branch '{}' does not match the release branch '{}'",
                branch, release_branch
            ),
            SkipReason::CommitNotReleaseWorthy { sha, detail } => {
                write!(f, "commit {} should not be released: {}", sha, detail)
            }
            SkipReason::NothingUnreleased { sha } => {
                write!(f, "commit {} is already part of a release", sha)
            }
            SkipReason::Superseded { branch, sha } => write!(
                f,
                "branch '{}' was advanced by a concurrent release while releasing {}",
                branch, sha
            ),
        }
    }
}

/// A completed release.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseSummary {
    pub version: Version,
    pub tag: String,
    pub url: String,
    /// The commit that triggered the release
    pub commit_sha: String,
    /// The version-bump commit now at the tip of the release branch
    pub bump_sha: String,
    /// Whether the release record pre-existed and was attached to
    pub reused_release: bool,
    pub closed_issues: Vec<u64>,
}

/// Terminal outcome of an invocation
#[derive(Debug, Clone, PartialEq)]
pub enum ReleaseOutcome {
    Released(ReleaseSummary),
    Skipped(SkipReason),
}

/// What a dry run would do
#[derive(Debug, Clone, PartialEq)]
pub enum ReleasePreview {
    Plan(ReleasePlan),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReleasePlan {
    pub current: Version,
    pub next: Version,
    pub changelog: Changelog,
}

enum Assessment {
    Empty,
    Plan {
        changelog: Changelog,
        marker_contents: String,
        current: Version,
        next: Version,
    },
}

pub struct ReleaseCoordinator<'a, H: VcsHost + ?Sized, T: IssueTracker + ?Sized> {
    host: &'a H,
    tracker: &'a T,
    config: &'a Config,
}

impl<'a, H: VcsHost + ?Sized, T: IssueTracker + ?Sized> ReleaseCoordinator<'a, H, T> {
    pub fn new(host: &'a H, tracker: &'a T, config: &'a Config) -> Self {
        ReleaseCoordinator {
            host,
            tracker,
            config,
        }
    }

    /// Run the full release sequence for the given build context.
    ///
    /// With `force`, both validation gates are bypassed; the release
    /// sequence itself is unaffected.
    pub fn run(&self, ctx: &CiContext, force: bool) -> Result<ReleaseOutcome> {
        log::info!("validating build for commit {}", ctx.sha);
        if let Some(skip) = self.validate_build(ctx) {
            if force {
                log::info!("force: ignoring build validation ({})", skip);
            } else {
                return Ok(ReleaseOutcome::Skipped(skip));
            }
        }

        log::info!("validating commit {}", ctx.sha);
        if let Some(skip) = self.validate_commit(&ctx.sha)? {
            if force {
                log::info!("force: ignoring commit validation ({})", skip);
            } else {
                return Ok(ReleaseOutcome::Skipped(skip));
            }
        }

        self.release(ctx)
    }

    /// Compute what `run` would do without mutating anything.
    pub fn preview(&self, ctx: &CiContext, force: bool) -> Result<ReleasePreview> {
        if !force {
            if let Some(skip) = self.validate_build(ctx) {
                return Ok(ReleasePreview::Skipped(skip));
            }
            if let Some(skip) = self.validate_commit(&ctx.sha)? {
                return Ok(ReleasePreview::Skipped(skip));
            }
        }
        match self.assess(&ctx.sha)? {
            Assessment::Empty => Ok(ReleasePreview::Skipped(SkipReason::NothingUnreleased {
                sha: ctx.sha.clone(),
            })),
            Assessment::Plan {
                changelog,
                current,
                next,
                ..
            } => Ok(ReleasePreview::Plan(ReleasePlan {
                current,
                next,
                changelog,
            })),
        }
    }

    /// Build validation: only non-PR, non-tag builds of the release branch
    /// may release.
    fn validate_build(&self, ctx: &CiContext) -> Option<SkipReason> {
        if ctx.is_pull_request {
            return Some(SkipReason::PullRequestBuild);
        }
        if ctx.is_tag {
            return Some(SkipReason::TagBuild);
        }
        if ctx.branch != self.config.branches.release {
            return Some(SkipReason::BranchMismatch {
                branch: ctx.branch.clone(),
                release_branch: self.config.branches.release.clone(),
            });
        }
        None
    }

    /// Commit validation: the triggering commit must be attached to an issue
    /// carrying a release label.
    fn validate_commit(&self, sha: &str) -> Result<Option<SkipReason>> {
        let commit = self.host.get_commit(sha)?;
        let classified = CommitClassifier::new(self.tracker).classify(commit)?;

        let issue = match &classified.issue {
            Some(issue) => issue,
            None => {
                return Ok(Some(SkipReason::CommitNotReleaseWorthy {
                    sha: sha.to_string(),
                    detail: "commit is not related to any issue".to_string(),
                }))
            }
        };

        if classified.bump().is_none() {
            return Ok(Some(SkipReason::CommitNotReleaseWorthy {
                sha: sha.to_string(),
                detail: format!("issue #{} carries no release label", issue.number),
            }));
        }

        Ok(None)
    }

    /// Changelog and version computation, shared by release and preview.
    fn assess(&self, sha: &str) -> Result<Assessment> {
        let changelog = ChangelogBuilder::new(self.host, self.tracker).build(sha)?;
        if changelog.is_empty() {
            return Ok(Assessment::Empty);
        }

        let marker = VersionMarker::new(&self.config.marker.path, &self.config.marker.key);
        // Read the marker as it existed at the triggering commit, not at the
        // branch tip, so a racing bump commit cannot shift the base version.
        let marker_contents = self.host.get_file(sha, marker.path())?;
        let current = marker.current_version(&marker_contents)?;
        let next = compute_next_version(&current, sha, changelog.entries())?;

        Ok(Assessment::Plan {
            changelog,
            marker_contents,
            current,
            next,
        })
    }

    fn release(&self, ctx: &CiContext) -> Result<ReleaseOutcome> {
        let (changelog, marker_contents, current, next) = match self.assess(&ctx.sha)? {
            Assessment::Empty => {
                return Ok(ReleaseOutcome::Skipped(SkipReason::NothingUnreleased {
                    sha: ctx.sha.clone(),
                }))
            }
            Assessment::Plan {
                changelog,
                marker_contents,
                current,
                next,
            } => (changelog, marker_contents, current, next),
        };

        let tag = next.to_string();
        log::info!("releasing {} as {} (from {})", ctx.sha, tag, current);

        let ensured = self.ensure_release(&tag, &ctx.sha)?;
        let reused_release = ensured.already_existed();
        let release = ensured.into_inner();
        if reused_release {
            log::info!("release {} already exists, attaching to it", tag);
        }

        // Notes upload never blocks the release.
        let notes = changelog.render();
        if let Err(err) = self.host.update_release_notes(&tag, &notes) {
            log::warn!("failed to upload release notes for {}: {}", tag, err);
        }

        let bump_commit = self.push_bump_commit(ctx, &marker_contents, &next)?;
        let bump_sha = match bump_commit {
            Some(sha) => sha,
            None => {
                return Ok(ReleaseOutcome::Skipped(SkipReason::Superseded {
                    branch: self.config.branches.release.clone(),
                    sha: ctx.sha.clone(),
                }))
            }
        };

        self.advance_stable(&bump_sha)?;

        let closed_issues = self.close_released_issues(&changelog, &release);

        Ok(ReleaseOutcome::Released(ReleaseSummary {
            version: next,
            tag: release.tag,
            url: release.url,
            commit_sha: ctx.sha.clone(),
            bump_sha,
            reused_release,
            closed_issues,
        }))
    }

    /// Create the release record unless one already exists for the tag.
    fn ensure_release(&self, tag: &str, sha: &str) -> Result<Ensured<ReleaseRecord>> {
        ensure(
            || self.host.get_release(tag),
            || {
                // Empty notes at creation; the rendered changelog is
                // uploaded as a separate best-effort step.
                match self.host.create_release(tag, sha, "")? {
                    CreatedRelease::Created(record) => Ok(Ensured::Created(record)),
                    CreatedRelease::AlreadyExists(record) => Ok(Ensured::Existing(record)),
                }
            },
        )
    }

    /// Create the bump commit parented on exactly the triggering commit and
    /// fast-forward the release branch to it. Returns `None` when the
    /// fast-forward is rejected, meaning another invocation won the race.
    fn push_bump_commit(
        &self,
        ctx: &CiContext,
        marker_contents: &str,
        next: &Version,
    ) -> Result<Option<String>> {
        let marker = VersionMarker::new(&self.config.marker.path, &self.config.marker.key);
        let rewritten = marker.rewrite(marker_contents, next)?;
        let message = self.config.bump_commit_message(next);

        let bump = self
            .host
            .create_commit(&ctx.sha, marker.path(), &rewritten, &message)?;
        log::info!(
            "created bump commit {} on top of {}",
            bump.short_sha(),
            ctx.sha
        );

        match self
            .host
            .update_ref(&self.config.branches.release, &bump.sha, true)?
        {
            RefUpdate::Updated => Ok(Some(bump.sha)),
            RefUpdate::Rejected => {
                log::info!(
                    "fast-forward of '{}' rejected, release superseded",
                    self.config.branches.release
                );
                Ok(None)
            }
        }
    }

    /// Point the stable branch at the released commit. Stable always tracks
    /// the latest release, so this is a forced pointer reset.
    fn advance_stable(&self, bump_sha: &str) -> Result<()> {
        match self
            .host
            .update_ref(&self.config.branches.stable, bump_sha, false)?
        {
            RefUpdate::Updated => Ok(()),
            RefUpdate::Rejected => Err(ReleaseError::host(
                "update_ref",
                HostErrorKind::Permanent,
                format!(
                    "forced update of '{}' was rejected",
                    self.config.branches.stable
                ),
            )),
        }
    }

    /// Close every issue that contributed a release label. Individual
    /// failures are logged and do not abort the release.
    fn close_released_issues(&self, changelog: &Changelog, release: &ReleaseRecord) -> Vec<u64> {
        let comment = format!(
            "This issue is part of release [{}]({})",
            release.tag, release.url
        );
        let mut closed = Vec::new();
        for issue in changelog.released_issues() {
            match self.tracker.close_issue(issue.number, &comment) {
                Ok(()) => {
                    log::info!("closed issue #{}", issue.number);
                    closed.push(issue.number);
                }
                Err(err) => {
                    log::warn!("failed to close issue #{}: {}", issue.number, err);
                }
            }
        }
        closed
    }
}
