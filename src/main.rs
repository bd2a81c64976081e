use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use relbot::config;
use relbot::coordinator::{CiContext, ReleaseCoordinator, ReleaseOutcome, ReleasePreview};
use relbot::host::{GithubHost, VcsHost};
use relbot::ui;

#[derive(clap::Parser)]
#[command(
    name = "relbot",
    about = "Release a commit: compute the next version from issue labels, \
             publish the release and push the version bump"
)]
struct Args {
    #[arg(short, long, help = "Custom configuration file path")]
    config: Option<PathBuf>,

    #[arg(long, help = "Repository full name, e.g. acme/widget")]
    repo: Option<String>,

    #[arg(long, help = "Commit to release (defaults to the CI commit)")]
    sha: Option<String>,

    #[arg(short, long, help = "Branch the build runs for")]
    branch: Option<String>,

    #[arg(short, long, help = "Release even if build or commit validation would skip")]
    force: bool,

    #[arg(long, help = "Show what would be released without making changes")]
    dry_run: bool,
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

/// Assemble the build context from flags, falling back to the environment
/// the CI provider exposes. Without an explicit commit, the tip of the
/// build branch is released.
fn build_context(args: &Args, host: &GithubHost) -> Result<CiContext> {
    let branch = args
        .branch
        .clone()
        .or_else(|| env_non_empty("GITHUB_REF_NAME"))
        .unwrap_or_default();

    let sha = match args.sha.clone().or_else(|| env_non_empty("GITHUB_SHA")) {
        Some(sha) => sha,
        None if !branch.is_empty() => host.branch_head(&branch)?,
        None => anyhow::bail!("no commit given; pass --sha or set GITHUB_SHA"),
    };

    Ok(CiContext {
        branch,
        sha,
        is_pull_request: env_non_empty("GITHUB_EVENT_NAME").as_deref() == Some("pull_request"),
        is_tag: env_non_empty("GITHUB_REF_TYPE").as_deref() == Some("tag"),
    })
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match config::load_config(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            ui::display_error(&format!("failed to load configuration: {}", e));
            std::process::exit(1);
        }
    };

    let repo = args
        .repo
        .clone()
        .or_else(|| config.github.repo.clone())
        .or_else(|| env_non_empty("GITHUB_REPOSITORY"));
    let repo = match repo {
        Some(repo) => repo,
        None => {
            ui::display_error(
                "no repository given; pass --repo, set github.repo in relbot.toml, \
                 or set GITHUB_REPOSITORY",
            );
            std::process::exit(1);
        }
    };

    let token = match env_non_empty("GITHUB_TOKEN") {
        Some(token) => token,
        None => {
            ui::display_error("GITHUB_TOKEN is not set");
            std::process::exit(1);
        }
    };

    let host = match GithubHost::new(&repo, &token, &config.github, config.retry.policy()) {
        Ok(host) => host,
        Err(e) => {
            ui::display_error(&e.to_string());
            std::process::exit(1);
        }
    };

    let ctx = build_context(&args, &host)?;

    let coordinator = ReleaseCoordinator::new(&host, &host, &config);

    if args.dry_run {
        ui::display_status(&format!("dry run for commit {} on {}", ctx.sha, repo));
        match coordinator.preview(&ctx, args.force) {
            Ok(ReleasePreview::Plan(plan)) => ui::display_plan(&plan),
            Ok(ReleasePreview::Skipped(reason)) => ui::display_skip(&reason),
            Err(e) => {
                ui::display_error(&e.to_string());
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    ui::display_status(&format!("releasing commit {} on {}", ctx.sha, repo));
    match coordinator.run(&ctx, args.force) {
        Ok(ReleaseOutcome::Released(summary)) => {
            ui::display_summary(&summary);
            // Hand-off point for external packaging: the released version
            // and commit are all a packager needs.
            println!("release={} sha={}", summary.tag, summary.commit_sha);
            Ok(())
        }
        Ok(ReleaseOutcome::Skipped(reason)) => {
            ui::display_skip(&reason);
            Ok(())
        }
        Err(e) => {
            ui::display_error(&e.to_string());
            std::process::exit(1);
        }
    }
}
