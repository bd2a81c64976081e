//! User-facing output. Pure display functions, separated from control flow.

use crate::coordinator::{ReleasePlan, ReleaseSummary, SkipReason};
use console::style;

pub fn display_status(message: &str) {
    println!("{} {}", style("→").yellow(), message);
}

pub fn display_success(message: &str) {
    println!("{} {}", style("✓").green(), message);
}

pub fn display_error(message: &str) {
    eprintln!("{} {}", style("ERROR:").red().bold(), message);
}

pub fn display_skip(reason: &SkipReason) {
    println!("{} {}", style("SKIPPED:").yellow().bold(), reason);
}

/// Show what a dry run would release.
pub fn display_plan(plan: &ReleasePlan) {
    println!(
        "\n{}",
        style(format!(
            "Would release {} -> {}",
            plan.current, plan.next
        ))
        .bold()
    );
    println!(
        "  {} features, {} bug fixes, {} issues, {} dangling commits",
        plan.changelog.features().len(),
        plan.changelog.bugs().len(),
        plan.changelog.issues().len(),
        plan.changelog.dangling().len()
    );
    println!("\n{}", plan.changelog.render());
}

pub fn display_summary(summary: &ReleaseSummary) {
    display_success(&format!(
        "Released {} at {} ({})",
        style(&summary.tag).green().bold(),
        &summary.commit_sha[..summary.commit_sha.len().min(7)],
        summary.url
    ));
    if summary.reused_release {
        display_status("attached to an existing release record");
    }
    display_status(&format!(
        "release branch advanced to bump commit {}",
        &summary.bump_sha[..summary.bump_sha.len().min(7)]
    ));
    if summary.closed_issues.is_empty() {
        display_status("no issues to close");
    } else {
        let numbers: Vec<String> = summary
            .closed_issues
            .iter()
            .map(|n| format!("#{}", n))
            .collect();
        display_status(&format!("closed {}", numbers.join(", ")));
    }
}
