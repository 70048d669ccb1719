use std::sync::OnceLock;

use colored::Colorize;

use commit_hours_core::model::{AggregateReport, RepositoryReport};

static COLOR_ENABLED: OnceLock<bool> = OnceLock::new();

pub fn set_color_enabled(enabled: bool) {
    colored::control::set_override(enabled);
    COLOR_ENABLED.set(enabled).ok();
}

pub(crate) fn color_enabled() -> bool {
    *COLOR_ENABLED.get().unwrap_or(&false)
}

pub fn render_terminal(report: &AggregateReport) {
    if report.repositories.is_empty() {
        eprintln!("{}", "No commits found.".dimmed());
        return;
    }

    let width = report
        .repositories
        .iter()
        .map(|r| r.name.len())
        .max()
        .unwrap_or(0);

    for repo in &report.repositories {
        render_repository(repo, width);
    }
    println!();
    render_totals(report);
}

fn render_repository(repo: &RepositoryReport, width: usize) {
    let marker = if repo.owned_by_me { "::" } else { ".." };
    let name = format!("{:<width$}", repo.name);
    let detail = format!(
        "{:>6}  {}",
        commits_label(repo.commits_by_me),
        hours_label(repo.estimated_hours)
    );
    if color_enabled() {
        let marker = if repo.owned_by_me {
            marker.bold().cyan()
        } else {
            marker.dimmed()
        };
        println!("{} {}  {}", marker, name.bold().white(), detail.dimmed());
    } else {
        println!("{marker} {name}  {detail}");
    }
}

fn render_totals(report: &AggregateReport) {
    let line = format!(
        "Total: {} in {}, about {}",
        commits_label(report.total_commits_by_me),
        repositories_label(report.repositories.len()),
        hours_label(report.total_hours_by_me),
    );
    if color_enabled() {
        println!("{}", line.bold().green());
    } else {
        println!("{line}");
    }
}

pub(crate) fn commits_label(count: u64) -> String {
    match count {
        1 => "1 commit".to_string(),
        n => format!("{n} commits"),
    }
}

pub(crate) fn hours_label(hours: i64) -> String {
    match hours {
        1 => "1 hour".to_string(),
        h => format!("{h} hours"),
    }
}

fn repositories_label(count: usize) -> String {
    match count {
        1 => "1 repository".to_string(),
        n => format!("{n} repositories"),
    }
}

pub fn render_json(report: &AggregateReport) -> String {
    serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
}

pub fn summary_line(report: &AggregateReport) -> String {
    match (report.total_commits_by_me, report.repositories.len()) {
        (0, _) => "No commits found.".to_string(),
        (c, r) => format!(
            "Found {} in {} (~{})",
            commits_label(c),
            repositories_label(r),
            hours_label(report.total_hours_by_me)
        ),
    }
}
