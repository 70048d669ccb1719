mod cli;
mod config;
mod output;

use std::io::IsTerminal;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use commit_hours_core::aggregate::{AggregateOptions, PagedAggregator, DEFAULT_MAX_PAGES};
use commit_hours_core::cache::{self, ReportCache};
use commit_hours_core::estimate::SessionPolicy;
use commit_hours_core::github::GitHubClient;
use commit_hours_core::model::RepositoryIdentity;
use commit_hours_core::span::Span;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "warn,commit_hours_core=debug,commit_hours=debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn span_setting(flag: Option<Span>, file: Option<&str>, key: &str) -> Result<Option<Span>> {
    match (flag, file) {
        (Some(span), _) => Ok(Some(span)),
        (None, Some(raw)) => raw
            .parse::<Span>()
            .map(Some)
            .map_err(|e| anyhow!("Invalid `{key}` in ~/.commit-hours.toml: {e}")),
        (None, None) => Ok(None),
    }
}

fn clear_spinner(spinner: &Option<ProgressBar>) {
    if let Some(sp) = spinner {
        sp.finish_and_clear();
    }
}

/// Login to report on and the node id whose commits count. Without a
/// configured user the authenticated viewer is used.
fn resolve_author(
    client: &GitHubClient,
    user: Option<String>,
    author_id: Option<String>,
) -> Result<(String, String)> {
    match (user, author_id) {
        (Some(user), Some(author_id)) => Ok((user, author_id)),
        (Some(user), None) => {
            let author_id = client
                .fetch_user_id(&user)
                .with_context(|| format!("Failed to look up GitHub user {user}"))?;
            Ok((user, author_id))
        }
        (None, author_id) => {
            let viewer = client
                .fetch_viewer()
                .context("Failed to look up the authenticated GitHub user")?;
            Ok((viewer.login, author_id.unwrap_or(viewer.id)))
        }
    }
}

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    init_tracing(cli.verbose);
    let cfg = config::load();

    let defaults = SessionPolicy::default();
    let policy = SessionPolicy {
        gap_threshold: span_setting(cli.gap, cfg.gap.as_deref(), "gap")?
            .map_or(defaults.gap_threshold, Span::to_duration),
        lookback: span_setting(cli.lookback, cfg.lookback.as_deref(), "lookback")?
            .map_or(defaults.lookback, Span::to_duration),
    };

    let use_color = if cli.no_color || cli.json {
        false
    } else if let Some(cfg_color) = cfg.color {
        cfg_color
    } else {
        std::io::stdout().is_terminal()
    };
    output::set_color_enabled(use_color);

    let token = std::env::var("GITHUB_TOKEN")
        .ok()
        .filter(|t| !t.trim().is_empty())
        .or(cfg.token)
        .context("No GitHub token: set GITHUB_TOKEN or `token` in ~/.commit-hours.toml")?;

    let mut client = GitHubClient::new(token).context("Failed to create GitHub client")?;
    if let Some(endpoint) = cfg.endpoint {
        client = client.with_endpoint(endpoint);
    }
    if let Some(page_size) = cfg.page_size {
        client = client.with_page_size(page_size);
    }

    let spinner = if !cli.json {
        let sp = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .tick_strings(&[
                "\u{2802}", "\u{2816}", "\u{2834}", "\u{2830}", "\u{2860}", "\u{28e0}", "\u{28c0}",
                "\u{2880}",
            ])
            .template("{spinner} {msg}")
        {
            sp.set_style(style);
        }
        sp.set_message("Looking up repositories...");
        sp.enable_steady_tick(std::time::Duration::from_millis(80));
        Some(sp)
    } else {
        None
    };

    let (user, author_id) = resolve_author(
        &client,
        cli.user.or(cfg.user),
        cli.author_id.or(cfg.author_id),
    )
    .inspect_err(|_| clear_spinner(&spinner))?;
    let client = client.with_author_id(Some(author_id));

    let mut repos: Vec<RepositoryIdentity> = if cli.no_discover {
        vec![]
    } else {
        client
            .discover_owned_repositories(&user)
            .with_context(|| format!("Failed to list repositories of {user}"))
            .inspect_err(|_| clear_spinner(&spinner))?
    };
    repos.extend(cli.repos);
    for raw in &cfg.repositories {
        match raw.parse::<RepositoryIdentity>() {
            Ok(repo) => repos.push(repo),
            Err(err) => tracing::warn!(%err, "skipping configured repository"),
        }
    }

    if repos.is_empty() {
        clear_spinner(&spinner);
        if cli.json {
            println!("{}", output::render_json(&Default::default()));
        } else {
            eprintln!("No repositories to scan for {user}.");
        }
        return Ok(());
    }

    if let Some(sp) = &spinner {
        sp.set_message(format!("Reading commit history of {} repositories...", repos.len()));
    }

    let mut exclude_owners = cli.exclude_owners;
    exclude_owners.extend(cfg.exclude_owners);
    let options = AggregateOptions {
        policy,
        viewer: Some(user),
        excluded_owners: exclude_owners,
        max_pages_per_repository: cli.max_pages.or(cfg.max_pages).unwrap_or(DEFAULT_MAX_PAGES),
    };

    let report = match PagedAggregator::new(&client, options).aggregate(&repos) {
        Ok(report) => report,
        Err(err) => {
            clear_spinner(&spinner);
            return Err(err).context("Could not read commit history from GitHub");
        }
    };

    if let Some(sp) = &spinner {
        sp.finish_with_message(format!("\u{2713} {}", output::summary_line(&report)));
    }

    if cli.json {
        println!("{}", output::render_json(&report));
    } else {
        println!();
        output::render_terminal(&report);
    }

    if let Some(path) = cli.cache.or(cfg.cache) {
        let cache = ReportCache::new(path);
        if cache::has_changed(cache.load().as_ref(), &report) {
            cache.store(&report)?;
            eprintln!("Updated cache at {}.", cache.path().display());
        } else {
            eprintln!("No new commits since the cached report.");
        }
    }

    Ok(())
}
