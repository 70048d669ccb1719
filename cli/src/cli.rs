use clap::Parser;
use commit_hours_core::model::RepositoryIdentity;
use commit_hours_core::span::Span;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "commit-hours",
    about = "Estimate coding hours from GitHub commit history",
    version
)]
pub struct Cli {
    /// GitHub login whose repositories count as owned (defaults to the token's user)
    #[arg(short, long)]
    pub user: Option<String>,

    /// Only count commits by this GitHub node id
    #[arg(long)]
    pub author_id: Option<String>,

    /// Extra repository to include, as owner/name (repeatable)
    #[arg(short, long = "repo", value_name = "OWNER/NAME")]
    pub repos: Vec<RepositoryIdentity>,

    /// Skip repositories owned by this login (repeatable)
    #[arg(short = 'x', long = "exclude-owner", value_name = "LOGIN")]
    pub exclude_owners: Vec<String>,

    /// Do not list the user's own repositories; only use --repo entries
    #[arg(long)]
    pub no_discover: bool,

    /// Largest gap between commits of one session: 45m, 2h, 1d
    #[arg(short, long)]
    pub gap: Option<Span>,

    /// Work assumed before the first commit of a session: 30m, 1h
    #[arg(short, long)]
    pub lookback: Option<Span>,

    /// Maximum history pages fetched per repository
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Compare against and update this report cache file
    #[arg(long)]
    pub cache: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Disable colored output (overrides TTY auto-detection)
    #[arg(long)]
    pub no_color: bool,

    /// Log progress to stderr
    #[arg(short, long)]
    pub verbose: bool,
}
