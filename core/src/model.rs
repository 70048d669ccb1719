use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Converts a millisecond total to whole hours, rounding half away from zero.
pub fn millis_to_hours(millis: i64) -> i64 {
    (millis as f64 / MILLIS_PER_HOUR).round() as i64
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryIdentity {
    pub owner: String,
    pub name: String,
}

impl RepositoryIdentity {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepositoryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepositoryIdentity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(RepositoryIdentity::new(owner, name))
            }
            _ => Err(format!("Invalid repository: {s}. Use: owner/name")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

impl PageInfo {
    pub fn last() -> Self {
        Self {
            has_more: false,
            next_cursor: None,
        }
    }

    pub fn more(cursor: impl Into<String>) -> Self {
        Self {
            has_more: true,
            next_cursor: Some(cursor.into()),
        }
    }
}

/// One validated page of commit history for a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResult {
    pub name: String,
    pub owner: String,
    /// Commit count the provider reports for the whole history.
    pub total_count: u64,
    /// Provider order; not necessarily sorted.
    pub timestamps: Vec<DateTime<Utc>>,
    pub page_info: PageInfo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub identity: RepositoryIdentity,
    pub cursor: Option<String>,
}

impl PageRequest {
    pub fn first(identity: RepositoryIdentity) -> Self {
        Self {
            identity,
            cursor: None,
        }
    }
}

/// Running totals for a repository while its pages are still coming in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryAccumulator {
    name: String,
    owner: String,
    owned_by_me: bool,
    estimated_duration_millis: i64,
    total_commit_count: u64,
    pagination_cursor: Option<String>,
    pages_fetched: usize,
}

impl RepositoryAccumulator {
    pub fn new(name: impl Into<String>, owner: impl Into<String>, owned_by_me: bool) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
            owned_by_me,
            estimated_duration_millis: 0,
            total_commit_count: 0,
            pagination_cursor: None,
            pages_fetched: 0,
        }
    }

    pub fn estimated_duration_millis(&self) -> i64 {
        self.estimated_duration_millis
    }

    pub fn total_commit_count(&self) -> u64 {
        self.total_commit_count
    }

    pub fn pagination_cursor(&self) -> Option<&str> {
        self.pagination_cursor.as_deref()
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Folds one page into the totals. Negative durations are ignored so the
    /// running estimate never decreases.
    pub fn record_page(&mut self, commits: u64, duration_millis: i64, cursor: Option<String>) {
        self.total_commit_count += commits;
        self.estimated_duration_millis += duration_millis.max(0);
        self.pagination_cursor = cursor;
        self.pages_fetched += 1;
    }

    /// Freezes the accumulator. Any remaining cursor is discarded.
    pub fn finalize(self) -> RepositoryReport {
        RepositoryReport {
            estimated_hours: millis_to_hours(self.estimated_duration_millis),
            name: self.name,
            owner: self.owner,
            owned_by_me: self.owned_by_me,
            commits_by_me: self.total_commit_count,
            estimated_duration_millis: self.estimated_duration_millis,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryReport {
    pub name: String,
    pub owner: String,
    pub owned_by_me: bool,
    pub commits_by_me: u64,
    pub estimated_duration_millis: i64,
    pub estimated_hours: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateReport {
    pub repositories: Vec<RepositoryReport>,
    pub total_commits_by_me: u64,
    pub total_hours_by_me: i64,
}

impl AggregateReport {
    /// Builds the report, deriving both totals from the repository entries.
    pub fn from_repositories(repositories: Vec<RepositoryReport>) -> Self {
        let total_commits_by_me = repositories.iter().map(|r| r.commits_by_me).sum();
        let total_millis: i64 = repositories
            .iter()
            .map(|r| r.estimated_duration_millis)
            .sum();
        Self {
            repositories,
            total_commits_by_me,
            total_hours_by_me: millis_to_hours(total_millis),
        }
    }

    pub fn owned_count(&self) -> usize {
        self.repositories.iter().filter(|r| r.owned_by_me).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(name: &str, commits: u64, millis: i64) -> RepositoryReport {
        RepositoryReport {
            name: name.to_string(),
            owner: "me".to_string(),
            owned_by_me: true,
            commits_by_me: commits,
            estimated_duration_millis: millis,
            estimated_hours: millis_to_hours(millis),
        }
    }

    #[test]
    fn parse_identity() {
        let id: RepositoryIdentity = "octo/widgets".parse().expect("valid repository");
        assert_eq!(id, RepositoryIdentity::new("octo", "widgets"));
        assert_eq!(id.to_string(), "octo/widgets");
    }

    #[test]
    fn parse_identity_rejects_bad_input() {
        assert!("widgets".parse::<RepositoryIdentity>().is_err());
        assert!("/widgets".parse::<RepositoryIdentity>().is_err());
        assert!("octo/".parse::<RepositoryIdentity>().is_err());
        assert!("a/b/c".parse::<RepositoryIdentity>().is_err());
    }

    #[test]
    fn hours_round_to_nearest() {
        assert_eq!(millis_to_hours(0), 0);
        assert_eq!(millis_to_hours(5_399_999), 1);
        assert_eq!(millis_to_hours(5_400_000), 2);
        assert_eq!(millis_to_hours(32_400_000), 9);
    }

    #[test]
    fn totals_round_once_after_summing() {
        // two repos of 0.4h each: per-repo rounding would give 0, summed gives 1
        let r = AggregateReport::from_repositories(vec![
            report("a", 1, 1_440_000),
            report("b", 2, 1_440_000),
        ]);
        assert_eq!(r.total_commits_by_me, 3);
        assert_eq!(r.total_hours_by_me, 1);
        assert_eq!(r.repositories[0].estimated_hours, 0);
    }

    #[test]
    fn accumulator_records_pages() {
        let mut acc = RepositoryAccumulator::new("widgets", "octo", true);
        acc.record_page(2, 1_000, Some("c1".to_string()));
        assert_eq!(acc.pagination_cursor(), Some("c1"));
        acc.record_page(1, 500, None);
        assert_eq!(acc.total_commit_count(), 3);
        assert_eq!(acc.estimated_duration_millis(), 1_500);
        assert_eq!(acc.pages_fetched(), 2);
        assert!(acc.pagination_cursor().is_none());

        let done = acc.finalize();
        assert_eq!(done.commits_by_me, 3);
        assert_eq!(done.owner, "octo");
    }

    #[test]
    fn report_serializes_camel_case() {
        let r = AggregateReport::from_repositories(vec![report("a", 1, 3_600_000)]);
        let json = serde_json::to_value(&r).expect("report serializes");
        assert_eq!(json["totalCommitsByMe"], 1);
        assert_eq!(json["totalHoursByMe"], 1);
        assert_eq!(json["repositories"][0]["ownedByMe"], true);
    }
}
