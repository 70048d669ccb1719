use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::{millis_to_hours, AggregateReport, RepositoryReport};

const MILLIS_PER_HOUR: i64 = 3_600_000;

/// Compact on-disk form of an [`AggregateReport`].
///
/// Each repository is stored as `[commits, hours, name, owned]`. Owner and
/// exact durations are not kept; loading restores durations from the
/// rounded hours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressedReport {
    pub tc: u64,
    pub th: i64,
    pub r: Vec<(u64, i64, String, bool)>,
}

impl From<&AggregateReport> for CompressedReport {
    fn from(report: &AggregateReport) -> Self {
        Self {
            tc: report.total_commits_by_me,
            th: report.total_hours_by_me,
            r: report
                .repositories
                .iter()
                .map(|repo| {
                    (
                        repo.commits_by_me,
                        repo.estimated_hours,
                        repo.name.clone(),
                        repo.owned_by_me,
                    )
                })
                .collect(),
        }
    }
}

impl From<CompressedReport> for AggregateReport {
    fn from(compressed: CompressedReport) -> Self {
        let repositories = compressed
            .r
            .into_iter()
            .map(|(commits, hours, name, owned)| RepositoryReport {
                name,
                owner: String::new(),
                owned_by_me: owned,
                commits_by_me: commits,
                estimated_duration_millis: hours * MILLIS_PER_HOUR,
                estimated_hours: millis_to_hours(hours * MILLIS_PER_HOUR),
            })
            .collect();
        AggregateReport {
            repositories,
            total_commits_by_me: compressed.tc,
            total_hours_by_me: compressed.th,
        }
    }
}

/// Whether a freshly computed report should be published over the cached one.
pub fn has_changed(previous: Option<&AggregateReport>, current: &AggregateReport) -> bool {
    previous.is_none_or(|prev| prev.total_commits_by_me != current.total_commits_by_me)
}

/// The last published report, kept in a single JSON file.
pub struct ReportCache {
    path: PathBuf,
}

impl ReportCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing or unreadable cache is treated as empty.
    pub fn load(&self) -> Option<AggregateReport> {
        match self.try_load() {
            Ok(report) => report,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "ignoring unreadable cache");
                None
            }
        }
    }

    fn try_load(&self) -> Result<Option<AggregateReport>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let compressed: CompressedReport =
            serde_json::from_str(&content).context("Cache is not a compressed report")?;
        Ok(Some(compressed.into()))
    }

    pub fn store(&self, report: &AggregateReport) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string(&CompressedReport::from(report))?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AggregateReport {
        AggregateReport::from_repositories(vec![
            RepositoryReport {
                name: "widgets".to_string(),
                owner: "octo".to_string(),
                owned_by_me: true,
                commits_by_me: 12,
                estimated_duration_millis: 7 * MILLIS_PER_HOUR,
                estimated_hours: 7,
            },
            RepositoryReport {
                name: "gadgets".to_string(),
                owner: "acme".to_string(),
                owned_by_me: false,
                commits_by_me: 3,
                estimated_duration_millis: 2 * MILLIS_PER_HOUR,
                estimated_hours: 2,
            },
        ])
    }

    #[test]
    fn compressed_json_shape() {
        let json =
            serde_json::to_value(CompressedReport::from(&sample())).expect("cache serializes");
        assert_eq!(json["tc"], 15);
        assert_eq!(json["th"], 9);
        assert_eq!(json["r"][0], serde_json::json!([12, 7, "widgets", true]));
    }

    #[test]
    fn store_then_load_keeps_totals() {
        let dir = tempfile::tempdir().expect("temp dir");
        let cache = ReportCache::new(dir.path().join("nested").join("cache.json"));
        assert!(cache.load().is_none());

        cache.store(&sample()).expect("cache stores");
        let loaded = cache.load().expect("cache should load");
        assert_eq!(loaded.total_commits_by_me, 15);
        assert_eq!(loaded.total_hours_by_me, 9);
        assert_eq!(loaded.repositories[1].name, "gadgets");
        assert!(!loaded.repositories[1].owned_by_me);
    }

    #[test]
    fn garbage_cache_loads_as_none() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("cache.json");
        fs::write(&path, "not json").expect("write cache file");
        assert!(ReportCache::new(path).load().is_none());
    }

    #[test]
    fn change_detection_follows_commit_total() {
        let current = sample();
        assert!(has_changed(None, &current));
        assert!(!has_changed(Some(&current), &current));

        let mut older = current.clone();
        older.total_commits_by_me -= 1;
        assert!(has_changed(Some(&older), &current));
    }
}
