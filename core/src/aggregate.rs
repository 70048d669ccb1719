//! Round-based aggregation of paged commit history.
//!
//! Every round asks the source for one page of each pending repository. Pages
//! are folded into per-repository accumulators; a repository leaves the
//! pending set once its source reports no further pages, it hits the page
//! cap, or one of its pages fails.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::error::{AggregateError, Result, SourceError};
use crate::estimate::SessionPolicy;
use crate::model::{
    AggregateReport, PageRequest, PageResult, RepositoryAccumulator, RepositoryIdentity,
    RepositoryReport,
};
use crate::source::{PageOutcome, PageSource};

pub const DEFAULT_MAX_PAGES: usize = 50;

#[derive(Debug, Clone)]
pub struct AggregateOptions {
    pub policy: SessionPolicy,
    /// Login whose repositories count as owned.
    pub viewer: Option<String>,
    /// Owners whose repositories are skipped entirely. Compared case-insensitively.
    pub excluded_owners: Vec<String>,
    pub max_pages_per_repository: usize,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            policy: SessionPolicy::default(),
            viewer: None,
            excluded_owners: vec![],
            max_pages_per_repository: DEFAULT_MAX_PAGES,
        }
    }
}

struct Pending {
    identity: RepositoryIdentity,
    accumulator: Option<RepositoryAccumulator>,
}

impl Pending {
    fn request(&self) -> PageRequest {
        PageRequest {
            identity: self.identity.clone(),
            cursor: self
                .accumulator
                .as_ref()
                .and_then(|acc| acc.pagination_cursor())
                .map(str::to_string),
        }
    }
}

enum Step {
    Pending(Pending),
    Finished(RepositoryReport),
    Dropped,
}

pub struct PagedAggregator<S> {
    source: S,
    options: AggregateOptions,
}

impl<S: PageSource> PagedAggregator<S> {
    pub fn new(source: S, options: AggregateOptions) -> Self {
        Self { source, options }
    }

    /// Walks every repository's history to the end and sums the estimates.
    ///
    /// Only a failure of the very first round is fatal; later failures drop
    /// the affected repositories from the report.
    pub fn aggregate(&self, specs: &[RepositoryIdentity]) -> Result<AggregateReport> {
        let mut seen = HashSet::new();
        let mut pending: Vec<Pending> = specs
            .iter()
            .filter(|identity| seen.insert(*identity))
            .map(|identity| Pending {
                identity: identity.clone(),
                accumulator: None,
            })
            .collect();

        let mut finished = Vec::new();
        let mut round = 0usize;

        while !pending.is_empty() {
            round += 1;
            let requests: Vec<PageRequest> = pending.iter().map(Pending::request).collect();
            debug!(round, repositories = requests.len(), "fetching commit pages");

            let outcomes = match self.source.fetch_round(&requests) {
                Ok(outcomes) => outcomes,
                Err(err) if round == 1 => return Err(AggregateError::SourceUnavailable(err)),
                Err(err) => {
                    warn!(round, dropped = pending.len(), error = %err, "round failed");
                    break;
                }
            };

            // Requests the source left unanswered count as failed.
            if round == 1 && !outcomes.iter().any(|outcome| outcome.is_ok()) {
                for (request, outcome) in requests.iter().zip(&outcomes) {
                    if let Err(err) = outcome {
                        debug!(repository = %request.identity, error = %err, "first page failed");
                    }
                }
                return Err(AggregateError::SourceUnavailable(
                    SourceError::AllPagesFailed(requests.len()),
                ));
            }

            if outcomes.len() != requests.len() {
                warn!(
                    round,
                    expected = requests.len(),
                    received = outcomes.len(),
                    "source returned a mismatched round; unanswered repositories dropped"
                );
            }

            let mut next = Vec::with_capacity(pending.len());
            for (entry, outcome) in pending.into_iter().zip(outcomes) {
                match self.absorb(entry, outcome) {
                    Step::Pending(entry) => next.push(entry),
                    Step::Finished(report) => finished.push(report),
                    Step::Dropped => {}
                }
            }
            pending = next;
        }

        debug!(
            rounds = round,
            repositories = finished.len(),
            "aggregation complete"
        );
        Ok(AggregateReport::from_repositories(finished))
    }

    fn absorb(&self, entry: Pending, outcome: PageOutcome) -> Step {
        let page = match outcome {
            Ok(page) => page,
            Err(err) => {
                warn!(repository = %entry.identity, error = %err, "dropping repository");
                return Step::Dropped;
            }
        };

        let mut accumulator = match entry.accumulator {
            Some(accumulator) => accumulator,
            None => match self.start(&entry.identity, &page) {
                Some(accumulator) => accumulator,
                None => return Step::Dropped,
            },
        };

        let PageResult {
            timestamps,
            page_info,
            ..
        } = page;

        let cursor = match (page_info.has_more, page_info.next_cursor) {
            (false, _) => None,
            (true, Some(cursor)) => Some(cursor),
            (true, None) => {
                warn!(repository = %entry.identity, "page reports more history without a cursor");
                return Step::Dropped;
            }
        };

        let duration = self.options.policy.estimate(&timestamps);
        accumulator.record_page(timestamps.len() as u64, duration.num_milliseconds(), cursor);

        if accumulator.pagination_cursor().is_none() {
            return Step::Finished(accumulator.finalize());
        }
        if accumulator.pages_fetched() >= self.options.max_pages_per_repository {
            warn!(
                repository = %entry.identity,
                pages = accumulator.pages_fetched(),
                "page limit reached; keeping partial history"
            );
            return Step::Finished(accumulator.finalize());
        }

        Step::Pending(Pending {
            identity: entry.identity,
            accumulator: Some(accumulator),
        })
    }

    fn start(
        &self,
        identity: &RepositoryIdentity,
        page: &PageResult,
    ) -> Option<RepositoryAccumulator> {
        if page.total_count == 0 || page.timestamps.is_empty() {
            debug!(repository = %identity, "no commits; skipped");
            return None;
        }
        if self.is_excluded(&page.owner) {
            debug!(repository = %identity, owner = %page.owner, "owner excluded");
            return None;
        }
        Some(RepositoryAccumulator::new(
            page.name.clone(),
            page.owner.clone(),
            self.is_viewer(&page.owner),
        ))
    }

    fn is_excluded(&self, owner: &str) -> bool {
        self.options
            .excluded_owners
            .iter()
            .any(|excluded| excluded.eq_ignore_ascii_case(owner))
    }

    fn is_viewer(&self, owner: &str) -> bool {
        self.options
            .viewer
            .as_deref()
            .is_some_and(|viewer| viewer.eq_ignore_ascii_case(owner))
    }
}
