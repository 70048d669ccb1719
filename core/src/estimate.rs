use chrono::{DateTime, Duration, Utc};

/// A maximal run of commits where no two consecutive commits are further
/// apart than the gap threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub first_commit: DateTime<Utc>,
    pub last_commit: DateTime<Utc>,
    pub commits: usize,
}

impl Session {
    /// Work attributed to this session: its span plus the lookback assumed
    /// before the first commit.
    pub fn duration(&self, lookback: Duration) -> Duration {
        self.last_commit - (self.first_commit - lookback)
    }
}

/// Parameters of the session estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    pub gap_threshold: Duration,
    pub lookback: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            gap_threshold: Duration::hours(2),
            lookback: Duration::hours(1),
        }
    }
}

impl SessionPolicy {
    pub fn estimate(&self, timestamps: &[DateTime<Utc>]) -> Duration {
        estimate(timestamps, self.gap_threshold, self.lookback)
    }
}

/// Merge timestamps into sessions. The input may be in any order and is not
/// modified.
pub fn sessions(timestamps: &[DateTime<Utc>], gap_threshold: Duration) -> Vec<Session> {
    let mut sorted = timestamps.to_vec();
    sorted.sort_unstable();

    let mut iter = sorted.into_iter();
    let Some(first) = iter.next() else {
        return vec![];
    };

    let mut out = Vec::new();
    let mut current = Session {
        first_commit: first,
        last_commit: first,
        commits: 1,
    };

    for time in iter {
        if time - current.last_commit > gap_threshold {
            out.push(current);
            current = Session {
                first_commit: time,
                last_commit: time,
                commits: 1,
            };
        } else {
            current.last_commit = time;
            current.commits += 1;
        }
    }
    out.push(current);
    out
}

/// Estimated coding time behind a set of commits. Empty input is zero, a
/// single commit is exactly `lookback`.
pub fn estimate(
    timestamps: &[DateTime<Utc>],
    gap_threshold: Duration,
    lookback: Duration,
) -> Duration {
    sessions(timestamps, gap_threshold)
        .iter()
        .fold(Duration::zero(), |total, session| {
            total + session.duration(lookback)
        })
}
