use thiserror::Error;

/// A whole round could not be fetched.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("all {0} page requests failed")]
    AllPagesFailed(usize),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SourceError::Decode(err.to_string())
        } else {
            SourceError::Transport(err.to_string())
        }
    }
}

/// A single repository's page in a round was unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageError {
    #[error("malformed page for {repository}: {reason}")]
    Malformed { repository: String, reason: String },
    #[error("fetch failed for {repository}: {reason}")]
    Fetch { repository: String, reason: String },
}

impl PageError {
    pub fn malformed(repository: impl Into<String>, reason: impl Into<String>) -> Self {
        PageError::Malformed {
            repository: repository.into(),
            reason: reason.into(),
        }
    }

    pub fn fetch(repository: impl Into<String>, reason: impl Into<String>) -> Self {
        PageError::Fetch {
            repository: repository.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("commit source unavailable: {0}")]
    SourceUnavailable(#[source] SourceError),
}

pub type Result<T> = std::result::Result<T, AggregateError>;
