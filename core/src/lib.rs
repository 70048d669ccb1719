//! Estimate coding hours from commit history.
//!
//! The `estimate` module merges commit timestamps into work sessions;
//! `aggregate` walks paged commit history round by round and sums the
//! estimates per repository.

pub mod aggregate;
pub mod cache;
pub mod error;
pub mod estimate;
pub mod github;
pub mod model;
pub mod source;
pub mod span;

pub use aggregate::{AggregateOptions, PagedAggregator};
pub use error::{AggregateError, PageError, SourceError};
pub use estimate::{estimate, SessionPolicy};
pub use model::{AggregateReport, PageInfo, PageRequest, PageResult, RepositoryIdentity};
pub use source::{Concurrent, PageSource, SinglePageSource};
