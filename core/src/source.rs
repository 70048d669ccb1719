use rayon::prelude::*;

use crate::error::{PageError, SourceError};
use crate::model::{PageRequest, PageResult};

pub type PageOutcome = Result<PageResult, PageError>;

/// A provider of commit history pages that can answer a whole round of
/// requests at once.
///
/// Implementations return exactly one outcome per request, in request order.
/// `Err` means the round as a whole could not be fetched.
pub trait PageSource {
    fn fetch_round(&self, requests: &[PageRequest]) -> Result<Vec<PageOutcome>, SourceError>;
}

impl<S: PageSource + ?Sized> PageSource for &S {
    fn fetch_round(&self, requests: &[PageRequest]) -> Result<Vec<PageOutcome>, SourceError> {
        (**self).fetch_round(requests)
    }
}

/// A provider that can only fetch one repository page per call.
pub trait SinglePageSource: Sync {
    fn fetch_page(&self, request: &PageRequest) -> PageOutcome;
}

/// Turns a [`SinglePageSource`] into a [`PageSource`] by fetching every
/// request of a round in parallel. The round only returns once every request
/// has produced an outcome.
pub struct Concurrent<S>(pub S);

impl<S: SinglePageSource> PageSource for Concurrent<S> {
    fn fetch_round(&self, requests: &[PageRequest]) -> Result<Vec<PageOutcome>, SourceError> {
        Ok(requests
            .par_iter()
            .map(|request| self.0.fetch_page(request))
            .collect())
    }
}
