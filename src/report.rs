use crate::error::CspError;
use serde::Serialize;

/// Terminal state of one page within a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PageStatus {
    /// Plugin disabled for this page; markup left untouched.
    Skipped,
    /// Policy resolved, validated, injected and the output hook invoked.
    Completed,
    /// Validation failed; markup left untouched.
    Failed,
}

/// Outcome of augmenting one page.
#[derive(Debug, Clone, Serialize)]
pub struct PageResult {
    pub page: String,
    pub status: PageStatus,
    /// Final serialized policy, present on completed pages.
    pub policy: Option<String>,
    pub hashes_added: usize,
    pub nonces_added: usize,
    pub integrity_added: usize,
}

impl PageResult {
    pub fn skipped(page: impl Into<String>) -> Self {
        Self {
            page: page.into(),
            status: PageStatus::Skipped,
            policy: None,
            hashes_added: 0,
            nonces_added: 0,
            integrity_added: 0,
        }
    }
}

/// Collects per-page outcomes for one build. A failed page never aborts the
/// rest of the build; its error is recorded here instead.
#[derive(Debug, Default)]
pub struct BuildReport {
    results: Vec<PageResult>,
    errors: Vec<(String, CspError)>,
}

impl BuildReport {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: PageResult) {
        self.results.push(result);
    }

    pub fn record_failure(&mut self, page: impl Into<String>, error: CspError) {
        let page = page.into();
        self.results.push(PageResult {
            page: page.clone(),
            status: PageStatus::Failed,
            policy: None,
            hashes_added: 0,
            nonces_added: 0,
            integrity_added: 0,
        });
        self.errors.push((page, error));
    }

    #[inline]
    pub fn results(&self) -> &[PageResult] {
        &self.results
    }

    #[inline]
    pub fn errors(&self) -> &[(String, CspError)] {
        &self.errors
    }

    #[inline]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
