//! Status and error log returned to the caller at the end of a run.

use crate::errors::SitemapError;
use crate::models::GeneratedFile;
use std::path::PathBuf;

/// Where a run stands in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Configured, no URL added yet.
    Idle,
    /// URLs are being added; documents are flushed as they fill up.
    Accumulating,
    /// The last document has been sealed and flushed.
    Ended,
    /// The index document has been built.
    IndexBuilt,
    /// The index has been written (or stored, in memory mode).
    IndexWritten,
    /// The index could not be written; sitemap files written so far remain.
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::IndexWritten | RunState::Failed)
    }
}

/// Everything a caller needs to show the outcome of a run.
#[derive(Debug)]
pub struct RunReport {
    pub state: RunState,
    /// Total URLs accepted by `add_url`.
    pub total_urls: usize,
    /// Number of sitemap documents written successfully.
    pub document_count: usize,
    /// Human-readable progress lines, e.g. "Wrote 1,204 bytes to ./sitemap1.xml".
    pub status: Vec<String>,
    /// Failures that did not stop the run.
    pub errors: Vec<SitemapError>,
    /// Paths written in file mode, sitemaps first then the index.
    pub written: Vec<PathBuf>,
    /// Documents kept in memory mode.
    pub files: Vec<GeneratedFile>,
    /// The index document, once built.
    pub index: Option<String>,
}

impl RunReport {
    pub(crate) fn new() -> Self {
        Self {
            state: RunState::Idle,
            total_urls: 0,
            document_count: 0,
            status: Vec::new(),
            errors: Vec::new(),
            written: Vec::new(),
            files: Vec::new(),
            index: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == RunState::IndexWritten && self.errors.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
