//! Error types for sitemap generation.
//!
//! Every fallible operation in the crate returns [`Result`], whose error is a
//! [`SitemapError`]. The variants line up with how the caller is expected to
//! react:
//!
//! | Variant | Raised by | Effect on the run |
//! |---------|-----------|-------------------|
//! | `Configuration` | `configure`, template checks | fatal, nothing has been written |
//! | `DataSource` | row source paging, row field lookup | aborts the current query only |
//! | `InvalidEntry` | `add_url` tag checks | the single URL is rejected |
//! | `Io` | file writes | recorded in the run report, generation continues |
//! | `Parse` | reading sitemaps back | the file is not a sitemap |

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while configuring, filling or writing a sitemap.
#[derive(Debug, Error)]
pub enum SitemapError {
    /// The generator was configured with values it cannot work with.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The row source failed or returned rows the template cannot use.
    #[error("data source error: {0}")]
    DataSource(String),

    /// A single URL entry was rejected.
    #[error("invalid sitemap entry: {0}")]
    InvalidEntry(String),

    /// A sitemap read back from disk is not well-formed XML.
    #[error("parse error: {0}")]
    Parse(String),

    /// Reading or writing an output file failed.
    #[error("I/O error on `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SitemapError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SitemapError::Io {
            path: path.into(),
            source,
        }
    }

    /// `true` for errors that must stop the run before any output is produced.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SitemapError::Configuration(_))
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, SitemapError>;
