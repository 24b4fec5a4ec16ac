//! # Awful Sitemap
//!
//! Generates Google XML sitemaps for sites with far more URLs than one file
//! may hold. URLs are added one by one, as a literal list, or from a paged
//! row source rendered through a `[placeholder]` template; they are split
//! into numbered files of at most 50,000 entries and listed in a sitemap
//! index.
//!
//! ## Features
//!
//! - Standard and Google News (`news:news`) sitemaps
//! - Optional gzip compression of each sitemap file
//! - File output or in-memory output for callers that store documents themselves
//! - A [`RunReport`] with status lines and every non-fatal error
//!
//! ## Architecture
//!
//! 1. **Configure**: [`GeneratorConfig`] from YAML or code, checked by `validate`
//! 2. **Accumulate**: [`SitemapBuilder`] fills a [`SitemapDocument`], flushing it when full
//! 3. **Write**: [`SitemapWriter`] serializes, compresses and stores each document
//! 4. **Index**: the builder lists `1..=document_count` in `{prefix}.xml`

pub mod builder;
pub mod config;
pub mod errors;
pub mod models;
pub mod outputs;
pub mod parse;
pub mod sources;
pub mod template;
pub mod utils;

pub use builder::{SitemapBuilder, UrlQuery};
pub use config::{GeneratorConfig, LineEnding, OutputMode};
pub use errors::{Result, SitemapError};
pub use models::{
    ChangeFrequency, GeneratedFile, NewsPublication, NewsTags, SitemapDocument, SitemapEntry,
    SitemapIndex, SitemapKind, UrlTags,
};
pub use outputs::report::{RunReport, RunState};
pub use outputs::writer::{DocumentSink, FileSink, MemorySink, SitemapWriter};
pub use sources::{Row, RowSource, VecRowSource, load_json_rows};
