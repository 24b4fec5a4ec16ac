//! The sitemap generation session.
//!
//! A [`SitemapBuilder`] owns all mutable state of one run: the in-progress
//! document, the running URL total, the number of documents written and the
//! [`RunReport`]. URLs arrive one at a time through [`SitemapBuilder::add_url`],
//! as a literal list, or from a paged [`RowSource`]; whenever the current
//! document already holds `max_entries_per_file` entries it is flushed and a
//! fresh one is started.
//!
//! # Lifecycle
//!
//! ```text
//! Idle -> Accumulating -> (flush, Accumulating)* -> Ended -> IndexBuilt -> IndexWritten
//!                                                                       \-> Failed
//! ```
//!
//! # Example
//!
//! ```no_run
//! use awful_sitemap::{GeneratorConfig, SitemapBuilder, UrlQuery, UrlTags, VecRowSource};
//!
//! # fn main() -> awful_sitemap::Result<()> {
//! let mut config = GeneratorConfig::for_host("www.example.com");
//! config.filename_prefix = "sitemap_clients".into();
//! config.gzip = true;
//!
//! let mut sitemap = SitemapBuilder::new(config)?;
//! sitemap.add_url("/about/", UrlTags::default())?;
//!
//! let mut rows = VecRowSource::default();
//! sitemap.add_urls_from_query(&mut rows, &UrlQuery::new("/clients/[slug]/", ["slug"]))?;
//!
//! let report = sitemap.finish();
//! for line in &report.status {
//!     println!("{line}");
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::{GeneratorConfig, OutputMode};
use crate::errors::{Result, SitemapError};
use crate::models::{ChangeFrequency, NewsTags, SitemapDocument, SitemapEntry, SitemapKind, UrlTags};
use crate::outputs::report::{RunReport, RunState};
use crate::outputs::writer::{DocumentSink, FileSink, MemorySink, SitemapWriter};
use crate::sources::{Row, RowSource, field_text};
use crate::template::LocationTemplate;
use crate::utils::{format_thousands, truncate_for_log};
use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// A templated query: how to turn each row into a location and tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlQuery {
    /// Location template with one `[placeholder]` per entry of `fields`.
    pub template: String,
    /// Row field names substituted into the template, in order.
    pub fields: Vec<String>,
    /// Row field holding a W3C `lastmod` value.
    pub lastmod_field: Option<String>,
    /// Row field holding the article title (news sitemaps).
    pub title_field: Option<String>,
    /// Row field holding the publication date (news sitemaps).
    pub publication_date_field: Option<String>,
}

impl UrlQuery {
    pub fn new<I, S>(template: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            template: template.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            lastmod_field: None,
            title_field: None,
            publication_date_field: None,
        }
    }

    pub fn with_lastmod_field(mut self, field: impl Into<String>) -> Self {
        self.lastmod_field = Some(field.into());
        self
    }

    pub fn with_news_fields(mut self, title: impl Into<String>, publication_date: impl Into<String>) -> Self {
        self.title_field = Some(title.into());
        self.publication_date_field = Some(publication_date.into());
        self
    }

    fn tags_for(&self, row: &Row, config: &GeneratorConfig) -> Result<UrlTags> {
        let mut tags = UrlTags::default();
        if let Some(field) = &self.lastmod_field {
            tags.lastmod = Some(field_text(row, field)?);
        }
        if config.kind == SitemapKind::News {
            if let (Some(publication), Some(title), Some(date)) = (
                &config.news_publication,
                &self.title_field,
                &self.publication_date_field,
            ) {
                tags.news = Some(NewsTags {
                    publication: publication.clone(),
                    publication_date: field_text(row, date)?,
                    title: field_text(row, title)?,
                });
            }
        }
        Ok(tags)
    }
}

/// One generation run.
pub struct SitemapBuilder {
    config: GeneratorConfig,
    writer: SitemapWriter,
    current: SitemapDocument,
    report: RunReport,
}

impl SitemapBuilder {
    /// Validate `config` and start a run writing to the sink its output mode selects.
    ///
    /// # Errors
    ///
    /// Returns [`SitemapError::Configuration`] if the config is invalid.
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        let sink = default_sink(&config);
        Self::with_sink(config, sink)
    }

    /// Validate `config` and start a run writing to `sink`.
    pub fn with_sink(mut config: GeneratorConfig, sink: Box<dyn DocumentSink>) -> Result<Self> {
        config.validate()?;
        info!(
            hostname = %config.hostname,
            prefix = %config.filename_prefix,
            gzip = config.gzip,
            max_entries = config.max_entries_per_file,
            kind = ?config.kind,
            "Sitemap run configured"
        );
        Ok(Self {
            writer: SitemapWriter::new(&config, sink),
            current: SitemapDocument::new(config.kind, config.max_entries_per_file),
            report: RunReport::new(),
            config,
        })
    }

    /// Replace the configuration before any URL has been added.
    ///
    /// The sink is rebuilt from the new output mode, replacing any sink given
    /// to [`with_sink`](Self::with_sink).
    ///
    /// # Errors
    ///
    /// Returns [`SitemapError::Configuration`] if the new config is invalid or
    /// the run has already started.
    pub fn configure(&mut self, mut config: GeneratorConfig) -> Result<()> {
        if self.report.state != RunState::Idle {
            return Err(SitemapError::Configuration(
                "cannot reconfigure a run after URLs have been added".into(),
            ));
        }
        config.validate()?;
        self.writer = SitemapWriter::new(&config, default_sink(&config));
        self.current = SitemapDocument::new(config.kind, config.max_entries_per_file);
        self.config = config;
        Ok(())
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn state(&self) -> RunState {
        self.report.state
    }

    pub fn total_urls(&self) -> usize {
        self.report.total_urls
    }

    pub fn document_count(&self) -> usize {
        self.report.document_count
    }

    /// Entries waiting in the unflushed document.
    pub fn pending_urls(&self) -> usize {
        self.current.len()
    }

    /// Append one URL to the current document, flushing it first if it is full.
    ///
    /// Relative locations get `{scheme}://{hostname}` prepended (with a `/`
    /// inserted if missing) unless `use_hostname_prefix` is off. Absolute
    /// `http(s)://` locations are used as-is.
    ///
    /// # Errors
    ///
    /// - [`SitemapError::InvalidEntry`] if the location is empty, a tag is
    ///   invalid, or a news run gets an entry without news tags
    /// - [`SitemapError::Configuration`] if the run has already ended
    pub fn add_url(&mut self, location: &str, tags: UrlTags) -> Result<()> {
        self.ensure_open()?;

        if self.config.kind == SitemapKind::News && tags.news.is_none() {
            return Err(SitemapError::InvalidEntry(format!(
                "news sitemap entry `{}` has no news tags",
                truncate_for_log(location, 120)
            )));
        }

        let entry = SitemapEntry::new(self.resolve_location(location)?, tags)?;

        if self.current.is_full() {
            self.flush_current();
        }
        self.current
            .push(entry)
            .map_err(|e| SitemapError::InvalidEntry(format!("document rejected `{}`", e.location)))?;

        self.report.state = RunState::Accumulating;
        self.report.total_urls += 1;
        Ok(())
    }

    /// Add literal URLs given as `URL` or `URL|changefreq` lines.
    ///
    /// Blank lines are skipped. Entries that fail validation are recorded in
    /// the report and skipped; the rest are added.
    ///
    /// # Returns
    ///
    /// The number of URLs added.
    pub fn add_url_list<S: AsRef<str>>(&mut self, lines: &[S]) -> Result<usize> {
        self.ensure_open()?;
        let mut added = 0;

        for line in lines {
            let line = line.as_ref().trim();
            if line.is_empty() {
                continue;
            }
            let (url, freq) = match line.split_once('|') {
                Some((url, freq)) => (url.trim(), Some(freq.trim())),
                None => (line, None),
            };

            let mut tags = UrlTags::default();
            if let Some(freq) = freq.filter(|f| !f.is_empty()) {
                match freq.parse::<ChangeFrequency>() {
                    Ok(freq) => tags.changefreq = Some(freq),
                    Err(e) => warn!(url, error = %e, "Ignoring change frequency"),
                }
            }

            match self.add_url(url, tags) {
                Ok(()) => added += 1,
                Err(e @ SitemapError::InvalidEntry(_)) => self.record_rejected(e),
                Err(e) => return Err(e),
            }
        }

        debug!(added, "Added URL list");
        Ok(added)
    }

    /// Add one URL per row of `source`, built from `query.template`.
    ///
    /// The template and field list are checked before the source is touched.
    /// Rows are then fetched one page at a time, page `i` starting at offset
    /// `i * max_entries_per_file`.
    ///
    /// # Returns
    ///
    /// The number of URLs added.
    ///
    /// # Errors
    ///
    /// - [`SitemapError::Configuration`] for a template/field mismatch, or a
    ///   news run without a publication and title/date fields
    /// - [`SitemapError::DataSource`] if a page fetch fails or a row lacks a
    ///   field; no row of the failing page is added, and documents flushed
    ///   before the failure remain valid
    #[instrument(level = "info", skip_all, fields(template = %query.template))]
    pub fn add_urls_from_query<R: RowSource + ?Sized>(
        &mut self,
        source: &mut R,
        query: &UrlQuery,
    ) -> Result<usize> {
        self.ensure_open()?;
        let template = LocationTemplate::parse(&query.template, &query.fields)?;
        debug!(fields = ?template.fields(), "Parsed location template");

        if self.config.kind == SitemapKind::News
            && (self.config.news_publication.is_none()
                || query.title_field.is_none()
                || query.publication_date_field.is_none())
        {
            return Err(SitemapError::Configuration(
                "news queries need a news_publication plus title and publication date fields".into(),
            ));
        }

        let total = source.row_count()?;
        if total == 0 {
            info!("Query returned no rows");
            self.report
                .status
                .push(format!("No rows for `{}`; no sitemap file to create", query.template));
            return Ok(0);
        }

        let page_size = self.config.max_entries_per_file;
        let pages = total.div_ceil(page_size);
        info!(total, pages, page_size, "Paging query results");

        let mut added = 0;
        for page_index in 0..pages {
            let offset = page_index * page_size;
            let rows = source.fetch_page(offset, page_size).map_err(|e| {
                error!(offset, error = %e, "Page fetch failed; aborting query");
                e
            })?;
            if rows.is_empty() {
                break;
            }

            // A bad row aborts the whole page, so render every row before adding any.
            let staged = rows
                .iter()
                .map(|row| -> Result<(String, UrlTags)> {
                    Ok((template.render(row)?, query.tags_for(row, &self.config)?))
                })
                .collect::<Result<Vec<_>>>()
                .map_err(|e| {
                    error!(offset, error = %e, "Row rejected; aborting query");
                    e
                })?;

            for (location, tags) in staged {
                match self.add_url(&location, tags) {
                    Ok(()) => added += 1,
                    Err(e @ SitemapError::InvalidEntry(_)) => self.record_rejected(e),
                    Err(e) => return Err(e),
                }
            }
        }

        info!(added, "Added URLs from query");
        Ok(added)
    }

    /// Seal and flush the in-progress document. Further URLs are rejected.
    ///
    /// Calling this more than once has no further effect.
    pub fn end_document(&mut self) {
        if self.report.state.is_terminal()
            || matches!(self.report.state, RunState::Ended | RunState::IndexBuilt)
        {
            return;
        }
        self.flush_current();
        self.report.state = RunState::Ended;
        info!(
            total_urls = self.report.total_urls,
            documents = self.report.document_count,
            "Finished adding URLs"
        );
    }

    /// Build the sitemap index for every document written so far.
    ///
    /// Ends the document first if the caller has not.
    pub fn build_index(&mut self) -> String {
        self.end_document();
        let content = self
            .writer
            .build_index(self.report.document_count, Utc::now());
        self.report.index = Some(content.clone());
        if !self.report.state.is_terminal() {
            self.report.state = RunState::IndexBuilt;
        }
        content
    }

    /// Write the index document as `{prefix}.xml`.
    ///
    /// # Errors
    ///
    /// Returns [`SitemapError::Io`] if the write fails; the run moves to
    /// [`RunState::Failed`] but sitemap files already written stay in place.
    pub fn write_index(&mut self, content: &str) -> Result<()> {
        let filename = self.writer.index_filename();
        match self.writer.write_index(content) {
            Ok(bytes) => {
                let location = self.writer.location(&filename);
                self.report.status.push(format!(
                    "Wrote {} bytes to {}",
                    format_thousands(bytes),
                    location.display()
                ));
                if self.config.output_mode == OutputMode::File {
                    self.report.written.push(location);
                }
                self.report.state = RunState::IndexWritten;
                Ok(())
            }
            Err(e) => {
                error!(file = %filename, error = %e, "Failed to write sitemap index");
                self.report.state = RunState::Failed;
                Err(e)
            }
        }
    }

    /// End the run: flush the last document, build and write the index.
    pub fn finish(mut self) -> RunReport {
        let content = self.build_index();
        if self.report.state == RunState::IndexBuilt {
            if let Err(e) = self.write_index(&content) {
                self.report.errors.push(e);
            }
        }
        self.report.files = self.writer.drain_files();

        info!(
            state = ?self.report.state,
            total_urls = self.report.total_urls,
            documents = self.report.document_count,
            errors = self.report.errors.len(),
            "Sitemap run complete"
        );
        self.report
    }

    fn ensure_open(&self) -> Result<()> {
        match self.report.state {
            RunState::Idle | RunState::Accumulating => Ok(()),
            state => Err(SitemapError::Configuration(format!(
                "cannot add URLs once the run has ended (state: {state:?})"
            ))),
        }
    }

    fn resolve_location(&self, location: &str) -> Result<String> {
        let location = location.trim();
        if location.is_empty() {
            return Err(SitemapError::InvalidEntry("location cannot be empty".into()));
        }
        if is_absolute_http(location) || !self.config.use_hostname_prefix {
            return Ok(location.to_string());
        }

        let slash = if location.starts_with('/') { "" } else { "/" };
        Ok(format!("{}{}{}", self.config.base_url(), slash, location))
    }

    fn record_rejected(&mut self, e: SitemapError) {
        warn!(error = %e, "Skipping URL");
        self.report.errors.push(e);
    }

    /// Seal the current document, write it, and start a new one.
    ///
    /// A failed write is recorded and does not consume a sequence number, so
    /// the index only ever lists files that exist.
    fn flush_current(&mut self) {
        let mut document = std::mem::replace(
            &mut self.current,
            SitemapDocument::new(self.config.kind, self.config.max_entries_per_file),
        );
        document.seal();
        if document.is_empty() {
            debug!("Nothing to flush");
            return;
        }

        let sequence = self.report.document_count + 1;
        let filename = self.writer.sitemap_filename(sequence);
        match self.writer.flush_document(&document, sequence) {
            Ok(bytes) => {
                self.report.document_count = sequence;
                let location = self.writer.location(&filename);
                self.report.status.push(format!(
                    "Wrote {} bytes to {}",
                    format_thousands(bytes),
                    location.display()
                ));
                if self.config.output_mode == OutputMode::File {
                    self.report.written.push(location);
                }
            }
            Err(e) => {
                error!(file = %filename, entries = document.len(), error = %e, "Failed to write sitemap document");
                self.report.errors.push(e);
            }
        }
    }
}

fn default_sink(config: &GeneratorConfig) -> Box<dyn DocumentSink> {
    match config.output_mode {
        OutputMode::File => Box::new(FileSink::new(config.output_directory.clone())),
        OutputMode::Memory => Box::new(MemorySink::default()),
    }
}

fn is_absolute_http(location: &str) -> bool {
    Url::parse(location)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LineEnding;
    use crate::models::NewsPublication;
    use crate::parse::{read_index_locations, read_locations};
    use crate::sources::VecRowSource;
    use flate2::read::GzDecoder;
    use serde_json::json;
    use std::io::Read;
    use std::path::PathBuf;

    fn memory_config(max: usize) -> GeneratorConfig {
        let mut config = GeneratorConfig::for_host("example.com");
        config.filename_prefix = "mysitemap".into();
        config.output_mode = OutputMode::Memory;
        config.max_entries_per_file = max;
        config.line_ending = LineEnding::Lf;
        config
    }

    fn file_text(report: &RunReport, name: &str) -> String {
        let file = report
            .files
            .iter()
            .find(|f| f.filename == name)
            .unwrap_or_else(|| panic!("missing {name}"));
        String::from_utf8(file.contents.clone()).unwrap()
    }

    fn sitemap_files(report: &RunReport) -> Vec<&crate::models::GeneratedFile> {
        report
            .files
            .iter()
            .filter(|f| f.filename != "mysitemap.xml")
            .collect()
    }

    fn compact(xml: &str) -> String {
        xml.lines().map(str::trim).collect()
    }

    /// Fails every write whose filename is in `fail`.
    struct FlakySink {
        inner: MemorySink,
        fail: Vec<String>,
    }

    impl DocumentSink for FlakySink {
        fn put(&mut self, filename: &str, bytes: &[u8]) -> Result<u64> {
            if self.fail.iter().any(|f| f == filename) {
                return Err(SitemapError::io(
                    filename,
                    std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
                ));
            }
            self.inner.put(filename, bytes)
        }

        fn location(&self, filename: &str) -> PathBuf {
            PathBuf::from(filename)
        }

        fn drain(&mut self) -> Vec<crate::models::GeneratedFile> {
            self.inner.drain()
        }
    }

    struct BrokenSource;

    impl RowSource for BrokenSource {
        fn row_count(&mut self) -> Result<usize> {
            Ok(10)
        }

        fn fetch_page(&mut self, _offset: usize, _limit: usize) -> Result<Vec<Row>> {
            Err(SitemapError::DataSource("connection reset".into()))
        }
    }

    /// Records every (offset, limit) it is asked for.
    struct RecordingSource {
        inner: VecRowSource,
        calls: Vec<(usize, usize)>,
    }

    impl RowSource for RecordingSource {
        fn row_count(&mut self) -> Result<usize> {
            self.inner.row_count()
        }

        fn fetch_page(&mut self, offset: usize, limit: usize) -> Result<Vec<Row>> {
            self.calls.push((offset, limit));
            self.inner.fetch_page(offset, limit)
        }
    }

    fn slug_rows(n: usize) -> VecRowSource {
        VecRowSource::from_values((0..n).map(|i| json!({ "slug": format!("p{i}") })).collect())
            .unwrap()
    }

    #[test]
    fn test_under_limit_produces_one_document() {
        let mut sitemap = SitemapBuilder::new(memory_config(5)).unwrap();
        for i in 0..5 {
            sitemap.add_url(&format!("/p/{i}/"), UrlTags::default()).unwrap();
        }
        let report = sitemap.finish();

        assert_eq!(report.document_count, 1);
        assert_eq!(report.total_urls, 5);
        let docs = sitemap_files(&report);
        assert_eq!(docs.len(), 1);
        assert_eq!(read_locations(&file_text(&report, "mysitemap1.xml")).unwrap().len(), 5);
    }

    #[test]
    fn test_one_over_limit_produces_two_documents() {
        let mut sitemap = SitemapBuilder::new(memory_config(3)).unwrap();
        for i in 0..4 {
            sitemap.add_url(&format!("/p/{i}/"), UrlTags::default()).unwrap();
        }
        let report = sitemap.finish();

        assert_eq!(report.document_count, 2);
        assert_eq!(read_locations(&file_text(&report, "mysitemap1.xml")).unwrap().len(), 3);
        assert_eq!(
            read_locations(&file_text(&report, "mysitemap2.xml")).unwrap(),
            vec!["https://example.com/p/3/"]
        );
    }

    #[test]
    fn test_full_document_is_flushed_only_when_next_url_arrives() {
        let mut sitemap = SitemapBuilder::new(memory_config(2)).unwrap();
        sitemap.add_url("/a/", UrlTags::default()).unwrap();
        sitemap.add_url("/b/", UrlTags::default()).unwrap();
        assert_eq!(sitemap.document_count(), 0);
        assert_eq!(sitemap.pending_urls(), 2);

        sitemap.add_url("/c/", UrlTags::default()).unwrap();
        assert_eq!(sitemap.document_count(), 1);
        assert_eq!(sitemap.pending_urls(), 1);
        assert_eq!(sitemap.total_urls(), 3);
    }

    #[test]
    fn test_round_trip_preserves_insertion_order() {
        let locs = ["/zeta/", "/alpha/", "/mid/", "https://other.example.org/x?y=1&z=2"];
        let mut sitemap = SitemapBuilder::new(memory_config(100)).unwrap();
        for loc in locs {
            sitemap.add_url(loc, UrlTags::default()).unwrap();
        }
        let report = sitemap.finish();

        assert_eq!(
            read_locations(&file_text(&report, "mysitemap1.xml")).unwrap(),
            vec![
                "https://example.com/zeta/",
                "https://example.com/alpha/",
                "https://example.com/mid/",
                "https://other.example.org/x?y=1&z=2",
            ]
        );
    }

    #[test]
    fn test_single_url_scenario() {
        let mut sitemap = SitemapBuilder::new(memory_config(50_000)).unwrap();
        let tags = UrlTags::default()
            .with_changefreq(ChangeFrequency::Weekly)
            .with_priority(0.5);
        sitemap.add_url("/a/", tags).unwrap();
        let report = sitemap.finish();

        let xml = file_text(&report, "mysitemap1.xml");
        let body = compact(&xml);
        assert_eq!(body.matches("<url>").count(), 1);
        assert!(body.contains("<url><loc>https://example.com/a/</loc></url>"));
        assert!(!xml.contains("<changefreq>"));
    }

    #[test]
    fn test_empty_run_writes_no_document_and_empty_index() {
        let mut sitemap = SitemapBuilder::new(memory_config(10)).unwrap();
        let mut rows = VecRowSource::default();
        let added = sitemap
            .add_urls_from_query(&mut rows, &UrlQuery::new("/p/[slug]/", ["slug"]))
            .unwrap();
        assert_eq!(added, 0);
        assert_eq!(sitemap.add_url_list::<&str>(&[]).unwrap(), 0);

        let report = sitemap.finish();
        assert_eq!(report.document_count, 0);
        assert!(sitemap_files(&report).is_empty());
        let index = report.index.as_deref().unwrap();
        assert!(index.contains("<sitemapindex"));
        assert!(read_index_locations(index).unwrap().is_empty());
        assert_eq!(report.state, RunState::IndexWritten);
        assert!(report.status.iter().any(|s| s.contains("no sitemap file to create")));
    }

    #[test]
    fn test_index_lists_every_document() {
        let mut config = memory_config(2);
        config.gzip = true;
        let mut sitemap = SitemapBuilder::new(config).unwrap();
        for i in 0..5 {
            sitemap.add_url(&format!("/p/{i}/"), UrlTags::default()).unwrap();
        }
        let report = sitemap.finish();

        assert_eq!(report.document_count, 3);
        let locs = read_index_locations(report.index.as_deref().unwrap()).unwrap();
        assert_eq!(
            locs,
            vec![
                "https://example.com/mysitemap1.xml.gz",
                "https://example.com/mysitemap2.xml.gz",
                "https://example.com/mysitemap3.xml.gz",
            ]
        );
    }

    #[test]
    fn test_query_substitutes_fields_positionally() {
        let mut sitemap = SitemapBuilder::new(memory_config(100)).unwrap();
        let mut rows = VecRowSource::from_values(vec![json!({"a": "foo", "b": "bar"})]).unwrap();
        sitemap
            .add_urls_from_query(&mut rows, &UrlQuery::new("/x-[a]-[b]/", ["a", "b"]))
            .unwrap();
        let report = sitemap.finish();

        assert_eq!(
            read_locations(&file_text(&report, "mysitemap1.xml")).unwrap(),
            vec!["https://example.com/x-foo-bar/"]
        );
    }

    #[test]
    fn test_query_escapes_substituted_values() {
        let mut sitemap = SitemapBuilder::new(memory_config(100)).unwrap();
        let mut rows = VecRowSource::from_values(vec![json!({"q": "fish & <chips>"})]).unwrap();
        sitemap
            .add_urls_from_query(&mut rows, &UrlQuery::new("/search/[q]/", ["q"]))
            .unwrap();
        let report = sitemap.finish();

        let xml = file_text(&report, "mysitemap1.xml");
        assert!(xml.contains("<loc>https://example.com/search/fish &amp; &lt;chips&gt;/</loc>"));
    }

    #[test]
    fn test_query_mismatch_fails_before_touching_source() {
        let mut sitemap = SitemapBuilder::new(memory_config(100)).unwrap();
        let mut source = RecordingSource {
            inner: slug_rows(3),
            calls: Vec::new(),
        };
        let err = sitemap
            .add_urls_from_query(&mut source, &UrlQuery::new("/x-[a]-[b]/", ["a"]))
            .unwrap_err();

        assert!(matches!(err, SitemapError::Configuration(_)));
        assert!(source.calls.is_empty());
        assert_eq!(sitemap.total_urls(), 0);
    }

    #[test]
    fn test_query_pages_by_max_entries() {
        let mut sitemap = SitemapBuilder::new(memory_config(4)).unwrap();
        let mut source = RecordingSource {
            inner: slug_rows(10),
            calls: Vec::new(),
        };
        let added = sitemap
            .add_urls_from_query(&mut source, &UrlQuery::new("/p/[slug]/", ["slug"]))
            .unwrap();

        assert_eq!(added, 10);
        assert_eq!(source.calls, vec![(0, 4), (4, 4), (8, 4)]);

        let report = sitemap.finish();
        assert_eq!(report.document_count, 3);
        let third = read_locations(&file_text(&report, "mysitemap3.xml")).unwrap();
        assert_eq!(third, vec!["https://example.com/p/p8/", "https://example.com/p/p9/"]);
    }

    #[test]
    fn test_query_after_direct_urls_continues_current_document() {
        let mut sitemap = SitemapBuilder::new(memory_config(3)).unwrap();
        sitemap.add_url("/home/", UrlTags::default()).unwrap();
        sitemap
            .add_urls_from_query(&mut slug_rows(3), &UrlQuery::new("/p/[slug]/", ["slug"]))
            .unwrap();
        let report = sitemap.finish();

        assert_eq!(report.total_urls, 4);
        assert_eq!(report.document_count, 2);
        assert_eq!(
            read_locations(&file_text(&report, "mysitemap2.xml")).unwrap(),
            vec!["https://example.com/p/p2/"]
        );
    }

    #[test]
    fn test_data_source_error_keeps_prior_documents() {
        let mut sitemap = SitemapBuilder::new(memory_config(2)).unwrap();
        for i in 0..3 {
            sitemap.add_url(&format!("/p/{i}/"), UrlTags::default()).unwrap();
        }
        let err = sitemap
            .add_urls_from_query(&mut BrokenSource, &UrlQuery::new("/p/[slug]/", ["slug"]))
            .unwrap_err();
        assert!(matches!(err, SitemapError::DataSource(_)));

        let report = sitemap.finish();
        assert_eq!(report.document_count, 2);
        assert_eq!(report.total_urls, 3);
    }

    #[test]
    fn test_row_missing_field_is_data_source_error() {
        let mut sitemap = SitemapBuilder::new(memory_config(10)).unwrap();
        let mut rows = VecRowSource::from_values(vec![json!({"id": 1})]).unwrap();
        let err = sitemap
            .add_urls_from_query(&mut rows, &UrlQuery::new("/p/[slug]/", ["slug"]))
            .unwrap_err();
        assert!(matches!(err, SitemapError::DataSource(_)));
    }

    #[test]
    fn test_bad_row_drops_its_whole_page() {
        let mut sitemap = SitemapBuilder::new(memory_config(3)).unwrap();
        let mut rows = VecRowSource::from_values(vec![
            json!({"slug": "a"}),
            json!({"slug": "b"}),
            json!({"slug": "c"}),
            json!({"slug": "d"}),
            json!({"id": 5}),
            json!({"slug": "f"}),
        ])
        .unwrap();
        let err = sitemap
            .add_urls_from_query(&mut rows, &UrlQuery::new("/p/[slug]/", ["slug"]))
            .unwrap_err();
        assert!(matches!(err, SitemapError::DataSource(_)));
        assert_eq!(sitemap.total_urls(), 3);

        let report = sitemap.finish();
        assert_eq!(report.document_count, 1);
        assert_eq!(
            read_locations(&file_text(&report, "mysitemap1.xml")).unwrap(),
            vec![
                "https://example.com/p/a/",
                "https://example.com/p/b/",
                "https://example.com/p/c/",
            ]
        );
        assert!(report.files.iter().all(|f| f.filename != "mysitemap2.xml"));
    }

    #[test]
    fn test_bad_row_mid_page_adds_nothing_from_that_page() {
        let mut sitemap = SitemapBuilder::new(memory_config(10)).unwrap();
        let mut rows = VecRowSource::from_values(vec![
            json!({"slug": "a"}),
            json!({"slug": "b"}),
            json!({"id": 3}),
        ])
        .unwrap();
        assert!(sitemap
            .add_urls_from_query(&mut rows, &UrlQuery::new("/p/[slug]/", ["slug"]))
            .is_err());
        assert_eq!(sitemap.total_urls(), 0);

        let report = sitemap.finish();
        assert_eq!(report.document_count, 0);
        assert!(sitemap_files(&report).is_empty());
    }

    #[test]
    fn test_invalid_row_tags_are_recorded_and_skipped() {
        let mut sitemap = SitemapBuilder::new(memory_config(10)).unwrap();
        let mut rows = VecRowSource::from_values(vec![
            json!({"slug": "good", "updated": "2024-04-19"}),
            json!({"slug": "bad", "updated": "last tuesday"}),
        ])
        .unwrap();
        let added = sitemap
            .add_urls_from_query(
                &mut rows,
                &UrlQuery::new("/p/[slug]/", ["slug"]).with_lastmod_field("updated"),
            )
            .unwrap();
        assert_eq!(added, 1);

        let report = sitemap.finish();
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(report.errors[0], SitemapError::InvalidEntry(_)));
        assert!(file_text(&report, "mysitemap1.xml").contains("<lastmod>2024-04-19</lastmod>"));
    }

    #[test]
    fn test_add_url_rejects_empty_location() {
        let mut sitemap = SitemapBuilder::new(memory_config(10)).unwrap();
        assert!(matches!(
            sitemap.add_url("", UrlTags::default()),
            Err(SitemapError::InvalidEntry(_))
        ));
        assert_eq!(sitemap.total_urls(), 0);
        assert_eq!(sitemap.state(), RunState::Idle);
    }

    #[test]
    fn test_add_url_after_end_is_rejected() {
        let mut sitemap = SitemapBuilder::new(memory_config(10)).unwrap();
        sitemap.add_url("/a/", UrlTags::default()).unwrap();
        sitemap.end_document();
        assert_eq!(sitemap.state(), RunState::Ended);
        assert!(sitemap.add_url("/b/", UrlTags::default()).is_err());

        // A second end is a no-op.
        sitemap.end_document();
        assert_eq!(sitemap.document_count(), 1);
    }

    #[test]
    fn test_location_normalisation() {
        let mut sitemap = SitemapBuilder::new(memory_config(10)).unwrap();
        sitemap.add_url("somepath/", UrlTags::default()).unwrap();
        sitemap.add_url("http://legacy.example.com/x", UrlTags::default()).unwrap();
        let report = sitemap.finish();

        assert_eq!(
            read_locations(&file_text(&report, "mysitemap1.xml")).unwrap(),
            vec!["https://example.com/somepath/", "http://legacy.example.com/x"]
        );
    }

    #[test]
    fn test_without_hostname_prefix_and_http() {
        let mut config = memory_config(10);
        config.use_hostname_prefix = false;
        config.https_urls = false;
        let mut sitemap = SitemapBuilder::new(config).unwrap();
        sitemap
            .add_urls_from_query(
                &mut VecRowSource::from_values(vec![json!({"url": "http://www.example.com/a/"})]).unwrap(),
                &UrlQuery::new("[url]", ["url"]),
            )
            .unwrap();
        let report = sitemap.finish();

        assert_eq!(
            read_locations(&file_text(&report, "mysitemap1.xml")).unwrap(),
            vec!["http://www.example.com/a/"]
        );
        let index = read_index_locations(report.index.as_deref().unwrap()).unwrap();
        assert_eq!(index, vec!["http://example.com/mysitemap1.xml"]);
    }

    #[test]
    fn test_url_list_with_changefreq() {
        let mut sitemap = SitemapBuilder::new(memory_config(10)).unwrap();
        let added = sitemap
            .add_url_list(&[
                "https://example.com/contact/|monthly",
                "",
                "/faq/|sometimes",
                "  |weekly",
            ])
            .unwrap();
        assert_eq!(added, 2);

        let report = sitemap.finish();
        assert_eq!(report.errors.len(), 1);
        let xml = file_text(&report, "mysitemap1.xml");
        assert!(!xml.contains("changefreq"));
        assert_eq!(
            read_locations(&xml).unwrap(),
            vec!["https://example.com/contact/", "https://example.com/faq/"]
        );
    }

    #[test]
    fn test_news_sitemap_from_add_url() {
        let mut config = memory_config(10);
        config.kind = SitemapKind::News;
        let mut sitemap = SitemapBuilder::new(config).unwrap();

        let news = NewsTags {
            publication: NewsPublication {
                name: "The Example Times".into(),
                language: "en".into(),
            },
            publication_date: "2024-04-01".into(),
            title: "Sample Article Title".into(),
        };
        sitemap
            .add_url("/yourpath/", UrlTags::default().with_news(news))
            .unwrap();
        assert_eq!(sitemap.total_urls(), 1);
        assert!(matches!(
            sitemap.add_url("/no-news/", UrlTags::default()),
            Err(SitemapError::InvalidEntry(_))
        ));

        let report = sitemap.finish();
        let xml = file_text(&report, "mysitemap1.xml");
        assert!(xml.contains("xmlns:news="));
        assert!(xml.contains("<news:title>Sample Article Title</news:title>"));
    }

    #[test]
    fn test_news_sitemap_from_query() {
        let mut config = memory_config(10);
        config.kind = SitemapKind::News;
        config.news_publication = Some(NewsPublication {
            name: "The Example Times".into(),
            language: "en".into(),
        });
        let mut sitemap = SitemapBuilder::new(config).unwrap();
        let mut rows = VecRowSource::from_values(vec![json!({
            "slug": "budget-vote",
            "headline": "Council passes budget",
            "published": "2024-04-19T08:00:00+00:00"
        })])
        .unwrap();

        let plain = UrlQuery::new("/news/[slug]/", ["slug"]);
        assert!(matches!(
            sitemap.add_urls_from_query(&mut rows, &plain),
            Err(SitemapError::Configuration(_))
        ));

        let query = plain.with_news_fields("headline", "published");
        assert_eq!(sitemap.add_urls_from_query(&mut rows, &query).unwrap(), 1);

        let report = sitemap.finish();
        let xml = file_text(&report, "mysitemap1.xml");
        assert!(xml.contains("<news:name>The Example Times</news:name>"));
        assert!(xml.contains("<news:title>Council passes budget</news:title>"));
        assert!(xml.contains("<news:publication_date>2024-04-19T08:00:00+00:00</news:publication_date>"));
    }

    #[test]
    fn test_failed_flush_is_reported_and_run_continues() {
        let sink = FlakySink {
            inner: MemorySink::default(),
            fail: vec!["mysitemap1.xml".into()],
        };
        let mut sitemap = SitemapBuilder::with_sink(memory_config(2), Box::new(sink)).unwrap();
        for i in 0..4 {
            sitemap.add_url(&format!("/p/{i}/"), UrlTags::default()).unwrap();
        }
        let report = sitemap.finish();

        // Sequence 1 is never consumed, so the second batch hits the same name.
        assert_eq!(report.document_count, 0);
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors.iter().all(|e| matches!(e, SitemapError::Io { .. })));
        assert_eq!(report.state, RunState::IndexWritten);
        assert!(read_index_locations(report.index.as_deref().unwrap()).unwrap().is_empty());
    }

    #[test]
    fn test_failed_index_write_marks_run_failed() {
        let sink = FlakySink {
            inner: MemorySink::default(),
            fail: vec!["mysitemap.xml".into()],
        };
        let mut sitemap = SitemapBuilder::with_sink(memory_config(2), Box::new(sink)).unwrap();
        sitemap.add_url("/a/", UrlTags::default()).unwrap();
        let report = sitemap.finish();

        assert_eq!(report.state, RunState::Failed);
        assert_eq!(report.document_count, 1);
        assert_eq!(report.files.len(), 1);
        assert!(matches!(report.errors[0], SitemapError::Io { .. }));
        assert!(!report.is_success());
    }

    #[test]
    fn test_configure_only_while_idle() {
        let mut sitemap = SitemapBuilder::new(memory_config(10)).unwrap();

        let mut bad = memory_config(10);
        bad.filename_prefix = "a/b".into();
        assert!(sitemap.configure(bad).is_err());

        let mut other = memory_config(10);
        other.filename_prefix = "renamed".into();
        sitemap.configure(other).unwrap();
        assert_eq!(sitemap.config().filename_prefix, "renamed");

        sitemap.add_url("/a/", UrlTags::default()).unwrap();
        assert!(sitemap.configure(memory_config(10)).is_err());
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = memory_config(10);
        config.hostname = String::new();
        assert!(matches!(
            SitemapBuilder::new(config),
            Err(SitemapError::Configuration(_))
        ));
    }

    #[test]
    fn test_file_mode_writes_gzip_documents_and_index() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = GeneratorConfig::for_host("www.testdomain.com");
        config.filename_prefix = "mysitemap".into();
        config.gzip = true;
        config.max_entries_per_file = 2;
        config.output_directory = dir.path().to_path_buf();

        let mut sitemap = SitemapBuilder::new(config).unwrap();
        for i in 0..3 {
            sitemap.add_url(&format!("/p/{i}/"), UrlTags::default()).unwrap();
        }
        let report = sitemap.finish();

        assert!(report.is_success());
        assert_eq!(report.written.len(), 3);
        assert!(report.files.is_empty());
        assert_eq!(report.status.len(), 3);
        assert!(report.status[0].starts_with("Wrote "));

        let raw = std::fs::read(dir.path().join("mysitemap2.xml.gz")).unwrap();
        let mut xml = String::new();
        GzDecoder::new(&raw[..]).read_to_string(&mut xml).unwrap();
        assert_eq!(read_locations(&xml).unwrap(), vec!["https://www.testdomain.com/p/2/"]);

        let index = std::fs::read_to_string(dir.path().join("mysitemap.xml")).unwrap();
        assert_eq!(read_index_locations(&index).unwrap().len(), 2);
        assert!(index.contains("\r\n"));
    }
}
