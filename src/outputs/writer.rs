//! Writing sitemap documents and the sitemap index.
//!
//! [`SitemapWriter`] turns sealed documents into XML, optionally gzips them,
//! and hands the bytes to a [`DocumentSink`]:
//!
//! - [`FileSink`]: one file per document under the output directory
//! - [`MemorySink`]: documents are kept for the caller
//!
//! Each file handle is opened, written, flushed and closed inside a single
//! call, so an error never leaves a handle open. Re-running overwrites files
//! of the same name.

use crate::config::GeneratorConfig;
use crate::errors::{Result, SitemapError};
use crate::models::{GeneratedFile, IndexEntry, SitemapDocument, SitemapIndex};
use crate::outputs::xml::{render_index, render_urlset};
use crate::utils::{ensure_writable_dir, w3c_timestamp};
use chrono::{DateTime, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Destination for finished documents.
pub trait DocumentSink {
    /// Persist `bytes` as `filename`, returning the number of bytes stored.
    fn put(&mut self, filename: &str, bytes: &[u8]) -> Result<u64>;

    /// Where `filename` ends up, for status messages.
    fn location(&self, filename: &str) -> PathBuf;

    /// Hand over documents kept in memory, if the sink keeps any.
    fn drain(&mut self) -> Vec<GeneratedFile> {
        Vec::new()
    }
}

/// Writes each document to `{output_directory}/{filename}`.
#[derive(Debug)]
pub struct FileSink {
    directory: PathBuf,
    prepared: bool,
}

impl FileSink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            prepared: false,
        }
    }
}

impl DocumentSink for FileSink {
    fn put(&mut self, filename: &str, bytes: &[u8]) -> Result<u64> {
        if !self.prepared {
            ensure_writable_dir(&self.directory)?;
            self.prepared = true;
        }

        let path = self.directory.join(filename);
        let file = File::create(&path).map_err(|e| SitemapError::io(&path, e))?;
        let mut out = BufWriter::new(file);
        out.write_all(bytes).map_err(|e| SitemapError::io(&path, e))?;
        out.flush().map_err(|e| SitemapError::io(&path, e))?;
        drop(out);

        set_file_mode(&path)?;
        Ok(bytes.len() as u64)
    }

    fn location(&self, filename: &str) -> PathBuf {
        self.directory.join(filename)
    }
}

#[cfg(unix)]
fn set_file_mode(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644))
        .map_err(|e| SitemapError::io(path, e))
}

#[cfg(not(unix))]
fn set_file_mode(_path: &Path) -> Result<()> {
    Ok(())
}

/// Keeps documents in memory; a repeated filename replaces the earlier one.
#[derive(Debug, Default)]
pub struct MemorySink {
    files: Vec<GeneratedFile>,
}

impl DocumentSink for MemorySink {
    fn put(&mut self, filename: &str, bytes: &[u8]) -> Result<u64> {
        let file = GeneratedFile {
            filename: filename.to_string(),
            contents: bytes.to_vec(),
        };
        match self.files.iter_mut().find(|f| f.filename == filename) {
            Some(existing) => *existing = file,
            None => self.files.push(file),
        }
        Ok(bytes.len() as u64)
    }

    fn location(&self, filename: &str) -> PathBuf {
        PathBuf::from(filename)
    }

    fn drain(&mut self) -> Vec<GeneratedFile> {
        std::mem::take(&mut self.files)
    }
}

/// Serializes documents and the index and passes them to a sink.
pub struct SitemapWriter {
    config: GeneratorConfig,
    sink: Box<dyn DocumentSink>,
}

impl SitemapWriter {
    pub fn new(config: &GeneratorConfig, sink: Box<dyn DocumentSink>) -> Self {
        Self {
            config: config.clone(),
            sink,
        }
    }

    /// `{prefix}{sequence}.xml[.gz]`
    pub fn sitemap_filename(&self, sequence: usize) -> String {
        self.config.sitemap_filename(sequence)
    }

    /// `{prefix}.xml`
    pub fn index_filename(&self) -> String {
        self.config.index_filename()
    }

    pub fn location(&self, filename: &str) -> PathBuf {
        self.sink.location(filename)
    }

    /// Serialize `document`, gzip it if configured, and store it as sitemap `sequence`.
    ///
    /// # Returns
    ///
    /// The number of bytes stored (compressed size when gzip is on).
    ///
    /// # Errors
    ///
    /// Returns [`SitemapError::Io`] if compression or the write fails.
    #[instrument(level = "info", skip_all, fields(sequence = sequence, entries = document.len()))]
    pub fn flush_document(&mut self, document: &SitemapDocument, sequence: usize) -> Result<u64> {
        let filename = self.sitemap_filename(sequence);
        let xml = render_urlset(document, self.config.line_ending);

        let bytes = if self.config.gzip {
            gzip(xml.as_bytes()).map_err(|e| SitemapError::io(self.sink.location(&filename), e))?
        } else {
            xml.into_bytes()
        };

        let written = self.sink.put(&filename, &bytes)?;
        info!(file = %filename, bytes = written, "Wrote sitemap document");
        Ok(written)
    }

    /// Build the index structure for sitemaps `1..=document_count`.
    pub fn index_for(&self, document_count: usize, generated_at: DateTime<Utc>) -> SitemapIndex {
        let last_modified = w3c_timestamp(generated_at);
        let base_url = self.config.base_url();
        SitemapIndex {
            entries: (1..=document_count)
                .map(|i| IndexEntry {
                    location: format!("{}/{}", base_url, self.sitemap_filename(i)),
                    last_modified: last_modified.clone(),
                })
                .collect(),
        }
    }

    /// Render the `<sitemapindex>` document listing `document_count` sitemaps.
    pub fn build_index(&self, document_count: usize, generated_at: DateTime<Utc>) -> String {
        let index = self.index_for(document_count, generated_at);
        debug!(entries = index.len(), "Built sitemap index");
        render_index(&index, self.config.line_ending)
    }

    /// Store the index document as `{prefix}.xml`.
    ///
    /// # Errors
    ///
    /// Returns [`SitemapError::Io`] if the write fails.
    #[instrument(level = "info", skip_all)]
    pub fn write_index(&mut self, content: &str) -> Result<u64> {
        let filename = self.index_filename();
        let written = self.sink.put(&filename, content.as_bytes())?;
        info!(file = %filename, bytes = written, "Wrote sitemap index");
        Ok(written)
    }

    pub(crate) fn drain_files(&mut self) -> Vec<GeneratedFile> {
        self.sink.drain()
    }
}

fn gzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(bytes.len() / 4), Compression::best());
    encoder.write_all(bytes)?;
    encoder.finish()
}
