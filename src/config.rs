//! Generator configuration.
//!
//! A [`GeneratorConfig`] can be built in code, loaded from a YAML file, or
//! assembled by the CLI from flags layered over a file. Whatever the source,
//! [`GeneratorConfig::validate`] runs before any row is read or file written.
//!
//! # Example `sitemap.yaml`
//!
//! ```yaml
//! hostname: www.example.com
//! https_urls: true
//! filename_prefix: sitemap_articles
//! gzip: true
//! output_directory: ./public/sitemaps
//! max_entries_per_file: 50000
//! kind: news
//! news_publication:
//!   name: The Example Times
//!   language: en
//! ```

use crate::errors::{Result, SitemapError};
use crate::models::{MAX_ENTRIES_PER_FILE, NewsPublication, SitemapKind};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};
use url::Url;

/// Where generated documents go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Write `{prefix}{N}.xml[.gz]` and `{prefix}.xml` under `output_directory`.
    #[default]
    File,
    /// Keep documents in the run report.
    Memory,
}

/// Line terminator used between XML structural lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    #[default]
    Crlf,
    Lf,
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Crlf => "\r\n",
            LineEnding::Lf => "\n",
        }
    }
}

/// Options for one generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Host used in `<loc>` values and index entries, e.g. `www.example.com`.
    pub hostname: String,
    /// `https://` when true, `http://` otherwise.
    pub https_urls: bool,
    /// Prepend `{scheme}://{hostname}` to relative locations.
    pub use_hostname_prefix: bool,
    /// `{prefix}.xml` is the index, `{prefix}1.xml` the first sitemap.
    pub filename_prefix: String,
    pub gzip: bool,
    pub output_directory: PathBuf,
    pub max_entries_per_file: usize,
    pub output_mode: OutputMode,
    pub kind: SitemapKind,
    pub line_ending: LineEnding,
    /// Default publication for news entries built from query rows.
    pub news_publication: Option<NewsPublication>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            hostname: String::new(),
            https_urls: true,
            use_hostname_prefix: true,
            filename_prefix: "sitemap".to_string(),
            gzip: false,
            output_directory: PathBuf::from("."),
            max_entries_per_file: MAX_ENTRIES_PER_FILE,
            output_mode: OutputMode::File,
            kind: SitemapKind::Standard,
            line_ending: LineEnding::Crlf,
            news_publication: None,
        }
    }
}

impl GeneratorConfig {
    /// Shorthand for a default config pointed at `hostname`.
    pub fn for_host(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            ..Self::default()
        }
    }

    /// Load a config from a YAML file. Missing keys take their defaults.
    ///
    /// The returned config is not validated yet; call [`validate`](Self::validate)
    /// after applying any overrides.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            SitemapError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: GeneratorConfig = serde_yaml::from_str(&raw).map_err(|e| {
            SitemapError::Configuration(format!("cannot parse {}: {e}", path.display()))
        })?;
        info!(hostname = %config.hostname, prefix = %config.filename_prefix, "Loaded configuration");
        Ok(config)
    }

    /// Check and normalise the configuration.
    ///
    /// The hostname may be given with a scheme and trailing slash
    /// (`https://www.example.com/`); only the host (and port) is kept.
    ///
    /// # Errors
    ///
    /// Returns [`SitemapError::Configuration`] if:
    /// - the hostname is empty or contains a path
    /// - the filename prefix is empty or contains a path separator
    /// - `max_entries_per_file` is zero or above 50,000
    /// - the kind is `news` and `news_publication` lacks a name or language
    pub fn validate(&mut self) -> Result<()> {
        self.hostname = normalize_hostname(&self.hostname)?;

        let prefix = self.filename_prefix.trim();
        if prefix.is_empty() {
            return Err(SitemapError::Configuration(
                "filename prefix cannot be empty".into(),
            ));
        }
        if prefix.contains(['/', '\\']) {
            return Err(SitemapError::Configuration(format!(
                "filename prefix `{prefix}` cannot contain a path separator"
            )));
        }
        self.filename_prefix = prefix.to_string();

        if self.max_entries_per_file == 0 {
            return Err(SitemapError::Configuration(
                "max_entries_per_file must be at least 1".into(),
            ));
        }
        if self.max_entries_per_file > MAX_ENTRIES_PER_FILE {
            return Err(SitemapError::Configuration(format!(
                "max_entries_per_file {} exceeds the {MAX_ENTRIES_PER_FILE} URL protocol limit",
                self.max_entries_per_file
            )));
        }

        if self.kind == SitemapKind::News {
            match &self.news_publication {
                Some(p) if !p.name.trim().is_empty() && !p.language.trim().is_empty() => {}
                Some(_) => {
                    return Err(SitemapError::Configuration(
                        "news_publication needs both a name and a language".into(),
                    ));
                }
                None => warn!("News sitemap without a default publication; every entry must carry its own"),
            }
        }

        Ok(())
    }

    pub fn scheme(&self) -> &'static str {
        if self.https_urls { "https" } else { "http" }
    }

    /// `{scheme}://{hostname}` without a trailing slash.
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme(), self.hostname)
    }

    pub fn file_extension(&self) -> &'static str {
        if self.gzip { "xml.gz" } else { "xml" }
    }

    /// `{prefix}{sequence}.xml[.gz]`
    pub fn sitemap_filename(&self, sequence: usize) -> String {
        format!("{}{}.{}", self.filename_prefix, sequence, self.file_extension())
    }

    /// `{prefix}.xml`; the index is never compressed.
    pub fn index_filename(&self) -> String {
        format!("{}.xml", self.filename_prefix)
    }
}

fn normalize_hostname(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(SitemapError::Configuration("hostname cannot be empty".into()));
    }

    let host = if trimmed.contains("://") {
        let parsed = Url::parse(trimmed).map_err(|e| {
            SitemapError::Configuration(format!("hostname `{raw}` is not a valid URL: {e}"))
        })?;
        if parsed.path() != "/" && !parsed.path().is_empty() {
            return Err(SitemapError::Configuration(format!(
                "hostname `{raw}` cannot contain a path"
            )));
        }
        let host = parsed.host_str().ok_or_else(|| {
            SitemapError::Configuration(format!("hostname `{raw}` has no host"))
        })?;
        match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    } else {
        trimmed.to_string()
    };

    if host.contains(['/', '\\']) || host.chars().any(char::is_whitespace) {
        return Err(SitemapError::Configuration(format!(
            "hostname `{raw}` must be a bare host like www.example.com"
        )));
    }
    Ok(host)
}
