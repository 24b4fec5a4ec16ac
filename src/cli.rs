//! Command-line interface definitions for Awful Sitemap.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Flags given to `generate` are layered over the values of the optional
//! YAML config file.

use awful_sitemap::{GeneratorConfig, OutputMode, SitemapKind, UrlQuery};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the Awful Sitemap application.
///
/// # Examples
///
/// ```sh
/// # Sitemaps for every client row, gzipped, into ./public
/// awful_sitemap generate --hostname www.example.com --prefix sitemap_clients \
///     --gzip -o ./public --rows clients.json --template "/clients/[slug]/" --fields slug
///
/// # A short list of static pages
/// awful_sitemap generate --config sitemap.yaml --urls pages.txt
///
/// # Check what was written
/// awful_sitemap inspect ./public/sitemap_clients.xml
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate numbered sitemap files and a sitemap index
    Generate(GenerateArgs),

    /// Print the locations listed in a sitemap or sitemap index (plain or .gz)
    Inspect {
        /// File to read
        file: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Optional path to a YAML config file
    #[arg(short, long, env = "SITEMAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Public hostname, e.g. www.example.com
    #[arg(long, env = "SITEMAP_HOSTNAME")]
    pub hostname: Option<String>,

    /// Filename prefix for sitemap files and the index
    #[arg(short, long)]
    pub prefix: Option<String>,

    /// Directory the files are written to
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Gzip each sitemap file (.xml.gz)
    #[arg(long)]
    pub gzip: bool,

    /// Build http:// instead of https:// URLs
    #[arg(long)]
    pub http: bool,

    /// Use locations verbatim instead of prefixing them with the hostname
    #[arg(long)]
    pub no_hostname_prefix: bool,

    /// Maximum URLs per sitemap file (1..=50000)
    #[arg(long)]
    pub max_entries: Option<usize>,

    /// Generate a Google News sitemap
    #[arg(long)]
    pub news: bool,

    /// Print the generated documents instead of writing them
    #[arg(long)]
    pub memory: bool,

    /// File with one `URL` or `URL|changefreq` line per URL
    #[arg(long)]
    pub urls: Option<PathBuf>,

    /// JSON file holding an array of row objects
    #[arg(long, requires = "template")]
    pub rows: Option<PathBuf>,

    /// Location template, e.g. "/clients/[slug]/"
    #[arg(long, requires = "rows")]
    pub template: Option<String>,

    /// Row fields substituted into the template, comma separated
    #[arg(long, value_delimiter = ',')]
    pub fields: Vec<String>,

    /// Row field holding each URL's lastmod
    #[arg(long)]
    pub lastmod_field: Option<String>,

    /// Row field holding the article title (news)
    #[arg(long)]
    pub title_field: Option<String>,

    /// Row field holding the publication date (news)
    #[arg(long)]
    pub publication_date_field: Option<String>,
}

impl GenerateArgs {
    /// Override `config` with every flag that was given.
    pub fn apply(&self, config: &mut GeneratorConfig) {
        if let Some(hostname) = &self.hostname {
            config.hostname = hostname.clone();
        }
        if let Some(prefix) = &self.prefix {
            config.filename_prefix = prefix.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_directory = dir.clone();
        }
        if let Some(max) = self.max_entries {
            config.max_entries_per_file = max;
        }
        if self.gzip {
            config.gzip = true;
        }
        if self.http {
            config.https_urls = false;
        }
        if self.no_hostname_prefix {
            config.use_hostname_prefix = false;
        }
        if self.news {
            config.kind = SitemapKind::News;
        }
        if self.memory {
            config.output_mode = OutputMode::Memory;
        }
    }

    /// The templated query, when `--rows` and `--template` were given.
    pub fn query(&self) -> Option<UrlQuery> {
        let template = self.template.as_ref()?;
        self.rows.as_ref()?;

        let mut query = UrlQuery::new(template.clone(), self.fields.iter().cloned());
        if let Some(field) = &self.lastmod_field {
            query = query.with_lastmod_field(field.clone());
        }
        if let (Some(title), Some(date)) = (&self.title_field, &self.publication_date_field) {
            query = query.with_news_fields(title.clone(), date.clone());
        }
        Some(query)
    }
}
