//! # Awful Sitemap
//!
//! Command-line front end for the sitemap generator.
//!
//! ## Usage
//!
//! ```sh
//! awful_sitemap generate --hostname www.example.com --rows clients.json \
//!     --template "/clients/[slug]/" --fields slug --gzip -o ./public
//! awful_sitemap inspect ./public/sitemap.xml
//! ```
//!
//! Fatal errors (bad configuration, unreadable rows) end the process with a
//! non-zero status. Failed sitemap writes are printed from the run report;
//! only a failed index write makes the run itself fail.

use awful_sitemap::parse::read_file;
use awful_sitemap::utils::{format_thousands, truncate_for_log};
use awful_sitemap::{GeneratorConfig, RunReport, RunState, SitemapBuilder, load_json_rows};
use clap::Parser;
use std::error::Error;
use std::path::Path;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;

use cli::{Cli, Command, GenerateArgs};

fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    match args.command {
        Command::Generate(args) => generate(&args),
        Command::Inspect { file } => inspect(&file),
    }
}

#[instrument(level = "info", skip_all)]
fn generate(args: &GenerateArgs) -> Result<(), Box<dyn Error>> {
    let start_time = std::time::Instant::now();

    let mut config = match &args.config {
        Some(path) => GeneratorConfig::load(path)?,
        None => GeneratorConfig::default(),
    };
    args.apply(&mut config);

    let mut sitemap = SitemapBuilder::new(config)?;

    // ---- Literal URL list ----
    if let Some(path) = &args.urls {
        let text = std::fs::read_to_string(path).map_err(|e| {
            error!(path = %path.display(), error = %e, "Failed to read URL list");
            e
        })?;
        let lines: Vec<&str> = text.lines().collect();
        let added = sitemap.add_url_list(&lines)?;
        info!(added, path = %path.display(), "Added URL list");
    }

    // ---- Templated rows ----
    // A data source failure still ends the run so earlier documents get indexed.
    let mut query_result = Ok(());
    if let (Some(query), Some(path)) = (args.query(), &args.rows) {
        let mut rows = load_json_rows(path)?;
        if let Err(e) = sitemap.add_urls_from_query(&mut rows, &query) {
            if e.is_fatal() {
                error!(error = %e, "Query rejected; nothing written");
                return Err(e.into());
            }
            error!(error = %e, "Query aborted");
            query_result = Err(e);
        }
    }

    let report = sitemap.finish();
    print_report(&report);

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        urls = %format_thousands(report.total_urls as u64),
        documents = report.document_count,
        "Execution complete"
    );

    query_result?;
    if report.state == RunState::Failed {
        return Err("sitemap index could not be written".into());
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    for line in &report.status {
        println!("{line}");
    }
    if report.has_errors() {
        warn!(count = report.errors.len(), "Run finished with errors");
        for e in &report.errors {
            eprintln!("error: {e}");
        }
    }

    for file in &report.files {
        println!("==> {} ({} bytes) <==", file.filename, format_thousands(file.contents.len() as u64));
        match std::str::from_utf8(&file.contents) {
            Ok(xml) => println!("{xml}"),
            Err(_) => println!("(gzip data)"),
        }
    }
}

#[instrument(level = "info", skip_all, fields(path = %path.display()))]
fn inspect(path: &Path) -> Result<(), Box<dyn Error>> {
    let parsed = read_file(path)?;
    println!(
        "{}: {:?} with {} locations",
        path.display(),
        parsed.root,
        format_thousands(parsed.locations.len() as u64)
    );
    for loc in &parsed.locations {
        debug!(loc = %truncate_for_log(loc, 200), "Location");
        println!("{loc}");
    }
    Ok(())
}
