//! Lint the content: front-matter, footnotes, links, anchors and assets

use anyhow::Result;
use clap::ValueEnum;

use crate::check::{Checker, Report};
use crate::content::ContentLoader;
use crate::Site;

/// How the report is printed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Load the corpus and run every check
pub fn collect(site: &Site) -> Result<Report> {
    let corpus = ContentLoader::new(site).load()?;
    Ok(Checker::new(&site.config).run(&corpus))
}

/// Run the checks and print the report. Returns whether errors remain.
pub fn run(site: &Site, strict: bool, format: OutputFormat) -> Result<bool> {
    let mut report = collect(site)?;
    if strict {
        report.promote_warnings();
    }

    match format {
        OutputFormat::Text => print!("{}", report.to_text()),
        OutputFormat::Json => println!("{}", report.to_json()?),
    }

    if report.has_errors() {
        tracing::debug!("{} errors found", report.error_count());
    }
    Ok(report.has_errors())
}
