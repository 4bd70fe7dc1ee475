//! quillpress: a static blog generator and content linter
//!
//! Posts, drafts and pages are Markdown files with front-matter. The crate
//! renders them into a static site with Tera templates and verifies the
//! corpus: front-matter fields, footnote references, internal links,
//! anchors and image assets.

pub mod check;
pub mod commands;
pub mod config;
pub mod content;
pub mod generator;
pub mod helpers;
pub mod server;
pub mod templates;

use anyhow::Result;
use std::path::{Path, PathBuf};

/// A site on disk and its configuration
#[derive(Debug, Clone)]
pub struct Site {
    /// Site configuration
    pub config: config::SiteConfig,
    /// Base directory
    pub base_dir: PathBuf,
    /// Source directory
    pub source_dir: PathBuf,
    /// Public (output) directory
    pub public_dir: PathBuf,
    /// Load `_drafts` even when `render_drafts` is off
    pub drafts: bool,
}

impl Site {
    /// Create a new Site instance from a directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let config_path = base_dir.join("_config.yml");

        let config = if config_path.exists() {
            config::SiteConfig::load(&config_path)?
        } else {
            tracing::debug!("No _config.yml in {:?}, using defaults", base_dir);
            config::SiteConfig::default()
        };

        let source_dir = base_dir.join(&config.source_dir);
        let public_dir = base_dir.join(&config.public_dir);

        Ok(Self {
            config,
            base_dir,
            source_dir,
            public_dir,
            drafts: false,
        })
    }

    /// Include drafts when loading content
    pub fn with_drafts(mut self, drafts: bool) -> Self {
        self.drafts = drafts;
        self
    }

    /// Initialize a new site
    pub fn init(&self) -> Result<()> {
        commands::init::run(self)
    }

    /// Generate the static site
    pub fn generate(&self) -> Result<generator::GenerateStats> {
        commands::generate::run(self)
    }

    /// Lint the content and return the report
    pub fn check(&self) -> Result<check::Report> {
        commands::check::collect(self)
    }

    /// Clean the public directory
    pub fn clean(&self) -> Result<()> {
        commands::clean::run(self)
    }

    /// Create a new post
    pub fn new_post(&self, title: &str, layout: Option<&str>) -> Result<PathBuf> {
        commands::new::run(self, title, layout)
    }
}
