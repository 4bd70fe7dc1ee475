//! CLI entry point for quillpress

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quillpress::commands;
use quillpress::commands::check::OutputFormat;
use quillpress::Site;

#[derive(Parser)]
#[command(name = "quillpress")]
#[command(version)]
#[command(about = "A static blog generator that checks footnotes, links and front-matter", long_about = None)]
struct Cli {
    /// Set the base directory (defaults to current directory)
    #[arg(short, long, global = true)]
    cwd: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new site
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        folder: PathBuf,
    },

    /// Create a new post, page or draft
    New {
        /// Layout to use (post, page, draft); defaults to `default_layout`
        #[arg(short, long)]
        layout: Option<String>,

        /// Title of the new document
        title: String,

        /// File path relative to the layout's directory
        #[arg(short, long)]
        path: Option<String>,
    },

    /// Move a draft into _posts
    Publish {
        /// Draft file name, with or without extension
        name: String,
    },

    /// Generate static files
    #[command(alias = "g")]
    Generate {
        /// Watch for file changes
        #[arg(short, long)]
        watch: bool,

        /// Include drafts
        #[arg(long)]
        drafts: bool,
    },

    /// Start a local server
    #[command(alias = "s")]
    Server {
        /// Port to listen on
        #[arg(short, long, default_value = "4000")]
        port: u16,

        /// IP address to bind to
        #[arg(short, long, default_value = "localhost")]
        ip: String,

        /// Open browser automatically
        #[arg(short, long)]
        open: bool,

        /// Enable static mode (no file watching)
        #[arg(long)]
        r#static: bool,

        /// Include drafts
        #[arg(long)]
        drafts: bool,
    },

    /// Check front-matter, footnotes, links and assets
    Check {
        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,

        /// Include drafts
        #[arg(long)]
        drafts: bool,

        /// Report format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Clean the public folder
    Clean,

    /// List site information
    List {
        /// Type of content to list (post, page, draft, tag, footnote)
        #[arg(default_value = "post")]
        r#type: String,
    },

    /// Display version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        "quillpress=debug,info"
    } else {
        "quillpress=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Determine base directory
    let base_dir = match cli.cwd {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    match cli.command {
        Commands::Init { folder } => {
            let target_dir = if folder.is_absolute() {
                folder
            } else {
                base_dir.join(folder)
            };
            tracing::info!("Initializing site in {:?}", target_dir);
            commands::init::init_site(&target_dir)?;
            println!("Initialized empty site in {:?}", target_dir);
        }

        Commands::New {
            layout,
            title,
            path,
        } => {
            let site = Site::new(&base_dir)?;
            let layout = layout.unwrap_or_else(|| site.config.default_layout.clone());
            tracing::info!("Creating new {} with title: {}", layout, title);
            let created = commands::new::create_post(&site, &title, &layout, path.as_deref())?;
            println!("Created {}", created.display());
        }

        Commands::Publish { name } => {
            let site = Site::new(&base_dir)?;
            let published = commands::publish::run(&site, &name)?;
            println!("Published {}", published.display());
        }

        Commands::Generate { watch, drafts } => {
            let site = Site::new(&base_dir)?.with_drafts(drafts);
            tracing::info!("Generating static files...");

            let stats = commands::generate::run(&site)?;
            println!(
                "Generated {} posts, {} pages, {} tags and {} assets",
                stats.posts, stats.pages, stats.tags, stats.assets
            );

            if watch {
                tracing::info!("Watching for file changes...");
                commands::generate::watch(&site).await?;
            }
        }

        Commands::Server {
            port,
            ip,
            open,
            r#static,
            drafts,
        } => {
            let site = Site::new(&base_dir)?.with_drafts(drafts);

            // Generate first
            tracing::info!("Generating static files...");
            site.generate()?;

            tracing::info!("Starting server at http://{}:{}", ip, port);
            quillpress::server::start(&site, &ip, port, !r#static, open).await?;
        }

        Commands::Check {
            strict,
            drafts,
            format,
        } => {
            let site = Site::new(&base_dir)?.with_drafts(drafts);
            if commands::check::run(&site, strict, format)? {
                std::process::exit(1);
            }
        }

        Commands::Clean => {
            let site = Site::new(&base_dir)?;
            tracing::info!("Cleaning public folder...");
            site.clean()?;
            println!("Cleaned successfully!");
        }

        Commands::List { r#type } => {
            let site = Site::new(&base_dir)?;
            commands::list::run(&site, &r#type)?;
        }

        Commands::Version => {
            println!("quillpress version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
