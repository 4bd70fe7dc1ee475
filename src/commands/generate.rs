//! Generate static files

use anyhow::Result;
use notify::Watcher;
use std::sync::mpsc::channel;
use std::time::{Duration, Instant};

use crate::content::ContentLoader;
use crate::generator::{GenerateStats, Generator};
use crate::Site;

/// Load the corpus and render the whole site
pub fn run(site: &Site) -> Result<GenerateStats> {
    let start = Instant::now();

    let corpus = ContentLoader::new(site).load()?;
    tracing::info!(
        "Loaded {} posts, {} drafts and {} pages",
        corpus.posts.len(),
        corpus.drafts.len(),
        corpus.pages.len()
    );

    let stats = Generator::new(site)?.generate(&corpus)?;

    tracing::info!("Generated in {:.2}s", start.elapsed().as_secs_f64());
    Ok(stats)
}

/// Watch the source tree and config, regenerating on change
pub async fn watch(site: &Site) -> Result<()> {
    let (tx, rx) = channel();

    let mut watcher = notify::recommended_watcher(move |res| {
        if let Ok(event) = res {
            let _ = tx.send(event);
        }
    })?;

    watcher.watch(&site.source_dir, notify::RecursiveMode::Recursive)?;

    let config_path = site.base_dir.join("_config.yml");
    if config_path.exists() {
        watcher.watch(&config_path, notify::RecursiveMode::NonRecursive)?;
    }

    tracing::info!("Watching for changes. Press Ctrl+C to stop.");

    let mut last_rebuild = Instant::now();

    loop {
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => {
                // Debounce bursts of events from a single save
                if last_rebuild.elapsed() > Duration::from_millis(500) {
                    tracing::info!("Change detected in {:?}, regenerating...", event.paths);
                    if let Err(e) = reload(site).and_then(|site| run(&site)) {
                        tracing::error!("Generation failed: {:#}", e);
                    }
                    last_rebuild = Instant::now();
                }
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    Ok(())
}

/// Re-read `_config.yml`, keeping command-line overrides
pub fn reload(site: &Site) -> Result<Site> {
    Ok(Site::new(&site.base_dir)?.with_drafts(site.drafts))
}
