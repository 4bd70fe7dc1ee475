//! Clean the public directory

use anyhow::{Context, Result};
use std::fs;

use crate::Site;

/// Delete the generated site
pub fn run(site: &Site) -> Result<()> {
    if site.public_dir.exists() {
        fs::remove_dir_all(&site.public_dir)
            .with_context(|| format!("Failed to delete {:?}", site.public_dir))?;
        tracing::info!("Deleted: {:?}", site.public_dir);
    } else {
        tracing::debug!("Nothing to clean at {:?}", site.public_dir);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_clean_removes_public_only() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("public/about")).unwrap();
        fs::write(dir.path().join("public/about/index.html"), "x").unwrap();
        fs::create_dir_all(dir.path().join("source")).unwrap();

        let site = Site::new(dir.path()).unwrap();
        run(&site).unwrap();
        assert!(!dir.path().join("public").exists());
        assert!(dir.path().join("source").exists());

        // A second clean is a no-op
        run(&site).unwrap();
    }
}
