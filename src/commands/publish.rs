//! Publish a draft: move it into `_posts` under a dated file name

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};
use std::fs;
use std::path::PathBuf;

use super::new::post_file_name;
use crate::content::{FileStem, FrontMatter};
use crate::Site;

/// Move `_drafts/<name>` into `_posts`, stamping a date if it has none
pub fn run(site: &Site, name: &str) -> Result<PathBuf> {
    let drafts_dir = site.source_dir.join("_drafts");
    let draft = [
        drafts_dir.join(name),
        drafts_dir.join(format!("{}.md", name)),
        drafts_dir.join(format!("{}.markdown", name)),
    ]
    .into_iter()
    .find(|p| p.is_file())
    .ok_or_else(|| anyhow!("No draft named {:?} in {:?}", name, drafts_dir))?;

    let now = Local::now();
    let stem = FileStem::from_path(&draft);
    let target = site
        .source_dir
        .join("_posts")
        .join(post_file_name(&site.config.new_post_name, &stem.slug, &now));
    if target.exists() {
        anyhow::bail!("File already exists: {:?}", target);
    }

    let content =
        fs::read_to_string(&draft).with_context(|| format!("Failed to read {:?}", draft))?;
    let content = with_date(&content, &now)?;

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&target, content).with_context(|| format!("Failed to write {:?}", target))?;
    fs::remove_file(&draft).with_context(|| format!("Failed to remove {:?}", draft))?;

    tracing::info!("Published: {:?} -> {:?}", draft, target);
    Ok(target)
}

/// Add a `date:` line to YAML front-matter that lacks one
fn with_date(content: &str, now: &DateTime<Local>) -> Result<String> {
    let (fm, _) = FrontMatter::parse_strict(content)
        .map_err(|e| anyhow!("Cannot publish a draft with invalid front-matter: {}", e))?;
    if fm.date.is_some() {
        return Ok(content.to_string());
    }

    let stamp = format!("date: {}", now.format("%Y-%m-%d %H:%M:%S"));
    let trimmed = content.trim_start();

    if trimmed.starts_with("---") {
        let split = trimmed.find('\n').map(|i| i + 1).unwrap_or(trimmed.len());
        let (open, rest) = trimmed.split_at(split);
        Ok(format!("{}{}\n{}", open, stamp, rest))
    } else if trimmed.starts_with(";;;") || trimmed.starts_with('{') {
        // JSON front-matter is left alone; the file name carries the date
        tracing::warn!("Draft uses JSON front-matter, not adding a date field");
        Ok(content.to_string())
    } else {
        Ok(format!("---\n{}\n---\n\n{}", stamp, content))
    }
}
