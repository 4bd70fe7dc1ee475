//! Create a new post, page or draft from a scaffold

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs;
use std::path::PathBuf;

use super::init::default_scaffold;
use crate::Site;

/// Create a new post/page/draft and return its path
pub fn create_post(site: &Site, title: &str, layout: &str, path: Option<&str>) -> Result<PathBuf> {
    let now = Local::now();
    let slug = slug::slugify(title);
    if slug.is_empty() && path.is_none() {
        anyhow::bail!("Cannot derive a file name from title {:?}", title);
    }

    let file_path = match (layout, path) {
        ("post" | "page" | "draft", Some(p)) => {
            let dir = match layout {
                "post" => site.source_dir.join("_posts"),
                "draft" => site.source_dir.join("_drafts"),
                _ => site.source_dir.clone(),
            };
            dir.join(format!("{}.md", p.trim_matches('/').trim_end_matches(".md")))
        }
        ("post", None) => site
            .source_dir
            .join("_posts")
            .join(post_file_name(&site.config.new_post_name, &slug, &now)),
        ("draft", None) => site.source_dir.join("_drafts").join(format!("{}.md", slug)),
        ("page", None) => site.source_dir.join(&slug).join("index.md"),
        (other, _) => anyhow::bail!("Unknown layout: {}. Available: post, page, draft", other),
    };

    if file_path.exists() {
        anyhow::bail!("File already exists: {:?}", file_path);
    }

    let scaffold_path = site
        .base_dir
        .join("scaffolds")
        .join(format!("{}.md", layout));
    let scaffold = if scaffold_path.exists() {
        fs::read_to_string(&scaffold_path)
            .with_context(|| format!("Failed to read {:?}", scaffold_path))?
    } else {
        default_scaffold(layout).to_string()
    };

    let content = scaffold
        .replace("{{ title }}", &yaml_scalar(title))
        .replace("{{ date }}", &now.format("%Y-%m-%d %H:%M:%S").to_string());

    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&file_path, content).with_context(|| format!("Failed to write {:?}", file_path))?;

    tracing::info!("Created: {:?}", file_path);
    Ok(file_path)
}

/// Run the new command with the site's default layout
pub fn run(site: &Site, title: &str, layout: Option<&str>) -> Result<PathBuf> {
    let layout = layout.unwrap_or(&site.config.default_layout);
    create_post(site, title, layout, None)
}

/// Expand `new_post_name` (`:year-:month-:day-:title.md`)
pub fn post_file_name(pattern: &str, slug: &str, date: &DateTime<Local>) -> String {
    let name = pattern
        .replace(":title", slug)
        .replace(":year", &date.format("%Y").to_string())
        .replace(":month", &date.format("%m").to_string())
        .replace(":day", &date.format("%d").to_string())
        .replace(":i_month", &date.format("%-m").to_string())
        .replace(":i_day", &date.format("%-d").to_string());

    if name.ends_with(".md") || name.ends_with(".markdown") {
        name
    } else {
        format!("{}.md", name)
    }
}

/// Quote a front-matter value when plain YAML would misread it
fn yaml_scalar(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value.starts_with(['-', '?', ' ', '!', '&', '*', '|', '>', '%', '@', '`'])
        || value.ends_with(' ')
        || value.contains([':', '#', '[', ']', '{', '}', ',', '"', '\''])
        || matches!(
            value.to_ascii_lowercase().as_str(),
            "true" | "false" | "yes" | "no" | "null" | "~"
        )
        || value.parse::<f64>().is_ok();

    if needs_quotes {
        // A JSON string is a valid double-quoted YAML scalar
        serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value))
    } else {
        value.to_string()
    }
}
