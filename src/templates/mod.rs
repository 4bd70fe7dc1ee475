//! Built-in blog templates using the Tera template engine
//!
//! The templates are embedded in the binary; a site needs no theme directory.

use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;
use tera::{Context, Tera};

use crate::config::SiteConfig;
use crate::helpers;

/// Template renderer with the embedded blog theme
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    /// Create a new renderer with all templates loaded
    pub fn new(config: &SiteConfig) -> Result<Self> {
        let mut tera = Tera::default();

        // Rendered Markdown is inserted verbatim; templates escape titles explicitly
        tera.autoescape_on(vec![]);

        tera.add_raw_templates(vec![
            ("layout.html", include_str!("blog/layout.html")),
            ("index.html", include_str!("blog/index.html")),
            ("post.html", include_str!("blog/post.html")),
            ("page.html", include_str!("blog/page.html")),
            ("archive.html", include_str!("blog/archive.html")),
            ("tags.html", include_str!("blog/tags.html")),
            ("tag.html", include_str!("blog/tag.html")),
            ("partials/meta.html", include_str!("blog/partials/meta.html")),
            ("partials/pager.html", include_str!("blog/partials/pager.html")),
        ])?;

        tera.register_filter("strip_html", strip_html_filter);
        tera.register_filter("truncate_chars", truncate_chars_filter);
        tera.register_filter("date_format", date_format_filter);
        tera.register_function("url_for", make_url_for(config.clone()));

        Ok(Self { tera })
    }

    /// Render a template with given context
    pub fn render(&self, template_name: &str, context: &Context) -> Result<String> {
        Ok(self.tera.render(template_name, context)?)
    }
}

/// Tera function: `url_for(path="...")` prefixes the site root
fn make_url_for(config: SiteConfig) -> impl tera::Function {
    move |args: &HashMap<String, tera::Value>| -> tera::Result<tera::Value> {
        let path = match args.get("path") {
            Some(val) => tera::try_get_value!("url_for", "path", String, val),
            None => String::new(),
        };
        Ok(tera::Value::String(helpers::url_for(&config, &path)))
    }
}

/// Tera filter: strip HTML tags
fn strip_html_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("strip_html", "value", String, value);
    Ok(tera::Value::String(helpers::strip_html(&s)))
}

/// Tera filter: truncate by character count
fn truncate_chars_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("truncate_chars", "value", String, value);
    let length = match args.get("length") {
        Some(val) => tera::try_get_value!("truncate_chars", "length", usize, val),
        None => 150,
    };
    let omission = match args.get("omission") {
        Some(val) => tera::try_get_value!("truncate_chars", "omission", String, val),
        None => " ...".to_string(),
    };

    Ok(tera::Value::String(helpers::truncate(
        s.trim(),
        length,
        Some(&omission),
    )))
}

/// Tera filter: format an RFC 3339 timestamp with a Moment.js-style format
fn date_format_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("date_format", "value", String, value);
    let format = match args.get("format") {
        Some(val) => tera::try_get_value!("date_format", "format", String, val),
        None => "YYYY-MM-DD".to_string(),
    };

    match chrono::DateTime::parse_from_rfc3339(&s) {
        Ok(date) => Ok(tera::Value::String(helpers::format_date(&date, &format))),
        // Not a timestamp; leave it as written
        Err(_) => Ok(tera::Value::String(s)),
    }
}

// Data structures for template context

#[derive(Debug, Clone, Serialize)]
pub struct SiteData {
    /// Pages linked from the navigation bar
    pub pages: Vec<NavPost>,
    pub post_count: usize,
    pub tag_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TagLink {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostData {
    pub title: String,
    /// RFC 3339 timestamp in the site timezone
    pub date_iso: String,
    pub path: String,
    pub permalink: String,
    pub authors: Vec<String>,
    pub tags: Vec<TagLink>,
    pub content: String,
    pub excerpt: Option<String>,
    pub draft: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageData {
    pub title: String,
    pub date_iso: String,
    pub path: String,
    pub permalink: String,
    pub authors: Vec<String>,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaginationData {
    pub per_page: usize,
    pub total: usize,
    pub current: usize,
    pub current_url: String,
    pub prev_link: String,
    pub next_link: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NavPost {
    pub title: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveYearData {
    pub year: i32,
    pub posts: Vec<PostData>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TagData {
    pub name: String,
    pub slug: String,
    pub path: String,
    pub posts: Vec<PostData>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigData {
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub author: String,
    pub language: String,
    pub url: String,
    pub root: String,
    pub tag_dir: String,
    pub archive_dir: String,
    pub date_format: String,
    pub per_page: usize,
}

impl From<&SiteConfig> for ConfigData {
    fn from(config: &SiteConfig) -> Self {
        Self {
            title: config.title.clone(),
            subtitle: config.subtitle.clone(),
            description: config.description.clone(),
            author: config.author.clone(),
            language: config.language.clone(),
            url: config.url.clone(),
            root: config.root.clone(),
            tag_dir: config.tag_dir.trim_matches('/').to_string(),
            archive_dir: config.archive_dir.trim_matches('/').to_string(),
            date_format: config.date_format.clone(),
            per_page: config.per_page,
        }
    }
}
