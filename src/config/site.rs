//! Site configuration (_config.yml)

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub author: String,
    pub language: String,
    pub timezone: String,

    // URL
    pub url: String,
    pub root: String,
    pub permalink: String,

    // Directory
    pub source_dir: String,
    pub public_dir: String,
    pub tag_dir: String,
    pub archive_dir: String,
    #[serde(default)]
    pub exclude: Vec<String>,

    // Writing
    pub new_post_name: String,
    pub default_layout: String,
    pub render_drafts: bool,
    pub future: bool,
    pub date_format: String,
    #[serde(default)]
    pub highlight: HighlightConfig,

    // Pagination
    pub per_page: usize,

    // Linting
    #[serde(default)]
    pub check: CheckConfig,

    // Store any additional fields
    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Quillpress".to_string(),
            subtitle: String::new(),
            description: String::new(),
            author: String::new(),
            language: "en".to_string(),
            timezone: String::new(),

            url: "http://example.com".to_string(),
            root: "/".to_string(),
            permalink: ":year/:month/:day/:title/".to_string(),

            source_dir: "source".to_string(),
            public_dir: "public".to_string(),
            tag_dir: "tags".to_string(),
            archive_dir: "archives".to_string(),
            exclude: Vec::new(),

            new_post_name: ":year-:month-:day-:title.md".to_string(),
            default_layout: "post".to_string(),
            render_drafts: false,
            future: true,
            date_format: "YYYY-MM-DD".to_string(),
            highlight: HighlightConfig::default(),

            per_page: 10,

            check: CheckConfig::default(),
            extra: HashMap::new(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        let config: SiteConfig =
            serde_yaml::from_str(&content).with_context(|| format!("Invalid config {:?}", path))?;

        if !config.timezone.is_empty() && config.timezone.parse::<chrono_tz::Tz>().is_err() {
            tracing::warn!(
                "Unknown timezone {:?} in config, falling back to local time",
                config.timezone
            );
        }

        Ok(config)
    }

    /// Interpret a naive front-matter timestamp in the configured timezone
    pub fn localize(&self, naive: NaiveDateTime) -> Option<DateTime<Local>> {
        match self.timezone.parse::<chrono_tz::Tz>() {
            Ok(tz) if !self.timezone.is_empty() => tz
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Local)),
            _ => Local.from_local_datetime(&naive).earliest(),
        }
    }

    /// A timestamp as seen in the configured timezone
    pub fn in_timezone(&self, dt: &DateTime<Local>) -> DateTime<FixedOffset> {
        match self.timezone.parse::<chrono_tz::Tz>() {
            Ok(tz) if !self.timezone.is_empty() => dt.with_timezone(&tz).fixed_offset(),
            _ => dt.fixed_offset(),
        }
    }

    /// Calendar date of a timestamp as seen in the configured timezone
    pub fn local_date(&self, dt: &DateTime<Local>) -> NaiveDate {
        self.in_timezone(dt).date_naive()
    }
}

/// Syntax highlighting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    pub theme: String,
    pub line_number: bool,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            theme: "base16-ocean.dark".to_string(),
            line_number: false,
        }
    }
}

/// Content linter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    pub require_author: bool,
    pub strict: bool,
    pub todo_markers: Vec<String>,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            require_author: true,
            strict: false,
            todo_markers: vec!["[TODO]".to_string(), "TODO:".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_default_config() {
        let config = SiteConfig::default();
        assert_eq!(config.title, "Quillpress");
        assert_eq!(config.per_page, 10);
        assert!(config.check.require_author);
        assert!(!config.render_drafts);
    }

    #[test]
    fn test_parse_config() {
        let yaml = r#"
title: Interpreter Notes
author: Jane Roe
per_page: 5
exclude:
  - "notes/*.md"
check:
  strict: true
  todo_markers: ["[TODO]"]
github: someone
"#;
        let config: SiteConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.title, "Interpreter Notes");
        assert_eq!(config.author, "Jane Roe");
        assert_eq!(config.per_page, 5);
        assert_eq!(config.exclude, vec!["notes/*.md"]);
        assert!(config.check.strict);
        assert!(config.check.require_author);
        assert_eq!(config.check.todo_markers, vec!["[TODO]"]);
        assert!(config.extra.contains_key("github"));
    }

    #[test]
    fn test_localize_with_timezone() {
        let config = SiteConfig {
            timezone: "Europe/London".to_string(),
            ..Default::default()
        };
        let naive = NaiveDateTime::parse_from_str("2024-01-15 10:30:00", "%Y-%m-%d %H:%M:%S")
            .unwrap();
        let dt = config.localize(naive).unwrap();
        let utc = dt.with_timezone(&chrono::Utc);
        // London is UTC+0 in January
        assert_eq!(utc.hour(), 10);
        assert_eq!(utc.minute(), 30);
        assert_eq!(config.in_timezone(&dt).to_rfc3339(), "2024-01-15T10:30:00+00:00");
        assert_eq!(config.local_date(&dt).to_string(), "2024-01-15");
    }
}
