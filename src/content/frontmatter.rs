//! Front-matter parsing

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use super::ContentError;
use crate::config::SiteConfig;

/// Custom deserializer that handles both a single string and a list of strings
fn string_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, SeqAccess, Visitor};
    use std::fmt;

    struct StringOrVec;

    impl<'de> Visitor<'de> for StringOrVec {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or a list of strings")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(vec![value.to_string()])
        }

        fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(vec![value])
        }

        fn visit_seq<S>(self, mut seq: S) -> Result<Self::Value, S::Error>
        where
            S: SeqAccess<'de>,
        {
            let mut vec = Vec::new();
            while let Some(item) = seq.next_element::<String>()? {
                vec.push(item);
            }
            Ok(vec)
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Vec::new())
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Vec::new())
        }
    }

    deserializer.deserialize_any(StringOrVec)
}

/// Front-matter data from a post or page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub date: Option<String>,
    pub updated: Option<String>,
    /// Kept as written so an unknown layout can be reported by name
    pub layout: Option<String>,
    #[serde(alias = "authors", deserialize_with = "string_or_vec", default)]
    pub author: Vec<String>,
    #[serde(deserialize_with = "string_or_vec", default)]
    pub tags: Vec<String>,
    #[serde(deserialize_with = "string_or_vec", default)]
    pub categories: Vec<String>,
    pub slug: Option<String>,
    pub permalink: Option<String>,
    pub excerpt: Option<String>,
    #[serde(default = "default_published")]
    pub published: bool,
    pub comments: bool,

    /// Additional custom fields, in the order they were written
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_yaml::Value>,
}

fn default_published() -> bool {
    true
}

impl Default for FrontMatter {
    fn default() -> Self {
        Self {
            title: None,
            date: None,
            updated: None,
            layout: None,
            author: Vec::new(),
            tags: Vec::new(),
            categories: Vec::new(),
            slug: None,
            permalink: None,
            excerpt: None,
            published: true,
            comments: false,
            extra: IndexMap::new(),
        }
    }
}

/// The raw front-matter block located at the top of a document
enum Block<'a> {
    Absent,
    Yaml { yaml: &'a str, body: &'a str },
    Json { json: &'a str, body: &'a str },
    Unterminated,
}

impl FrontMatter {
    /// Parse front-matter leniently, for rendering.
    /// Returns (front_matter, remaining_content)
    pub fn parse(content: &str) -> (Self, &str) {
        let trimmed = content.trim_start();
        match locate(trimmed) {
            Block::Absent | Block::Unterminated => (FrontMatter::default(), trimmed),
            Block::Yaml { yaml, body } => match parse_yaml(yaml) {
                Ok(fm) => (fm, body),
                Err(e) => {
                    tracing::warn!("Failed to parse front-matter, treating as content: {}", e);
                    (FrontMatter::default(), trimmed)
                }
            },
            Block::Json { json, body } => match parse_json(json) {
                Ok(fm) => (fm, body),
                Err(e) => {
                    tracing::warn!("Failed to parse front-matter, treating as content: {}", e);
                    (FrontMatter::default(), trimmed)
                }
            },
        }
    }

    /// Parse front-matter and report any malformed block
    pub fn parse_strict(content: &str) -> Result<(Self, &str), ContentError> {
        let trimmed = content.trim_start();
        match locate(trimmed) {
            Block::Absent => Ok((FrontMatter::default(), trimmed)),
            Block::Unterminated => Err(ContentError::UnterminatedFrontMatter),
            Block::Yaml { yaml, body } => Ok((parse_yaml(yaml)?, body)),
            Block::Json { json, body } => Ok((parse_json(json)?, body)),
        }
    }

    /// Parse the date string in the site's timezone
    pub fn parse_date(&self, config: &SiteConfig) -> Option<DateTime<Local>> {
        self.date
            .as_ref()
            .and_then(|s| parse_date_string(s, config))
    }

    /// Parse the updated date string in the site's timezone
    pub fn parse_updated(&self, config: &SiteConfig) -> Option<DateTime<Local>> {
        self.updated
            .as_ref()
            .and_then(|s| parse_date_string(s, config))
    }
}

fn locate(content: &str) -> Block<'_> {
    if content.starts_with("---") {
        return locate_yaml(content);
    }

    if let Some(rest) = content.strip_prefix(";;;") {
        return match rest.find(";;;") {
            Some(end_pos) => Block::Json {
                json: &rest[..end_pos],
                body: rest[end_pos + 3..].trim_start_matches(['\n', '\r']),
            },
            None => Block::Unterminated,
        };
    }

    if content.starts_with('{') {
        // Find matching closing brace, skipping braces inside strings
        let mut depth = 0;
        let mut in_string = false;
        let mut escaped = false;
        for (i, c) in content.char_indices() {
            if in_string {
                match c {
                    _ if escaped => escaped = false,
                    '\\' => escaped = true,
                    '"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match c {
                '"' => in_string = true,
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Block::Json {
                            json: &content[..i + 1],
                            body: content[i + 1..].trim_start_matches(['\n', '\r']),
                        };
                    }
                }
                _ => {}
            }
        }
        // An unbalanced brace is prose, not metadata
        return Block::Absent;
    }

    Block::Absent
}

fn locate_yaml(content: &str) -> Block<'_> {
    let rest = content[3..].trim_start_matches(['\n', '\r']);

    match rest.find("\n---") {
        Some(end_pos) => {
            let yaml = &rest[..end_pos];
            let body = rest[end_pos + 4..].trim_start_matches(['\n', '\r']);

            if yaml.trim().is_empty() {
                return Block::Yaml { yaml, body };
            }

            // A leading `---` is also a thematic break; only treat it as
            // front-matter when the block has `key: value` structure.
            if yaml.lines().any(looks_like_yaml_key) {
                Block::Yaml { yaml, body }
            } else {
                Block::Absent
            }
        }
        None => {
            let first = rest.lines().find(|l| !l.trim().is_empty());
            if first.map(looks_like_yaml_key).unwrap_or(false) {
                Block::Unterminated
            } else {
                Block::Absent
            }
        }
    }
}

/// Whether a line reads as a YAML `key:` entry rather than prose
fn looks_like_yaml_key(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return false;
    }
    let Some(colon_pos) = trimmed.find(':') else {
        return false;
    };
    let key = &trimmed[..colon_pos];
    let is_valid_key = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        && !matches!(key, "http" | "https" | "ftp" | "mailto");
    if !is_valid_key {
        return false;
    }
    let after_colon = &trimmed[colon_pos + 1..];
    after_colon.is_empty() || after_colon.starts_with(' ')
}

fn parse_yaml(yaml: &str) -> Result<FrontMatter, ContentError> {
    if yaml.trim().is_empty() {
        return Ok(FrontMatter::default());
    }
    serde_yaml::from_str::<FrontMatter>(yaml).map_err(|e| ContentError::InvalidYaml(e.to_string()))
}

fn parse_json(json: &str) -> Result<FrontMatter, ContentError> {
    serde_json::from_str::<FrontMatter>(json).map_err(|e| ContentError::InvalidJson(e.to_string()))
}

/// Parse a date string in various formats
pub fn parse_date_string(s: &str, config: &SiteConfig) -> Option<DateTime<Local>> {
    let s = s.trim();

    // Explicit offsets win over the configured timezone
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Local));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%d %H:%M:%S %z", "%Y-%m-%dT%H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Local));
        }
    }

    let formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
    ];
    for fmt in formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return config.localize(dt);
        }
    }

    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return config.localize(d.and_hms_opt(0, 0, 0)?);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yaml_frontmatter() {
        let content = r#"---
layout: post
title: Inline caching in an AST interpreter
author:
  - Jane Roe
  - John Doe
date: 2024-01-15 10:30:00
tags: [interpreters, performance]
---

This is the content.
"#;

        let (fm, remaining) = FrontMatter::parse(content);
        assert_eq!(fm.title.as_deref(), Some("Inline caching in an AST interpreter"));
        assert_eq!(fm.layout.as_deref(), Some("post"));
        assert_eq!(fm.author, vec!["Jane Roe", "John Doe"]);
        assert_eq!(fm.tags, vec!["interpreters", "performance"]);
        assert!(remaining.starts_with("This is the content."));
    }

    #[test]
    fn test_single_author_and_alias() {
        let content = "---\ntitle: About\nauthors: Jane Roe\n---\nbody\n";
        let (fm, _) = FrontMatter::parse_strict(content).unwrap();
        assert_eq!(fm.author, vec!["Jane Roe"]);
    }

    #[test]
    fn test_parse_json_frontmatter() {
        let content = r#"{"title": "Test Post", "tags": ["a", "b"]}

This is content.
"#;

        let (fm, remaining) = FrontMatter::parse(content);
        assert_eq!(fm.title, Some("Test Post".to_string()));
        assert_eq!(fm.tags, vec!["a", "b"]);
        assert!(remaining.contains("This is content."));
    }

    #[test]
    fn test_json_braces_inside_strings() {
        let content = "{\"title\": \"a } b\", \"note\": \"say \\\"{\\\"\"}\nBody {here}\n";
        let (fm, remaining) = FrontMatter::parse_strict(content).unwrap();
        assert_eq!(fm.title.as_deref(), Some("a } b"));
        assert_eq!(remaining, "Body {here}\n");
    }

    #[test]
    fn test_extra_fields_keep_order() {
        let content = "---\ntitle: T\nzeta: 1\nalpha: 2\n---\n";
        let (fm, _) = FrontMatter::parse(content);
        let keys: Vec<_> = fm.extra.keys().cloned().collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_parse_date() {
        let fm = FrontMatter {
            date: Some("2024-01-15 10:30:00".to_string()),
            ..Default::default()
        };

        let dt = fm.parse_date(&SiteConfig::default()).unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M").to_string(), "2024-01-15 10:30");
    }

    #[test]
    fn test_parse_date_only() {
        let dt = parse_date_string("2023/05/14", &SiteConfig::default()).unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2023-05-14");
        assert!(parse_date_string("last tuesday", &SiteConfig::default()).is_none());
    }

    #[test]
    fn test_strict_reports_invalid_yaml() {
        let content = "---\ntitle: [unclosed\nlayout: post\n---\nbody\n";
        let err = FrontMatter::parse_strict(content).unwrap_err();
        assert!(matches!(err, ContentError::InvalidYaml(_)));

        // Lenient parsing keeps the document renderable
        let (fm, remaining) = FrontMatter::parse(content);
        assert_eq!(fm.title, None);
        assert!(remaining.contains("body"));
    }

    #[test]
    fn test_strict_reports_unterminated_block() {
        let content = "---\ntitle: Never closed\n\nSome body text\n";
        let err = FrontMatter::parse_strict(content).unwrap_err();
        assert!(matches!(err, ContentError::UnterminatedFrontMatter));
    }

    #[test]
    fn test_markdown_separator_not_yaml() {
        let content = r#"
---

Some random text with markdown lists:
- Item 1
- Item 2

---
More content here.
"#;

        let (fm, remaining) = FrontMatter::parse_strict(content).unwrap();
        assert_eq!(fm.title, None);
        assert!(remaining.contains("Some random text"));
    }

    #[test]
    fn test_content_with_url_not_yaml() {
        let content = r#"
---

Check out https://example.com/path and http://test.com

---
More content.
"#;

        let (fm, remaining) = FrontMatter::parse(content);
        assert_eq!(fm.title, None);
        assert!(remaining.contains("https://example.com"));
    }

    #[test]
    fn test_no_frontmatter() {
        let (fm, remaining) = FrontMatter::parse_strict("# Just a heading\n").unwrap();
        assert!(fm.published);
        assert_eq!(remaining, "# Just a heading\n");
    }
}
