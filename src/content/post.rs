//! Post and Page models

use chrono::{DateTime, Local, NaiveDate};
use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::footnote::FootnoteIndex;
use super::links::LinkRef;
use super::ContentError;

lazy_static! {
    static ref DATED_FILENAME: Regex =
        Regex::new(r"^(\d{4})-(\d{2})-(\d{2})-(.+)$").expect("valid regex");
}

/// Rendering layout of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    Post,
    Page,
}

impl FromStr for Layout {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "post" => Ok(Layout::Post),
            "page" => Ok(Layout::Page),
            other => Err(ContentError::UnknownLayout(other.to_string())),
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::Post => f.write_str("post"),
            Layout::Page => f.write_str("page"),
        }
    }
}

/// Date and slug encoded in a source filename.
///
/// `2023-05-14-inline-caching.md` carries both; `about.md` only a slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStem {
    pub date: Option<NaiveDate>,
    pub slug: String,
}

impl FileStem {
    pub fn from_path(path: &Path) -> Self {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("untitled");

        if let Some(caps) = DATED_FILENAME.captures(stem) {
            let date = NaiveDate::from_ymd_opt(
                caps[1].parse().unwrap_or(0),
                caps[2].parse().unwrap_or(0),
                caps[3].parse().unwrap_or(0),
            );
            if date.is_some() {
                return Self {
                    date,
                    slug: slug::slugify(&caps[4]),
                };
            }
        }

        Self {
            date: None,
            slug: slug::slugify(stem),
        }
    }
}

/// A blog post
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    /// Post title
    pub title: String,

    /// Publication date
    pub date: DateTime<Local>,

    /// Last updated date
    pub updated: Option<DateTime<Local>>,

    /// Authors, in front-matter order
    pub authors: Vec<String>,

    /// Raw markdown content
    pub raw: String,

    /// Rendered HTML content
    pub content: String,

    /// Post excerpt (before <!-- more -->)
    pub excerpt: Option<String>,

    /// Post tags
    pub tags: Vec<String>,

    /// Post categories
    pub categories: Vec<String>,

    /// Layout as written in front-matter (validated by the checker)
    pub layout: Option<String>,

    /// Source file path (relative to the source dir)
    pub source: String,

    /// Full source file path
    pub full_source: PathBuf,

    /// URL path (with root)
    pub path: String,

    /// Full permalink URL
    pub permalink: String,

    /// Slug (URL-friendly name)
    pub slug: String,

    /// Date encoded in the filename, if any
    pub filename_date: Option<NaiveDate>,

    /// Whether the post lives in `_drafts`
    pub draft: bool,

    /// Whether the post is published
    pub published: bool,

    /// Whether comments are enabled
    pub comments: bool,

    /// Line number of the first body line in the source file
    pub body_line: usize,

    /// Footnotes declared and referenced in the body
    #[serde(skip)]
    pub footnotes: FootnoteIndex,

    /// Outgoing links and images
    #[serde(skip)]
    pub links: Vec<LinkRef>,

    /// Anchor ids available in the rendered document
    #[serde(skip)]
    pub anchors: BTreeSet<String>,

    /// Strict front-matter parse failure, if any
    #[serde(skip)]
    pub front_matter_error: Option<String>,

    /// Whether the front-matter names a title
    #[serde(skip)]
    pub has_title: bool,

    /// Custom front-matter fields
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_yaml::Value>,
}

impl Post {
    /// Create a new post with minimal required fields
    pub fn new(title: String, date: DateTime<Local>, source: String) -> Self {
        let slug = slug::slugify(&title);
        Self {
            title,
            date,
            updated: None,
            authors: Vec::new(),
            raw: String::new(),
            content: String::new(),
            excerpt: None,
            tags: Vec::new(),
            categories: Vec::new(),
            layout: None,
            source: source.clone(),
            full_source: PathBuf::from(&source),
            path: String::new(),
            permalink: String::new(),
            slug,
            filename_date: None,
            draft: false,
            published: true,
            comments: true,
            body_line: 1,
            footnotes: FootnoteIndex::default(),
            links: Vec::new(),
            anchors: BTreeSet::new(),
            front_matter_error: None,
            has_title: true,
            extra: IndexMap::new(),
        }
    }

    /// Get the previous (newer) post in a newest-first list
    pub fn prev<'a>(&self, posts: &'a [Post]) -> Option<&'a Post> {
        let pos = posts.iter().position(|p| p.source == self.source)?;
        if pos > 0 {
            Some(&posts[pos - 1])
        } else {
            None
        }
    }

    /// Get the next (older) post in a newest-first list
    pub fn next<'a>(&self, posts: &'a [Post]) -> Option<&'a Post> {
        let pos = posts.iter().position(|p| p.source == self.source)?;
        posts.get(pos + 1)
    }
}

/// A standalone page
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    /// Page title
    pub title: String,

    /// Last modification time, used for the feed and sitemap-ish listings
    pub date: DateTime<Local>,

    /// Authors, in front-matter order
    pub authors: Vec<String>,

    /// Raw markdown content
    pub raw: String,

    /// Rendered HTML content
    pub content: String,

    /// Layout as written in front-matter
    pub layout: Option<String>,

    /// Source file path (relative)
    pub source: String,

    /// Full source file path
    pub full_source: PathBuf,

    /// URL path (with root)
    pub path: String,

    /// Full permalink URL
    pub permalink: String,

    /// Line number of the first body line in the source file
    pub body_line: usize,

    #[serde(skip)]
    pub footnotes: FootnoteIndex,

    #[serde(skip)]
    pub links: Vec<LinkRef>,

    #[serde(skip)]
    pub anchors: BTreeSet<String>,

    #[serde(skip)]
    pub front_matter_error: Option<String>,

    #[serde(skip)]
    pub has_title: bool,

    /// Custom front-matter fields
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_yaml::Value>,
}

impl Page {
    /// Create a new page with minimal required fields
    pub fn new(title: String, date: DateTime<Local>, source: String) -> Self {
        Self {
            title,
            date,
            authors: Vec::new(),
            raw: String::new(),
            content: String::new(),
            layout: None,
            source: source.clone(),
            full_source: PathBuf::from(&source),
            path: String::new(),
            permalink: String::new(),
            body_line: 1,
            footnotes: FootnoteIndex::default(),
            links: Vec::new(),
            anchors: BTreeSet::new(),
            front_matter_error: None,
            has_title: true,
            extra: IndexMap::new(),
        }
    }
}
