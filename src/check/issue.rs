//! Findings reported by the content checker

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// How serious a finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// A problem found in a document
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Issue {
    #[error("invalid front-matter: {0}")]
    InvalidFrontMatter(String),

    #[error("missing required front-matter field `{0}`")]
    MissingField(&'static str),

    #[error("unknown layout `{0}` (expected `post` or `page`)")]
    UnknownLayout(String),

    #[error("slug `{slug}` is also used by {other}")]
    DuplicateSlug { slug: String, other: String },

    #[error("title \"{title}\" is also used by {other}")]
    DuplicateTitle { title: String, other: String },

    #[error("output path `{path}` is also produced by {other}")]
    DuplicatePath { path: String, other: String },

    #[error("footnote reference `[^{0}]` has no definition")]
    UndefinedFootnote(String),

    #[error("footnote `[^{0}]` is defined more than once")]
    DuplicateFootnote(String),

    #[error("footnote `[^{0}]` is never referenced")]
    UnusedFootnote(String),

    #[error("anchor `#{0}` does not exist in this document")]
    BrokenAnchor(String),

    #[error("link target `{0}` does not exist")]
    BrokenLink(String),

    #[error("link target `{0}` is not published (draft, `published: false` or future-dated)")]
    UnpublishedLink(String),

    #[error("anchor `#{fragment}` does not exist in `{target}`")]
    BrokenLinkAnchor { target: String, fragment: String },

    #[error("image or asset `{0}` does not exist")]
    MissingAsset(String),

    #[error("editorial marker `{0}` left in text")]
    TodoMarker(String),

    #[error("filename date {filename} disagrees with front-matter date {front_matter}")]
    DateMismatch {
        filename: String,
        front_matter: String,
    },
}

impl Issue {
    /// Default severity before `strict` promotion
    pub fn severity(&self) -> Severity {
        match self {
            Issue::UnusedFootnote(_) | Issue::TodoMarker(_) | Issue::DateMismatch { .. } => {
                Severity::Warning
            }
            _ => Severity::Error,
        }
    }

    /// Stable machine-readable identifier
    pub fn code(&self) -> &'static str {
        match self {
            Issue::InvalidFrontMatter(_) => "invalid-front-matter",
            Issue::MissingField(_) => "missing-field",
            Issue::UnknownLayout(_) => "unknown-layout",
            Issue::DuplicateSlug { .. } => "duplicate-slug",
            Issue::DuplicateTitle { .. } => "duplicate-title",
            Issue::DuplicatePath { .. } => "duplicate-path",
            Issue::UndefinedFootnote(_) => "undefined-footnote",
            Issue::DuplicateFootnote(_) => "duplicate-footnote",
            Issue::UnusedFootnote(_) => "unused-footnote",
            Issue::BrokenAnchor(_) => "broken-anchor",
            Issue::BrokenLink(_) => "broken-link",
            Issue::UnpublishedLink(_) => "unpublished-link",
            Issue::BrokenLinkAnchor { .. } => "broken-link-anchor",
            Issue::MissingAsset(_) => "missing-asset",
            Issue::TodoMarker(_) => "todo-marker",
            Issue::DateMismatch { .. } => "date-mismatch",
        }
    }
}

/// One finding, located in a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Source path relative to the site's base directory
    pub source: String,
    pub line: Option<usize>,
    pub issue: Issue,
}

impl Diagnostic {
    pub fn new(source: &str, line: Option<usize>, issue: Issue) -> Self {
        Self {
            severity: issue.severity(),
            source: source.to_string(),
            line,
            issue,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}: {}: {}", self.source, line, self.severity, self.issue),
            None => write!(f, "{}: {}: {}", self.source, self.severity, self.issue),
        }
    }
}
