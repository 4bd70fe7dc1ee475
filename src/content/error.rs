//! Typed errors raised while reading content

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("front-matter opened with `---` is never closed")]
    UnterminatedFrontMatter,

    #[error("invalid YAML front-matter: {0}")]
    InvalidYaml(String),

    #[error("invalid JSON front-matter: {0}")]
    InvalidJson(String),

    #[error("unknown layout `{0}` (expected `post` or `page`)")]
    UnknownLayout(String),
}
