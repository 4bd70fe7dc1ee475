//! Content module - handles posts, pages, footnotes, links and rendering

mod error;
pub mod footnote;
mod frontmatter;
pub mod links;
pub mod loader;
mod markdown;
mod post;
pub mod prose;

pub use error::ContentError;
pub use footnote::{Footnote, FootnoteIndex, FootnoteRef};
pub use frontmatter::{parse_date_string, FrontMatter};
pub use links::{LinkKind, LinkRef};
pub use loader::{ContentLoader, Corpus};
pub use markdown::MarkdownRenderer;
pub use post::{FileStem, Layout, Page, Post};
