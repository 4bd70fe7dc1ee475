//! Outgoing links, images and heading anchors of a Markdown body

use lazy_static::lazy_static;
use percent_encoding::percent_decode_str;
use pulldown_cmark::{Event, LinkType, Options, Parser, Tag, TagEnd};
use regex::Regex;
use std::collections::{BTreeSet, HashMap};

use super::prose::LineIndex;

lazy_static! {
    static ref URI_SCHEME: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").expect("valid regex");
}

/// Markdown extensions shared by the renderer and the link extractor, so
/// both agree on what counts as a link or a heading.
pub fn markdown_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_SMART_PUNCTUATION
        | Options::ENABLE_HEADING_ATTRIBUTES
}

/// Where a link points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// Has a URI scheme or is protocol-relative; never fetched
    External,
    /// `#fragment` within the same document
    Anchor,
    /// Relative path to another Markdown source file
    Document,
    /// Absolute path on the generated site
    Site,
    /// Relative path to an asset or page
    Relative,
    /// Contains template syntax meant for another generator
    Templated,
}

/// A link or image found in a document body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRef {
    pub dest: String,
    pub kind: LinkKind,
    pub image: bool,
    pub line: usize,
}

impl LinkRef {
    pub fn new(dest: &str, image: bool, line: usize) -> Self {
        Self {
            dest: dest.to_string(),
            kind: classify(dest),
            image,
            line,
        }
    }

    /// Path component with query and fragment removed, percent-decoded
    pub fn path(&self) -> String {
        let end = self.dest.find(['#', '?']).unwrap_or(self.dest.len());
        percent_decode_str(&self.dest[..end])
            .decode_utf8_lossy()
            .to_string()
    }

    /// Fragment after `#`, if any
    pub fn fragment(&self) -> Option<String> {
        let (_, frag) = self.dest.split_once('#')?;
        Some(percent_decode_str(frag).decode_utf8_lossy().to_string())
    }
}

/// Classify a link destination
pub fn classify(dest: &str) -> LinkKind {
    let dest = dest.trim();
    if dest.contains("{{") || dest.contains("{%") {
        return LinkKind::Templated;
    }
    if dest.is_empty() || dest.starts_with('#') {
        return LinkKind::Anchor;
    }
    if dest.starts_with("//") || URI_SCHEME.is_match(dest) {
        return LinkKind::External;
    }

    let end = dest.find(['#', '?']).unwrap_or(dest.len());
    let path = dest[..end].to_ascii_lowercase();
    if path.ends_with(".md") || path.ends_with(".markdown") {
        LinkKind::Document
    } else if path.starts_with('/') {
        LinkKind::Site
    } else {
        LinkKind::Relative
    }
}

/// Assigns unique heading ids: an explicit `{#id}`, or the `slug` crate's
/// slug of the heading text (punctuation runs become single hyphens, so
/// `Rc<RefCell<T>>` gives `rc-refcell-t`), suffixed `-1`, `-2`, ... on collision.
#[derive(Debug, Default)]
pub struct AnchorRegistry {
    seen: HashMap<String, usize>,
    ids: BTreeSet<String>,
}

impl AnchorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a heading and return its id
    pub fn heading(&mut self, explicit: Option<&str>, text: &str) -> String {
        let base = match explicit {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                let slug = slug::slugify(text);
                if slug.is_empty() {
                    "section".to_string()
                } else {
                    slug
                }
            }
        };

        let count = self.seen.entry(base.clone()).or_insert(0);
        let id = if *count == 0 {
            base
        } else {
            format!("{}-{}", base, count)
        };
        *count += 1;
        self.ids.insert(id.clone());
        id
    }

    /// Register a non-heading anchor such as a footnote label
    pub fn insert(&mut self, id: &str) {
        self.ids.insert(id.to_string());
    }

    pub fn into_ids(self) -> BTreeSet<String> {
        self.ids
    }
}

/// Links and anchors extracted from one body
#[derive(Debug, Clone, Default)]
pub struct Outline {
    pub links: Vec<LinkRef>,
    pub anchors: BTreeSet<String>,
}

/// Extract links, images and heading anchors. `first_line` is the source
/// line of the body's first line.
pub fn extract(markdown: &str, first_line: usize) -> Outline {
    let lines = LineIndex::new(markdown, first_line);

    let mut outline = Outline::default();
    let mut registry = AnchorRegistry::new();
    let mut heading: Option<(Option<String>, String)> = None;

    for (event, range) in Parser::new_ext(markdown, markdown_options()).into_offset_iter() {
        match event {
            Event::Start(Tag::Link {
                link_type,
                dest_url,
                ..
            }) => {
                let mut link = LinkRef::new(&dest_url, false, lines.line_of(range.start));
                if link_type == LinkType::Email {
                    link.kind = LinkKind::External;
                }
                outline.links.push(link);
            }
            Event::Start(Tag::Image { dest_url, .. }) => {
                outline
                    .links
                    .push(LinkRef::new(&dest_url, true, lines.line_of(range.start)));
            }
            Event::Start(Tag::Heading { id, .. }) => {
                heading = Some((id.map(|s| s.to_string()), String::new()));
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some((_, buf)) = heading.as_mut() {
                    buf.push_str(&text);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((id, text)) = heading.take() {
                    registry.heading(id.as_deref(), &text);
                }
            }
            Event::Start(Tag::FootnoteDefinition(label)) => {
                registry.insert(&label);
            }
            _ => {}
        }
    }

    outline.anchors = registry.into_ids();
    outline
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify("https://github.com/som-rs"), LinkKind::External);
        assert_eq!(classify("mailto:me@example.com"), LinkKind::External);
        assert_eq!(classify("//cdn.example.com/x.js"), LinkKind::External);
        assert_eq!(classify("#benchmarks"), LinkKind::Anchor);
        assert_eq!(classify("2023-05-14-inline-caching.md#results"), LinkKind::Document);
        assert_eq!(classify("/about/"), LinkKind::Site);
        assert_eq!(classify("../assets/bench.png"), LinkKind::Relative);
        assert_eq!(
            classify("{{ site.baseurl }}/assets/x.png"),
            LinkKind::Templated
        );
        assert_eq!(classify("{% post_url 2023-05-14-x %}"), LinkKind::Templated);
    }

    #[test]
    fn test_path_and_fragment() {
        let link = LinkRef::new("/assets/my%20plot.png?v=2#top", true, 1);
        assert_eq!(link.path(), "/assets/my plot.png");
        assert_eq!(link.fragment().as_deref(), Some("top"));
        assert_eq!(LinkRef::new("x.md", false, 1).fragment(), None);
    }

    #[test]
    fn test_registry_dedupes() {
        let mut reg = AnchorRegistry::new();
        assert_eq!(reg.heading(None, "Results"), "results");
        assert_eq!(reg.heading(None, "Results"), "results-1");
        assert_eq!(reg.heading(Some("custom"), "Whatever"), "custom");
        assert_eq!(reg.heading(None, "Why `Rc<RefCell<T>>`?"), "why-rc-refcell-t");
        let ids = reg.into_ids();
        assert!(ids.contains("results-1"));
    }

    #[test]
    fn test_extract() {
        let md = "\
# Inline caching

See [the results](#results) and ![plot](assets/plot.png).

## Results {#results}

Compare with [the loop post](2023-06-01-loops.md) or [GitHub](https://github.com).
";
        let outline = extract(md, 5);
        assert_eq!(outline.links.len(), 4);
        assert_eq!(outline.links[0].kind, LinkKind::Anchor);
        assert_eq!(outline.links[0].line, 7);
        assert!(outline.links[1].image);
        assert_eq!(outline.links[1].kind, LinkKind::Relative);
        assert_eq!(outline.links[2].kind, LinkKind::Document);
        assert_eq!(outline.links[2].line, 11);
        assert_eq!(outline.links[3].kind, LinkKind::External);
        assert!(outline.anchors.contains("inline-caching"));
        assert!(outline.anchors.contains("results"));
    }

    #[test]
    fn test_footnote_labels_are_anchors() {
        let outline = extract("Text[^gc].\n\n[^gc]: Tracing collector.\n", 1);
        assert!(outline.anchors.contains("gc"));
    }
}
