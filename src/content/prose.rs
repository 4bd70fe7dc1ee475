//! Source positions of the prose in a Markdown body
//!
//! Prose is whatever pulldown-cmark reports as text outside code blocks, at
//! any nesting depth: list items, blockquotes and footnote bodies included.
//! Inline code, raw HTML and code listings are never prose.

use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use std::ops::Range;

use super::links::markdown_options;

/// Maps byte offsets in a body to source line numbers
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
    first_line: usize,
}

impl LineIndex {
    /// `first_line` is the source line of the body's first line
    pub fn new(text: &str, first_line: usize) -> Self {
        let starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { starts, first_line }
    }

    pub fn line_of(&self, offset: usize) -> usize {
        let idx = match self.starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        idx + self.first_line
    }
}

/// Byte ranges of prose text. Adjacent text events are merged, so a
/// bracketed run like `[TODO]` comes back as one span.
pub fn prose_spans(markdown: &str) -> Vec<Range<usize>> {
    let mut spans: Vec<Range<usize>> = Vec::new();
    let mut in_code = false;

    for (event, range) in Parser::new_ext(markdown, markdown_options()).into_offset_iter() {
        match event {
            Event::Start(Tag::CodeBlock(_)) => in_code = true,
            Event::End(TagEnd::CodeBlock) => in_code = false,
            Event::Text(_) if !in_code => match spans.last_mut() {
                Some(last) if last.end == range.start => last.end = range.end,
                _ => spans.push(range),
            },
            _ => {}
        }
    }

    spans
}

/// Byte offset of `marker` written as raw HTML (block or inline), ignoring
/// any copy of it inside code
pub fn find_html_marker(markdown: &str, marker: &str) -> Option<usize> {
    Parser::new_ext(markdown, markdown_options())
        .into_offset_iter()
        .find_map(|(event, range)| match event {
            Event::Html(_) | Event::InlineHtml(_) => markdown[range.clone()]
                .find(marker)
                .map(|i| range.start + i),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(md: &str) -> Vec<&str> {
        prose_spans(md).into_iter().map(|r| &md[r]).collect()
    }

    #[test]
    fn test_line_index() {
        let lines = LineIndex::new("a\nbc\n\nd", 5);
        assert_eq!(lines.line_of(0), 5);
        assert_eq!(lines.line_of(3), 6);
        assert_eq!(lines.line_of(6), 8);
    }

    #[test]
    fn test_code_is_not_prose() {
        let md = "intro `[^1]` end\n\n```rust\nlet x = [^2];\n```\n\n    indented [TODO]\n\nafter\n";
        let all = texts(md).concat();
        assert!(all.contains("intro"));
        assert!(all.contains("after"));
        assert!(!all.contains("[^1]"));
        assert!(!all.contains("[^2]"));
        assert!(!all.contains("[TODO]"));
    }

    #[test]
    fn test_container_blocks_are_prose() {
        let md = "1. First item\n\n    Second paragraph [TODO] here.\n\n> quoted [TODO]\n";
        let spans = texts(md);
        assert_eq!(spans.iter().filter(|t| t.contains("[TODO]")).count(), 2);
    }

    #[test]
    fn test_find_html_marker() {
        let md = "Intro\n\n```html\n<!-- more -->\n```\n\nMiddle\n\n<!-- more -->\n\nRest\n";
        let pos = find_html_marker(md, "<!-- more -->").unwrap();
        assert!(md[..pos].contains("Middle"));
        assert_eq!(find_html_marker("`<!-- more -->`\n", "<!-- more -->"), None);
    }
}
