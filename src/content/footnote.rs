//! Footnote references and definitions within a single document
//!
//! Definitions and resolved references come from the Markdown parser, so
//! footnotes inside list items, blockquotes and other footnote bodies count.
//! A `[^label]` with no definition is left as plain text by the parser; those
//! are recovered from prose spans. Code listings never contribute footnotes.

use lazy_static::lazy_static;
use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use regex::Regex;
use std::collections::{HashMap, HashSet};

use super::links::markdown_options;
use super::prose::{prose_spans, LineIndex};

lazy_static! {
    static ref REFERENCE: Regex = Regex::new(r"\[\^([^\]]+)\]").expect("valid regex");
}

/// A `[^label]` marker in prose
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FootnoteRef {
    pub label: String,
    pub line: usize,
}

/// A `[^label]: body` definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Footnote {
    pub label: String,
    pub body: String,
    pub line: usize,
}

/// All footnote activity in one document
#[derive(Debug, Clone, Default)]
pub struct FootnoteIndex {
    pub references: Vec<FootnoteRef>,
    pub definitions: Vec<Footnote>,
}

/// Footnote labels match case-insensitively, ignoring surrounding whitespace
pub fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Accumulates the plain-text body of the definition being parsed
struct OpenDefinition {
    footnote: Footnote,
    paragraph_break: bool,
}

impl OpenDefinition {
    fn push(&mut self, text: &str) {
        if self.paragraph_break && !self.footnote.body.is_empty() {
            self.footnote.body.push('\n');
        }
        self.paragraph_break = false;
        self.footnote.body.push_str(text);
    }

    fn finish(mut self) -> Footnote {
        self.footnote.body = self.footnote.body.trim().to_string();
        self.footnote
    }
}

impl FootnoteIndex {
    /// Scan a Markdown body. `first_line` is the source line of the body's first line.
    pub fn scan(markdown: &str, first_line: usize) -> Self {
        let lines = LineIndex::new(markdown, first_line);
        let mut index = FootnoteIndex::default();
        let mut open: Option<OpenDefinition> = None;
        let mut in_code = false;

        for (event, range) in Parser::new_ext(markdown, markdown_options()).into_offset_iter() {
            match event {
                Event::Start(Tag::FootnoteDefinition(label)) => {
                    if let Some(done) = open.take() {
                        index.definitions.push(done.finish());
                    }
                    open = Some(OpenDefinition {
                        footnote: Footnote {
                            label: label.to_string(),
                            body: String::new(),
                            line: lines.line_of(range.start),
                        },
                        paragraph_break: false,
                    });
                }
                Event::End(TagEnd::FootnoteDefinition) => {
                    if let Some(done) = open.take() {
                        index.definitions.push(done.finish());
                    }
                }
                Event::FootnoteReference(label) => {
                    index.references.push(FootnoteRef {
                        label: label.to_string(),
                        line: lines.line_of(range.start),
                    });
                    if let Some(def) = open.as_mut() {
                        def.push(&format!("[^{}]", label));
                    }
                }
                Event::Start(Tag::CodeBlock(_)) => in_code = true,
                Event::End(TagEnd::CodeBlock) => in_code = false,
                Event::Text(text) | Event::Code(text) if !in_code => {
                    if let Some(def) = open.as_mut() {
                        def.push(&text);
                    }
                }
                Event::SoftBreak | Event::HardBreak => {
                    if let Some(def) = open.as_mut() {
                        def.push(" ");
                    }
                }
                Event::End(TagEnd::Paragraph) => {
                    if let Some(def) = open.as_mut() {
                        def.paragraph_break = true;
                    }
                }
                _ => {}
            }
        }
        if let Some(done) = open.take() {
            index.definitions.push(done.finish());
        }

        for span in prose_spans(markdown) {
            index.collect_unresolved(markdown, span.start, span.end, &lines);
        }
        index.references.sort_by_key(|r| r.line);

        index
    }

    /// References the parser left as text because nothing defines them
    fn collect_unresolved(&mut self, markdown: &str, start: usize, end: usize, lines: &LineIndex) {
        for caps in REFERENCE.captures_iter(&markdown[start..end]) {
            let Some(whole) = caps.get(0) else { continue };
            let offset = start + whole.start();
            if offset > 0 && markdown.as_bytes()[offset - 1] == b'\\' {
                continue;
            }
            self.references.push(FootnoteRef {
                label: caps[1].to_string(),
                line: lines.line_of(offset),
            });
        }
    }

    /// References that no definition in the document satisfies
    pub fn undefined(&self) -> Vec<&FootnoteRef> {
        let defined: HashSet<String> = self
            .definitions
            .iter()
            .map(|d| normalize_label(&d.label))
            .collect();
        self.references
            .iter()
            .filter(|r| !defined.contains(&normalize_label(&r.label)))
            .collect()
    }

    /// Definitions that are never referenced
    pub fn unused(&self) -> Vec<&Footnote> {
        let referenced: HashSet<String> = self
            .references
            .iter()
            .map(|r| normalize_label(&r.label))
            .collect();
        self.definitions
            .iter()
            .filter(|d| !referenced.contains(&normalize_label(&d.label)))
            .collect()
    }

    /// Second and later definitions of an already defined label
    pub fn duplicates(&self) -> Vec<&Footnote> {
        let mut seen: HashMap<String, usize> = HashMap::new();
        self.definitions
            .iter()
            .filter(|d| {
                let count = seen.entry(normalize_label(&d.label)).or_insert(0);
                *count += 1;
                *count > 1
            })
            .collect()
    }

    /// Look up a definition by label
    pub fn definition(&self, label: &str) -> Option<&Footnote> {
        let key = normalize_label(label);
        self.definitions
            .iter()
            .find(|d| normalize_label(&d.label) == key)
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty() && self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_references_and_definitions() {
        let md = "\
Inline caches[^ic] make sends cheap[^2].

[^ic]: See the Self papers.
[^2]: Measured on the
    benchmark suite.
";
        let index = FootnoteIndex::scan(md, 1);
        assert_eq!(index.references.len(), 2);
        assert_eq!(index.references[0].label, "ic");
        assert_eq!(index.references[0].line, 1);
        assert_eq!(index.definitions.len(), 2);
        assert_eq!(index.definitions[1].body, "Measured on the benchmark suite.");
        assert_eq!(index.definitions[1].line, 4);
        assert!(index.undefined().is_empty());
        assert!(index.unused().is_empty());
    }

    #[test]
    fn test_undefined_and_unused() {
        let md = "Claim[^missing].\n\n[^orphan]: Never cited.\n";
        let index = FootnoteIndex::scan(md, 10);
        let undefined = index.undefined();
        assert_eq!(undefined.len(), 1);
        assert_eq!(undefined[0].label, "missing");
        assert_eq!(undefined[0].line, 10);
        let unused = index.unused();
        assert_eq!(unused.len(), 1);
        assert_eq!(unused[0].label, "orphan");
        assert_eq!(unused[0].line, 12);
    }

    #[test]
    fn test_labels_are_case_insensitive() {
        let md = "Text[^Note].\n\n[^note]: body\n";
        let index = FootnoteIndex::scan(md, 1);
        assert!(index.undefined().is_empty());
        assert!(index.definition("NOTE").is_some());
    }

    #[test]
    fn test_duplicate_definitions() {
        let md = "A[^1]\n\n[^1]: first\n\n[^1]: second\n";
        let index = FootnoteIndex::scan(md, 1);
        let dups = index.duplicates();
        assert_eq!(dups.len(), 1);
        assert_eq!(dups[0].body, "second");
    }

    #[test]
    fn test_code_is_ignored() {
        let md = "\
Real[^1] and `fake[^2]`.

```rust
let v = x[^3];
```

    indented[^4] listing

[^1]: defined
";
        let index = FootnoteIndex::scan(md, 1);
        let labels: Vec<_> = index.references.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["1"]);
        assert!(index.undefined().is_empty());
    }

    #[test]
    fn test_multi_paragraph_definition() {
        let md = "See[^long].\n\n[^long]: First paragraph.\n\n    Second paragraph[^nested].\n\n[^nested]: inner\n";
        let index = FootnoteIndex::scan(md, 1);
        let long = index.definition("long").unwrap();
        assert_eq!(long.body, "First paragraph.\nSecond paragraph[^nested].");
        assert!(index.unused().is_empty());
    }

    #[test]
    fn test_list_item_continuation() {
        let md = "1. First item\n\n    Second paragraph cites[^gc].\n\n[^gc]: Tracing GC.\n";
        let index = FootnoteIndex::scan(md, 1);
        assert_eq!(index.references.len(), 1);
        assert_eq!(index.references[0].line, 3);
        assert!(index.unused().is_empty());

        let index = FootnoteIndex::scan("- item\n\n    continued with[^missing].\n", 1);
        let undefined = index.undefined();
        assert_eq!(undefined.len(), 1);
        assert_eq!(undefined[0].label, "missing");
        assert_eq!(undefined[0].line, 3);
    }

    #[test]
    fn test_blockquote_references() {
        let md = "> Quoted claim[^q] and[^nowhere].\n\n[^q]: Source.\n";
        let index = FootnoteIndex::scan(md, 1);
        let labels: Vec<_> = index.undefined().iter().map(|r| r.label.clone()).collect();
        assert_eq!(labels, vec!["nowhere"]);
        assert!(index.unused().is_empty());
    }

    #[test]
    fn test_fenced_block_in_definition_body() {
        let md = "See[^listing].\n\n[^listing]: The loop:\n\n    ```\n    x[^fake]\n    ```\n\n    Done.\n";
        let index = FootnoteIndex::scan(md, 1);
        assert_eq!(index.references.len(), 1);
        assert!(index.undefined().is_empty());
        let listing = index.definition("listing").unwrap();
        assert_eq!(listing.body, "The loop:\nDone.");
    }

    #[test]
    fn test_escaped_reference_is_literal() {
        let index = FootnoteIndex::scan("Write \\[^x] literally.\n", 1);
        assert!(index.references.is_empty());
    }
}
