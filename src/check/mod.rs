//! Content checker - verifies front-matter, footnotes, links and assets
//!
//! External URLs are counted but never fetched.

mod issue;
mod targets;

use anyhow::Result;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};

pub use issue::{Diagnostic, Issue, Severity};
pub use targets::{join_source, url_key, SiteIndex, Target};

use crate::config::SiteConfig;
use crate::content::prose::{prose_spans, LineIndex};
use crate::content::{Corpus, FootnoteIndex, Layout, LinkKind, LinkRef, Page, Post};

/// The parts of a post or page the checker looks at
struct DocView<'a> {
    source: &'a str,
    path: &'a str,
    raw: &'a str,
    body_line: usize,
    footnotes: &'a FootnoteIndex,
    links: &'a [LinkRef],
    anchors: &'a BTreeSet<String>,
}

impl<'a> From<&'a Post> for DocView<'a> {
    fn from(post: &'a Post) -> Self {
        Self {
            source: &post.source,
            path: &post.path,
            raw: &post.raw,
            body_line: post.body_line,
            footnotes: &post.footnotes,
            links: &post.links,
            anchors: &post.anchors,
        }
    }
}

impl<'a> From<&'a Page> for DocView<'a> {
    fn from(page: &'a Page) -> Self {
        Self {
            source: &page.source,
            path: &page.path,
            raw: &page.raw,
            body_line: page.body_line,
            footnotes: &page.footnotes,
            links: &page.links,
            anchors: &page.anchors,
        }
    }
}

/// Result of checking a corpus
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub diagnostics: Vec<Diagnostic>,
    pub documents: usize,
    pub external_links: usize,
}

#[derive(Serialize)]
struct DiagnosticRecord<'a> {
    severity: Severity,
    code: &'static str,
    source: &'a str,
    line: Option<usize>,
    message: String,
}

#[derive(Serialize)]
struct ReportRecord<'a> {
    documents: usize,
    errors: usize,
    warnings: usize,
    external_links: usize,
    diagnostics: Vec<DiagnosticRecord<'a>>,
}

impl Report {
    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    /// Treat every warning as an error
    pub fn promote_warnings(&mut self) {
        for d in &mut self.diagnostics {
            d.severity = Severity::Error;
        }
    }

    /// Findings of a given kind, by code
    pub fn with_code(&self, code: &str) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.issue.code() == code)
            .collect()
    }

    /// `source:line: severity: message` lines plus a summary
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for d in &self.diagnostics {
            out.push_str(&d.to_string());
            out.push('\n');
        }
        out.push_str(&format!(
            "Checked {} documents: {} errors, {} warnings ({} external links not verified)\n",
            self.documents,
            self.error_count(),
            self.warning_count(),
            self.external_links
        ));
        out
    }

    pub fn to_json(&self) -> Result<String> {
        let record = ReportRecord {
            documents: self.documents,
            errors: self.error_count(),
            warnings: self.warning_count(),
            external_links: self.external_links,
            diagnostics: self
                .diagnostics
                .iter()
                .map(|d| DiagnosticRecord {
                    severity: d.severity,
                    code: d.issue.code(),
                    source: &d.source,
                    line: d.line,
                    message: d.issue.to_string(),
                })
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&record)?)
    }
}

/// Runs every document-level check over a corpus
pub struct Checker<'c> {
    config: &'c SiteConfig,
}

impl<'c> Checker<'c> {
    pub fn new(config: &'c SiteConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, corpus: &Corpus) -> Report {
        let index = SiteIndex::build(corpus, self.config);
        let mut report = Report::default();

        for post in corpus.all_posts() {
            self.check_post_metadata(post, &mut report);
            self.check_document(&DocView::from(post), &index, &mut report);
        }
        for page in &corpus.pages {
            self.check_page_metadata(page, &mut report);
            self.check_document(&DocView::from(page), &index, &mut report);
        }
        self.check_uniqueness(corpus, &mut report);

        report.documents = corpus.all_posts().count() + corpus.pages.len();
        report.diagnostics.sort_by(|a, b| {
            a.source
                .cmp(&b.source)
                .then(a.line.unwrap_or(0).cmp(&b.line.unwrap_or(0)))
        });
        if self.config.check.strict {
            report.promote_warnings();
        }

        tracing::debug!(
            "Checked {} documents: {} diagnostics",
            report.documents,
            report.diagnostics.len()
        );

        report
    }

    fn display_source(&self, source: &str) -> String {
        format!("{}/{}", self.config.source_dir.trim_end_matches('/'), source)
    }

    fn push(&self, report: &mut Report, source: &str, line: Option<usize>, issue: Issue) {
        report
            .diagnostics
            .push(Diagnostic::new(&self.display_source(source), line, issue));
    }

    fn check_common_metadata(
        &self,
        source: &str,
        error: Option<&String>,
        has_title: bool,
        layout: Option<&String>,
        report: &mut Report,
    ) {
        if let Some(e) = error {
            self.push(report, source, Some(1), Issue::InvalidFrontMatter(e.clone()));
            // Field checks would only repeat the parse failure
            return;
        }
        if !has_title {
            self.push(report, source, None, Issue::MissingField("title"));
        }
        if let Some(layout) = layout {
            if layout.parse::<Layout>().is_err() {
                self.push(report, source, None, Issue::UnknownLayout(layout.clone()));
            }
        }
    }

    fn check_post_metadata(&self, post: &Post, report: &mut Report) {
        self.check_common_metadata(
            &post.source,
            post.front_matter_error.as_ref(),
            post.has_title,
            post.layout.as_ref(),
            report,
        );
        if post.front_matter_error.is_some() {
            return;
        }

        if self.config.check.require_author && post.authors.is_empty() {
            self.push(report, &post.source, None, Issue::MissingField("author"));
        }

        if let Some(filename_date) = post.filename_date {
            let date = self.config.local_date(&post.date);
            if date != filename_date {
                self.push(
                    report,
                    &post.source,
                    None,
                    Issue::DateMismatch {
                        filename: filename_date.to_string(),
                        front_matter: date.to_string(),
                    },
                );
            }
        }
    }

    fn check_page_metadata(&self, page: &Page, report: &mut Report) {
        self.check_common_metadata(
            &page.source,
            page.front_matter_error.as_ref(),
            page.has_title,
            page.layout.as_ref(),
            report,
        );
    }

    fn check_document(&self, doc: &DocView<'_>, index: &SiteIndex<'_>, report: &mut Report) {
        self.check_footnotes(doc, report);
        self.check_links(doc, index, report);
        self.check_markers(doc, report);
    }

    fn check_footnotes(&self, doc: &DocView<'_>, report: &mut Report) {
        for r in doc.footnotes.undefined() {
            self.push(
                report,
                doc.source,
                Some(r.line),
                Issue::UndefinedFootnote(r.label.clone()),
            );
        }
        for d in doc.footnotes.duplicates() {
            self.push(
                report,
                doc.source,
                Some(d.line),
                Issue::DuplicateFootnote(d.label.clone()),
            );
        }
        for d in doc.footnotes.unused() {
            self.push(
                report,
                doc.source,
                Some(d.line),
                Issue::UnusedFootnote(d.label.clone()),
            );
        }
    }

    fn check_links(&self, doc: &DocView<'_>, index: &SiteIndex<'_>, report: &mut Report) {
        for link in doc.links {
            let issue = match link.kind {
                LinkKind::External => {
                    report.external_links += 1;
                    None
                }
                LinkKind::Templated => None,
                LinkKind::Anchor => link
                    .fragment()
                    .filter(|f| !f.is_empty() && !doc.anchors.contains(f))
                    .map(Issue::BrokenAnchor),
                LinkKind::Document => {
                    let target = targets::join_source(doc.source, &link.path())
                        .map(|source| index.resolve_source(&source))
                        .unwrap_or(Target::Missing);
                    self.classify_target(link, target)
                }
                LinkKind::Site => {
                    let target = index.resolve_site_path(&link.path());
                    self.classify_target(link, target)
                }
                LinkKind::Relative => {
                    let target = index.resolve_from(doc.path, &link.path());
                    self.classify_target(link, target)
                }
            };

            if let Some(issue) = issue {
                self.push(report, doc.source, Some(link.line), issue);
            }
        }
    }

    fn classify_target(&self, link: &LinkRef, target: Target<'_>) -> Option<Issue> {
        match target {
            Target::Asset => None,
            Target::Document(_) | Target::Route if link.image => {
                Some(Issue::MissingAsset(link.dest.clone()))
            }
            Target::Document(anchors) => broken_fragment(link, anchors),
            Target::Route => None,
            Target::Hidden => Some(Issue::UnpublishedLink(link.dest.clone())),
            Target::Missing if link.image => Some(Issue::MissingAsset(link.dest.clone())),
            Target::Missing => Some(Issue::BrokenLink(link.dest.clone())),
        }
    }

    fn check_markers(&self, doc: &DocView<'_>, report: &mut Report) {
        let markers = &self.config.check.todo_markers;
        if markers.is_empty() {
            return;
        }

        let lines = LineIndex::new(doc.raw, doc.body_line);
        let mut seen = HashSet::new();
        for span in prose_spans(doc.raw) {
            let text = &doc.raw[span.clone()];
            for marker in markers.iter().filter(|m| !m.is_empty()) {
                for (offset, _) in text.match_indices(marker.as_str()) {
                    let line = lines.line_of(span.start + offset);
                    if seen.insert((line, marker.as_str())) {
                        self.push(
                            report,
                            doc.source,
                            Some(line),
                            Issue::TodoMarker(marker.clone()),
                        );
                    }
                }
            }
        }
    }

    fn check_uniqueness(&self, corpus: &Corpus, report: &mut Report) {
        let mut posts: Vec<&Post> = corpus.all_posts().collect();
        posts.sort_by(|a, b| a.source.cmp(&b.source));

        let mut slugs: HashMap<&str, &str> = HashMap::new();
        let mut titles: HashMap<String, &str> = HashMap::new();
        for post in &posts {
            if let Some(other) = slugs.get(post.slug.as_str()) {
                self.push(
                    report,
                    &post.source,
                    None,
                    Issue::DuplicateSlug {
                        slug: post.slug.clone(),
                        other: self.display_source(other),
                    },
                );
            } else {
                slugs.insert(&post.slug, &post.source);
            }
            if post.has_title {
                let key = post.title.trim().to_lowercase();
                if let Some(other) = titles.get(&key) {
                    self.push(
                        report,
                        &post.source,
                        None,
                        Issue::DuplicateTitle {
                            title: post.title.clone(),
                            other: self.display_source(other),
                        },
                    );
                } else {
                    titles.insert(key, &post.source);
                }
            }
        }

        let mut paths: HashMap<String, &str> = HashMap::new();
        let documents = posts
            .iter()
            .map(|p| (p.path.as_str(), p.source.as_str()))
            .chain(corpus.pages.iter().map(|p| (p.path.as_str(), p.source.as_str())));
        for (path, source) in documents {
            let key = targets::url_key(path);
            if let Some(other) = paths.get(&key) {
                self.push(
                    report,
                    source,
                    None,
                    Issue::DuplicatePath {
                        path: path.to_string(),
                        other: self.display_source(other),
                    },
                );
            } else {
                paths.insert(key, source);
            }
        }
    }
}

fn broken_fragment(link: &LinkRef, anchors: &BTreeSet<String>) -> Option<Issue> {
    let fragment = link.fragment().filter(|f| !f.is_empty())?;
    if anchors.contains(&fragment) {
        None
    } else {
        Some(Issue::BrokenLinkAnchor {
            target: link.path(),
            fragment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentLoader;
    use crate::Site;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn check(dir: &TempDir) -> Report {
        let site = Site::new(dir.path()).unwrap().with_drafts(true);
        let corpus = ContentLoader::new(&site).load().unwrap();
        Checker::new(&site.config).run(&corpus)
    }

    const GOOD_POST: &str = "---
layout: post
title: Inline caching
author: Jane Roe
---

Sends got faster[^ic]. See [results](#results), the [about page](/about/)
and [the next post](2023-06-01-loops.md#setup).

![bench](/assets/bench.png)

## Results

Numbers.

[^ic]: Polymorphic inline caches.
";

    #[test]
    fn test_clean_corpus_has_no_findings() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "source/_posts/2023-05-14-inline-caching.md", GOOD_POST);
        write(
            dir.path(),
            "source/_posts/2023-06-01-loops.md",
            "---\ntitle: Loops\nauthor: [Jane Roe, John Doe]\n---\n\n## Setup\n\nBack to [caching](/2023/05/14/inline-caching/#results).\n",
        );
        write(dir.path(), "source/about.md", "---\ntitle: About\nlayout: page\n---\n\n[Code](https://github.com/som-rs/som-rs)\n");
        write(dir.path(), "source/assets/bench.png", "png");

        let report = check(&dir);
        assert!(report.diagnostics.is_empty(), "{}", report.to_text());
        assert_eq!(report.documents, 3);
        assert_eq!(report.external_links, 1);
    }

    #[test]
    fn test_footnote_findings() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "source/about.md",
            "---\ntitle: About\n---\n\nClaim[^a] and[^b].\n\n[^a]: one\n\n[^a]: again\n\n[^c]: unused\n",
        );
        let report = check(&dir);

        let undefined = report.with_code("undefined-footnote");
        assert_eq!(undefined.len(), 1);
        assert_eq!(undefined[0].line, Some(5));
        assert_eq!(undefined[0].source, "source/about.md");
        assert_eq!(report.with_code("duplicate-footnote").len(), 1);
        let unused = report.with_code("unused-footnote");
        assert_eq!(unused.len(), 1);
        assert_eq!(unused[0].severity, Severity::Warning);
        assert_eq!(report.error_count(), 2);
    }

    #[test]
    fn test_front_matter_findings() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "source/_posts/2023-01-01-untitled.md", "---\nlayout: default\n---\nbody\n");
        write(dir.path(), "source/_posts/2023-01-02-broken.md", "---\ntitle: [x\n---\nbody\n");
        let report = check(&dir);

        let missing: Vec<_> = report
            .with_code("missing-field")
            .iter()
            .map(|d| d.issue.clone())
            .collect();
        assert!(missing.contains(&Issue::MissingField("title")));
        assert!(missing.contains(&Issue::MissingField("author")));
        assert_eq!(report.with_code("unknown-layout").len(), 1);
        let invalid = report.with_code("invalid-front-matter");
        assert_eq!(invalid.len(), 1);
        assert_eq!(invalid[0].source, "source/_posts/2023-01-02-broken.md");
    }

    #[test]
    fn test_site_author_satisfies_requirement() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "_config.yml", "author: Jane Roe\n");
        write(dir.path(), "source/_posts/2023-01-01-a.md", "---\ntitle: A\n---\nbody\n");
        let report = check(&dir);
        assert!(report.with_code("missing-field").is_empty());
    }

    #[test]
    fn test_broken_links_and_assets() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "source/about.md",
            "---\ntitle: About\n---\n\n[a](#nowhere)\n[b](missing.md)\n[c](/no/such/page/)\n![d](/assets/nope.png)\n[e](2023-01-01-a.md)\n[f]({{site.baseurl}}/x)\n",
        );
        write(
            dir.path(),
            "source/_posts/2023-01-01-a.md",
            "---\ntitle: A\nauthor: Me\n---\n[back](../about.md#missing)\n",
        );
        let report = check(&dir);

        assert_eq!(report.with_code("broken-anchor").len(), 1);
        let broken: Vec<_> = report
            .with_code("broken-link")
            .iter()
            .map(|d| d.issue.to_string())
            .collect();
        assert_eq!(
            broken,
            vec![
                "link target `missing.md` does not exist",
                "link target `/no/such/page/` does not exist",
                "link target `2023-01-01-a.md` does not exist",
            ]
        );
        assert_eq!(report.with_code("missing-asset").len(), 1);
        let anchor = report.with_code("broken-link-anchor");
        assert_eq!(anchor.len(), 1);
        assert_eq!(anchor[0].source, "source/_posts/2023-01-01-a.md");
    }

    #[test]
    fn test_generated_routes_are_valid_targets() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "source/_posts/2023-01-01-a.md",
            "---\ntitle: A\nauthor: Me\ntags: [GC]\n---\n[home](/) [archive](/archives/) [tag](/tags/gc/) [feed](/atom.xml)\n",
        );
        let report = check(&dir);
        assert!(report.diagnostics.is_empty(), "{}", report.to_text());
    }

    #[test]
    fn test_duplicates() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "source/_posts/2023-01-01-same.md", "---\ntitle: Same\nauthor: Me\n---\n");
        write(dir.path(), "source/_drafts/same.md", "---\ntitle: same\nauthor: Me\n---\n");
        let report = check(&dir);
        assert_eq!(report.with_code("duplicate-slug").len(), 1);
        assert_eq!(report.with_code("duplicate-title").len(), 1);
    }

    #[test]
    fn test_markers_and_strict_mode() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "_config.yml", "check:\n  strict: true\n");
        write(
            dir.path(),
            "source/about.md",
            "---\ntitle: About\n---\n\n[TODO] finish this\n\n```\n// [TODO] in code\n```\n\n`[TODO]` inline\n",
        );
        let report = check(&dir);
        let markers = report.with_code("todo-marker");
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].line, Some(5));
        assert_eq!(markers[0].severity, Severity::Error);
        assert!(report.has_errors());
    }

    #[test]
    fn test_container_blocks_are_checked() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "source/about.md",
            "---\ntitle: About\n---\n\n1. First item\n\n    Cites[^gc] and [TODO] here.\n\n> [TODO] quoted[^nowhere]\n\n[^gc]: Tracing GC.\n",
        );
        let report = check(&dir);

        let undefined = report.with_code("undefined-footnote");
        assert_eq!(undefined.len(), 1);
        assert_eq!(undefined[0].line, Some(9));
        assert!(report.with_code("unused-footnote").is_empty());

        let lines: Vec<_> = report
            .with_code("todo-marker")
            .iter()
            .map(|d| d.line)
            .collect();
        assert_eq!(lines, vec![Some(7), Some(9)]);
    }

    #[test]
    fn test_links_to_hidden_posts() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "_config.yml", "future: false\n");
        write(
            dir.path(),
            "source/_posts/2023-01-01-a.md",
            "---\ntitle: A\nauthor: Me\n---\n[b](2023-01-02-b.md) [b2](/2023/01/02/b/) [c](2999-01-01-c.md)\n",
        );
        write(
            dir.path(),
            "source/_posts/2023-01-02-b.md",
            "---\ntitle: B\nauthor: Me\npublished: false\n---\nLater.\n",
        );
        write(
            dir.path(),
            "source/_posts/2999-01-01-c.md",
            "---\ntitle: C\nauthor: Me\n---\nSoon.\n",
        );
        let report = check(&dir);

        let hidden = report.with_code("unpublished-link");
        assert_eq!(hidden.len(), 3, "{}", report.to_text());
        assert!(hidden.iter().all(|d| d.source == "source/_posts/2023-01-01-a.md"));
        assert!(report.with_code("broken-link").is_empty());
        assert!(report.has_errors());
    }

    #[test]
    fn test_date_mismatch() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "source/_posts/2023-01-01-a.md",
            "---\ntitle: A\nauthor: Me\ndate: 2023-02-03\n---\n",
        );
        let report = check(&dir);
        let mismatch = report.with_code("date-mismatch");
        assert_eq!(mismatch.len(), 1);
        assert_eq!(
            mismatch[0].issue.to_string(),
            "filename date 2023-01-01 disagrees with front-matter date 2023-02-03"
        );
    }

    #[test]
    fn test_json_output() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "source/about.md", "---\ntitle: About\n---\nx[^n]\n");
        let report = check(&dir);
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["errors"], 1);
        assert_eq!(json["diagnostics"][0]["code"], "undefined-footnote");
        assert_eq!(json["diagnostics"][0]["line"], 4);
    }
}
