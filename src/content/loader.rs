//! Content loader - loads posts, drafts, pages and assets from the source directory

use anyhow::Result;
use chrono::{DateTime, Local};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::footnote::FootnoteIndex;
use super::links;
use super::post::FileStem;
use super::{ContentError, FrontMatter, MarkdownRenderer, Page, Post};
use crate::Site;

/// Everything found under the source directory
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    /// Posts from `_posts`, newest first, published or not
    pub posts: Vec<Post>,
    /// Posts from `_drafts`, newest first; empty unless drafts are enabled
    pub drafts: Vec<Post>,
    /// Standalone pages, ordered by source path
    pub pages: Vec<Page>,
    /// Non-Markdown files, relative to the source dir with `/` separators
    pub assets: BTreeSet<String>,
}

impl Corpus {
    /// Posts that belong on the generated site, newest first
    pub fn visible_posts(&self, future: bool) -> Vec<Post> {
        let now = Local::now();
        let mut posts: Vec<Post> = self
            .posts
            .iter()
            .chain(self.drafts.iter())
            .filter(|p| p.published && (future || p.date <= now))
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.date.cmp(&a.date));
        posts
    }

    /// Every post and draft that was loaded
    pub fn all_posts(&self) -> impl Iterator<Item = &Post> {
        self.posts.iter().chain(self.drafts.iter())
    }
}

/// A source file split into front-matter and analysed body
struct Parsed {
    front_matter: FrontMatter,
    front_matter_error: Option<String>,
    body: String,
    body_line: usize,
    footnotes: FootnoteIndex,
    outline: links::Outline,
    modified: Option<DateTime<Local>>,
}

/// Loads content from the source directory
pub struct ContentLoader<'a> {
    site: &'a Site,
    renderer: MarkdownRenderer,
    include_drafts: bool,
    exclude: Vec<glob::Pattern>,
}

impl<'a> ContentLoader<'a> {
    /// Create a new content loader
    pub fn new(site: &'a Site) -> Self {
        let renderer = MarkdownRenderer::with_options(
            &site.config.highlight.theme,
            site.config.highlight.line_number,
        );
        let exclude = site
            .config
            .exclude
            .iter()
            .filter_map(|p| match glob::Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    tracing::warn!("Ignoring invalid exclude pattern {:?}: {}", p, e);
                    None
                }
            })
            .collect();

        Self {
            site,
            renderer,
            include_drafts: site.config.render_drafts || site.drafts,
            exclude,
        }
    }

    /// Also load `_drafts`, regardless of `render_drafts`
    pub fn with_drafts(mut self, include: bool) -> Self {
        self.include_drafts = self.include_drafts || include;
        self
    }

    /// Load the whole source tree
    pub fn load(&self) -> Result<Corpus> {
        let corpus = Corpus {
            posts: self.load_posts()?,
            drafts: if self.include_drafts {
                self.load_drafts()?
            } else {
                Vec::new()
            },
            pages: self.load_pages()?,
            assets: self.collect_assets(),
        };

        tracing::debug!(
            "Loaded {} posts, {} drafts, {} pages, {} assets",
            corpus.posts.len(),
            corpus.drafts.len(),
            corpus.pages.len(),
            corpus.assets.len()
        );

        Ok(corpus)
    }

    /// Load all posts from source/_posts
    pub fn load_posts(&self) -> Result<Vec<Post>> {
        self.load_post_dir("_posts", false)
    }

    /// Load all drafts from source/_drafts
    pub fn load_drafts(&self) -> Result<Vec<Post>> {
        self.load_post_dir("_drafts", true)
    }

    fn load_post_dir(&self, dir: &str, draft: bool) -> Result<Vec<Post>> {
        let posts_dir = self.site.source_dir.join(dir);
        if !posts_dir.exists() {
            return Ok(Vec::new());
        }

        let mut posts = Vec::new();

        for entry in WalkDir::new(&posts_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() && is_markdown_file(path) && !self.is_excluded(path) {
                match self.load_post(path, draft) {
                    Ok(post) => posts.push(post),
                    Err(e) => {
                        tracing::warn!("Failed to load post {:?}: {}", path, e);
                    }
                }
            }
        }

        // Sort by date descending (newest first)
        posts.sort_by(|a, b| b.date.cmp(&a.date));

        Ok(posts)
    }

    /// Load a single post from a file
    fn load_post(&self, path: &Path, draft: bool) -> Result<Post> {
        let parsed = self.parse_file(path)?;
        let fm = parsed.front_matter;
        let config = &self.site.config;
        let stem = FileStem::from_path(path);

        let filename_date = stem
            .date
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .and_then(|d| config.localize(d));

        // Front-matter date wins, then the filename, then the file itself
        let date = fm
            .parse_date(config)
            .or(filename_date)
            .or(parsed.modified)
            .unwrap_or_else(Local::now);
        let updated = fm.parse_updated(config).or(parsed.modified);

        let has_title = fm.title.is_some();
        let title = fm.title.clone().unwrap_or_else(|| fallback_title(path));

        let source = self.relative_source(path);
        let slug = fm
            .slug
            .as_deref()
            .map(slug::slugify)
            .unwrap_or_else(|| stem.slug.clone());

        let permalink_path = match fm.permalink.as_deref() {
            Some(custom) => join_root(&config.root, custom),
            None => self.generate_permalink(&date, &slug),
        };
        let permalink = format!("{}{}", config.url.trim_end_matches('/'), permalink_path);

        let (excerpt_md, full_md) = MarkdownRenderer::split_excerpt(&parsed.body);
        let content_html = self.renderer.render(&full_md)?;
        let excerpt_html = match excerpt_md {
            Some(excerpt) => Some(self.renderer.render(&excerpt)?),
            None => None,
        };

        let mut post = Post::new(title, date, source);
        post.updated = updated;
        post.authors = authors_or_default(&fm.author, &config.author);
        post.raw = parsed.body;
        post.content = content_html;
        post.excerpt = excerpt_html;
        post.tags = fm.tags;
        post.categories = fm.categories;
        post.layout = fm.layout;
        post.full_source = path.to_path_buf();
        post.path = permalink_path;
        post.permalink = permalink;
        post.slug = slug;
        post.filename_date = stem.date;
        post.draft = draft;
        post.published = fm.published;
        post.comments = fm.comments;
        post.body_line = parsed.body_line;
        post.footnotes = parsed.footnotes;
        post.links = parsed.outline.links;
        post.anchors = parsed.outline.anchors;
        post.front_matter_error = parsed.front_matter_error;
        post.has_title = has_title;
        post.extra = fm.extra;

        Ok(post)
    }

    /// Load all pages (Markdown files outside `_`-prefixed directories)
    pub fn load_pages(&self) -> Result<Vec<Page>> {
        let mut pages = Vec::new();

        for entry in WalkDir::new(&self.site.source_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if self.is_private(path) || self.is_excluded(path) {
                continue;
            }

            if path.is_file() && is_markdown_file(path) {
                match self.load_page(path) {
                    Ok(page) => pages.push(page),
                    Err(e) => {
                        tracing::warn!("Failed to load page {:?}: {}", path, e);
                    }
                }
            }
        }

        pages.sort_by(|a, b| a.source.cmp(&b.source));

        Ok(pages)
    }

    /// Load a single page from a file
    fn load_page(&self, path: &Path) -> Result<Page> {
        let parsed = self.parse_file(path)?;
        let fm = parsed.front_matter;
        let config = &self.site.config;

        let date = fm
            .parse_date(config)
            .or(parsed.modified)
            .unwrap_or_else(Local::now);

        let has_title = fm.title.is_some();
        let title = fm.title.clone().unwrap_or_else(|| fallback_title(path));
        let source = self.relative_source(path);

        let page_path = match fm.permalink.as_deref() {
            Some(custom) => join_root(&config.root, custom),
            None => join_root(&config.root, &page_path_for(&source)),
        };
        let permalink = format!("{}{}", config.url.trim_end_matches('/'), page_path);

        let content_html = self.renderer.render(&parsed.body)?;

        let mut page = Page::new(title, date, source);
        page.authors = authors_or_default(&fm.author, &config.author);
        page.raw = parsed.body;
        page.content = content_html;
        page.layout = fm.layout;
        page.full_source = path.to_path_buf();
        page.path = page_path;
        page.permalink = permalink;
        page.body_line = parsed.body_line;
        page.footnotes = parsed.footnotes;
        page.links = parsed.outline.links;
        page.anchors = parsed.outline.anchors;
        page.front_matter_error = parsed.front_matter_error;
        page.has_title = has_title;
        page.extra = fm.extra;

        Ok(page)
    }

    fn parse_file(&self, path: &Path) -> Result<Parsed, ContentError> {
        let content = fs::read_to_string(path).map_err(|source| ContentError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let (front_matter, body, front_matter_error) = match FrontMatter::parse_strict(&content) {
            Ok((fm, body)) => (fm, body, None),
            Err(e) => {
                tracing::debug!("Strict front-matter parse failed for {:?}: {}", path, e);
                let (fm, body) = FrontMatter::parse(&content);
                (fm, body, Some(e.to_string()))
            }
        };

        // The body is always a suffix of the file
        let consumed = &content[..content.len() - body.len()];
        let body_line = consumed.matches('\n').count() + 1;

        let modified = fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Local>::from);

        Ok(Parsed {
            footnotes: FootnoteIndex::scan(body, body_line),
            outline: links::extract(body, body_line),
            front_matter,
            front_matter_error,
            body: body.to_string(),
            body_line,
            modified,
        })
    }

    /// Non-Markdown files that are published verbatim
    fn collect_assets(&self) -> BTreeSet<String> {
        WalkDir::new(&self.site.source_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .filter(|e| !is_markdown_file(e.path()))
            .filter(|e| !self.is_private(e.path()) && !self.is_excluded(e.path()))
            .map(|e| self.relative_source(e.path()))
            .collect()
    }

    /// Paths under `_`-prefixed directories, or hidden files
    fn is_private(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.site.source_dir).unwrap_or(path);
        relative.components().any(|c| {
            c.as_os_str()
                .to_str()
                .map(|s| s.starts_with('_') || s.starts_with('.'))
                .unwrap_or(false)
        })
    }

    fn is_excluded(&self, path: &Path) -> bool {
        if self.exclude.is_empty() {
            return false;
        }
        let relative = self.relative_source(path);
        self.exclude.iter().any(|p| p.matches(&relative))
    }

    /// Source path relative to the source dir, with `/` separators
    fn relative_source(&self, path: &Path) -> String {
        let relative: PathBuf = path
            .strip_prefix(&self.site.source_dir)
            .unwrap_or(path)
            .to_path_buf();
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Generate permalink based on config pattern
    fn generate_permalink(&self, date: &DateTime<Local>, slug: &str) -> String {
        let pattern = &self.site.config.permalink;

        let result = pattern
            .replace(":year", &date.format("%Y").to_string())
            .replace(":month", &date.format("%m").to_string())
            .replace(":day", &date.format("%d").to_string())
            .replace(":i_month", &date.format("%-m").to_string())
            .replace(":i_day", &date.format("%-d").to_string())
            .replace(":title", slug)
            .replace(":slug", slug);

        join_root(&self.site.config.root, &result)
    }
}

/// URL path of a page derived from its source path.
/// `about.md` → `about/`, `notes/index.md` → `notes/`, `index.md` → ``
pub fn page_path_for(source: &str) -> String {
    let without_ext = source
        .strip_suffix(".markdown")
        .or_else(|| source.strip_suffix(".md"))
        .unwrap_or(source);

    if without_ext == "index" {
        String::new()
    } else if let Some(dir) = without_ext.strip_suffix("/index") {
        format!("{}/", dir)
    } else {
        format!("{}/", without_ext)
    }
}

/// Prefix a site-relative path with the configured root
fn join_root(root: &str, path: &str) -> String {
    format!(
        "{}/{}",
        root.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn authors_or_default(authors: &[String], default: &str) -> Vec<String> {
    let authors: Vec<String> = authors
        .iter()
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect();
    if authors.is_empty() && !default.trim().is_empty() {
        vec![default.trim().to_string()]
    } else {
        authors
    }
}

fn fallback_title(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Untitled")
        .to_string()
}

/// Check if a file is a markdown file
pub fn is_markdown_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e == "md" || e == "markdown")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn site_in(dir: &TempDir) -> Site {
        Site::new(dir.path()).unwrap()
    }

    #[test]
    fn test_page_path_for() {
        assert_eq!(page_path_for("about.md"), "about/");
        assert_eq!(page_path_for("notes/index.md"), "notes/");
        assert_eq!(page_path_for("index.md"), "");
        assert_eq!(page_path_for("talks/2024.markdown"), "talks/2024/");
    }

    #[test]
    fn test_load_dated_post() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "source/_posts/2023-05-14-inline-caching.md",
            "---\nlayout: post\ntitle: Inline caching\nauthor: Jane Roe\n---\n\nIntro[^1].\n\n[^1]: Note.\n",
        );
        let site = site_in(&dir);
        let corpus = ContentLoader::new(&site).load().unwrap();

        assert_eq!(corpus.posts.len(), 1);
        let post = &corpus.posts[0];
        assert_eq!(post.title, "Inline caching");
        assert_eq!(post.slug, "inline-caching");
        assert_eq!(post.authors, vec!["Jane Roe"]);
        assert_eq!(post.date.format("%Y-%m-%d").to_string(), "2023-05-14");
        assert_eq!(post.path, "/2023/05/14/inline-caching/");
        assert_eq!(post.source, "_posts/2023-05-14-inline-caching.md");
        assert_eq!(post.body_line, 7);
        assert_eq!(post.footnotes.references[0].line, 7);
        assert_eq!(post.footnotes.definitions[0].line, 9);
        assert!(post.front_matter_error.is_none());
        assert!(post.anchors.contains("1"));
    }

    #[test]
    fn test_drafts_only_when_enabled() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "source/_drafts/loops.md",
            "---\ntitle: Loop specialization\n---\nbody\n",
        );
        let site = site_in(&dir);

        let corpus = ContentLoader::new(&site).load().unwrap();
        assert!(corpus.drafts.is_empty());

        let corpus = ContentLoader::new(&site).with_drafts(true).load().unwrap();
        assert_eq!(corpus.drafts.len(), 1);
        assert!(corpus.drafts[0].draft);
        assert_eq!(corpus.visible_posts(true).len(), 1);
    }

    #[test]
    fn test_pages_and_assets() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "source/about.md", "---\ntitle: About\nlayout: page\n---\nHi\n");
        write(dir.path(), "source/assets/bench.png", "png");
        write(dir.path(), "source/_posts/img.png", "private");
        write(dir.path(), "source/.DS_Store", "junk");
        let site = site_in(&dir);
        let corpus = ContentLoader::new(&site).load().unwrap();

        assert_eq!(corpus.pages.len(), 1);
        assert_eq!(corpus.pages[0].path, "/about/");
        assert_eq!(corpus.pages[0].permalink, "http://example.com/about/");
        assert_eq!(
            corpus.assets.iter().cloned().collect::<Vec<_>>(),
            vec!["assets/bench.png"]
        );
    }

    #[test]
    fn test_exclude_patterns() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "_config.yml", "exclude:\n  - \"scratch/**\"\n");
        write(dir.path(), "source/scratch/notes.md", "# scratch\n");
        write(dir.path(), "source/about.md", "# about\n");
        let site = site_in(&dir);
        let corpus = ContentLoader::new(&site).load().unwrap();
        assert_eq!(corpus.pages.len(), 1);
        assert_eq!(corpus.pages[0].source, "about.md");
        assert!(!corpus.pages[0].has_title);
    }

    #[test]
    fn test_broken_front_matter_is_recorded() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "source/_posts/2024-02-01-bad.md",
            "---\ntitle: [oops\n---\nbody\n",
        );
        let site = site_in(&dir);
        let corpus = ContentLoader::new(&site).load().unwrap();
        let post = &corpus.posts[0];
        assert!(post.front_matter_error.is_some());
        assert!(!post.has_title);
    }

    #[test]
    fn test_unpublished_and_future_posts_hidden() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "source/_posts/2020-01-01-hidden.md",
            "---\ntitle: Hidden\npublished: false\n---\n",
        );
        write(
            dir.path(),
            "source/_posts/2999-01-01-future.md",
            "---\ntitle: Future\n---\n",
        );
        let site = site_in(&dir);
        let corpus = ContentLoader::new(&site).load().unwrap();
        assert_eq!(corpus.posts.len(), 2);
        assert_eq!(corpus.visible_posts(true).len(), 1);
        assert_eq!(corpus.visible_posts(false).len(), 0);
    }
}
