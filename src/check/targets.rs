//! Everything a link may legitimately point at on the generated site

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::config::SiteConfig;
use crate::content::Corpus;

/// What a site path resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target<'a> {
    /// A post or page, with its anchor ids
    Document(&'a BTreeSet<String>),
    /// A generated listing (index, archive, tag page, feed)
    Route,
    /// A static file copied from the source dir
    Asset,
    /// A post that is loaded but not generated: unpublished or future-dated
    Hidden,
    Missing,
}

/// Lookup tables for link resolution
#[derive(Debug)]
pub struct SiteIndex<'a> {
    root: String,
    by_source: HashMap<String, &'a BTreeSet<String>>,
    by_path: HashMap<String, &'a BTreeSet<String>>,
    hidden_sources: HashSet<String>,
    hidden_paths: HashSet<String>,
    routes: HashSet<String>,
    assets: &'a BTreeSet<String>,
}

impl<'a> SiteIndex<'a> {
    pub fn build(corpus: &'a Corpus, config: &SiteConfig) -> Self {
        let root = normalize_root(&config.root);
        let mut by_source = HashMap::new();
        let mut by_path = HashMap::new();
        let mut hidden_sources = HashSet::new();
        let mut hidden_paths = HashSet::new();

        let visible = corpus.visible_posts(config.future);
        let published: HashSet<&str> = visible.iter().map(|p| p.source.as_str()).collect();

        for post in corpus.all_posts() {
            let key = strip_root(&root, &post.path).map(url_key);
            if published.contains(post.source.as_str()) {
                by_source.insert(post.source.clone(), &post.anchors);
                if let Some(key) = key {
                    by_path.insert(key, &post.anchors);
                }
            } else {
                hidden_sources.insert(post.source.clone());
                hidden_paths.extend(key);
            }
        }
        for page in &corpus.pages {
            by_source.insert(page.source.clone(), &page.anchors);
            if let Some(path) = strip_root(&root, &page.path) {
                by_path.insert(url_key(path), &page.anchors);
            }
        }

        let mut routes = HashSet::new();
        routes.insert(String::new());
        routes.insert(url_key(&config.archive_dir));
        routes.insert(url_key(&config.tag_dir));
        routes.insert("atom.xml".to_string());

        if config.per_page > 0 {
            let pages = visible.len().div_ceil(config.per_page);
            for n in 2..=pages {
                routes.insert(format!("page/{}", n));
            }
        }
        for post in &visible {
            for tag in &post.tags {
                let tag_slug = slug::slugify(tag);
                if !tag_slug.is_empty() {
                    routes.insert(url_key(&format!("{}/{}", config.tag_dir, tag_slug)));
                }
            }
        }

        Self {
            root,
            by_source,
            by_path,
            hidden_sources,
            hidden_paths,
            routes,
            assets: &corpus.assets,
        }
    }

    /// Resolve a source path (relative to the source dir) to a document
    pub fn resolve_source(&self, source: &str) -> Target<'a> {
        if let Some(anchors) = self.by_source.get(source) {
            Target::Document(anchors)
        } else if self.hidden_sources.contains(source) {
            Target::Hidden
        } else {
            Target::Missing
        }
    }

    /// Resolve an absolute site path such as `/about/` or `/assets/x.png`
    pub fn resolve_site_path(&self, path: &str) -> Target<'a> {
        let Some(relative) = strip_root(&self.root, path) else {
            return Target::Missing;
        };
        let Some(relative) = normalize_segments(relative) else {
            return Target::Missing;
        };
        self.resolve_relative_to_root(&relative)
    }

    /// Resolve a relative link against the URL directory of a document
    pub fn resolve_from(&self, doc_path: &str, link: &str) -> Target<'a> {
        let Some(base) = strip_root(&self.root, doc_path) else {
            return Target::Missing;
        };
        let base_dir = match base.rfind('/') {
            Some(idx) => &base[..idx],
            None => "",
        };
        match normalize_segments(&format!("{}/{}", base_dir, link)) {
            Some(joined) => self.resolve_relative_to_root(&joined),
            None => Target::Missing,
        }
    }

    fn resolve_relative_to_root(&self, relative: &str) -> Target<'a> {
        let file = relative.trim_matches('/');
        if self.assets.contains(file) {
            return Target::Asset;
        }
        let key = url_key(relative);
        if let Some(anchors) = self.by_path.get(&key) {
            return Target::Document(anchors);
        }
        if self.routes.contains(&key) {
            return Target::Route;
        }
        if self.hidden_paths.contains(&key) {
            return Target::Hidden;
        }
        Target::Missing
    }
}

/// Root as `/` or `/prefix/`
fn normalize_root(root: &str) -> String {
    let trimmed = root.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", trimmed)
    }
}

/// Remove the site root from an absolute path
fn strip_root<'p>(root: &str, path: &'p str) -> Option<&'p str> {
    if let Some(rest) = path.strip_prefix(root) {
        return Some(rest);
    }
    // `/blog` is the same page as `/blog/`
    if path == root.trim_end_matches('/') {
        return Some("");
    }
    None
}

/// Canonical key for a page URL: no surrounding slashes, no `index.html`
pub fn url_key(path: &str) -> String {
    let path = path.trim_start_matches('/');
    let path = path.strip_suffix("index.html").unwrap_or(path);
    path.trim_end_matches('/').to_string()
}

/// Collapse `.` and `..` segments; `None` when the path escapes the root
pub fn normalize_segments(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    let mut joined = parts.join("/");
    if path.ends_with('/') && !joined.is_empty() {
        joined.push('/');
    }
    Some(joined)
}

/// Resolve a relative source path against the directory of another source file
pub fn join_source(from_source: &str, relative: &str) -> Option<String> {
    let dir = match from_source.rfind('/') {
        Some(idx) => &from_source[..idx],
        None => "",
    };
    normalize_segments(&format!("{}/{}", dir, relative))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_key() {
        assert_eq!(url_key("/about/"), "about");
        assert_eq!(url_key("about/index.html"), "about");
        assert_eq!(url_key("/"), "");
        assert_eq!(url_key("atom.xml"), "atom.xml");
    }

    #[test]
    fn test_normalize_segments() {
        assert_eq!(normalize_segments("a/./b/../c").as_deref(), Some("a/c"));
        assert_eq!(normalize_segments("/a/b/").as_deref(), Some("a/b/"));
        assert_eq!(normalize_segments("../x"), None);
    }

    #[test]
    fn test_join_source() {
        assert_eq!(
            join_source("_posts/2023-05-14-a.md", "2023-06-01-b.md").as_deref(),
            Some("_posts/2023-06-01-b.md")
        );
        assert_eq!(
            join_source("_drafts/x.md", "../about.md").as_deref(),
            Some("about.md")
        );
        assert_eq!(join_source("about.md", "../../x.md"), None);
    }

    #[test]
    fn test_strip_root() {
        assert_eq!(strip_root("/", "/about/"), Some("about/"));
        assert_eq!(strip_root("/blog/", "/blog/about/"), Some("about/"));
        assert_eq!(strip_root("/blog/", "/blog"), Some(""));
        assert_eq!(strip_root("/blog/", "/other/"), None);
        assert_eq!(normalize_root("blog"), "/blog/");
    }
}
