//! Generator module - renders the corpus into static HTML using the built-in Tera templates

use anyhow::{Context as _, Result};
use chrono::Datelike;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use tera::Context;

use crate::check::join_source;
use crate::content::{Corpus, Layout, LinkKind, LinkRef, Page, Post};
use crate::helpers;
use crate::templates::{
    ArchiveYearData, ConfigData, NavPost, PageData, PaginationData, PostData, SiteData, TagData,
    TagLink, TemplateRenderer,
};
use crate::Site;

lazy_static! {
    static ref LINK_ATTR: Regex = Regex::new(r#"(href|src)="([^"]*)""#).expect("valid regex");
}

/// Number of entries in `atom.xml`
const FEED_LIMIT: usize = 20;

/// Static site generator using Tera templates
pub struct Generator {
    site: Site,
    renderer: TemplateRenderer,
}

/// What a generation run produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerateStats {
    pub posts: usize,
    pub pages: usize,
    pub tags: usize,
    pub assets: usize,
}

impl Generator {
    /// Create a new generator
    pub fn new(site: &Site) -> Result<Self> {
        let renderer = TemplateRenderer::new(&site.config)?;

        Ok(Self {
            site: site.clone(),
            renderer,
        })
    }

    /// Generate the entire site
    pub fn generate(&self, corpus: &Corpus) -> Result<GenerateStats> {
        fs::create_dir_all(&self.site.public_dir)
            .with_context(|| format!("Failed to create {:?}", self.site.public_dir))?;

        let assets = self.copy_assets(corpus)?;

        let posts = corpus.visible_posts(self.site.config.future);
        let doc_paths = document_paths(&posts, &corpus.pages);

        let post_data: Vec<PostData> = posts
            .iter()
            .map(|p| self.post_data(p, &doc_paths))
            .collect();
        let tags = self.collect_tags(&posts, &post_data);

        let site_data = SiteData {
            pages: corpus
                .pages
                .iter()
                .map(|p| NavPost {
                    title: p.title.clone(),
                    path: p.path.clone(),
                })
                .collect(),
            post_count: posts.len(),
            tag_count: tags.len(),
        };
        let config_data = ConfigData::from(&self.site.config);

        self.generate_index_pages(&post_data, &site_data, &config_data)?;
        self.generate_post_pages(&posts, &post_data, &site_data, &config_data)?;
        self.generate_page_pages(&corpus.pages, &doc_paths, &site_data, &config_data)?;
        self.generate_archive_page(&posts, &post_data, &site_data, &config_data)?;
        self.generate_tag_pages(&tags, &site_data, &config_data)?;
        self.generate_atom_feed(&posts, &post_data)?;

        let stats = GenerateStats {
            posts: posts.len(),
            pages: corpus.pages.len(),
            tags: tags.len(),
            assets,
        };
        tracing::info!(
            "Generated {} posts, {} pages, {} tags, copied {} assets",
            stats.posts,
            stats.pages,
            stats.tags,
            stats.assets
        );

        Ok(stats)
    }

    fn post_data(&self, post: &Post, doc_paths: &HashMap<String, String>) -> PostData {
        let config = &self.site.config;
        PostData {
            title: post.title.clone(),
            date_iso: config.in_timezone(&post.date).to_rfc3339(),
            path: post.path.clone(),
            permalink: post.permalink.clone(),
            authors: post.authors.clone(),
            tags: post
                .tags
                .iter()
                .filter(|t| !slug::slugify(t).is_empty())
                .map(|t| TagLink {
                    name: t.clone(),
                    path: helpers::tag_url(config, t),
                })
                .collect(),
            content: rewrite_document_links(&post.content, &post.source, doc_paths),
            excerpt: post
                .excerpt
                .as_ref()
                .map(|e| rewrite_document_links(e, &post.source, doc_paths)),
            draft: post.draft,
        }
    }

    fn page_data(&self, page: &Page, doc_paths: &HashMap<String, String>) -> PageData {
        PageData {
            title: page.title.clone(),
            date_iso: self.site.config.in_timezone(&page.date).to_rfc3339(),
            path: page.path.clone(),
            permalink: page.permalink.clone(),
            authors: page.authors.clone(),
            content: rewrite_document_links(&page.content, &page.source, doc_paths),
        }
    }

    /// Group posts by tag slug; the first spelling seen names the tag
    fn collect_tags(&self, posts: &[Post], post_data: &[PostData]) -> Vec<TagData> {
        let mut by_slug: BTreeMap<String, TagData> = BTreeMap::new();

        for (post, data) in posts.iter().zip(post_data) {
            for tag in &post.tags {
                let tag_slug = slug::slugify(tag);
                if tag_slug.is_empty() {
                    continue;
                }
                by_slug
                    .entry(tag_slug.clone())
                    .or_insert_with(|| TagData {
                        name: tag.trim().to_string(),
                        path: helpers::tag_url(&self.site.config, tag),
                        slug: tag_slug,
                        posts: Vec::new(),
                    })
                    .posts
                    .push(data.clone());
            }
        }

        let mut tags: Vec<TagData> = by_slug.into_values().collect();
        tags.sort_by_key(|t| t.name.to_lowercase());
        tags
    }

    /// Create a base context with common variables
    fn create_base_context(&self, site_data: &SiteData, config_data: &ConfigData) -> Context {
        let mut context = Context::new();
        context.insert("site", site_data);
        context.insert("config", config_data);
        context.insert(
            "current_year",
            &chrono::Local::now().format("%Y").to_string(),
        );
        context.insert("version", env!("CARGO_PKG_VERSION"));
        context
    }

    /// Generate index pages with pagination
    fn generate_index_pages(
        &self,
        posts: &[PostData],
        site_data: &SiteData,
        config_data: &ConfigData,
    ) -> Result<()> {
        let config = &self.site.config;
        let per_page = if config.per_page == 0 {
            posts.len().max(1)
        } else {
            config.per_page
        };
        let total_pages = posts.len().div_ceil(per_page).max(1);

        for page_num in 1..=total_pages {
            let start = ((page_num - 1) * per_page).min(posts.len());
            let end = (start + per_page).min(posts.len());

            let pagination = PaginationData {
                per_page,
                total: total_pages,
                current: page_num,
                current_url: helpers::index_page_url(config, page_num),
                prev_link: if page_num > 1 {
                    helpers::index_page_url(config, page_num - 1)
                } else {
                    String::new()
                },
                next_link: if page_num < total_pages {
                    helpers::index_page_url(config, page_num + 1)
                } else {
                    String::new()
                },
            };

            let mut context = self.create_base_context(site_data, config_data);
            context.insert("page_posts", &posts[start..end]);
            context.insert("pagination", &pagination);
            context.insert("current_path", &pagination.current_url);

            let html = self.renderer.render("index.html", &context)?;
            self.write_output(&pagination.current_url, &html)?;
        }

        Ok(())
    }

    /// Generate individual post pages
    fn generate_post_pages(
        &self,
        posts: &[Post],
        post_data: &[PostData],
        site_data: &SiteData,
        config_data: &ConfigData,
    ) -> Result<()> {
        let nav = |p: &Post| NavPost {
            title: p.title.clone(),
            path: p.path.clone(),
        };

        for (post, data) in posts.iter().zip(post_data) {
            let mut context = self.create_base_context(site_data, config_data);
            context.insert("current_path", &post.path);

            let html = match self.layout_of(post.layout.as_deref(), Layout::Post, &post.source) {
                Layout::Post => {
                    context.insert("post", data);
                    context.insert("newer_post", &post.prev(posts).map(nav));
                    context.insert("older_post", &post.next(posts).map(nav));
                    self.renderer.render("post.html", &context)?
                }
                Layout::Page => {
                    context.insert(
                        "page",
                        &PageData {
                            title: data.title.clone(),
                            date_iso: data.date_iso.clone(),
                            path: data.path.clone(),
                            permalink: data.permalink.clone(),
                            authors: data.authors.clone(),
                            content: data.content.clone(),
                        },
                    );
                    self.renderer.render("page.html", &context)?
                }
            };

            self.write_output(&post.path, &html)?;
        }

        Ok(())
    }

    /// Generate standalone pages
    fn generate_page_pages(
        &self,
        pages: &[Page],
        doc_paths: &HashMap<String, String>,
        site_data: &SiteData,
        config_data: &ConfigData,
    ) -> Result<()> {
        for page in pages {
            let data = self.page_data(page, doc_paths);
            let mut context = self.create_base_context(site_data, config_data);
            context.insert("current_path", &page.path);

            let html = match self.layout_of(page.layout.as_deref(), Layout::Page, &page.source) {
                Layout::Page => {
                    context.insert("page", &data);
                    self.renderer.render("page.html", &context)?
                }
                Layout::Post => {
                    context.insert(
                        "post",
                        &PostData {
                            title: data.title,
                            date_iso: data.date_iso,
                            path: data.path,
                            permalink: data.permalink,
                            authors: data.authors,
                            tags: Vec::new(),
                            content: data.content,
                            excerpt: None,
                            draft: false,
                        },
                    );
                    context.insert("newer_post", &None::<NavPost>);
                    context.insert("older_post", &None::<NavPost>);
                    self.renderer.render("post.html", &context)?
                }
            };

            self.write_output(&page.path, &html)?;
        }

        Ok(())
    }

    fn layout_of(&self, layout: Option<&str>, default: Layout, source: &str) -> Layout {
        match layout.map(str::parse::<Layout>) {
            None => default,
            Some(Ok(layout)) => layout,
            Some(Err(e)) => {
                tracing::warn!("{}: {}, rendering as {}", source, e, default);
                default
            }
        }
    }

    /// Generate archive page, grouped by year, newest first
    fn generate_archive_page(
        &self,
        posts: &[Post],
        post_data: &[PostData],
        site_data: &SiteData,
        config_data: &ConfigData,
    ) -> Result<()> {
        let mut years_map: BTreeMap<i32, Vec<PostData>> = BTreeMap::new();

        for (post, data) in posts.iter().zip(post_data) {
            let year = self.site.config.local_date(&post.date).year();
            years_map.entry(year).or_default().push(data.clone());
        }

        let archive_years: Vec<ArchiveYearData> = years_map
            .into_iter()
            .rev()
            .map(|(year, posts)| ArchiveYearData { year, posts })
            .collect();

        let path = helpers::url_for(
            &self.site.config,
            &format!("{}/", config_data.archive_dir),
        );
        let mut context = self.create_base_context(site_data, config_data);
        context.insert("archive_years", &archive_years);
        context.insert("current_path", &path);

        let html = self.renderer.render("archive.html", &context)?;
        self.write_output(&path, &html)?;
        tracing::debug!("Generated archive page");

        Ok(())
    }

    /// Generate the tag index and one page per tag
    fn generate_tag_pages(
        &self,
        tags: &[TagData],
        site_data: &SiteData,
        config_data: &ConfigData,
    ) -> Result<()> {
        let index_path = helpers::url_for(&self.site.config, &format!("{}/", config_data.tag_dir));
        let mut context = self.create_base_context(site_data, config_data);
        context.insert("all_tags", tags);
        context.insert("current_path", &index_path);
        let html = self.renderer.render("tags.html", &context)?;
        self.write_output(&index_path, &html)?;

        for tag in tags {
            let mut context = self.create_base_context(site_data, config_data);
            context.insert("tag", tag);
            context.insert("current_path", &tag.path);

            let html = self.renderer.render("tag.html", &context)?;
            self.write_output(&tag.path, &html)?;
        }

        tracing::debug!("Generated {} tag pages", tags.len());
        Ok(())
    }

    /// Generate Atom feed with the most recent posts
    fn generate_atom_feed(&self, posts: &[Post], post_data: &[PostData]) -> Result<()> {
        let config = &self.site.config;
        let home = helpers::full_url_for(config, "");
        let updated = posts
            .iter()
            .map(|p| p.updated.unwrap_or(p.date).max(p.date))
            .max()
            .map(|d| helpers::date_xml(&config.in_timezone(&d)))
            .unwrap_or_else(|| helpers::date_xml(&chrono::Local::now()));

        let mut feed = String::new();
        feed.push_str(r#"<?xml version="1.0" encoding="utf-8"?>"#);
        feed.push('\n');
        feed.push_str(r#"<feed xmlns="http://www.w3.org/2005/Atom">"#);
        feed.push('\n');
        feed.push_str(&format!(
            "  <title>{}</title>\n",
            helpers::escape_xml(&config.title)
        ));
        if !config.subtitle.is_empty() {
            feed.push_str(&format!(
                "  <subtitle>{}</subtitle>\n",
                helpers::escape_xml(&config.subtitle)
            ));
        }
        feed.push_str(&format!(
            "  <link href=\"{}\" rel=\"self\"/>\n",
            helpers::full_url_for(config, "atom.xml")
        ));
        feed.push_str(&format!("  <link href=\"{}\"/>\n", home));
        feed.push_str(&format!("  <updated>{}</updated>\n", updated));
        feed.push_str(&format!("  <id>{}</id>\n", home));
        if !config.author.is_empty() {
            feed.push_str(&format!(
                "  <author><name>{}</name></author>\n",
                helpers::escape_xml(&config.author)
            ));
        }
        feed.push_str("  <generator>quillpress</generator>\n");

        for (post, data) in posts.iter().zip(post_data).take(FEED_LIMIT) {
            feed.push_str("  <entry>\n");
            feed.push_str(&format!(
                "    <title>{}</title>\n",
                helpers::escape_xml(&post.title)
            ));
            feed.push_str(&format!("    <link href=\"{}\"/>\n", post.permalink));
            feed.push_str(&format!("    <id>{}</id>\n", post.permalink));
            feed.push_str(&format!(
                "    <published>{}</published>\n",
                helpers::date_xml(&config.in_timezone(&post.date))
            ));
            feed.push_str(&format!(
                "    <updated>{}</updated>\n",
                helpers::date_xml(&config.in_timezone(&post.updated.unwrap_or(post.date)))
            ));
            for author in &post.authors {
                feed.push_str(&format!(
                    "    <author><name>{}</name></author>\n",
                    helpers::escape_xml(author)
                ));
            }
            for tag in &data.tags {
                feed.push_str(&format!(
                    "    <category term=\"{}\"/>\n",
                    helpers::escape_xml(&tag.name)
                ));
            }

            let content = data.excerpt.as_ref().unwrap_or(&data.content);
            let content = helpers::absolutize_urls(content, config);
            // CDATA cannot contain its own terminator
            let content = helpers::strip_invalid_xml_chars(&content).replace("]]>", "]]]]><![CDATA[>");
            feed.push_str(&format!(
                "    <content type=\"html\"><![CDATA[{}]]></content>\n",
                content
            ));
            feed.push_str("  </entry>\n");
        }

        feed.push_str("</feed>\n");

        let output_path = self.site.public_dir.join("atom.xml");
        fs::write(&output_path, feed)
            .with_context(|| format!("Failed to write {:?}", output_path))?;
        tracing::debug!("Generated atom.xml");

        Ok(())
    }

    /// Copy static files from the source dir to the public dir
    fn copy_assets(&self, corpus: &Corpus) -> Result<usize> {
        for asset in &corpus.assets {
            let from = self.site.source_dir.join(asset);
            let dest = self.site.public_dir.join(asset);

            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&from, &dest)
                .with_context(|| format!("Failed to copy {:?} to {:?}", from, dest))?;
        }

        Ok(corpus.assets.len())
    }

    /// File a URL path is written to, relative to the public dir
    fn output_file(&self, url_path: &str) -> PathBuf {
        let root = self.site.config.root.trim_matches('/');
        let mut relative = url_path.trim_start_matches('/');
        if !root.is_empty() {
            if relative == root {
                relative = "";
            } else if let Some(rest) = relative.strip_prefix(&format!("{}/", root)) {
                relative = rest;
            }
        }

        if relative.ends_with(".html") || relative.ends_with(".htm") {
            self.site.public_dir.join(relative)
        } else {
            self.site
                .public_dir
                .join(relative.trim_end_matches('/'))
                .join("index.html")
        }
    }

    fn write_output(&self, url_path: &str, html: &str) -> Result<()> {
        let output_path = self.output_file(url_path);
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create dir {:?}", parent))?;
        }
        fs::write(&output_path, html)
            .with_context(|| format!("Failed to write {:?}", output_path))?;
        tracing::debug!("Generated: {:?}", output_path);
        Ok(())
    }
}

/// URL path of every document that gets written, keyed by source path.
/// Links to hidden posts are left pointing at their sources.
fn document_paths(posts: &[Post], pages: &[Page]) -> HashMap<String, String> {
    posts
        .iter()
        .map(|p| (p.source.clone(), p.path.clone()))
        .chain(pages.iter().map(|p| (p.source.clone(), p.path.clone())))
        .collect()
}

/// Point links at Markdown sources to the pages generated from them
fn rewrite_document_links(
    html: &str,
    from_source: &str,
    doc_paths: &HashMap<String, String>,
) -> String {
    LINK_ATTR
        .replace_all(html, |caps: &Captures| {
            let dest = &caps[2];
            let link = LinkRef::new(dest, false, 0);
            if link.kind != LinkKind::Document {
                return caps[0].to_string();
            }

            let target = join_source(from_source, &link.path()).and_then(|s| doc_paths.get(&s));
            match (target, dest.split_once('#')) {
                (Some(path), Some((_, fragment))) if !fragment.is_empty() => {
                    format!(r#"{}="{}#{}""#, &caps[1], path, fragment)
                }
                (Some(path), _) => format!(r#"{}="{}""#, &caps[1], path),
                (None, _) => caps[0].to_string(),
            }
        })
        .into_owned()
}
