//! List site content

use anyhow::Result;
use std::collections::BTreeMap;

use crate::content::footnote::normalize_label;
use crate::content::{ContentLoader, Corpus, Post};
use crate::Site;

/// List site content by type
pub fn run(site: &Site, content_type: &str) -> Result<()> {
    let loader = ContentLoader::new(site).with_drafts(matches!(
        content_type,
        "draft" | "drafts" | "footnote" | "footnotes"
    ));
    let corpus = loader.load()?;
    print!("{}", render(&corpus, content_type)?);
    Ok(())
}

/// Build the listing text for a content type
pub fn render(corpus: &Corpus, content_type: &str) -> Result<String> {
    let mut out = String::new();

    match content_type {
        "post" | "posts" => list_posts(&mut out, "Posts", &corpus.posts),
        "draft" | "drafts" => list_posts(&mut out, "Drafts", &corpus.drafts),
        "page" | "pages" => {
            out.push_str(&format!("Pages ({}):\n", corpus.pages.len()));
            for page in &corpus.pages {
                out.push_str(&format!("  {} {} [{}]\n", page.path, page.title, page.source));
            }
        }
        "tag" | "tags" => {
            let mut tags: BTreeMap<String, (String, usize)> = BTreeMap::new();
            for post in &corpus.posts {
                for tag in &post.tags {
                    tags.entry(slug::slugify(tag))
                        .or_insert_with(|| (tag.clone(), 0))
                        .1 += 1;
                }
            }
            let mut tags: Vec<_> = tags.into_values().collect();
            tags.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

            out.push_str(&format!("Tags ({}):\n", tags.len()));
            for (tag, count) in tags {
                out.push_str(&format!("  {} ({})\n", tag, count));
            }
        }
        "footnote" | "footnotes" => {
            let documents = corpus
                .all_posts()
                .map(|p| (&p.source, &p.footnotes))
                .chain(corpus.pages.iter().map(|p| (&p.source, &p.footnotes)))
                .filter(|(_, f)| !f.is_empty());

            let mut total = 0;
            let mut body = String::new();
            for (source, footnotes) in documents {
                body.push_str(&format!("  {}\n", source));
                for def in &footnotes.definitions {
                    let uses = footnotes
                        .references
                        .iter()
                        .filter(|r| normalize_label(&r.label) == normalize_label(&def.label))
                        .count();
                    body.push_str(&format!(
                        "    [^{}] line {}: {} reference(s)\n",
                        def.label, def.line, uses
                    ));
                    total += 1;
                }
                for r in footnotes.undefined() {
                    body.push_str(&format!("    [^{}] line {}: undefined\n", r.label, r.line));
                }
            }
            out.push_str(&format!("Footnotes ({}):\n", total));
            out.push_str(&body);
        }
        _ => {
            anyhow::bail!(
                "Unknown type: {}. Available: post, page, draft, tag, footnote",
                content_type
            );
        }
    }

    Ok(out)
}

fn list_posts(out: &mut String, heading: &str, posts: &[Post]) {
    out.push_str(&format!("{} ({}):\n", heading, posts.len()));
    for post in posts {
        out.push_str(&format!(
            "  {} - {} [{}]{}\n",
            post.date.format("%Y-%m-%d"),
            post.title,
            post.source,
            if post.published { "" } else { " (unpublished)" }
        ));
    }
}
