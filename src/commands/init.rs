//! Initialize a new site

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::Site;

const CONFIG: &str = r#"# Site
title: Quillpress
subtitle: ''
description: ''
author: John Doe
language: en
timezone: ''

# URL
## Set `url` to your site's origin and `root` to its sub-directory, if any
url: http://example.com
root: /
permalink: :year/:month/:day/:title/

# Directory
source_dir: source
public_dir: public
tag_dir: tags
archive_dir: archives
exclude: []

# Writing
new_post_name: :year-:month-:day-:title.md
default_layout: post
render_drafts: false
future: true
date_format: YYYY-MM-DD
highlight:
  theme: base16-ocean.dark
  line_number: false

# Pagination
per_page: 10

# Content checks
check:
  require_author: true
  strict: false
  todo_markers: ["[TODO]", "TODO:"]
"#;

const POST_SCAFFOLD: &str = r#"---
title: {{ title }}
date: {{ date }}
tags:
---
"#;

const PAGE_SCAFFOLD: &str = r#"---
title: {{ title }}
date: {{ date }}
layout: page
---
"#;

const DRAFT_SCAFFOLD: &str = r#"---
title: {{ title }}
tags:
---
"#;

const ABOUT_PAGE: &str = r#"---
title: About
layout: page
---

This blog is built with quillpress. Edit `source/about.md` to introduce yourself.
"#;

/// Built-in scaffold for a layout, used when `scaffolds/<layout>.md` is absent
pub(crate) fn default_scaffold(layout: &str) -> &'static str {
    match layout {
        "page" => PAGE_SCAFFOLD,
        "draft" => DRAFT_SCAFFOLD,
        _ => POST_SCAFFOLD,
    }
}

/// Initialize a new site in the given directory
pub fn init_site(target_dir: &Path) -> Result<()> {
    let config_path = target_dir.join("_config.yml");
    if config_path.exists() {
        anyhow::bail!("A site already exists in {:?}", target_dir);
    }

    for dir in ["source/_posts", "source/_drafts", "scaffolds"] {
        let path = target_dir.join(dir);
        fs::create_dir_all(&path).with_context(|| format!("Failed to create {:?}", path))?;
    }

    fs::write(&config_path, CONFIG)?;
    fs::write(target_dir.join("scaffolds/post.md"), POST_SCAFFOLD)?;
    fs::write(target_dir.join("scaffolds/page.md"), PAGE_SCAFFOLD)?;
    fs::write(target_dir.join("scaffolds/draft.md"), DRAFT_SCAFFOLD)?;
    fs::write(target_dir.join("source/about.md"), ABOUT_PAGE)?;

    let now = chrono::Local::now();
    let sample_post = format!(
        r#"---
title: Hello World
date: {}
tags: [meta]
---

Welcome to your new blog[^welcome]. Posts live in `source/_posts`, drafts in
`source/_drafts`, and pages such as the [about page](../about.md) anywhere
else under `source`.

<!-- more -->

## Writing

Create a post with `quillpress new "My New Post"` and preview it with
`quillpress server`. Before publishing, run `quillpress check` to catch
broken links, [missing anchors](#writing) and dangling footnotes.

[^welcome]: Footnotes are checked too: every reference needs a definition.
"#,
        now.format("%Y-%m-%d %H:%M:%S")
    );
    let sample_name = format!("source/_posts/{}-hello-world.md", now.format("%Y-%m-%d"));
    fs::write(target_dir.join(sample_name), sample_post)?;

    tracing::debug!("Initialized site skeleton in {:?}", target_dir);
    Ok(())
}

/// Run the init command for an existing Site handle
pub fn run(site: &Site) -> Result<()> {
    init_site(&site.base_dir)
}
