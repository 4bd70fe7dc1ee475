use std::fs;

use quillpress::commands;
use quillpress::Site;
use tempfile::TempDir;
use walkdir::WalkDir;

fn new_site() -> (TempDir, Site) {
    let dir = TempDir::new().unwrap();
    commands::init::init_site(dir.path()).unwrap();
    let site = Site::new(dir.path()).unwrap();
    (dir, site)
}

#[test]
fn fresh_site_checks_clean_and_generates() {
    let (_dir, site) = new_site();

    let report = site.check().unwrap();
    assert!(
        report.diagnostics.is_empty(),
        "unexpected diagnostics:\n{}",
        report.to_text()
    );
    assert_eq!(report.documents, 2);

    let stats = site.generate().unwrap();
    assert_eq!(stats.posts, 1);
    assert_eq!(stats.pages, 1);
    assert_eq!(stats.tags, 1);

    for file in [
        "index.html",
        "about/index.html",
        "archives/index.html",
        "tags/index.html",
        "tags/meta/index.html",
        "atom.xml",
    ] {
        assert!(site.public_dir.join(file).is_file(), "missing {}", file);
    }

    let post = WalkDir::new(&site.public_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| e.path().ends_with("hello-world/index.html"))
        .expect("rendered sample post");
    let html = fs::read_to_string(post.path()).unwrap();
    assert!(html.contains("Hello World"));
    assert!(html.contains(r#"id="writing""#));
    assert!(!html.contains("about.md"));

    let feed = fs::read_to_string(site.public_dir.join("atom.xml")).unwrap();
    assert!(feed.contains("http://example.com/"));
}

#[test]
fn broken_content_is_reported_and_strict_fails_on_warnings() {
    let (dir, site) = new_site();
    let posts = dir.path().join("source/_posts");

    fs::write(
        posts.join("2023-02-01-escape-analysis.md"),
        "---\ntitle: Escape analysis\n---\nSee [^missing] and ![plot](/images/plot.png).\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("source/_drafts/notes.md"),
        "---\ntitle: Notes\n---\n[TODO] finish\n",
    )
    .unwrap();

    let report = site.check().unwrap();
    assert_eq!(report.with_code("undefined-footnote").len(), 1);
    assert_eq!(report.with_code("missing-asset").len(), 1);
    assert!(report.has_errors());

    let drafts = site.clone().with_drafts(true);
    let report = drafts.check().unwrap();
    assert_eq!(report.with_code("todo-marker").len(), 1);
    assert!(commands::check::run(&drafts, true, commands::check::OutputFormat::Json).unwrap());
}

#[test]
fn new_then_publish_round_trip() {
    let (dir, site) = new_site();

    let draft = site.new_post("Tracing GC", Some("draft")).unwrap();
    assert_eq!(draft, dir.path().join("source/_drafts/tracing-gc.md"));

    let published = commands::publish::run(&site, "tracing-gc").unwrap();
    assert!(!draft.exists());
    assert!(published.starts_with(dir.path().join("source/_posts")));

    let stats = site.generate().unwrap();
    assert_eq!(stats.posts, 2);
}
