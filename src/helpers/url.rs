//! URL helper functions

use crate::config::SiteConfig;

/// Generate a URL with the root path
///
/// # Examples
/// ```ignore
/// url_for(&config, "/css/style.css") // -> "/blog/css/style.css"
/// ```
pub fn url_for(config: &SiteConfig, path: &str) -> String {
    let root = config.root.trim_end_matches('/');
    let path = path.trim_start_matches('/');

    if path.is_empty() {
        format!("{}/", root)
    } else {
        format!("{}/{}", root, path)
    }
}

/// Generate a full URL including the domain
///
/// # Examples
/// ```ignore
/// full_url_for(&config, "/about/") // -> "https://example.com/blog/about/"
/// ```
pub fn full_url_for(config: &SiteConfig, path: &str) -> String {
    let base = config.url.trim_end_matches('/');
    format!("{}{}", base, url_for(config, path))
}

/// URL of a tag's listing page
pub fn tag_url(config: &SiteConfig, tag: &str) -> String {
    url_for(
        config,
        &format!("{}/{}/", config.tag_dir.trim_matches('/'), slug::slugify(tag)),
    )
}

/// URL of the n-th index page (1-based)
pub fn index_page_url(config: &SiteConfig, page: usize) -> String {
    if page <= 1 {
        url_for(config, "")
    } else {
        url_for(config, &format!("page/{}/", page))
    }
}

/// Make root-relative `href`/`src` attributes absolute, for feed readers
pub fn absolutize_urls(html: &str, config: &SiteConfig) -> String {
    let base = config.url.trim_end_matches('/');
    html.replace("href=\"/", &format!("href=\"{}/", base))
        .replace("src=\"/", &format!("src=\"{}/", base))
        .replace("href='/", &format!("href='{}/", base))
        .replace("src='/", &format!("src='{}/", base))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> SiteConfig {
        SiteConfig {
            url: "https://example.com".to_string(),
            root: "/blog/".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_url_for() {
        let config = test_config();
        assert_eq!(url_for(&config, "/css/style.css"), "/blog/css/style.css");
        assert_eq!(url_for(&config, "about/"), "/blog/about/");
        assert_eq!(url_for(&config, ""), "/blog/");
    }

    #[test]
    fn test_full_url_for() {
        let config = test_config();
        assert_eq!(
            full_url_for(&config, "/about/"),
            "https://example.com/blog/about/"
        );
    }

    #[test]
    fn test_listing_urls() {
        let config = test_config();
        assert_eq!(tag_url(&config, "Garbage Collection"), "/blog/tags/garbage-collection/");
        assert_eq!(index_page_url(&config, 1), "/blog/");
        assert_eq!(index_page_url(&config, 3), "/blog/page/3/");
    }

    #[test]
    fn test_absolutize_urls() {
        let config = test_config();
        assert_eq!(
            absolutize_urls(r#"<img src="/blog/a.png"><a href="https://x.org/">"#, &config),
            r#"<img src="https://example.com/blog/a.png"><a href="https://x.org/">"#
        );
    }
}
