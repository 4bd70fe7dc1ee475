//! Development server
//!
//! Serves the public directory under the site root. With live reload on,
//! HTML pages get a small WebSocket client and every successful rebuild
//! tells open pages to refresh.

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocketUpgrade},
        State,
    },
    http::{Request, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use notify_debouncer_mini::{new_debouncer, notify::RecursiveMode, DebounceEventResult};
use percent_encoding::percent_decode_str;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tower_http::services::ServeDir;

use crate::commands::generate;
use crate::Site;

const RELOAD_PATH: &str = "/__livereload";

const RELOAD_CLIENT: &str = r#"<script>
(function () {
  var ws = new WebSocket('ws://' + location.host + '/__livereload');
  ws.onmessage = function (msg) { if (msg.data === 'reload') location.reload(); };
  ws.onclose = function () { setTimeout(function () { location.reload(); }, 1000); };
})();
</script>
"#;

struct ServerState {
    public_dir: PathBuf,
    /// Site sub-path, e.g. `/blog/`; output files are written without it
    root: String,
    reload_tx: broadcast::Sender<()>,
    live_reload: bool,
}

/// Serve the generated site until interrupted
pub async fn start(site: &Site, ip: &str, port: u16, watch: bool, open: bool) -> Result<()> {
    let (reload_tx, _) = broadcast::channel(16);

    if watch {
        let site = site.clone();
        let tx = reload_tx.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = watch_and_reload(site, tx) {
                tracing::error!("File watcher stopped: {:#}", e);
            }
        });
    }

    let state = Arc::new(ServerState {
        public_dir: site.public_dir.clone(),
        root: site.config.root.clone(),
        reload_tx,
        live_reload: watch,
    });
    let app = Router::new()
        .route(RELOAD_PATH, get(reload_socket))
        .fallback(serve_file)
        .with_state(state);

    let host = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", ip, port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    let url = format!("http://{}:{}{}", ip, port, site.config.root);
    tracing::info!("Serving {:?} at {}", site.public_dir, url);
    if watch {
        tracing::info!("Live reload enabled");
    }
    if open {
        if let Err(e) = open_browser(&url) {
            tracing::warn!("Failed to open browser: {}", e);
        }
    }

    axum::serve(listener, app).await?;
    Ok(())
}

/// Rebuild after source or config changes, then notify connected pages
fn watch_and_reload(site: Site, reload_tx: broadcast::Sender<()>) -> Result<()> {
    let (tx, rx) = std::sync::mpsc::channel::<DebounceEventResult>();
    let mut debouncer = new_debouncer(Duration::from_millis(500), tx)?;

    let config_path = site.base_dir.join("_config.yml");
    for (path, mode) in [
        (&site.source_dir, RecursiveMode::Recursive),
        (&config_path, RecursiveMode::NonRecursive),
    ] {
        if path.exists() {
            debouncer.watcher().watch(path, mode)?;
            tracing::debug!("Watching {:?}", path);
        }
    }

    for result in rx {
        let events = match result {
            Ok(events) => events,
            Err(e) => {
                tracing::error!("Watch error: {:?}", e);
                continue;
            }
        };
        let changed: Vec<&PathBuf> = events
            .iter()
            .map(|e| &e.path)
            .filter(|p| is_relevant(p))
            .collect();
        if changed.is_empty() {
            continue;
        }
        tracing::info!("Changed: {:?}", changed);

        match generate::reload(&site).and_then(|site| generate::run(&site)) {
            Ok(stats) => {
                tracing::info!("Rebuilt {} posts and {} pages", stats.posts, stats.pages);
                let _ = reload_tx.send(());
            }
            Err(e) => tracing::error!("Generation failed: {:#}", e),
        }
    }

    Ok(())
}

/// Editor swap files and VCS metadata do not trigger rebuilds
fn is_relevant(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    !path.components().any(|c| c.as_os_str() == ".git")
        && name != ".DS_Store"
        && !name.ends_with('~')
        && !name.ends_with(".swp")
        && !name.starts_with(".#")
}

async fn reload_socket(ws: WebSocketUpgrade, State(state): State<Arc<ServerState>>) -> Response {
    let mut reloads = state.reload_tx.subscribe();
    ws.on_upgrade(move |mut socket| async move {
        loop {
            match reloads.recv().await {
                Ok(()) => {
                    if socket.send(Message::Text("reload".into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
        tracing::debug!("Live reload client disconnected");
    })
}

/// Serve a file from the public dir, injecting the reload client into pages
async fn serve_file(State(state): State<Arc<ServerState>>, mut request: Request<Body>) -> Response {
    let Some(path) = strip_site_root(request.uri().path(), &state.root) else {
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    };

    if state.live_reload {
        let decoded = percent_decode_str(&path).decode_utf8_lossy();
        if let Some(file) = html_file(&state.public_dir, &decoded) {
            if let Ok(html) = tokio::fs::read_to_string(&file).await {
                return Html(inject_live_reload(&html)).into_response();
            }
        }
    }

    let query = request
        .uri()
        .query()
        .map(|q| format!("?{}", q))
        .unwrap_or_default();
    if let Ok(uri) = format!("{}{}", path, query).parse::<Uri>() {
        *request.uri_mut() = uri;
    }

    let mut files = ServeDir::new(&state.public_dir).append_index_html_on_directories(true);
    match files.try_call(request).await {
        Ok(response) => response.into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Map a request path under the site root to a path inside the public dir
fn strip_site_root(path: &str, root: &str) -> Option<String> {
    let root = root.trim_end_matches('/');
    if root.is_empty() {
        return Some(path.to_string());
    }
    match path.strip_prefix(root) {
        Some("") => Some("/".to_string()),
        Some(rest) if rest.starts_with('/') => Some(rest.to_string()),
        _ => None,
    }
}

/// The HTML file a decoded request path names, if one exists
fn html_file(public_dir: &Path, path: &str) -> Option<PathBuf> {
    let relative = path.trim_start_matches('/');
    if relative.split('/').any(|segment| segment == "..") {
        return None;
    }

    let candidate = public_dir.join(relative);
    let file = if candidate.is_dir() {
        candidate.join("index.html")
    } else {
        candidate
    };
    let is_html = matches!(
        file.extension().and_then(|e| e.to_str()),
        Some("html" | "htm")
    );
    (is_html && file.is_file()).then_some(file)
}

fn inject_live_reload(html: &str) -> String {
    match html.rfind("</body>") {
        Some(pos) => format!("{}{}{}", &html[..pos], RELOAD_CLIENT, &html[pos..]),
        None => format!("{}{}", html, RELOAD_CLIENT),
    }
}

fn open_browser(url: &str) -> std::io::Result<()> {
    let (program, args): (&str, &[&str]) = if cfg!(target_os = "macos") {
        ("open", &[])
    } else if cfg!(target_os = "windows") {
        ("cmd", &["/c", "start"])
    } else {
        ("xdg-open", &[])
    };
    Command::new(program).args(args).arg(url).spawn().map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_inject_live_reload() {
        let html = inject_live_reload("<html><body><p>Hi</p></body></html>");
        assert!(html.contains(RELOAD_PATH));
        assert!(html.ends_with("</script>\n</body></html>"));
        assert!(inject_live_reload("<p>bare</p>").starts_with("<p>bare</p><script>"));
    }

    #[test]
    fn test_strip_site_root() {
        assert_eq!(strip_site_root("/a/b/", "/").as_deref(), Some("/a/b/"));
        assert_eq!(strip_site_root("/blog", "/blog/").as_deref(), Some("/"));
        assert_eq!(strip_site_root("/blog/2024/", "/blog/").as_deref(), Some("/2024/"));
        assert_eq!(strip_site_root("/blogroll/", "/blog/"), None);
        assert_eq!(strip_site_root("/other/", "/blog/"), None);
    }

    #[test]
    fn test_html_file() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("about")).unwrap();
        fs::write(dir.path().join("about/index.html"), "<p>About</p>").unwrap();
        fs::write(dir.path().join("atom.xml"), "<feed/>").unwrap();

        assert_eq!(
            html_file(dir.path(), "/about/"),
            Some(dir.path().join("about/index.html"))
        );
        assert_eq!(html_file(dir.path(), "/atom.xml"), None);
        assert_eq!(html_file(dir.path(), "/missing/"), None);
        assert_eq!(html_file(dir.path(), "/../about/index.html"), None);
    }

    #[test]
    fn test_is_relevant() {
        assert!(is_relevant(Path::new("/blog/source/_posts/2024-01-01-a.md")));
        assert!(!is_relevant(Path::new("/blog/source/.git/index")));
        assert!(!is_relevant(Path::new("/blog/source/_posts/a.md~")));
        assert!(!is_relevant(Path::new("/blog/source/_posts/.a.md.swp")));
    }
}
