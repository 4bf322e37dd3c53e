//! Landing page.

use axum::extract::State;
use axum::response::Html;

use crate::context::AppContext;

/// Served when the static directory has no `index.html`.
pub const FALLBACK_INDEX: &str =
    "<h1>Twitch restreaming server</h1><p>index.html is missing.</p>";

/// GET / -- the control page, or a placeholder when it is missing.
pub async fn index(State(ctx): State<AppContext>) -> Html<String> {
    if let Some(dir) = &ctx.config.server.static_dir {
        let path = dir.join("index.html");
        match tokio::fs::read_to_string(&path).await {
            Ok(html) => return Html(html),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to read {}: {e}", path.display()),
        }
    }
    Html(FALLBACK_INDEX.to_string())
}
