//! Axum router construction.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::routes;

/// Build the complete Axum router.
///
/// Paths without a route fall through to files under the configured static
/// directory, when it exists.
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let static_dir = ctx.config.server.static_dir.clone();

    let mut app = Router::new()
        .route("/", get(routes::index::index))
        .route("/health", get(routes::health::health_check))
        .route("/logs", get(routes::logs::list_logs))
        .route("/logs/stream", get(routes::events::log_events))
        .route("/stream-status", get(routes::stream::stream_status))
        .route("/start-stream", post(routes::stream::start_stream))
        .route("/stop-stream", post(routes::stream::stop_stream))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx);

    if let Some(dir) = static_dir {
        if dir.exists() {
            tracing::info!("Serving static files from {:?}", dir);
            app = app.fallback_service(ServeDir::new(&dir));
        }
    }

    app
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use sr_core::config::{Config, StreamKey};
    use sr_relay::testing::{FakeTranscoder, StaticFetcher};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn context(config: Config) -> AppContext {
        AppContext::new(
            config,
            Arc::new(StaticFetcher::new()),
            Arc::new(FakeTranscoder::new()),
        )
    }

    fn config_without_static() -> Config {
        let mut config = Config::default();
        config.server.static_dir = None;
        config
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = build_router(context(config_without_static()));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "OK");
    }

    #[tokio::test]
    async fn index_falls_back_without_static_dir() {
        let app = build_router(context(config_without_static()));
        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, routes::index::FALLBACK_INDEX);
    }

    #[tokio::test]
    async fn static_files_are_served() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>Control</h1>").unwrap();
        std::fs::write(dir.path().join("app.js"), "console.log('hi');").unwrap();

        let mut config = Config::default();
        config.server.static_dir = Some(dir.path().to_path_buf());
        let app = build_router(context(config));

        let response = app
            .clone()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_text(response).await, "<h1>Control</h1>");

        let response = app
            .oneshot(Request::get("/app.js").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "console.log('hi');");
    }

    #[tokio::test]
    async fn start_without_body_is_bad_request() {
        let mut config = config_without_static();
        config.relay.stream_key = StreamKey::new("live_secret");
        let app = build_router(context(config));

        let response = app
            .oneshot(
                Request::post("/start-stream")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
