//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which builds an [`AppContext`] around a scripted
//! transcoder and serves the full router on a random port for HTTP-level
//! testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use sr_core::config::{Config, StreamKey};
use sr_hls::{HttpFetcher, ManifestFetch};
use sr_relay::testing::FakeTranscoder;
use sr_server::context::AppContext;
use sr_server::router::build_router;

/// A running server plus handles on its collaborators.
pub struct TestHarness {
    pub ctx: AppContext,
    pub transcoder: FakeTranscoder,
    pub addr: SocketAddr,
}

/// Default test configuration: a stream key and no static directory.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.server.static_dir = None;
    config.relay.stream_key = StreamKey::new("live_test_key");
    config
}

impl TestHarness {
    /// Start a server with [`test_config`], real HTTP manifest fetching and a
    /// working fake transcoder.
    pub async fn start() -> Self {
        Self::start_with(test_config(), FakeTranscoder::new()).await
    }

    /// Start a server with a custom configuration and transcoder.
    pub async fn start_with(config: Config, transcoder: FakeTranscoder) -> Self {
        let fetcher: Arc<dyn ManifestFetch> = Arc::new(
            HttpFetcher::new(std::time::Duration::from_secs(5)).expect("failed to build fetcher"),
        );
        let ctx = AppContext::new(config, fetcher, Arc::new(transcoder.clone()));
        let app = build_router(ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            ctx,
            transcoder,
            addr,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// GET `path` and decode the JSON body.
    pub async fn get_json(&self, path: &str) -> serde_json::Value {
        reqwest::get(self.url(path))
            .await
            .expect("request failed")
            .json()
            .await
            .expect("invalid JSON body")
    }

    /// POST a JSON body to `path`, returning status and decoded body.
    pub async fn post_json(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> (u16, serde_json::Value) {
        let resp = reqwest::Client::new()
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .expect("request failed");
        let status = resp.status().as_u16();
        let json = resp.json().await.expect("invalid JSON body");
        (status, json)
    }
}
