//! Manifest retrieval over HTTP(S).

use std::time::Duration;

use async_trait::async_trait;

/// Source of raw manifest text.
#[async_trait]
pub trait ManifestFetch: Send + Sync {
    /// Fetch the body at `url` as text.
    ///
    /// # Errors
    ///
    /// - [`sr_core::Error::Fetch`] when the server answers with a non-success status.
    /// - [`sr_core::Error::Network`] on connection failures and timeouts.
    async fn fetch(&self, url: &str) -> sr_core::Result<String>;
}

/// [`ManifestFetch`] backed by a shared `reqwest` client.
///
/// The transport (plain or TLS) follows the URL scheme; redirects follow
/// reqwest's default policy.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> sr_core::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("streamrelay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| sr_core::Error::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl ManifestFetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> sr_core::Result<String> {
        tracing::debug!(url, "Fetching manifest");

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| sr_core::Error::network(url, describe(&e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(sr_core::Error::Fetch {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        resp.text()
            .await
            .map_err(|e| sr_core::Error::network(url, describe(&e)))
    }
}

fn describe(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("request timed out: {e}")
    } else {
        e.to_string()
    }
}
