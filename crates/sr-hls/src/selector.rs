//! Never-failing source resolution.

use std::sync::Arc;

use sr_core::LogSink;

use crate::fetch::ManifestFetch;
use crate::variant::{is_master_playlist, select_best_variant};

/// Resolves a requested source URL to the best rendition it advertises.
///
/// Any fetch failure degrades to the requested URL; the cause is only
/// visible as an error entry in the relay log.
#[derive(Clone)]
pub struct VariantSelector {
    fetcher: Arc<dyn ManifestFetch>,
    log: Arc<LogSink>,
}

impl VariantSelector {
    pub fn new(fetcher: Arc<dyn ManifestFetch>, log: Arc<LogSink>) -> Self {
        Self { fetcher, log }
    }

    /// Return the URL ffmpeg should read for `url`.
    pub async fn resolve(&self, url: &str) -> String {
        self.log.info(format!("Analyzing M3U8 manifest: {url}"));

        let text = match self.fetcher.fetch(url).await {
            Ok(text) => text,
            Err(e) => {
                self.log.error(format!("Failed to analyze M3U8 manifest: {e}"));
                return url.to_string();
            }
        };

        if is_master_playlist(&text) {
            self.log
                .info("Master playlist detected, searching for the best quality variant");

            if let Some(best) = select_best_variant(&text, url) {
                self.log.info(format!(
                    "Best quality found: {} bps at {}",
                    best.bandwidth, best.url
                ));
                return best.url;
            }
        }

        self.log.info("Using the original M3U8 URL");
        url.to_string()
    }
}
