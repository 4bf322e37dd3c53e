//! Shared application state handed to every route handler.

use std::sync::Arc;
use std::time::Duration;

use sr_av::{FfmpegTranscoder, Transcoder};
use sr_core::config::Config;
use sr_core::LogSink;
use sr_hls::{HttpFetcher, ManifestFetch, VariantSelector};
use sr_relay::StreamSupervisor;
use tokio_util::sync::CancellationToken;

/// Cheap-to-clone handle on the configuration, the relay log and the
/// supervisor.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub log: Arc<LogSink>,
    pub supervisor: Arc<StreamSupervisor>,
    /// Cancelled when the server begins shutting down; ends long-lived
    /// responses such as the log event stream.
    pub shutdown: CancellationToken,
}

impl AppContext {
    /// Assemble a context around explicit collaborators.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: Config,
        fetcher: Arc<dyn ManifestFetch>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        let log = Arc::new(LogSink::new());
        let selector = VariantSelector::new(fetcher, log.clone());
        let supervisor = StreamSupervisor::new(config.relay.clone(), log.clone(), selector, transcoder);

        Self {
            config: Arc::new(config),
            log,
            supervisor: Arc::new(supervisor),
            shutdown: CancellationToken::new(),
        }
    }

    /// Production context: HTTP manifest fetching and the ffmpeg CLI.
    pub fn from_config(config: Config) -> sr_core::Result<Self> {
        let timeout = Duration::from_secs(config.relay.manifest_timeout_secs);
        let fetcher = Arc::new(HttpFetcher::new(timeout)?);
        let transcoder = Arc::new(FfmpegTranscoder::discover(&config.tools));
        Ok(Self::new(config, fetcher, transcoder))
    }
}
