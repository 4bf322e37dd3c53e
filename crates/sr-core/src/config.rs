//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! server, relay, and tool sections. Every section defaults sensibly so a
//! completely empty `{}` file is valid. Deployment secrets (the stream key)
//! normally arrive through the environment via [`Config::apply_env`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::Error;

/// Environment variable holding the destination stream key.
pub const ENV_STREAM_KEY: &str = "TWITCH_STREAM_KEY";
/// Environment variable overriding the listen port.
pub const ENV_PORT: &str = "PORT";
/// Environment variable overriding the listen host.
pub const ENV_HOST: &str = "HOST";

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub relay: RelayConfig,
    pub tools: ToolsConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Configuration(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, failing on unreadable or invalid files.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|name| std::env::var(name).ok());
    }

    /// Apply overrides using the given variable lookup.
    ///
    /// Blank values are ignored so an empty `TWITCH_STREAM_KEY=` line in a
    /// `.env` file does not count as a configured key.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(ENV_STREAM_KEY).and_then(StreamKey::new) {
            self.relay.stream_key = Some(key);
        }

        if let Some(port) = lookup(ENV_PORT) {
            match port.trim().parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(e) => tracing::warn!("Ignoring invalid {ENV_PORT} value {port:?}: {e}"),
            }
        }

        if let Some(host) = lookup(ENV_HOST).filter(|h| !h.trim().is_empty()) {
            self.server.host = host.trim().to_string();
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if self.relay.stream_key.is_none() {
            warnings.push(format!(
                "relay.stream_key is not set ({ENV_STREAM_KEY}); streams cannot be started"
            ));
        }

        if !self.relay.ingest_url.starts_with("rtmp://")
            && !self.relay.ingest_url.starts_with("rtmps://")
        {
            warnings.push(format!(
                "relay.ingest_url '{}' is not an RTMP URL",
                self.relay.ingest_url
            ));
        }

        if self.relay.manifest_timeout_secs == 0 {
            warnings.push("relay.manifest_timeout_secs is 0; manifest fetches will fail".into());
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            static_dir: Some(PathBuf::from("public")),
        }
    }
}

/// Secret key appended to the ingest URL.
///
/// `Debug` never prints the key; use [`StreamKey::expose`] where the clear
/// value is required.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamKey(String);

impl StreamKey {
    /// Wrap a key, returning `None` for blank input.
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        let trimmed = key.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// The clear key.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StreamKey(<redacted>)")
    }
}

/// Relay destination and transcoder flag settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Destination credential; `None` blocks every start.
    pub stream_key: Option<StreamKey>,
    /// Ingest endpoint the key is appended to.
    pub ingest_url: String,
    /// Deadline for fetching an HLS manifest.
    pub manifest_timeout_secs: u64,
    pub analyze_duration: String,
    pub probe_size: String,
    /// Upper bound, in seconds, for ffmpeg's reconnect back-off.
    pub reconnect_delay_max: u32,
    pub audio_codec: String,
    pub audio_sample_rate: u32,
    pub audio_bitrate: String,
    pub output_format: String,
    pub max_muxing_queue_size: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            stream_key: None,
            ingest_url: "rtmp://live.twitch.tv/app".into(),
            manifest_timeout_secs: 10,
            analyze_duration: "10M".into(),
            probe_size: "10M".into(),
            reconnect_delay_max: 5,
            audio_codec: "aac".into(),
            audio_sample_rate: 44_100,
            audio_bitrate: "128k".into(),
            output_format: "flv".into(),
            max_muxing_queue_size: 9999,
        }
    }
}

impl RelayConfig {
    /// Full destination URL for the given key.
    pub fn destination_url(&self, key: &StreamKey) -> String {
        format!("{}/{}", self.ingest_url.trim_end_matches('/'), key.expose())
    }

    /// Destination URL with the key masked, safe for logs.
    pub fn redacted_destination(&self) -> String {
        format!("{}/<redacted>", self.ingest_url.trim_end_matches('/'))
    }
}

/// External tool path overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
}
