//! Relay session model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of one relay session.
///
/// Lifecycle events carry it so that events from a replaced session can be
/// recognised and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Starting,
    Running,
    Stopped,
    Failed,
}

impl SessionStatus {
    /// Whether a relay process is (or is about to be) pushing to the ingest.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Coarse classification of a requested source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceOrigin {
    /// Twitch CDN (`ttvnw.net`) or `twitch.tv` page.
    Twitch,
    Generic,
}

impl SourceOrigin {
    /// Classify by substring match on the URL.
    pub fn classify(url: &str) -> Self {
        if url.contains("ttvnw.net") || url.contains("twitch.tv") {
            Self::Twitch
        } else {
            Self::Generic
        }
    }

    pub fn is_twitch(self) -> bool {
        self == Self::Twitch
    }
}

/// The active relay, as seen from outside the supervisor.
///
/// The process handle is deliberately absent; only the supervisor owns it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSession {
    pub id: SessionId,
    /// URL as submitted by the caller.
    pub requested_url: String,
    /// URL ffmpeg actually reads, after variant selection.
    pub source_url: String,
    /// Ingest destination with the stream key masked.
    pub destination: String,
    pub origin: SourceOrigin,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub pid: Option<u32>,
}

impl StreamSession {
    pub fn new(
        requested_url: impl Into<String>,
        source_url: impl Into<String>,
        destination: impl Into<String>,
        origin: SourceOrigin,
    ) -> Self {
        Self {
            id: SessionId::new(),
            requested_url: requested_url.into(),
            source_url: source_url.into(),
            destination: destination.into(),
            origin,
            status: SessionStatus::Starting,
            started_at: Utc::now(),
            pid: None,
        }
    }
}
