//! Unified error type for streamrelay.
//!
//! All crates funnel their failures into [`Error`], which carries enough context
//! for API handlers to derive an HTTP status code via [`Error::http_status`].

/// Unified error type covering all failure modes in streamrelay.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Request data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Required configuration (e.g. the stream key) is missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The external transcoder is missing or unusable.
    #[error("Dependency error [{tool}]: {message}")]
    Dependency {
        /// Name of the tool that is unusable.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// A connection-level failure while talking to a remote host.
    #[error("Network error for {url}: {message}")]
    Network {
        /// The URL that was requested.
        url: String,
        /// Human-readable error description.
        message: String,
    },

    /// A remote host answered with a non-success status.
    #[error("Fetch failed for {url}: HTTP {status}")]
    Fetch {
        /// The URL that was requested.
        url: String,
        /// The HTTP status code returned.
        status: u16,
    },

    /// The transcoding process could not be launched, signalled, or failed.
    #[error("Process error: {message}")]
    Process {
        /// Human-readable error description.
        message: String,
        /// Captured diagnostic output of the process, if any.
        stderr: String,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::Configuration(_) => 500,
            Error::Dependency { .. } => 500,
            Error::Network { .. } => 502,
            Error::Fetch { .. } => 502,
            Error::Process { .. } => 500,
            Error::Io { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::Configuration(_) => "configuration_error",
            Error::Dependency { .. } => "dependency_error",
            Error::Network { .. } => "network_error",
            Error::Fetch { .. } => "fetch_error",
            Error::Process { .. } => "process_error",
            Error::Io { .. } => "io_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Convenience constructor for [`Error::Dependency`].
    pub fn dependency(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Dependency {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Network`].
    pub fn network(url: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Network {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Process`] without diagnostics.
    pub fn process(message: impl Into<String>) -> Self {
        Error::Process {
            message: message.into(),
            stderr: String::new(),
        }
    }

    /// Captured diagnostic output attached to this error, if any.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Error::Process { stderr, .. } if !stderr.is_empty() => Some(stderr),
            _ => None,
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_display() {
        let err = Error::Validation("stream URL is missing".into());
        assert_eq!(err.to_string(), "Validation error: stream URL is missing");
        assert_eq!(err.http_status(), 400);
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn configuration_is_server_error() {
        let err = Error::Configuration("stream key is not configured".into());
        assert_eq!(err.http_status(), 500);
        assert_eq!(err.code(), "configuration_error");
    }

    #[test]
    fn dependency_display() {
        let err = Error::dependency("ffmpeg", "not found in PATH");
        assert_eq!(err.to_string(), "Dependency error [ffmpeg]: not found in PATH");
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn fetch_carries_status() {
        let err = Error::Fetch {
            url: "http://host/master.m3u8".into(),
            status: 404,
        };
        assert_eq!(
            err.to_string(),
            "Fetch failed for http://host/master.m3u8: HTTP 404"
        );
        assert_eq!(err.http_status(), 502);
    }

    #[test]
    fn process_diagnostics() {
        let err = Error::Process {
            message: "ffmpeg exited with code 1".into(),
            stderr: "Connection refused".into(),
        };
        assert_eq!(err.diagnostics(), Some("Connection refused"));
        assert_eq!(Error::process("spawn failed").diagnostics(), None);
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(err.code(), "io_error");
    }
}
