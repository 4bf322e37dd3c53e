//! External tool detection.
//!
//! ffmpeg is the only tool the relay needs. A configured path wins when it
//! exists; otherwise [`which::which`] searches `PATH`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::process::Command;

/// Name of the transcoder executable.
pub const FFMPEG: &str = "ffmpeg";

/// Availability information for a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// Whether the tool was found and ran.
    pub available: bool,
    /// Version string (first line of `-version` output), if available.
    pub version: Option<String>,
    /// Resolved path to the executable.
    pub path: Option<PathBuf>,
}

/// Outcome of the pre-start dependency check, reported back to API callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyStatus {
    pub ok: bool,
    pub message: String,
}

impl DependencyStatus {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

impl From<&ToolInfo> for DependencyStatus {
    fn from(info: &ToolInfo) -> Self {
        match (info.available, &info.version) {
            (true, Some(version)) => Self::ok(format!("{} is installed ({version})", info.name)),
            (true, None) => Self::ok(format!("{} is installed", info.name)),
            (false, _) => Self::unavailable(format!(
                "{} is not usable; is it installed and in PATH?",
                info.name
            )),
        }
    }
}

/// Locate ffmpeg, preferring `configured` when it points at an existing file.
pub fn locate_ffmpeg(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Some(path.to_path_buf());
        }
        tracing::warn!(
            "Configured ffmpeg path {} does not exist; falling back to PATH",
            path.display()
        );
    }
    which::which(FFMPEG).ok()
}

/// Run `<path> -version` and report whether the tool is usable.
pub async fn check_tool(name: &str, path: Option<&Path>) -> ToolInfo {
    let Some(path) = path else {
        return ToolInfo {
            name: name.to_string(),
            available: false,
            version: None,
            path: None,
        };
    };

    let output = Command::new(path)
        .arg("-version")
        .stdin(std::process::Stdio::null())
        .output()
        .await;

    match output {
        Ok(output) if output.status.success() => ToolInfo {
            name: name.to_string(),
            available: true,
            version: String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .map(|s| s.to_string()),
            path: Some(path.to_path_buf()),
        },
        Ok(output) => {
            tracing::debug!("{name} -version exited with {}", output.status);
            ToolInfo {
                name: name.to_string(),
                available: false,
                version: None,
                path: Some(path.to_path_buf()),
            }
        }
        Err(e) => {
            tracing::debug!("Failed to run {name} at {}: {e}", path.display());
            ToolInfo {
                name: name.to_string(),
                available: false,
                version: None,
                path: Some(path.to_path_buf()),
            }
        }
    }
}
