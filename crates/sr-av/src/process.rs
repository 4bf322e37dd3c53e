//! Transcoder seam and the ffmpeg child-process implementation.
//!
//! The supervisor only sees [`Transcoder`] and [`RelayProcess`]; the ffmpeg
//! implementations below drain the child's output pipes in background tasks
//! and keep the last [`TAIL_LINES`] lines of each for diagnostics.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use sr_core::config::ToolsConfig;

use crate::command::RelayInvocation;
use crate::tools::{self, DependencyStatus, FFMPEG};

/// Number of trailing output lines retained per stream.
pub const TAIL_LINES: usize = 20;

/// How a relay process finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessExit {
    /// Exit code, `None` when terminated by a signal.
    pub code: Option<i32>,
    pub success: bool,
    /// Tail of captured standard output.
    pub stdout: String,
    /// Tail of captured standard error.
    pub stderr: String,
}

impl ProcessExit {
    /// Human-readable description of the exit.
    pub fn describe(&self) -> String {
        match self.code {
            Some(code) => format!("exited with code {code}"),
            None => "was terminated by a signal".to_string(),
        }
    }
}

/// A launched relay process owned by the supervisor.
#[async_trait]
pub trait RelayProcess: Send {
    /// OS process id, when known.
    fn pid(&self) -> Option<u32>;

    /// Request termination without waiting for the exit.
    fn kill(&mut self) -> sr_core::Result<()>;

    /// Wait for the process to exit and collect its diagnostics.
    async fn wait(&mut self) -> sr_core::Result<ProcessExit>;
}

/// Something that can verify itself and launch relay processes.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Program name used in logs and dependency errors.
    fn name(&self) -> &str;

    /// Verify the transcoder is usable.
    async fn check(&self) -> DependencyStatus;

    /// Launch a relay without waiting for it to finish.
    fn spawn(&self, invocation: &RelayInvocation) -> sr_core::Result<Box<dyn RelayProcess>>;
}

// ---------------------------------------------------------------------------
// ffmpeg
// ---------------------------------------------------------------------------

/// [`Transcoder`] running the ffmpeg CLI.
///
/// The executable is located on every check/spawn, so installing ffmpeg while
/// the service runs takes effect without a restart.
#[derive(Debug, Clone, Default)]
pub struct FfmpegTranscoder {
    configured_path: Option<PathBuf>,
}

impl FfmpegTranscoder {
    pub fn discover(tools_config: &ToolsConfig) -> Self {
        Self {
            configured_path: tools_config.ffmpeg_path.clone(),
        }
    }

    /// Use an explicit executable instead of searching `PATH`.
    pub fn with_program(path: impl Into<PathBuf>) -> Self {
        Self {
            configured_path: Some(path.into()),
        }
    }

    fn locate(&self) -> Option<PathBuf> {
        tools::locate_ffmpeg(self.configured_path.as_deref())
    }

    /// Availability information for diagnostics commands.
    pub async fn tool_info(&self) -> tools::ToolInfo {
        tools::check_tool(FFMPEG, self.locate().as_deref()).await
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &str {
        FFMPEG
    }

    async fn check(&self) -> DependencyStatus {
        DependencyStatus::from(&self.tool_info().await)
    }

    fn spawn(&self, invocation: &RelayInvocation) -> sr_core::Result<Box<dyn RelayProcess>> {
        let program = self.locate().ok_or_else(|| {
            sr_core::Error::dependency(FFMPEG, "ffmpeg not found; is it installed and in PATH?")
        })?;

        let process = FfmpegProcess::spawn(&program, invocation.args())?;
        Ok(Box::new(process))
    }
}

/// A running ffmpeg child with its output pipes being drained.
pub struct FfmpegProcess {
    child: Child,
    stdout_tail: Option<JoinHandle<String>>,
    stderr_tail: Option<JoinHandle<String>>,
}

impl FfmpegProcess {
    /// Spawn `program` with `args`; the child is killed if this handle is dropped.
    pub fn spawn(program: &std::path::Path, args: Vec<String>) -> sr_core::Result<Self> {
        let mut child = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                sr_core::Error::process(format!("failed to spawn {}: {e}", program.display()))
            })?;

        let stdout_tail = child.stdout.take().map(|out| spawn_tail(out, "stdout"));
        let stderr_tail = child.stderr.take().map(|err| spawn_tail(err, "stderr"));

        tracing::debug!(pid = ?child.id(), program = %program.display(), "Spawned relay process");

        Ok(Self {
            child,
            stdout_tail,
            stderr_tail,
        })
    }
}

#[async_trait]
impl RelayProcess for FfmpegProcess {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    fn kill(&mut self) -> sr_core::Result<()> {
        self.child
            .start_kill()
            .map_err(|e| sr_core::Error::process(format!("failed to signal ffmpeg: {e}")))
    }

    async fn wait(&mut self) -> sr_core::Result<ProcessExit> {
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| sr_core::Error::process(format!("failed to wait for ffmpeg: {e}")))?;

        Ok(ProcessExit {
            code: status.code(),
            success: status.success(),
            stdout: collect_tail(self.stdout_tail.take()).await,
            stderr: collect_tail(self.stderr_tail.take()).await,
        })
    }
}

/// Drain `reader` line by line, tracing each line and returning the tail.
fn spawn_tail<R>(reader: R, stream: &'static str) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut tail: VecDeque<String> = VecDeque::with_capacity(TAIL_LINES);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf).trim_end().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    tracing::trace!(target: "streamrelay::ffmpeg", stream, "{line}");
                    if tail.len() == TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                Err(e) => {
                    tracing::debug!("Failed to read ffmpeg {stream}: {e}");
                    break;
                }
            }
        }

        Vec::from(tail).join("\n")
    })
}

async fn collect_tail(handle: Option<JoinHandle<String>>) -> String {
    match handle {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    }
}
