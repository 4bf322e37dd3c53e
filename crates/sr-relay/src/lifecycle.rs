//! Per-session monitor task and the events it reports.
//!
//! Each launched process is owned by one monitor task. The task waits for the
//! process to exit, or for a kill request from the supervisor, and reports the
//! outcome as a [`LifecycleEvent`] tagged with the session id.

use tokio::sync::{mpsc, oneshot};

use sr_av::{ProcessExit, RelayProcess};

use crate::session::SessionId;

/// Reply channel for a kill request; receives the result of signalling.
pub(crate) type KillRequest = oneshot::Sender<sr_core::Result<()>>;

/// What happened to a session's process.
#[derive(Debug)]
pub(crate) enum LifecycleEvent {
    /// The process is running; carries the key-redacted invocation.
    Started { id: SessionId, command_line: String },
    /// The process failed or exited unsuccessfully on its own.
    Failed {
        id: SessionId,
        message: String,
        stdout: String,
        stderr: String,
    },
    /// The process completed normally or was killed on request.
    Ended { id: SessionId },
}

impl LifecycleEvent {
    pub(crate) fn session_id(&self) -> SessionId {
        match self {
            Self::Started { id, .. } | Self::Failed { id, .. } | Self::Ended { id } => *id,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::Failed { .. } => "failed",
            Self::Ended { .. } => "ended",
        }
    }
}

enum Next {
    Exited(sr_core::Result<ProcessExit>),
    Kill(KillRequest),
}

/// Spawn the monitor for `process`, returning the handle used to kill it.
///
/// Dropping the returned sender leaves the process running until it exits.
pub(crate) fn spawn_monitor(
    id: SessionId,
    program: String,
    command_line: String,
    mut process: Box<dyn RelayProcess>,
    events: mpsc::UnboundedSender<LifecycleEvent>,
) -> oneshot::Sender<KillRequest> {
    let (kill_tx, mut kill_rx) = oneshot::channel::<KillRequest>();

    tokio::spawn(async move {
        let _ = events.send(LifecycleEvent::Started { id, command_line });

        // An exit that is already pending wins over a kill request.
        let next = tokio::select! {
            biased;
            result = process.wait() => Next::Exited(result),
            Ok(reply) = &mut kill_rx => Next::Kill(reply),
        };

        let event = match next {
            Next::Kill(reply) => {
                let signalled = process.kill();
                let failed = signalled.is_err();
                let _ = reply.send(signalled);
                if failed {
                    // The process may still be alive; keep owning it until it exits.
                    tracing::warn!(session = %id, "Kill failed, waiting for the relay to exit");
                }
                match process.wait().await {
                    Ok(exit) => tracing::debug!(session = %id, "Relay {}", exit.describe()),
                    Err(e) => tracing::debug!(session = %id, "Relay wait failed after kill: {e}"),
                }
                LifecycleEvent::Ended { id }
            }
            Next::Exited(Ok(exit)) if exit.success => LifecycleEvent::Ended { id },
            Next::Exited(Ok(exit)) => LifecycleEvent::Failed {
                id,
                message: format!("{program} {}", exit.describe()),
                stdout: exit.stdout,
                stderr: exit.stderr,
            },
            Next::Exited(Err(e)) => LifecycleEvent::Failed {
                id,
                message: e.to_string(),
                stdout: String::new(),
                stderr: e.diagnostics().unwrap_or_default().to_string(),
            },
        };

        if events.send(event).is_err() {
            tracing::debug!(session = %id, "Supervisor gone, dropping lifecycle event");
        }
    });

    kill_tx
}

/// Ask a monitor to kill its process and wait for the signalling result.
///
/// A monitor that already finished means the process is gone, which counts
/// as success.
pub(crate) async fn terminate(kill: oneshot::Sender<KillRequest>) -> sr_core::Result<()> {
    let (reply_tx, reply_rx) = oneshot::channel();
    if kill.send(reply_tx).is_err() {
        return Ok(());
    }
    reply_rx.await.unwrap_or(Ok(()))
}
