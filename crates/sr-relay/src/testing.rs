//! Test doubles for driving the supervisor without ffmpeg or a network.
//!
//! [`FakeTranscoder`] records every spawn and kill in a journal and lets the
//! test decide when (and how) each process exits. [`StaticFetcher`] serves
//! manifests from an in-memory map.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use sr_av::{DependencyStatus, ProcessExit, RelayInvocation, RelayProcess, Transcoder};
use sr_hls::ManifestFetch;

/// One recorded interaction with the fake transcoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscoderCall {
    Spawn { index: usize, source_url: String },
    Kill { index: usize },
}

#[derive(Default)]
struct FakeState {
    calls: Vec<TranscoderCall>,
    exits: Vec<Option<oneshot::Sender<ProcessExit>>>,
    dependency_missing: bool,
    fail_spawns: bool,
    fail_kills: bool,
}

/// Scripted [`Transcoder`]; processes run until the test ends them.
#[derive(Clone, Default)]
pub struct FakeTranscoder {
    state: Arc<Mutex<FakeState>>,
}

impl FakeTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transcoder whose dependency check fails.
    pub fn missing() -> Self {
        let fake = Self::default();
        fake.state.lock().dependency_missing = true;
        fake
    }

    /// Make subsequent spawns fail synchronously.
    pub fn fail_spawns(&self, fail: bool) {
        self.state.lock().fail_spawns = fail;
    }

    /// Make subsequent kills fail. The process keeps running until the test
    /// ends it.
    pub fn fail_kills(&self, fail: bool) {
        self.state.lock().fail_kills = fail;
    }

    pub fn calls(&self) -> Vec<TranscoderCall> {
        self.state.lock().calls.clone()
    }

    pub fn spawn_count(&self) -> usize {
        self.state.lock().exits.len()
    }

    pub fn kill_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, TranscoderCall::Kill { .. }))
            .count()
    }

    /// Let process `index` exit successfully. Returns `false` if it already exited.
    pub fn finish_process(&self, index: usize) -> bool {
        self.exit_process(
            index,
            ProcessExit {
                code: Some(0),
                success: true,
                stdout: String::new(),
                stderr: String::new(),
            },
        )
    }

    /// Let process `index` exit with code 1 and the given stderr.
    pub fn fail_process(&self, index: usize, stderr: &str) -> bool {
        self.exit_process(
            index,
            ProcessExit {
                code: Some(1),
                success: false,
                stdout: String::new(),
                stderr: stderr.to_string(),
            },
        )
    }

    fn exit_process(&self, index: usize, exit: ProcessExit) -> bool {
        let sender = self
            .state
            .lock()
            .exits
            .get_mut(index)
            .and_then(Option::take);
        match sender {
            Some(tx) => tx.send(exit).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn check(&self) -> DependencyStatus {
        if self.state.lock().dependency_missing {
            DependencyStatus::unavailable("ffmpeg is not usable; is it installed and in PATH?")
        } else {
            DependencyStatus::ok("ffmpeg is installed (fake)")
        }
    }

    fn spawn(&self, invocation: &RelayInvocation) -> sr_core::Result<Box<dyn RelayProcess>> {
        let mut state = self.state.lock();
        if state.fail_spawns {
            return Err(sr_core::Error::process("failed to spawn ffmpeg: scripted failure"));
        }

        let index = state.exits.len();
        let (tx, rx) = oneshot::channel();
        state.exits.push(Some(tx));
        state.calls.push(TranscoderCall::Spawn {
            index,
            source_url: invocation.source_url().to_string(),
        });

        Ok(Box::new(FakeProcess {
            index,
            exit: rx,
            killed: false,
            state: self.state.clone(),
        }))
    }
}

struct FakeProcess {
    index: usize,
    exit: oneshot::Receiver<ProcessExit>,
    killed: bool,
    state: Arc<Mutex<FakeState>>,
}

fn killed_exit() -> ProcessExit {
    ProcessExit {
        code: None,
        success: false,
        stdout: String::new(),
        stderr: String::new(),
    }
}

#[async_trait]
impl RelayProcess for FakeProcess {
    fn pid(&self) -> Option<u32> {
        Some(40_000 + self.index as u32)
    }

    fn kill(&mut self) -> sr_core::Result<()> {
        let mut state = self.state.lock();
        state.calls.push(TranscoderCall::Kill { index: self.index });
        if state.fail_kills {
            return Err(sr_core::Error::process(
                "failed to signal ffmpeg: operation not permitted",
            ));
        }
        self.killed = true;
        Ok(())
    }

    async fn wait(&mut self) -> sr_core::Result<ProcessExit> {
        if self.killed {
            return Ok(killed_exit());
        }
        Ok((&mut self.exit).await.unwrap_or_else(|_| killed_exit()))
    }
}

/// [`ManifestFetch`] answering from a fixed URL → body map.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    manifests: HashMap<String, String>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.manifests.insert(url.into(), body.into());
        self
    }
}

#[async_trait]
impl ManifestFetch for StaticFetcher {
    async fn fetch(&self, url: &str) -> sr_core::Result<String> {
        self.manifests
            .get(url)
            .cloned()
            .ok_or_else(|| sr_core::Error::network(url, "connection refused"))
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
