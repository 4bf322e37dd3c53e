//! The single-slot stream supervisor.
//!
//! Start, stop and lifecycle events are serialized through one async
//! operation lock. The slot itself sits behind a short-held mutex so that
//! [`StreamSupervisor::status`] never waits on a start that is resolving a
//! manifest.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use sr_av::{RelayInvocation, Transcoder};
use sr_core::config::RelayConfig;
use sr_core::{Error, LogEntry, LogSink, Result};
use sr_hls::VariantSelector;

use crate::lifecycle::{self, KillRequest, LifecycleEvent};
use crate::session::{SessionId, SessionStatus, SourceOrigin, StreamSession};

/// Number of log entries included in a status snapshot.
pub const STATUS_LOG_TAIL: usize = 10;

/// Result of a successful start, echoed back to API callers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartReport {
    pub session_id: SessionId,
    pub original_url: String,
    pub best_quality_url: String,
    pub is_twitch_url: bool,
    pub dependency_ok: bool,
    pub dependency_message: String,
}

/// Result of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NothingRunning,
}

/// Point-in-time view of the supervisor.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStatus {
    pub is_streaming: bool,
    /// Effective source of the active session.
    pub stream_url: Option<String>,
    /// State of the active session, or how the last one ended.
    pub state: SessionStatus,
    pub logs: Vec<LogEntry>,
}

struct ActiveSession {
    session: StreamSession,
    kill: oneshot::Sender<KillRequest>,
}

#[derive(Default)]
struct Slot {
    active: Option<ActiveSession>,
    last_state: SessionStatus,
}

struct Shared {
    log: Arc<LogSink>,
    op_lock: tokio::sync::Mutex<()>,
    slot: Mutex<Slot>,
}

impl Shared {
    fn take_active(&self, outcome: SessionStatus) -> Option<ActiveSession> {
        let mut slot = self.slot.lock();
        let active = slot.active.take();
        if active.is_some() {
            slot.last_state = outcome;
        }
        active
    }

    /// Apply a lifecycle event. Callers hold the operation lock.
    fn apply(&self, event: LifecycleEvent) {
        let mut slot = self.slot.lock();
        let id = event.session_id();
        if slot.active.as_ref().map(|a| a.session.id) != Some(id) {
            drop(slot);
            // Kills always end as `Ended`, so a stale failure is a real crash.
            let kind = event.kind();
            match event {
                LifecycleEvent::Failed {
                    message,
                    stdout,
                    stderr,
                    ..
                } => self.log_failure(&message, &stdout, &stderr),
                _ => {
                    tracing::debug!(session = %id, event = kind, "Ignoring event from a replaced session")
                }
            }
            return;
        }

        match event {
            LifecycleEvent::Started { command_line, .. } => {
                if let Some(active) = slot.active.as_mut() {
                    active.session.status = SessionStatus::Running;
                }
                drop(slot);
                self.log
                    .info(format!("Stream started with command: {command_line}"));
            }
            LifecycleEvent::Failed {
                message,
                stdout,
                stderr,
                ..
            } => {
                slot.active = None;
                slot.last_state = SessionStatus::Failed;
                drop(slot);
                self.log_failure(&message, &stdout, &stderr);
            }
            LifecycleEvent::Ended { .. } => {
                slot.active = None;
                slot.last_state = SessionStatus::Stopped;
                drop(slot);
                self.log.info("Stream finished");
            }
        }
    }

    fn log_failure(&self, message: &str, stdout: &str, stderr: &str) {
        self.log.error(format!("Streaming error: {message}"));
        if !stdout.is_empty() {
            self.log.info(format!("Standard output: {stdout}"));
        }
        if !stderr.is_empty() {
            self.log.info(format!("Standard error: {stderr}"));
        }
    }
}

async fn run_lifecycle(shared: Arc<Shared>, mut events: mpsc::UnboundedReceiver<LifecycleEvent>) {
    while let Some(event) = events.recv().await {
        let _op = shared.op_lock.lock().await;
        shared.apply(event);
    }
    tracing::debug!("Lifecycle task stopped");
}

/// Owns the (at most one) relay session.
pub struct StreamSupervisor {
    relay: RelayConfig,
    selector: VariantSelector,
    transcoder: Arc<dyn Transcoder>,
    shared: Arc<Shared>,
    events: mpsc::UnboundedSender<LifecycleEvent>,
}

impl StreamSupervisor {
    /// Create the supervisor and spawn its lifecycle task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        relay: RelayConfig,
        log: Arc<LogSink>,
        selector: VariantSelector,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        let shared = Arc::new(Shared {
            log,
            op_lock: tokio::sync::Mutex::new(()),
            slot: Mutex::new(Slot::default()),
        });

        let (events, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_lifecycle(shared.clone(), rx));

        Self {
            relay,
            selector,
            transcoder,
            shared,
            events,
        }
    }

    fn log(&self) -> &LogSink {
        &self.shared.log
    }

    /// Start relaying `requested_url`, replacing any active session.
    ///
    /// Returns as soon as the process is launched; its progress is reported
    /// through the log.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] for a blank URL.
    /// - [`Error::Configuration`] when no stream key is configured.
    /// - [`Error::Dependency`] when the transcoder is unusable.
    /// - [`Error::Process`] when the process cannot be launched.
    pub async fn start(&self, requested_url: &str) -> Result<StartReport> {
        let requested_url = requested_url.trim();
        if requested_url.is_empty() {
            self.log().error("Stream URL is missing");
            return Err(Error::Validation("stream URL is missing".into()));
        }

        let Some(key) = self.relay.stream_key.clone() else {
            self.log().error("Twitch stream key is not configured");
            return Err(Error::Configuration(
                "Twitch stream key is not configured (set TWITCH_STREAM_KEY)".into(),
            ));
        };

        let dependency = self.transcoder.check().await;
        if !dependency.ok {
            self.log()
                .error(format!("{} is not installed correctly", self.transcoder.name()));
            return Err(Error::dependency(self.transcoder.name(), dependency.message));
        }

        let _op = self.shared.op_lock.lock().await;

        if let Some(previous) = self.shared.take_active(SessionStatus::Stopped) {
            self.log().info("Stopping the current stream...");
            if let Err(e) = lifecycle::terminate(previous.kill).await {
                self.log()
                    .error(format!("Failed to stop the current stream: {e}"));
            }
        }

        let origin = SourceOrigin::classify(requested_url);
        if origin.is_twitch() {
            self.log().info("Twitch URL detected");
        }

        let source_url = self.selector.resolve(requested_url).await;

        self.log().info("Starting stream to Twitch...");
        self.log().info(format!("Source URL: {source_url}"));

        let invocation = RelayInvocation::new(source_url.as_str(), &self.relay, &key);
        let process = match self.transcoder.spawn(&invocation) {
            Ok(process) => process,
            Err(e) => {
                self.log().error(format!("Failed to start the stream: {e}"));
                return Err(e);
            }
        };

        let mut session = StreamSession::new(
            requested_url,
            source_url.as_str(),
            self.relay.redacted_destination(),
            origin,
        );
        session.pid = process.pid();

        let kill = lifecycle::spawn_monitor(
            session.id,
            self.transcoder.name().to_string(),
            invocation.redacted_command_line(self.transcoder.name()),
            process,
            self.events.clone(),
        );

        tracing::info!(session = %session.id, pid = ?session.pid, "Relay session launched");

        let report = StartReport {
            session_id: session.id,
            original_url: requested_url.to_string(),
            best_quality_url: source_url,
            is_twitch_url: origin.is_twitch(),
            dependency_ok: dependency.ok,
            dependency_message: dependency.message,
        };

        self.shared.slot.lock().active = Some(ActiveSession { session, kill });

        Ok(report)
    }

    /// Stop the active session, if any.
    ///
    /// # Errors
    ///
    /// [`Error::Process`] when the process could not be signalled. The slot
    /// is cleared either way.
    pub async fn stop(&self) -> Result<StopOutcome> {
        let _op = self.shared.op_lock.lock().await;

        let Some(active) = self.shared.take_active(SessionStatus::Stopped) else {
            self.log().info("Stop requested but no stream is running");
            return Ok(StopOutcome::NothingRunning);
        };

        self.log().info("Stopping the stream...");
        match lifecycle::terminate(active.kill).await {
            Ok(()) => {
                tracing::info!(session = %active.session.id, "Relay session stopped");
                Ok(StopOutcome::Stopped)
            }
            Err(e) => {
                self.log().error(format!("Failed to stop the stream: {e}"));
                Err(e)
            }
        }
    }

    /// Stop the active session before the service exits.
    pub async fn shutdown(&self) {
        let _op = self.shared.op_lock.lock().await;
        if let Some(active) = self.shared.take_active(SessionStatus::Stopped) {
            self.log().info("Stopping the stream for shutdown");
            if let Err(e) = lifecycle::terminate(active.kill).await {
                tracing::error!("Failed to stop the stream on shutdown: {e}");
            }
        }
    }

    pub fn status(&self) -> StreamStatus {
        let (stream_url, state) = {
            let slot = self.shared.slot.lock();
            match &slot.active {
                Some(active) => (
                    Some(active.session.source_url.clone()),
                    active.session.status,
                ),
                None => (None, slot.last_state),
            }
        };

        StreamStatus {
            is_streaming: stream_url.is_some(),
            stream_url,
            state,
            logs: self.log().recent(STATUS_LOG_TAIL),
        }
    }

    /// Snapshot of the active session.
    pub fn current_session(&self) -> Option<StreamSession> {
        self.shared
            .slot
            .lock()
            .active
            .as_ref()
            .map(|a| a.session.clone())
    }

    pub fn is_streaming(&self) -> bool {
        self.shared.slot.lock().active.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{wait_until, FakeTranscoder, StaticFetcher, TranscoderCall};
    use sr_core::config::StreamKey;
    use std::time::Duration;

    const MASTER_URL: &str = "https://cdn.example.com/live/master.m3u8";
    const MASTER: &str = "#EXTM3U\n\
        #EXT-X-STREAM-INF:BANDWIDTH=500000\n\
        360p.m3u8\n\
        #EXT-X-STREAM-INF:BANDWIDTH=2500000\n\
        720p.m3u8\n";
    const WAIT: Duration = Duration::from_secs(2);

    fn relay_config(key: Option<&str>) -> RelayConfig {
        RelayConfig {
            stream_key: key.and_then(StreamKey::new),
            ..RelayConfig::default()
        }
    }

    fn supervisor_with(
        relay: RelayConfig,
        transcoder: FakeTranscoder,
    ) -> (StreamSupervisor, Arc<LogSink>) {
        let log = Arc::new(LogSink::new());
        let fetcher = StaticFetcher::new().with(MASTER_URL, MASTER);
        let selector = VariantSelector::new(Arc::new(fetcher), log.clone());
        let supervisor = StreamSupervisor::new(relay, log.clone(), selector, Arc::new(transcoder));
        (supervisor, log)
    }

    fn supervisor(transcoder: FakeTranscoder) -> (StreamSupervisor, Arc<LogSink>) {
        supervisor_with(relay_config(Some("live_secret")), transcoder)
    }

    #[tokio::test]
    async fn start_resolves_best_variant_and_runs() {
        let fake = FakeTranscoder::new();
        let (sup, log) = supervisor(fake.clone());

        let report = sup.start(MASTER_URL).await.unwrap();
        assert_eq!(report.original_url, MASTER_URL);
        assert_eq!(report.best_quality_url, "https://cdn.example.com/live/720p.m3u8");
        assert!(!report.is_twitch_url);
        assert!(report.dependency_ok);

        assert_eq!(
            fake.calls(),
            vec![TranscoderCall::Spawn {
                index: 0,
                source_url: "https://cdn.example.com/live/720p.m3u8".into()
            }]
        );

        assert!(wait_until(WAIT, || sup.status().state == SessionStatus::Running).await);
        let status = sup.status();
        assert!(status.is_streaming);
        assert_eq!(
            status.stream_url.as_deref(),
            Some("https://cdn.example.com/live/720p.m3u8")
        );

        let started = log
            .all()
            .into_iter()
            .find(|e| e.message.starts_with("Stream started with command:"))
            .unwrap();
        assert!(started.message.contains("rtmp://live.twitch.tv/app/<redacted>"));
        assert!(log.all().iter().all(|e| !e.message.contains("live_secret")));
    }

    #[tokio::test]
    async fn second_start_kills_first_before_spawning() {
        let fake = FakeTranscoder::new();
        let (sup, _log) = supervisor(fake.clone());

        let first = sup.start(MASTER_URL).await.unwrap();
        let second = sup.start("https://other.example.com/live.m3u8").await.unwrap();
        assert_ne!(first.session_id, second.session_id);

        let calls = fake.calls();
        assert_eq!(calls.len(), 3);
        assert!(matches!(calls[0], TranscoderCall::Spawn { index: 0, .. }));
        assert_eq!(calls[1], TranscoderCall::Kill { index: 0 });
        assert!(matches!(calls[2], TranscoderCall::Spawn { index: 1, .. }));

        // The first session's end event must not clear the second.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let current = sup.current_session().unwrap();
        assert_eq!(current.id, second.session_id);
        assert!(sup.status().is_streaming);
    }

    #[tokio::test]
    async fn start_without_key_is_configuration_error() {
        let fake = FakeTranscoder::new();
        let (sup, log) = supervisor_with(relay_config(None), fake.clone());

        let err = sup.start(MASTER_URL).await.unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert_eq!(fake.spawn_count(), 0);
        assert!(!sup.is_streaming());
        assert!(log.all().iter().any(|e| e.is_error));
    }

    #[tokio::test]
    async fn blank_url_is_validation_error() {
        let fake = FakeTranscoder::new();
        let (sup, log) = supervisor(fake.clone());
        let err = sup.start("   ").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(fake.spawn_count(), 0);

        let entries = log.all();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_error);
        assert_eq!(entries[0].message, "Stream URL is missing");
    }

    #[tokio::test]
    async fn missing_dependency_leaves_running_session_alone() {
        let fake = FakeTranscoder::new();
        let (sup, _log) = supervisor(fake.clone());
        sup.start(MASTER_URL).await.unwrap();

        let (broken, _log) = supervisor(FakeTranscoder::missing());
        let err = broken.start(MASTER_URL).await.unwrap_err();
        assert!(matches!(err, Error::Dependency { .. }));
        assert!(!broken.is_streaming());

        assert!(sup.is_streaming());
        assert_eq!(fake.spawn_count(), 1);
    }

    #[tokio::test]
    async fn spawn_failure_records_no_session() {
        let fake = FakeTranscoder::new();
        fake.fail_spawns(true);
        let (sup, log) = supervisor(fake);

        let err = sup.start(MASTER_URL).await.unwrap_err();
        assert!(matches!(err, Error::Process { .. }));
        assert!(!sup.is_streaming());
        assert!(log
            .all()
            .iter()
            .any(|e| e.is_error && e.message.starts_with("Failed to start the stream")));
    }

    #[tokio::test]
    async fn process_failure_clears_slot_and_logs_stderr() {
        let fake = FakeTranscoder::new();
        let (sup, log) = supervisor(fake.clone());
        sup.start(MASTER_URL).await.unwrap();

        assert!(fake.fail_process(0, "Connection to tcp://live.twitch.tv:1935 failed"));
        assert!(wait_until(WAIT, || !sup.status().is_streaming).await);

        let status = sup.status();
        assert_eq!(status.state, SessionStatus::Failed);
        assert!(status.stream_url.is_none());

        let entries = log.all();
        assert!(entries
            .iter()
            .any(|e| e.is_error && e.message == "Streaming error: ffmpeg exited with code 1"));
        assert!(entries
            .iter()
            .any(|e| e.message.starts_with("Standard error: Connection to tcp://")));
    }

    #[tokio::test]
    async fn crash_before_restart_still_logs_diagnostics() {
        let fake = FakeTranscoder::new();
        let (sup, log) = supervisor(fake.clone());
        sup.start(MASTER_URL).await.unwrap();
        assert!(wait_until(WAIT, || sup.status().state == SessionStatus::Running).await);

        // The first relay dies just as the operator restarts.
        assert!(fake.fail_process(0, "av_interleaved_write_frame(): Broken pipe"));
        let second = sup.start("https://other.example.com/live.m3u8").await.unwrap();

        assert!(
            wait_until(WAIT, || log
                .all()
                .iter()
                .any(|e| e.message == "Standard error: av_interleaved_write_frame(): Broken pipe"))
            .await
        );
        assert!(log
            .all()
            .iter()
            .any(|e| e.is_error && e.message == "Streaming error: ffmpeg exited with code 1"));

        assert!(sup.is_streaming());
        assert_eq!(sup.current_session().unwrap().id, second.session_id);
        assert_eq!(fake.spawn_count(), 2);
    }

    #[tokio::test]
    async fn natural_end_clears_slot() {
        let fake = FakeTranscoder::new();
        let (sup, log) = supervisor(fake.clone());
        sup.start(MASTER_URL).await.unwrap();

        assert!(fake.finish_process(0));
        assert!(wait_until(WAIT, || !sup.is_streaming()).await);
        assert_eq!(sup.status().state, SessionStatus::Stopped);
        assert!(log.all().iter().any(|e| e.message == "Stream finished"));
    }

    #[tokio::test]
    async fn stop_with_nothing_running() {
        let (sup, log) = supervisor(FakeTranscoder::new());

        let outcome = sup.stop().await.unwrap();
        assert_eq!(outcome, StopOutcome::NothingRunning);

        let entries = log.all();
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].is_error);
    }

    #[tokio::test]
    async fn stop_kills_active_session() {
        let fake = FakeTranscoder::new();
        let (sup, _log) = supervisor(fake.clone());
        sup.start(MASTER_URL).await.unwrap();

        assert_eq!(sup.stop().await.unwrap(), StopOutcome::Stopped);
        assert!(!sup.is_streaming());
        assert!(fake.calls().contains(&TranscoderCall::Kill { index: 0 }));
        assert_eq!(sup.status().state, SessionStatus::Stopped);

        // Stopping again finds nothing.
        assert_eq!(sup.stop().await.unwrap(), StopOutcome::NothingRunning);
    }

    #[tokio::test]
    async fn stop_reports_kill_failure_and_clears_slot() {
        let fake = FakeTranscoder::new();
        let (sup, log) = supervisor(fake.clone());
        sup.start(MASTER_URL).await.unwrap();
        fake.fail_kills(true);

        let err = sup.stop().await.unwrap_err();
        assert!(matches!(err, Error::Process { .. }));
        assert!(!sup.is_streaming());
        assert_eq!(sup.status().state, SessionStatus::Stopped);
        assert!(fake.calls().contains(&TranscoderCall::Kill { index: 0 }));
        assert!(log
            .all()
            .iter()
            .any(|e| e.is_error && e.message.starts_with("Failed to stop the stream:")));

        assert_eq!(sup.stop().await.unwrap(), StopOutcome::NothingRunning);
    }

    #[tokio::test]
    async fn restart_proceeds_when_kill_fails() {
        let fake = FakeTranscoder::new();
        let (sup, log) = supervisor(fake.clone());
        sup.start(MASTER_URL).await.unwrap();
        fake.fail_kills(true);

        let second = sup.start("https://other.example.com/live.m3u8").await.unwrap();
        assert_eq!(fake.spawn_count(), 2);
        assert!(matches!(
            fake.calls()[2],
            TranscoderCall::Spawn { index: 1, .. }
        ));
        assert!(log
            .all()
            .iter()
            .any(|e| e.is_error && e.message.starts_with("Failed to stop the current stream:")));

        // The unkillable first relay exiting later leaves the new session alone.
        assert!(fake.finish_process(0));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(sup.is_streaming());
        assert_eq!(sup.current_session().unwrap().id, second.session_id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_starts_leave_one_session() {
        let fake = FakeTranscoder::new();
        let (sup, _log) = supervisor(fake.clone());
        let sup = Arc::new(sup);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let sup = sup.clone();
                tokio::spawn(async move {
                    sup.start(&format!("https://cdn{i}.example.com/live.m3u8"))
                        .await
                })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().session_id);
        }

        assert_eq!(fake.spawn_count(), 8);
        assert_eq!(fake.kill_count(), 7);
        assert!(sup.is_streaming());
        let current = sup.current_session().unwrap();
        assert!(ids.contains(&current.id));
    }

    #[tokio::test]
    async fn manifest_failure_falls_back_to_requested_url() {
        let fake = FakeTranscoder::new();
        let (sup, log) = supervisor(fake.clone());

        let url = "https://video-weaver.ams03.hls.ttvnw.net/v1/playlist/abc.m3u8";
        let report = sup.start(url).await.unwrap();
        assert_eq!(report.best_quality_url, url);
        assert!(report.is_twitch_url);
        assert!(log
            .all()
            .iter()
            .any(|e| e.is_error && e.message.starts_with("Failed to analyze M3U8 manifest")));
    }

    #[tokio::test]
    async fn status_includes_last_ten_logs() {
        let (sup, log) = supervisor(FakeTranscoder::new());
        for i in 0..25 {
            log.info(format!("entry {i}"));
        }
        let status = sup.status();
        assert_eq!(status.logs.len(), STATUS_LOG_TAIL);
        assert_eq!(status.logs[0].message, "entry 15");
        assert_eq!(status.state, SessionStatus::Idle);

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["isStreaming"], false);
        assert!(json["streamUrl"].is_null());
        assert_eq!(json["state"], "idle");
    }

    #[tokio::test]
    async fn shutdown_stops_active_session() {
        let fake = FakeTranscoder::new();
        let (sup, _log) = supervisor(fake.clone());
        sup.start(MASTER_URL).await.unwrap();

        sup.shutdown().await;
        assert!(!sup.is_streaming());
        assert!(fake.calls().contains(&TranscoderCall::Kill { index: 0 }));
    }
}
