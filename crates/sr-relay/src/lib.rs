//! # sr-relay
//!
//! Ownership of the one relay session the service may run at a time.
//!
//! [`StreamSupervisor`] validates start requests, resolves the best source
//! rendition through [`sr_hls::VariantSelector`], launches the transcoder and
//! follows the process through a per-session monitor task. Lifecycle events
//! are applied under the same lock as start and stop, so a replaced session
//! can never clear its successor.
//!
//! Enable the `testing` feature for [`testing::FakeTranscoder`] and
//! [`testing::StaticFetcher`].

mod lifecycle;
pub mod session;
pub mod supervisor;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use session::{SessionId, SessionStatus, SourceOrigin, StreamSession};
pub use supervisor::{StartReport, StopOutcome, StreamStatus, StreamSupervisor, STATUS_LOG_TAIL};
