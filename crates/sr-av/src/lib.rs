//! # sr-av
//!
//! The ffmpeg side of the relay.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`tools`]) -- locate ffmpeg (configured path or
//!   `PATH`) and verify that it runs.
//! - **Invocation building** ([`RelayInvocation`]) -- the resilient input
//!   flags and Twitch-friendly output flags for one relay.
//! - **Process handling** ([`Transcoder`], [`RelayProcess`]) -- the seam the
//!   supervisor launches, waits on, and kills sessions through, with
//!   [`FfmpegTranscoder`] as the production implementation.

pub mod command;
pub mod process;
pub mod tools;

// ---- Re-exports for convenience ----

pub use command::RelayInvocation;
pub use process::{FfmpegProcess, FfmpegTranscoder, ProcessExit, RelayProcess, Transcoder};
pub use tools::{DependencyStatus, ToolInfo};
