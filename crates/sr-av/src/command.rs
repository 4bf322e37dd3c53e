//! ffmpeg argument building for one relay session.

use sr_core::config::{RelayConfig, StreamKey};

/// A fully specified relay: where to read, where to push, and how.
#[derive(Debug, Clone)]
pub struct RelayInvocation {
    source_url: String,
    destination_url: String,
    redacted_destination: String,
    input_args: Vec<String>,
    output_args: Vec<String>,
}

impl RelayInvocation {
    /// Build the invocation for `source_url` pushed to `relay`'s ingest with `key`.
    pub fn new(source_url: impl Into<String>, relay: &RelayConfig, key: &StreamKey) -> Self {
        let input_args = vec![
            // Read at native frame rate.
            "-re".to_string(),
            "-analyzeduration".to_string(),
            relay.analyze_duration.clone(),
            "-probesize".to_string(),
            relay.probe_size.clone(),
            "-fflags".to_string(),
            "+genpts+discardcorrupt".to_string(),
            "-reconnect".to_string(),
            "1".to_string(),
            "-reconnect_streamed".to_string(),
            "1".to_string(),
            "-reconnect_delay_max".to_string(),
            relay.reconnect_delay_max.to_string(),
        ];

        let output_args = vec![
            "-c:v".to_string(),
            "copy".to_string(),
            "-c:a".to_string(),
            relay.audio_codec.clone(),
            "-ar".to_string(),
            relay.audio_sample_rate.to_string(),
            "-b:a".to_string(),
            relay.audio_bitrate.clone(),
            "-f".to_string(),
            relay.output_format.clone(),
            "-max_muxing_queue_size".to_string(),
            relay.max_muxing_queue_size.to_string(),
        ];

        Self {
            source_url: source_url.into(),
            destination_url: relay.destination_url(key),
            redacted_destination: relay.redacted_destination(),
            input_args,
            output_args,
        }
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// Destination including the stream key. Never log this.
    pub fn destination_url(&self) -> &str {
        &self.destination_url
    }

    /// Complete argument list, without the program name.
    pub fn args(&self) -> Vec<String> {
        self.build_args(&self.destination_url)
    }

    /// Shell-like rendering of the invocation with the stream key masked.
    pub fn redacted_command_line(&self, program: &str) -> String {
        let mut parts = vec![program.to_string()];
        parts.extend(self.build_args(&self.redacted_destination));
        parts.join(" ")
    }

    fn build_args(&self, destination: &str) -> Vec<String> {
        // -nostats keeps stderr line-oriented; progress updates are \r-separated.
        let mut args = vec!["-nostats".to_string()];
        args.extend(self.input_args.iter().cloned());
        args.push("-i".to_string());
        args.push(self.source_url.clone());
        args.extend(self.output_args.iter().cloned());
        args.push(destination.to_string());
        args
    }
}
