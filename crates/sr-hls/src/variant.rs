//! Master-playlist parsing and best-variant selection.
//!
//! Selection is a single forward scan: every `#EXT-X-STREAM-INF` line with a
//! `BANDWIDTH` attribute strictly greater than the best seen so far claims the
//! line that follows it as its URL. Equal bandwidths keep the first variant,
//! and a tag on the final line has no URL and is skipped.
//!
//! `BANDWIDTH` only matches right after the `:` or `,` that opens an
//! attribute, so an `AVERAGE-BANDWIDTH` value is never taken for the peak
//! bitrate, even when it comes first on the line.

use std::sync::OnceLock;

use regex::Regex;

/// Tag marking a variant entry; its presence anywhere marks a master playlist.
pub const STREAM_INF_TAG: &str = "#EXT-X-STREAM-INF";

/// One rendition listed by a master playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    /// Declared peak bitrate in bits per second.
    pub bandwidth: u64,
    /// Absolute URL of the variant's media playlist.
    pub url: String,
}

fn bandwidth_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Anchored on the attribute separator so AVERAGE-BANDWIDTH is not mistaken
    // for BANDWIDTH.
    RE.get_or_init(|| Regex::new(r"[:,]BANDWIDTH=(\d+)").expect("static regex"))
}

/// Whether `text` is a master playlist rather than a media playlist.
pub fn is_master_playlist(text: &str) -> bool {
    text.contains(STREAM_INF_TAG)
}

/// Extract the `BANDWIDTH` attribute of a stream-info line.
pub fn parse_bandwidth(line: &str) -> Option<u64> {
    bandwidth_re()
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Resolve a variant URL against the manifest it was listed in.
///
/// Anything not starting with `http` is appended to the manifest URL
/// truncated after its last `/`.
pub fn resolve_variant_url(candidate: &str, manifest_url: &str) -> String {
    if candidate.starts_with("http") {
        return candidate.to_string();
    }
    let base_end = manifest_url.rfind('/').map_or(0, |i| i + 1);
    format!("{}{}", &manifest_url[..base_end], candidate)
}

/// Pick the highest-bandwidth variant of a master playlist.
///
/// Returns `None` for media playlists and for master playlists in which no
/// stream-info line carried a usable `BANDWIDTH` followed by a URL line.
pub fn select_best_variant(text: &str, manifest_url: &str) -> Option<Variant> {
    if !is_master_playlist(text) {
        return None;
    }

    let lines: Vec<&str> = text.split('\n').collect();
    let mut best_bandwidth = 0u64;
    let mut best: Option<Variant> = None;

    for (i, line) in lines.iter().enumerate() {
        if !line.contains(STREAM_INF_TAG) {
            continue;
        }
        let Some(bandwidth) = parse_bandwidth(line) else {
            continue;
        };
        if bandwidth <= best_bandwidth {
            continue;
        }
        best_bandwidth = bandwidth;

        if let Some(next) = lines.get(i + 1) {
            best = Some(Variant {
                bandwidth,
                url: resolve_variant_url(next.trim(), manifest_url),
            });
        }
    }

    best
}
