//! # sr-hls
//!
//! Resolution of a requested source URL into the URL ffmpeg should read.
//!
//! - **Fetching** ([`ManifestFetch`], [`HttpFetcher`]) -- retrieve manifest
//!   text over HTTP or HTTPS with a deadline.
//! - **Variant parsing** ([`variant`]) -- pure functions that detect master
//!   playlists and pick the highest-bandwidth rendition.
//! - **Selection** ([`VariantSelector`]) -- the never-failing combination of
//!   the two, reporting problems to the relay log instead of the caller.

pub mod fetch;
pub mod selector;
pub mod variant;

pub use fetch::{HttpFetcher, ManifestFetch};
pub use selector::VariantSelector;
pub use variant::{is_master_playlist, resolve_variant_url, select_best_variant, Variant};
