//! Song Overlay - per-song metadata overrides and synchronized lyrics.
//!
//! Users can override what the upstream service reports about a song (title,
//! accent color, which lyrics to use and how to time them). Overrides live in
//! a [`registry::Registry`] persisted as one JSON blob in a
//! [`prefs::PreferenceStore`]. Lyrics are validated into a
//! [`lyrics::LyricsDocument`] and followed against a playback clock by a
//! [`lyrics::SyncSession`].

pub mod cli;
pub mod config;
pub mod error;
pub mod lyrics;
pub mod model;
pub mod prefs;
pub mod registry;
pub mod sources;
#[cfg(test)]
pub mod test_utils;

pub use error::{Error, Result};
