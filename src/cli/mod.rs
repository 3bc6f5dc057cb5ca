//! Command-line interface for song-overlay.
//!
//! A developer tool for inspecting and editing the override registry and for
//! replaying lyric files against a wall clock, without the UI.

mod commands;

pub use commands::{Cli, Commands, ConfigCommand, LyricsCommand, OverridesCommand, run_command};
