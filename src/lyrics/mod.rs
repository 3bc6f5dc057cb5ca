//! Synchronized lyrics.
//!
//! # Architecture
//!
//! ```text
//! LyricsProvider ──RawLyrics──▶ LyricsDocument (validated, immutable)
//!                                     │ Arc
//!                                     ▼
//! PlaybackClock ──position──▶ SyncSession ──▶ SyncCursor::resolve
//!                                     │
//!                                     ▼ SyncEvent (mpsc)
//!                              ScrollFollower ──▶ ScrollCommand (UI)
//! ```

mod cursor;
mod document;
mod follow;
mod session;

pub use cursor::{DEFAULT_POLL_CAP, Resolution, SyncCursor};
pub use document::{
    LyricsDocument, LyricsReference, LyricsSource, RawLyrics, RawSubterm, RawTerm, Subterm,
    SyncType, Term,
};
pub use follow::{FollowConfig, ScrollCommand, ScrollFollower};
pub use session::{SyncEvent, SyncSession};

use crate::sources::ClockError;

/// Errors building a lyric document.
#[derive(Debug, thiserror::Error)]
pub enum LyricsError {
    /// Synced document with a term missing a timestamp
    #[error("Malformed sync data: line {line} term {term} is missing a timestamp")]
    MalformedSync { line: usize, term: usize },

    #[error("Invalid timing: line {line} term {term} ends before it starts")]
    InvalidSpan { line: usize, term: usize },

    #[error("Unknown sync type {0}")]
    UnknownSyncType(u8),

    #[error("Unknown lyrics source {0:?}")]
    UnknownSource(String),

    #[error("Invalid lyrics reference {0:?} (expected source:id)")]
    InvalidReference(String),

    #[error("Failed to parse lyrics: {0}")]
    Parse(#[source] serde_json::Error),
}

/// Errors from the polling loop.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Playback clock failed: {0}")]
    Clock(#[from] ClockError),

    #[error("Lyric loop task failed: {0}")]
    Join(String),
}
