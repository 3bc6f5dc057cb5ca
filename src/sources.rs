//! Collaborator interfaces.
//!
//! Canonical metadata, lyric data and the playback position all come from
//! outside this crate (network clients, the audio service). These traits are
//! the seams; production code plugs in real implementations and tests use
//! the mocks below.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::lyrics::{LyricsReference, RawLyrics};
use crate::model::SongMetadata;

/// Failure reading the playback position.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClockError {
    #[error("No active playback")]
    NoPlayback,

    #[error("Playback clock unavailable: {0}")]
    Unavailable(String),
}

/// Failure fetching data from a remote collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Current playback position.
///
/// Positions normally advance but may jump either way when the user seeks.
pub trait PlaybackClock: Send + Sync {
    fn position_ms(&self) -> Result<i64, ClockError>;
}

/// Canonical (non-overridden) song metadata.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch_metadata(&self, song_id: &str) -> Result<SongMetadata, FetchError>;
}

/// Lyric data by reference, plus a lookup for songs without a pinned reference.
#[async_trait]
pub trait LyricsProvider: Send + Sync {
    /// Fetch one document. `Ok(None)` if the source has no such document.
    async fn fetch_lyrics(
        &self,
        reference: &LyricsReference,
    ) -> Result<Option<RawLyrics>, FetchError>;

    /// Best match for a song. `Ok(None)` when nothing matches.
    async fn search(
        &self,
        title: &str,
        artist: Option<&str>,
    ) -> Result<Option<LyricsReference>, FetchError>;
}

/// Clock that runs from the moment it is created, with seeking.
///
/// Uses tokio's clock, so it follows paused/advanced time in tests.
#[derive(Debug)]
pub struct ElapsedClock {
    origin: Mutex<(tokio::time::Instant, i64)>,
}

impl ElapsedClock {
    /// Start counting from `position_ms` now.
    pub fn starting_at(position_ms: i64) -> Self {
        Self {
            origin: Mutex::new((tokio::time::Instant::now(), position_ms)),
        }
    }

    pub fn seek(&self, position_ms: i64) {
        *self.origin.lock() = (tokio::time::Instant::now(), position_ms);
    }
}

impl Default for ElapsedClock {
    fn default() -> Self {
        Self::starting_at(0)
    }
}

impl PlaybackClock for ElapsedClock {
    fn position_ms(&self) -> Result<i64, ClockError> {
        let (instant, base) = *self.origin.lock();
        let elapsed = i64::try_from(instant.elapsed().as_millis()).unwrap_or(i64::MAX);
        Ok(base.saturating_add(elapsed))
    }
}

/// Mock collaborators for tests.
#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::HashMap;

    /// Metadata source backed by a map.
    #[derive(Default)]
    pub struct MockMetadata {
        pub songs: HashMap<String, SongMetadata>,
    }

    impl MockMetadata {
        pub fn with(id: &str, metadata: SongMetadata) -> Self {
            let mut songs = HashMap::new();
            songs.insert(id.to_string(), metadata);
            Self { songs }
        }
    }

    #[async_trait]
    impl MetadataSource for MockMetadata {
        async fn fetch_metadata(&self, song_id: &str) -> Result<SongMetadata, FetchError> {
            self.songs
                .get(song_id)
                .cloned()
                .ok_or_else(|| FetchError::NotFound(song_id.to_string()))
        }
    }

    /// Lyrics provider backed by a map, with an optional search answer.
    #[derive(Default)]
    pub struct MockLyrics {
        pub documents: HashMap<LyricsReference, RawLyrics>,
        pub search_result: Option<LyricsReference>,
        /// Error returned by every call (takes precedence)
        pub error: Option<FetchError>,
        pub searches: Mutex<Vec<String>>,
    }

    impl MockLyrics {
        pub fn with(reference: LyricsReference, lyrics: RawLyrics) -> Self {
            let mut documents = HashMap::new();
            documents.insert(reference, lyrics);
            Self {
                documents,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl LyricsProvider for MockLyrics {
        async fn fetch_lyrics(
            &self,
            reference: &LyricsReference,
        ) -> Result<Option<RawLyrics>, FetchError> {
            if let Some(e) = &self.error {
                return Err(e.clone());
            }
            Ok(self.documents.get(reference).cloned())
        }

        async fn search(
            &self,
            title: &str,
            _artist: Option<&str>,
        ) -> Result<Option<LyricsReference>, FetchError> {
            if let Some(e) = &self.error {
                return Err(e.clone());
            }
            self.searches.lock().push(title.to_string());
            Ok(self.search_result.clone())
        }
    }
}
