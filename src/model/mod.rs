//! Song entity: canonical metadata plus the user's override layer.
//!
//! Every field a [`Song`] exposes is resolved the same way: the override if
//! the user set one, else the canonical value from the metadata source, else
//! [`Resolved::Unresolved`]. "Not loaded yet" is never silently turned into a
//! blank value.

mod title;

pub use title::clean_title;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;
use crate::lyrics::{LyricsDocument, LyricsError, LyricsReference};
use crate::registry::{OverrideStore, Registry, RegistryError};
use crate::sources::{LyricsProvider, MetadataSource};

/// Canonical song metadata as supplied by the metadata source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongMetadata {
    /// Raw upload title
    pub title: String,
    pub artist: Option<String>,
    pub description: Option<String>,
    pub duration_secs: Option<u64>,
}

/// Where a field value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved<T> {
    /// Set by the user
    Override(T),
    /// From canonical metadata
    Canonical(T),
    /// No override and no canonical value (yet)
    Unresolved,
}

impl<T> Resolved<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Resolved::Override(v) | Resolved::Canonical(v) => Some(v),
            Resolved::Unresolved => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Resolved::Override(v) | Resolved::Canonical(v) => Some(v),
            Resolved::Unresolved => None,
        }
    }

    pub fn is_override(&self) -> bool {
        matches!(self, Resolved::Override(_))
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, Resolved::Unresolved)
    }

    fn from_parts(overridden: Option<T>, canonical: Option<T>) -> Self {
        match (overridden, canonical) {
            (Some(v), _) => Resolved::Override(v),
            (None, Some(v)) => Resolved::Canonical(v),
            (None, None) => Resolved::Unresolved,
        }
    }
}

/// A song as seen by the UI.
#[derive(Debug)]
pub struct Song {
    id: String,
    overrides: Arc<OverrideStore>,
    metadata: RwLock<Option<SongMetadata>>,
}

impl Song {
    /// Bind a song to its override store in `registry`.
    pub fn new(id: impl Into<String>, registry: &Registry) -> Self {
        let id = id.into();
        let overrides = registry.get_or_create(&id);
        Self {
            id,
            overrides,
            metadata: RwLock::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn overrides(&self) -> &Arc<OverrideStore> {
        &self.overrides
    }

    pub fn metadata(&self) -> Option<SongMetadata> {
        self.metadata.read().clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.metadata.read().is_some()
    }

    /// Install canonical metadata obtained elsewhere.
    pub fn set_metadata(&self, metadata: SongMetadata) {
        *self.metadata.write() = Some(metadata);
    }

    /// Fetch canonical metadata from `source`.
    pub async fn load_metadata<S: MetadataSource + ?Sized>(&self, source: &S) -> Result<()> {
        let metadata = source.fetch_metadata(&self.id).await?;
        tracing::debug!(target: "model", id = %self.id, title = %metadata.title, "Loaded song metadata");
        self.set_metadata(metadata);
        Ok(())
    }

    /// Display title: override, else the cleaned canonical title.
    pub fn title(&self) -> Resolved<String> {
        let canonical = self
            .metadata
            .read()
            .as_ref()
            .map(|m| clean_title(&m.title, m.artist.as_deref()));
        Resolved::from_parts(self.overrides.title(), canonical)
    }

    pub fn set_title(&self, title: Option<String>) -> std::result::Result<bool, RegistryError> {
        self.overrides.set_title(title)
    }

    pub fn artist(&self) -> Resolved<String> {
        let canonical = self.metadata.read().as_ref().and_then(|m| m.artist.clone());
        Resolved::from_parts(None, canonical)
    }

    /// Accent color (ARGB). Only the user sets this; there is no canonical value.
    pub fn accent_color(&self) -> Resolved<u32> {
        Resolved::from_parts(self.overrides.accent_color(), None)
    }

    pub fn set_accent_color(&self, argb: Option<u32>) -> std::result::Result<bool, RegistryError> {
        self.overrides.set_accent_color(argb)
    }

    /// Pinned lyrics reference, if the user chose one.
    pub fn lyrics_source_id(&self) -> Resolved<String> {
        Resolved::from_parts(self.overrides.lyrics_source_id(), None)
    }

    pub fn set_lyrics_reference(
        &self,
        reference: Option<&LyricsReference>,
    ) -> std::result::Result<bool, RegistryError> {
        self.overrides
            .set_lyrics_source_id(reference.map(LyricsReference::to_string))
    }

    /// Sync offset for this song, or `default_ms` when not overridden.
    pub fn lyrics_sync_offset_ms(&self, default_ms: i64) -> i64 {
        self.overrides.lyrics_sync_offset_ms().unwrap_or(default_ms)
    }

    pub fn set_lyrics_sync_offset_ms(
        &self,
        offset: Option<i64>,
    ) -> std::result::Result<bool, RegistryError> {
        self.overrides.set_lyrics_sync_offset_ms(offset)
    }

    /// Fetch and validate this song's lyrics.
    ///
    /// Uses the pinned reference when there is one, otherwise asks the
    /// provider to search by title. `Ok(None)` when no lyrics are available
    /// or the title is not known yet.
    pub async fn fetch_lyrics<P: LyricsProvider + ?Sized>(
        &self,
        provider: &P,
    ) -> Result<Option<LyricsDocument>> {
        let reference = match self.overrides.lyrics_source_id() {
            Some(pinned) => LyricsReference::parse(&pinned)?,
            None => {
                let Some(title) = self.title().into_value() else {
                    tracing::debug!(target: "model", id = %self.id, "No title yet, skipping lyrics search");
                    return Ok(None);
                };
                let artist = self.artist().into_value();
                match provider.search(&title, artist.as_deref()).await? {
                    Some(found) => found,
                    None => return Ok(None),
                }
            }
        };

        let Some(raw) = provider.fetch_lyrics(&reference).await? else {
            tracing::debug!(target: "model", id = %self.id, %reference, "Provider has no such lyrics");
            return Ok(None);
        };
        let document = LyricsDocument::from_raw(raw).map_err(|e: LyricsError| {
            tracing::warn!(target: "model", id = %self.id, %reference, "Rejected lyrics: {}", e);
            e
        })?;
        Ok(Some(document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::lyrics::{LyricsSource, RawLyrics, RawTerm};
    use crate::sources::FetchError;
    use crate::sources::mocks::{MockLyrics, MockMetadata};

    fn metadata() -> SongMetadata {
        SongMetadata {
            title: "ARTIST - Song Name [Official MV]".into(),
            artist: Some("ARTIST".into()),
            description: None,
            duration_secs: Some(215),
        }
    }

    fn raw_lyrics(sync: u8, start: Option<f64>) -> RawLyrics {
        RawLyrics {
            id: "81234".into(),
            source: Some("ptl".into()),
            sync,
            lines: vec![vec![RawTerm {
                start,
                end: start.map(|s| s + 1000.0),
                ..RawTerm::untimed("la")
            }]],
        }
    }

    #[test]
    fn test_title_unresolved_before_load() {
        let registry = Registry::in_memory();
        let song = Song::new("abc", &registry);
        assert_eq!(song.title(), Resolved::Unresolved);
        assert!(!song.is_loaded());
    }

    #[test]
    fn test_title_override_then_canonical() {
        let registry = Registry::in_memory();
        let song = Song::new("abc", &registry);
        song.set_metadata(metadata());
        assert_eq!(song.title(), Resolved::Canonical("Song Name".into()));

        song.set_title(Some("Mine".into())).unwrap();
        assert_eq!(song.title(), Resolved::Override("Mine".into()));

        song.set_title(None).unwrap();
        assert_eq!(song.title(), Resolved::Canonical("Song Name".into()));
    }

    #[test]
    fn test_override_only_fields() {
        let registry = Registry::in_memory();
        let song = Song::new("abc", &registry);
        song.set_metadata(metadata());

        assert_eq!(song.accent_color(), Resolved::Unresolved);
        song.set_accent_color(Some(0xFF00_00FF)).unwrap();
        assert_eq!(song.accent_color(), Resolved::Override(0xFF00_00FF));

        assert_eq!(song.lyrics_sync_offset_ms(120), 120);
        song.set_lyrics_sync_offset_ms(Some(-80)).unwrap();
        assert_eq!(song.lyrics_sync_offset_ms(120), -80);
    }

    #[test]
    fn test_songs_share_store() {
        let registry = Registry::in_memory();
        let a = Song::new("abc", &registry);
        let b = Song::new("abc", &registry);
        a.set_title(Some("Shared".into())).unwrap();
        assert_eq!(b.title(), Resolved::Override("Shared".into()));
    }

    #[tokio::test]
    async fn test_load_metadata() {
        let registry = Registry::in_memory();
        let song = Song::new("abc", &registry);
        song.load_metadata(&MockMetadata::with("abc", metadata()))
            .await
            .unwrap();
        assert_eq!(song.artist(), Resolved::Canonical("ARTIST".into()));

        let missing = Song::new("zzz", &registry);
        let err = missing
            .load_metadata(&MockMetadata::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Fetch(FetchError::NotFound(_))));
        assert_eq!(missing.title(), Resolved::Unresolved);
    }

    #[tokio::test]
    async fn test_concurrent_loads_share_registry() {
        let registry = Registry::in_memory();
        let mut source = MockMetadata::default();
        for id in ["a", "b", "c"] {
            source.songs.insert(id.to_string(), metadata());
        }
        let songs: Vec<Song> = ["a", "b", "c", "a"]
            .into_iter()
            .map(|id| Song::new(id, &registry))
            .collect();

        let results =
            futures::future::join_all(songs.iter().map(|song| song.load_metadata(&source))).await;
        assert!(results.iter().all(|r| r.is_ok()));
        assert!(songs.iter().all(Song::is_loaded));
        assert_eq!(registry.len(), 3);
        assert!(Arc::ptr_eq(songs[0].overrides(), songs[3].overrides()));
    }

    #[tokio::test]
    async fn test_fetch_lyrics_uses_pinned_reference() {
        let registry = Registry::in_memory();
        let song = Song::new("abc", &registry);
        let reference = LyricsReference::new(LyricsSource::PetitLyrics, "81234");
        song.set_lyrics_reference(Some(&reference)).unwrap();
        assert_eq!(song.lyrics_source_id(), Resolved::Override("ptl:81234".into()));

        let provider = MockLyrics::with(reference, raw_lyrics(1, Some(0.0)));
        let doc = song.fetch_lyrics(&provider).await.unwrap().unwrap();
        assert_eq!(doc.id(), "81234");
        assert!(doc.is_synced());
        assert!(provider.searches.lock().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_lyrics_searches_by_title() {
        let registry = Registry::in_memory();
        let song = Song::new("abc", &registry);
        let reference = LyricsReference::new(LyricsSource::PetitLyrics, "81234");
        let mut provider = MockLyrics::with(reference.clone(), raw_lyrics(0, None));
        provider.search_result = Some(reference);

        // Title unknown: no search
        assert!(song.fetch_lyrics(&provider).await.unwrap().is_none());
        assert!(provider.searches.lock().is_empty());

        song.set_metadata(metadata());
        let doc = song.fetch_lyrics(&provider).await.unwrap().unwrap();
        assert!(!doc.is_synced());
        assert_eq!(provider.searches.lock().as_slice(), ["Song Name".to_string()]);
    }

    #[tokio::test]
    async fn test_fetch_lyrics_rejects_malformed() {
        let registry = Registry::in_memory();
        let song = Song::new("abc", &registry);
        let reference = LyricsReference::new(LyricsSource::PetitLyrics, "81234");
        song.set_lyrics_reference(Some(&reference)).unwrap();

        let provider = MockLyrics::with(reference, raw_lyrics(2, None));
        let err = song.fetch_lyrics(&provider).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Lyrics(LyricsError::MalformedSync { line: 0, term: 0 })
        ));
    }

    #[tokio::test]
    async fn test_fetch_lyrics_provider_failure() {
        let registry = Registry::in_memory();
        let song = Song::new("abc", &registry);
        song.set_metadata(metadata());
        let provider = MockLyrics {
            error: Some(FetchError::Network("offline".into())),
            ..Default::default()
        };
        let err = song.fetch_lyrics(&provider).await.unwrap_err();
        assert!(matches!(err, Error::Fetch(FetchError::Network(_))));
    }
}
