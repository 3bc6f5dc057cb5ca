//! Crate-wide error types.
//!
//! Each subsystem has its own `thiserror` enum so callers can match on the
//! exact condition (a corrupt registry blob is not the same thing as an
//! empty one). [`Error`] aggregates them for code that just wants `?`.
//! The binary uses `anyhow` on top of this.
//!
//! # Example
//!
//! ```ignore
//! use song_overlay::error::{Result, ResultExt};
//!
//! fn open(prefs: Arc<dyn PreferenceStore>) -> Result<Registry> {
//!     let registry = Registry::load(prefs).with_context("loading overrides")?;
//!     Ok(registry)
//! }
//! ```

use crate::config::ConfigError;
use crate::lyrics::{LyricsError, SyncError};
use crate::prefs::PrefsError;
use crate::registry::RegistryError;
use crate::sources::FetchError;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Override registry error (corrupt blob, storage failure, bad field value)
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Lyric document rejected at construction
    #[error("Lyrics error: {0}")]
    Lyrics(#[from] LyricsError),

    /// Polling loop failure
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// Preference store I/O
    #[error("Preferences error: {0}")]
    Prefs(#[from] PrefsError),

    /// Collaborator fetch failure
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }

    /// True if this error (or the error it wraps) is a corrupt registry blob.
    pub fn is_corrupt_registry(&self) -> bool {
        match self {
            Self::Registry(RegistryError::Corrupt(_)) => true,
            Self::WithContext { source, .. } => source.is_corrupt_registry(),
            _ => false,
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().context(ctx))
    }
}
