//! Test utilities and fixtures.
//!
//! Lyric documents built from plain spans, preference stores that count
//! (or refuse) writes, and clocks for driving the polling loop under
//! tokio's paused time.
//!
//! # Example
//!
//! ```ignore
//! use crate::test_utils::{synced_doc, PausedClock};
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_something() {
//!     let doc = synced_doc(&[(0.0, 1000.0), (1000.0, 2000.0)]);
//!     let clock = Arc::new(PausedClock::new());
//!     // ... test logic
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::lyrics::{LyricsDocument, RawTerm, SyncType};
use crate::prefs::{MemoryPrefs, PreferenceStore, PrefsError};
use crate::sources::{ClockError, ElapsedClock, PlaybackClock};

/// Line-synced document with one single-term line per `(start, end)` span.
///
/// Line `i` is timed by `spans[i]`.
pub fn synced_doc(spans: &[(f64, f64)]) -> Arc<LyricsDocument> {
    let lines = spans
        .iter()
        .enumerate()
        .map(|(i, &(start, end))| vec![RawTerm::timed(format!("line {i}"), start, end)])
        .collect();
    doc_with_lines(SyncType::LineSync, lines)
}

/// Unsynced document with one untimed term per line.
pub fn unsynced_doc(lines: &[&str]) -> Arc<LyricsDocument> {
    let lines = lines.iter().map(|text| vec![RawTerm::untimed(*text)]).collect();
    doc_with_lines(SyncType::None, lines)
}

/// Document from raw lines; panics if they do not validate.
pub fn doc_with_lines(sync_type: SyncType, lines: Vec<Vec<RawTerm>>) -> Arc<LyricsDocument> {
    Arc::new(
        LyricsDocument::new("test", None, sync_type, lines).expect("Invalid test lyrics"),
    )
}

/// Memory prefs that count writes, optionally failing every write.
#[derive(Debug, Default)]
pub struct CountingPrefs {
    inner: MemoryPrefs,
    writes: AtomicUsize,
    fail: bool,
}

impl CountingPrefs {
    /// A store whose every `put` fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Successful writes so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl PreferenceStore for CountingPrefs {
    fn get(&self, key: &str) -> Result<Option<String>, PrefsError> {
        self.inner.get(key)
    }

    fn put(&self, key: &str, value: &str) -> Result<(), PrefsError> {
        if self.fail {
            return Err(PrefsError::Write(
                "memory".into(),
                std::io::Error::other("write refused"),
            ));
        }
        self.inner.put(key, value)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// [`ElapsedClock`] that counts reads.
#[derive(Debug, Default)]
pub struct PausedClock {
    clock: ElapsedClock,
    reads: AtomicUsize,
}

impl PausedClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seek(&self, position_ms: i64) {
        self.clock.seek(position_ms);
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl PlaybackClock for PausedClock {
    fn position_ms(&self) -> Result<i64, ClockError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.clock.position_ms()
    }
}

/// Clock that always fails.
#[derive(Debug, Default)]
pub struct FailingClock;

impl PlaybackClock for FailingClock {
    fn position_ms(&self) -> Result<i64, ClockError> {
        Err(ClockError::Unavailable("player service gone".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synced_doc_shape() {
        let doc = synced_doc(&[(0.0, 10.0), (10.0, 20.0)]);
        assert!(doc.is_synced());
        assert_eq!(doc.line_count(), 2);
        assert_eq!(doc.line_text(1).as_deref(), Some("line 1"));
    }

    #[test]
    fn test_counting_prefs() {
        let prefs = CountingPrefs::default();
        prefs.put("k", "v").unwrap();
        assert_eq!(prefs.writes(), 1);
        assert!(CountingPrefs::failing().put("k", "v").is_err());
    }
}
