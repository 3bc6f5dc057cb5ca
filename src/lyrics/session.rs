//! Cancellable polling loop that drives a [`SyncCursor`].
//!
//! While a synced document is attached, a background task repeatedly reads
//! the playback clock, applies the current sync offset, resolves the active
//! range and sleeps for the delay the cursor suggests. Range changes are
//! sent as [`SyncEvent`]s.
//!
//! # Usage
//!
//! ```ignore
//! let (mut session, mut events) = SyncSession::new(clock, DEFAULT_POLL_CAP);
//! session.set_offset_ms(song.lyrics_sync_offset_ms(0));
//! session.attach(Arc::new(document)).await?;
//!
//! while let Some(event) = events.recv().await {
//!     if let SyncEvent::RangeChanged { range, .. } = event {
//!         if let Some(cmd) = follower.on_range(range.as_ref()) { /* scroll */ }
//!     }
//! }
//! ```

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::SyncError;
use super::cursor::SyncCursor;
use super::document::LyricsDocument;
use crate::sources::PlaybackClock;

/// Events emitted by the polling loop.
///
/// `generation` increases with every attach, so consumers can drop events
/// that were still queued from a previous document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// The active range changed
    RangeChanged {
        generation: u64,
        /// Adjusted playback position the range was resolved at
        position_ms: i64,
        range: Option<RangeInclusive<usize>>,
    },
    /// The attached document has no timing; nothing will follow
    Unsynced { generation: u64 },
}

impl SyncEvent {
    pub fn generation(&self) -> u64 {
        match self {
            SyncEvent::RangeChanged { generation, .. } | SyncEvent::Unsynced { generation } => {
                *generation
            }
        }
    }
}

struct ActiveLoop {
    document: Arc<LyricsDocument>,
    token: CancellationToken,
    handle: JoinHandle<Result<(), SyncError>>,
}

/// One lyric display session. At most one polling loop runs at a time.
pub struct SyncSession {
    clock: Arc<dyn PlaybackClock>,
    offset_ms: Arc<AtomicI64>,
    cap: Duration,
    events: mpsc::Sender<SyncEvent>,
    generation: u64,
    active: Option<ActiveLoop>,
}

impl SyncSession {
    /// Create a session and the receiver for its events.
    pub fn new(clock: Arc<dyn PlaybackClock>, cap: Duration) -> (Self, mpsc::Receiver<SyncEvent>) {
        let (events, rx) = mpsc::channel(64);
        let session = Self {
            clock,
            offset_ms: Arc::new(AtomicI64::new(0)),
            cap,
            events,
            generation: 0,
            active: None,
        };
        (session, rx)
    }

    /// Change the sync offset; a running loop picks it up on its next lookup.
    pub fn set_offset_ms(&self, offset_ms: i64) {
        self.offset_ms.store(offset_ms, Ordering::Relaxed);
    }

    pub fn offset_ms(&self) -> i64 {
        self.offset_ms.load(Ordering::Relaxed)
    }

    /// Document currently attached, if any.
    pub fn document(&self) -> Option<&Arc<LyricsDocument>> {
        self.active.as_ref().map(|a| &a.document)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True while the polling loop for the attached document is still running.
    pub fn is_running(&self) -> bool {
        self.active.as_ref().is_some_and(|a| !a.handle.is_finished())
    }

    /// Replace the attached document and start following it.
    ///
    /// The previous loop is cancelled and awaited before the new one starts.
    /// The returned result is the previous loop's outcome; the new loop is
    /// started either way.
    pub async fn attach(&mut self, document: Arc<LyricsDocument>) -> Result<(), SyncError> {
        let previous = self.detach().await;
        if let Err(e) = &previous {
            tracing::warn!(target: "lyrics::sync", "Previous lyric loop ended with error: {}", e);
        }

        self.generation += 1;
        let token = CancellationToken::new();
        let cursor = SyncCursor::with_cap(Arc::clone(&document), self.cap);

        tracing::debug!(
            target: "lyrics::sync",
            id = document.id(),
            generation = self.generation,
            "Starting lyric loop"
        );

        let handle = tokio::spawn(run_loop(
            cursor,
            Arc::clone(&self.clock),
            Arc::clone(&self.offset_ms),
            self.events.clone(),
            token.clone(),
            self.generation,
        ));

        self.active = Some(ActiveLoop {
            document,
            token,
            handle,
        });
        previous
    }

    /// Stop following. Returns how the loop ended (e.g. a clock failure).
    pub async fn detach(&mut self) -> Result<(), SyncError> {
        let Some(active) = self.active.take() else {
            return Ok(());
        };
        active.token.cancel();
        match active.handle.await {
            Ok(result) => result,
            Err(e) => Err(SyncError::Join(e.to_string())),
        }
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            active.token.cancel();
        }
    }
}

async fn run_loop(
    mut cursor: SyncCursor,
    clock: Arc<dyn PlaybackClock>,
    offset_ms: Arc<AtomicI64>,
    events: mpsc::Sender<SyncEvent>,
    token: CancellationToken,
    generation: u64,
) -> Result<(), SyncError> {
    if !cursor.is_tracking() {
        tokio::select! {
            biased;
            _ = token.cancelled() => {}
            _ = events.send(SyncEvent::Unsynced { generation }) => {}
        }
        return Ok(());
    }

    loop {
        if token.is_cancelled() {
            return Ok(());
        }

        let position_ms = clock.position_ms()?;
        let offset = offset_ms.load(Ordering::Relaxed);
        let resolution = cursor.resolve(position_ms, offset);

        if resolution.changed {
            let event = SyncEvent::RangeChanged {
                generation,
                position_ms: position_ms.saturating_add(offset),
                range: resolution.range,
            };
            tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(()),
                sent = events.send(event) => {
                    if sent.is_err() {
                        tracing::debug!(target: "lyrics::sync", "Event receiver dropped, stopping");
                        return Ok(());
                    }
                }
            }
        }

        let Some(delay) = resolution.next else {
            return Ok(());
        };

        tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(()),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
