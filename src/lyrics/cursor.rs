//! Time-to-line resolution for synced lyrics.
//!
//! [`SyncCursor`] answers "which lines are being sung at this playback
//! position, and how long until that can change?".
//!
//! # Policy
//!
//! - A term is active on the half-open interval `[start, end)`.
//! - The active range is the contiguous run of lines, starting at the lowest
//!   line with an active term.
//! - In a gap, or after the last term, the range that was active just
//!   before the most recent term end is held over. Before the first term
//!   there is no range.
//!
//! Lookups during normal playback step forward from the previous position;
//! a seek backwards or a long jump forwards falls back to a binary search.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use super::document::LyricsDocument;

/// Default ceiling on the delay between two lookups.
pub const DEFAULT_POLL_CAP: Duration = Duration::from_millis(100);

/// Forward steps tried before falling back to a binary search.
const SEQUENTIAL_WINDOW: usize = 16;

/// Floor on the delay between two lookups.
const MIN_POLL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy)]
struct TimedTerm {
    line: usize,
    start: f64,
    end: f64,
}

/// Outcome of one lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Active lines, if any
    pub range: Option<RangeInclusive<usize>>,
    /// How long until the answer can change; `None` when it never will
    pub next: Option<Duration>,
    /// Whether `range` differs from the previous lookup
    pub changed: bool,
}

/// Stateful lookup over one document.
#[derive(Debug)]
pub struct SyncCursor {
    document: Arc<LyricsDocument>,
    /// Timed terms ordered by start (document order on ties)
    timeline: Vec<TimedTerm>,
    /// `max_end[i]` is the latest end among `timeline[..=i]`
    max_end: Vec<f64>,
    /// Last timeline index whose start is at or before `last_time`
    hint: Option<usize>,
    last_time: Option<f64>,
    current_range: Option<RangeInclusive<usize>>,
    cap: Duration,
}

impl SyncCursor {
    pub fn new(document: Arc<LyricsDocument>) -> Self {
        Self::with_cap(document, DEFAULT_POLL_CAP)
    }

    /// Cursor whose suggested delay never exceeds `cap`.
    pub fn with_cap(document: Arc<LyricsDocument>, cap: Duration) -> Self {
        let mut timeline: Vec<TimedTerm> = if document.is_synced() {
            document
                .terms()
                .filter_map(|(line, term)| {
                    term.span().map(|(start, end)| TimedTerm { line, start, end })
                })
                .collect()
        } else {
            Vec::new()
        };
        timeline.sort_by(|a, b| a.start.total_cmp(&b.start));

        let max_end = timeline
            .iter()
            .scan(f64::NEG_INFINITY, |acc, term| {
                *acc = acc.max(term.end);
                Some(*acc)
            })
            .collect();

        tracing::debug!(
            target: "lyrics::sync",
            id = document.id(),
            sync = ?document.sync_type(),
            terms = timeline.len(),
            "Cursor attached"
        );

        Self {
            document,
            timeline,
            max_end,
            hint: None,
            last_time: None,
            current_range: None,
            cap: cap.max(MIN_POLL),
        }
    }

    pub fn document(&self) -> &Arc<LyricsDocument> {
        &self.document
    }

    /// True if lookups can ever produce a range.
    pub fn is_tracking(&self) -> bool {
        !self.timeline.is_empty()
    }

    /// Range from the most recent lookup.
    pub fn current_range(&self) -> Option<RangeInclusive<usize>> {
        self.current_range.clone()
    }

    /// Resolve the active lines at `position_ms + offset_ms`.
    pub fn resolve(&mut self, position_ms: i64, offset_ms: i64) -> Resolution {
        if !self.is_tracking() {
            return Resolution {
                range: None,
                next: None,
                changed: false,
            };
        }

        let t = position_ms.saturating_add(offset_ms) as f64;
        let started = self.locate(t);
        self.hint = started;
        self.last_time = Some(t);

        let active = self.active_terms(started, t);
        let range = match started {
            None => None,
            Some(_) if !active.is_empty() => self.line_range(&active),
            Some(index) => self.held_range(index),
        };

        let next = self.next_delay(started, &active, t);
        let changed = range != self.current_range;
        if changed {
            tracing::trace!(target: "lyrics::sync", t, ?range, "Active range changed");
        }
        self.current_range = range.clone();

        Resolution {
            range,
            next: Some(next),
            changed,
        }
    }

    /// Stateless lookup at an adjusted time in milliseconds.
    pub fn range_at(&self, t: f64) -> Option<RangeInclusive<usize>> {
        let started = self.search(t)?;
        let active = self.active_terms(Some(started), t);
        if active.is_empty() {
            self.held_range(started)
        } else {
            self.line_range(&active)
        }
    }

    /// Last timeline index with `start <= t`.
    fn locate(&self, t: f64) -> Option<usize> {
        if let (Some(prev), Some(hint)) = (self.last_time, self.hint) {
            if t >= prev {
                let mut index = hint;
                for _ in 0..SEQUENTIAL_WINDOW {
                    match self.timeline.get(index + 1) {
                        Some(term) if term.start <= t => index += 1,
                        _ => return Some(index),
                    }
                }
            }
        } else if self.last_time.is_some_and(|prev| t >= prev) {
            // Still before the first term last time; only the head can have started.
            if self.timeline[0].start > t {
                return None;
            }
        }
        self.search(t)
    }

    fn search(&self, t: f64) -> Option<usize> {
        self.timeline.partition_point(|term| term.start <= t).checked_sub(1)
    }

    /// Indices of terms whose `[start, end)` contains `t`.
    fn active_terms(&self, started: Option<usize>, t: f64) -> Vec<usize> {
        let Some(last) = started else {
            return Vec::new();
        };
        let mut active = Vec::new();
        for index in (0..=last).rev() {
            if self.max_end[index] <= t {
                break;
            }
            if t < self.timeline[index].end {
                active.push(index);
            }
        }
        active
    }

    fn line_range(&self, terms: &[usize]) -> Option<RangeInclusive<usize>> {
        let mut lines: Vec<usize> = terms.iter().map(|&i| self.timeline[i].line).collect();
        lines.sort_unstable();
        lines.dedup();

        let first = *lines.first()?;
        let mut last = first;
        for &line in &lines[1..] {
            if line != last + 1 {
                break;
            }
            last = line;
        }
        Some(first..=last)
    }

    /// Range active just before the most recent end among terms up to
    /// `started`, for times at which none of them is active.
    fn held_range(&self, started: usize) -> Option<RangeInclusive<usize>> {
        let last_end = self.max_end[started];
        let mut ending = Vec::new();
        for index in (0..=started).rev() {
            if self.max_end[index] < last_end {
                break;
            }
            let term = self.timeline[index];
            if term.end == last_end && term.start < last_end {
                ending.push(index);
            }
        }
        if ending.is_empty() {
            // Only zero-length terms have ended; they were never active.
            let line = self.timeline[started].line;
            Some(line..=line)
        } else {
            self.line_range(&ending)
        }
    }

    fn next_delay(&self, started: Option<usize>, active: &[usize], t: f64) -> Duration {
        let next_start = started
            .map_or(Some(0), |i| Some(i + 1))
            .and_then(|i| self.timeline.get(i))
            .map(|term| term.start - t);
        let earliest_end = active
            .iter()
            .map(|&i| self.timeline[i].end - t)
            .min_by(f64::total_cmp);

        let until = match (next_start, earliest_end) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => return self.cap,
        };

        let nanos = (until.max(0.0) * 1_000_000.0).round().min(u64::MAX as f64) as u64;
        Duration::from_nanos(nanos).clamp(MIN_POLL, self.cap)
    }
}
