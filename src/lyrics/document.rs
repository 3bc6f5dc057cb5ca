//! Parsed lyric documents.
//!
//! A document is lines of terms of subterms. A term is the unit that carries
//! timing; a subterm is a run of text with an optional phonetic reading
//! (furigana). Timestamps are milliseconds from the start of the track.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::LyricsError;

/// How finely a document is timed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SyncType {
    #[default]
    None,
    LineSync,
    WordSync,
}

impl SyncType {
    /// From the numeric tag used by lyric providers (0, 1, 2).
    pub fn from_index(index: u8) -> Result<Self, LyricsError> {
        match index {
            0 => Ok(SyncType::None),
            1 => Ok(SyncType::LineSync),
            2 => Ok(SyncType::WordSync),
            other => Err(LyricsError::UnknownSyncType(other)),
        }
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn is_synced(self) -> bool {
        self != SyncType::None
    }

    pub fn label(self) -> &'static str {
        match self {
            SyncType::None => "Not synced",
            SyncType::LineSync => "Line sync",
            SyncType::WordSync => "Word sync",
        }
    }
}

/// Where a lyric document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LyricsSource {
    PetitLyrics,
}

impl LyricsSource {
    pub const ALL: [LyricsSource; 1] = [LyricsSource::PetitLyrics];

    /// Short code used in lyric references and persisted ids.
    pub fn code(self) -> &'static str {
        match self {
            LyricsSource::PetitLyrics => "ptl",
        }
    }

    pub fn from_code(code: &str) -> Result<Self, LyricsError> {
        Self::ALL
            .into_iter()
            .find(|s| s.code() == code)
            .ok_or_else(|| LyricsError::UnknownSource(code.to_string()))
    }

    pub fn display_name(self) -> &'static str {
        match self {
            LyricsSource::PetitLyrics => "PetitLyrics",
        }
    }

    /// Brand color, packed ARGB.
    pub fn color(self) -> u32 {
        match self {
            LyricsSource::PetitLyrics => 0xFFBD_0A0F,
        }
    }
}

impl fmt::Display for LyricsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A pointer to one document at one source, written `code:id` (e.g. `ptl:81234`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LyricsReference {
    pub source: LyricsSource,
    pub id: String,
}

impl LyricsReference {
    pub fn new(source: LyricsSource, id: impl Into<String>) -> Self {
        Self {
            source,
            id: id.into(),
        }
    }

    pub fn parse(reference: &str) -> Result<Self, LyricsError> {
        let (code, id) = reference
            .split_once(':')
            .filter(|(_, id)| !id.is_empty())
            .ok_or_else(|| LyricsError::InvalidReference(reference.to_string()))?;
        Ok(Self::new(LyricsSource::from_code(code)?, id))
    }
}

impl fmt::Display for LyricsReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source.code(), self.id)
    }
}

// ============================================================================
// Raw input
// ============================================================================

/// Unvalidated lyric data as handed over by a lyrics provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLyrics {
    pub id: String,
    /// Source code, see [`LyricsSource::code`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Numeric sync tag, see [`SyncType::from_index`]
    #[serde(default)]
    pub sync: u8,
    pub lines: Vec<Vec<RawTerm>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTerm {
    pub subterms: Vec<RawSubterm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
}

impl RawTerm {
    /// A single-subterm term with timing.
    pub fn timed(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            subterms: vec![RawSubterm::plain(text)],
            start: Some(start),
            end: Some(end),
        }
    }

    /// A single-subterm term without timing.
    pub fn untimed(text: impl Into<String>) -> Self {
        Self {
            subterms: vec![RawSubterm::plain(text)],
            start: None,
            end: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSubterm {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading: Option<String>,
}

impl RawSubterm {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            reading: None,
        }
    }
}

// ============================================================================
// Validated document
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Subterm {
    text: String,
    reading: Option<String>,
    index: usize,
}

impl Subterm {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn reading(&self) -> Option<&str> {
        self.reading.as_deref()
    }

    /// Position among all subterms of the document (0-based, reading order).
    pub fn index(&self) -> usize {
        self.index
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    subterms: Vec<Subterm>,
    start: Option<f64>,
    end: Option<f64>,
}

impl Term {
    pub fn subterms(&self) -> &[Subterm] {
        &self.subterms
    }

    pub fn start(&self) -> Option<f64> {
        self.start
    }

    pub fn end(&self) -> Option<f64> {
        self.end
    }

    /// `(start, end)` when both are known.
    pub fn span(&self) -> Option<(f64, f64)> {
        Some((self.start?, self.end?))
    }

    pub fn text(&self) -> String {
        self.subterms.iter().map(|s| s.text.as_str()).collect()
    }
}

/// An immutable, validated lyric document.
///
/// When `sync_type` is not [`SyncType::None`] every term has a finite
/// `start <= end`.
#[derive(Debug, Clone, PartialEq)]
pub struct LyricsDocument {
    id: String,
    source: Option<LyricsSource>,
    sync_type: SyncType,
    lines: Vec<Vec<Term>>,
    subterm_count: usize,
}

impl LyricsDocument {
    /// Validate and index lyric lines.
    pub fn new(
        id: impl Into<String>,
        source: Option<LyricsSource>,
        sync_type: SyncType,
        lines: Vec<Vec<RawTerm>>,
    ) -> Result<Self, LyricsError> {
        let mut next_index = 0;
        let mut built = Vec::with_capacity(lines.len());

        for (line_no, line) in lines.into_iter().enumerate() {
            let mut terms = Vec::with_capacity(line.len());
            for (term_no, raw) in line.into_iter().enumerate() {
                if sync_type.is_synced() {
                    let (Some(start), Some(end)) = (raw.start, raw.end) else {
                        return Err(LyricsError::MalformedSync {
                            line: line_no,
                            term: term_no,
                        });
                    };
                    if !start.is_finite() || !end.is_finite() || start > end {
                        return Err(LyricsError::InvalidSpan {
                            line: line_no,
                            term: term_no,
                        });
                    }
                }

                let subterms = raw
                    .subterms
                    .into_iter()
                    .map(|s| {
                        let subterm = Subterm {
                            text: s.text,
                            reading: s.reading,
                            index: next_index,
                        };
                        next_index += 1;
                        subterm
                    })
                    .collect();

                terms.push(Term {
                    subterms,
                    start: raw.start,
                    end: raw.end,
                });
            }
            built.push(terms);
        }

        Ok(Self {
            id: id.into(),
            source,
            sync_type,
            lines: built,
            subterm_count: next_index,
        })
    }

    /// Validate provider output.
    pub fn from_raw(raw: RawLyrics) -> Result<Self, LyricsError> {
        let sync_type = SyncType::from_index(raw.sync)?;
        let source = raw.source.as_deref().map(LyricsSource::from_code).transpose()?;
        Self::new(raw.id, source, sync_type, raw.lines)
    }

    /// Parse and validate a JSON-encoded [`RawLyrics`].
    pub fn from_json(json: &str) -> Result<Self, LyricsError> {
        let raw: RawLyrics = serde_json::from_str(json).map_err(LyricsError::Parse)?;
        Self::from_raw(raw)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> Option<LyricsSource> {
        self.source
    }

    pub fn sync_type(&self) -> SyncType {
        self.sync_type
    }

    pub fn is_synced(&self) -> bool {
        self.sync_type.is_synced()
    }

    pub fn lines(&self) -> &[Vec<Term>] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn term_count(&self) -> usize {
        self.lines.iter().map(Vec::len).sum()
    }

    pub fn subterm_count(&self) -> usize {
        self.subterm_count
    }

    /// Plain text of a line, readings dropped.
    pub fn line_text(&self, line: usize) -> Option<String> {
        self.lines
            .get(line)
            .map(|terms| terms.iter().map(Term::text).collect())
    }

    /// Iterate `(line index, term)` in reading order.
    pub fn terms(&self) -> impl Iterator<Item = (usize, &Term)> {
        self.lines
            .iter()
            .enumerate()
            .flat_map(|(i, line)| line.iter().map(move |t| (i, t)))
    }
}
