//! Override fields and their accessor table.
//!
//! Every overridable field has a tag ([`OverrideField`]) and an entry in a
//! static table of getter/setter function pointers. Generic code (the store's
//! change detection, observers, the CLI) goes through the tag; typed code
//! uses the struct fields directly.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::RegistryError;

/// The sparse override record for one song.
///
/// `None` means "no override, use the canonical value".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SongOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Packed ARGB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accent_color: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lyrics_source_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lyrics_sync_offset_ms: Option<i64>,
}

impl SongOverrides {
    /// True when no field is overridden.
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Tag naming one overridable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OverrideField {
    Title,
    AccentColor,
    LyricsSourceId,
    LyricsSyncOffset,
}

/// Shape of the value a field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Color,
    Millis,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueKind::Text => "text",
            ValueKind::Color => "color",
            ValueKind::Millis => "milliseconds",
        })
    }
}

/// A field value, tagged with its shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideValue {
    Text(String),
    Color(u32),
    Millis(i64),
}

impl OverrideValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            OverrideValue::Text(_) => ValueKind::Text,
            OverrideValue::Color(_) => ValueKind::Color,
            OverrideValue::Millis(_) => ValueKind::Millis,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            OverrideValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<u32> {
        match self {
            OverrideValue::Color(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_millis(&self) -> Option<i64> {
        match self {
            OverrideValue::Millis(ms) => Some(*ms),
            _ => None,
        }
    }

    /// Parse user input for `field`.
    ///
    /// Colors accept `#RRGGBB` (opaque), `#AARRGGBB`, or a decimal ARGB value.
    pub fn parse(field: OverrideField, input: &str) -> Result<Self, RegistryError> {
        let invalid = |reason: &str| RegistryError::InvalidValue {
            field,
            value: input.to_string(),
            reason: reason.to_string(),
        };
        let trimmed = input.trim();

        match field.kind() {
            ValueKind::Text => Ok(OverrideValue::Text(input.to_string())),
            ValueKind::Color => {
                if let Some(hex) = trimmed.strip_prefix('#') {
                    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                        return Err(invalid("not hex"));
                    }
                    let raw = u32::from_str_radix(hex, 16).map_err(|_| invalid("not hex"))?;
                    match hex.len() {
                        6 => Ok(OverrideValue::Color(0xFF00_0000 | raw)),
                        8 => Ok(OverrideValue::Color(raw)),
                        _ => Err(invalid("expected #RRGGBB or #AARRGGBB")),
                    }
                } else {
                    trimmed
                        .parse::<u32>()
                        .map(OverrideValue::Color)
                        .map_err(|_| invalid("expected a hex color or ARGB integer"))
                }
            }
            ValueKind::Millis => trimmed
                .parse::<i64>()
                .map(OverrideValue::Millis)
                .map_err(|_| invalid("expected an integer number of milliseconds")),
        }
    }
}

impl fmt::Display for OverrideValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverrideValue::Text(s) => write!(f, "{s:?}"),
            OverrideValue::Color(c) => write!(f, "#{c:08X}"),
            OverrideValue::Millis(ms) => write!(f, "{ms}ms"),
        }
    }
}

struct FieldAccessor {
    kind: ValueKind,
    get: fn(&SongOverrides) -> Option<OverrideValue>,
    /// Returns false if the value has the wrong shape; the record is then untouched.
    set: fn(&mut SongOverrides, Option<OverrideValue>) -> bool,
}

// Indexed by `OverrideField as usize`.
static ACCESSORS: [FieldAccessor; OverrideField::COUNT] = [
    FieldAccessor {
        kind: ValueKind::Text,
        get: |o| o.title.clone().map(OverrideValue::Text),
        set: |o, v| match v {
            None => {
                o.title = None;
                true
            }
            Some(OverrideValue::Text(s)) => {
                o.title = Some(s);
                true
            }
            Some(_) => false,
        },
    },
    FieldAccessor {
        kind: ValueKind::Color,
        get: |o| o.accent_color.map(OverrideValue::Color),
        set: |o, v| match v {
            None => {
                o.accent_color = None;
                true
            }
            Some(OverrideValue::Color(c)) => {
                o.accent_color = Some(c);
                true
            }
            Some(_) => false,
        },
    },
    FieldAccessor {
        kind: ValueKind::Text,
        get: |o| o.lyrics_source_id.clone().map(OverrideValue::Text),
        set: |o, v| match v {
            None => {
                o.lyrics_source_id = None;
                true
            }
            Some(OverrideValue::Text(s)) => {
                o.lyrics_source_id = Some(s);
                true
            }
            Some(_) => false,
        },
    },
    FieldAccessor {
        kind: ValueKind::Millis,
        get: |o| o.lyrics_sync_offset_ms.map(OverrideValue::Millis),
        set: |o, v| match v {
            None => {
                o.lyrics_sync_offset_ms = None;
                true
            }
            Some(OverrideValue::Millis(ms)) => {
                o.lyrics_sync_offset_ms = Some(ms);
                true
            }
            Some(_) => false,
        },
    },
];

impl OverrideField {
    pub const COUNT: usize = 4;

    pub const ALL: [OverrideField; Self::COUNT] = [
        OverrideField::Title,
        OverrideField::AccentColor,
        OverrideField::LyricsSourceId,
        OverrideField::LyricsSyncOffset,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Name used in the persisted blob and on the command line.
    pub fn name(self) -> &'static str {
        match self {
            OverrideField::Title => "title",
            OverrideField::AccentColor => "accent_color",
            OverrideField::LyricsSourceId => "lyrics_source_id",
            OverrideField::LyricsSyncOffset => "lyrics_sync_offset_ms",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    pub fn kind(self) -> ValueKind {
        ACCESSORS[self.index()].kind
    }

    /// Read this field from a record.
    pub fn get(self, overrides: &SongOverrides) -> Option<OverrideValue> {
        (ACCESSORS[self.index()].get)(overrides)
    }

    /// Write this field on a record.
    pub fn set(
        self,
        overrides: &mut SongOverrides,
        value: Option<OverrideValue>,
    ) -> Result<(), RegistryError> {
        let accessor = &ACCESSORS[self.index()];
        let found = value.as_ref().map(OverrideValue::kind);
        if (accessor.set)(overrides, value) {
            Ok(())
        } else {
            Err(RegistryError::FieldType {
                field: self,
                expected: accessor.kind,
                found: found.unwrap_or(accessor.kind),
            })
        }
    }
}

impl fmt::Display for OverrideField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
