//! Display-title cleanup for canonical song titles.
//!
//! Upload titles tend to carry noise: `ARTIST - Song [Official MV] {4K}`.
//! The cleaned title is what the UI shows when the user has not overridden it.

/// Blank filler often used to pad titles.
const HANGUL_FILLER: char = '\u{3164}';

const BRACKETS: [(char, char); 2] = [('[', ']'), ('{', '}')];

/// Tokens dropped when they stand alone.
const NOISE_TOKENS: [&str; 2] = ["-", "MV"];

/// Strip bracketed tags, the artist name and separator noise from a title.
///
/// Falls back to the trimmed input if nothing would be left.
pub fn clean_title(raw: &str, artist: Option<&str>) -> String {
    let mut title = raw.to_string();

    for (open, close) in BRACKETS {
        while let Some(start) = title.find(open) {
            let Some(len) = title[start..].find(close) else {
                break;
            };
            title.replace_range(start..start + len + close.len_utf8(), " ");
        }
    }

    if let Some(artist) = artist.map(str::trim).filter(|a| !a.is_empty()) {
        title = title.replace(artist, " ");
    }

    let cleaned = title
        .split_whitespace()
        .filter(|token| !NOISE_TOKENS.contains(token))
        .collect::<Vec<_>>()
        .join(" ");
    let cleaned = cleaned.trim_matches(|c: char| c.is_whitespace() || c == HANGUL_FILLER);

    if cleaned.is_empty() {
        raw.trim().to_string()
    } else {
        cleaned.to_string()
    }
}
