//! Override registry commands.

use anyhow::Context;

use crate::registry::{OverrideField, OverrideValue, Registry};

/// List customized songs and their overrides
pub fn cmd_overrides_list(registry: &Registry) -> anyhow::Result<()> {
    let customized = registry.customized();
    if customized.is_empty() {
        println!("No overrides set.");
        return Ok(());
    }

    for (id, overrides) in &customized {
        println!("{}", id);
        for field in OverrideField::ALL {
            if let Some(value) = field.get(overrides) {
                println!("  {:<22} {}", field.name(), value);
            }
        }
    }
    println!("\n{} customized song(s)", customized.len());
    Ok(())
}

/// Set one or more overrides for a song
pub fn cmd_overrides_set(
    registry: &Registry,
    id: &str,
    title: Option<&str>,
    accent_color: Option<&str>,
    lyrics_id: Option<&str>,
    sync_offset: Option<i64>,
) -> anyhow::Result<()> {
    let mut updates: Vec<(OverrideField, OverrideValue)> = Vec::new();
    if let Some(title) = title {
        updates.push((OverrideField::Title, OverrideValue::Text(title.to_string())));
    }
    if let Some(color) = accent_color {
        updates.push((
            OverrideField::AccentColor,
            OverrideValue::parse(OverrideField::AccentColor, color)?,
        ));
    }
    if let Some(reference) = lyrics_id {
        crate::lyrics::LyricsReference::parse(reference)
            .with_context(|| format!("Invalid lyrics id {:?}", reference))?;
        updates.push((
            OverrideField::LyricsSourceId,
            OverrideValue::Text(reference.to_string()),
        ));
    }
    if let Some(offset) = sync_offset {
        updates.push((OverrideField::LyricsSyncOffset, OverrideValue::Millis(offset)));
    }

    if updates.is_empty() {
        anyhow::bail!("Nothing to set; pass at least one of --title, --accent-color, --lyrics-id, --sync-offset");
    }

    let store = registry.get_or_create(id);
    for (field, value) in updates {
        let rendered = value.to_string();
        if store.set(field, Some(value))? {
            println!("SET: {} {} = {}", id, field, rendered);
        } else {
            println!("UNCHANGED: {} {}", id, field);
        }
    }
    Ok(())
}

/// Clear one field, or every field, of a song's overrides
pub fn cmd_overrides_clear(registry: &Registry, id: &str, field: Option<&str>) -> anyhow::Result<()> {
    let fields = match field {
        Some(name) => vec![
            OverrideField::from_name(name).with_context(|| format!("Unknown field {:?}", name))?,
        ],
        None => OverrideField::ALL.to_vec(),
    };

    let Some(store) = registry.get(id) else {
        println!("No overrides for {}", id);
        return Ok(());
    };

    let mut cleared = 0;
    for field in fields {
        if store.set(field, None)? {
            println!("CLEARED: {} {}", id, field);
            cleared += 1;
        }
    }
    if cleared == 0 {
        println!("Nothing to clear for {}", id);
    }
    Ok(())
}
