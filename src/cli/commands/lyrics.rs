//! Lyric file commands.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::runtime::Runtime;

use crate::config::LyricsConfig;
use crate::lyrics::{LyricsDocument, ScrollCommand, ScrollFollower, SyncEvent, SyncSession};
use crate::sources::ElapsedClock;

// Terminal stand-in for a lyric view: 12 rows of 20px text.
const VIEWPORT_PX: f32 = 240.0;
const LINE_HEIGHT_PX: f32 = 20.0;
const LINE_SPACING_PX: f32 = 25.0;

fn read_document(path: &Path) -> anyhow::Result<LyricsDocument> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    LyricsDocument::from_json(&json).with_context(|| format!("Invalid lyrics in {}", path.display()))
}

/// Latest end time in the document, in milliseconds.
fn last_end_ms(document: &LyricsDocument) -> Option<f64> {
    document
        .terms()
        .filter_map(|(_, term)| term.end())
        .fold(None, |acc: Option<f64>, end| Some(acc.map_or(end, |a| a.max(end))))
}

fn format_ms(ms: f64) -> String {
    let total = (ms.max(0.0) / 1000.0) as u64;
    format!("{:02}:{:02}.{:03}", total / 60, total % 60, (ms.max(0.0) as u64) % 1000)
}

fn describe_scroll(cmd: &ScrollCommand) -> String {
    let how = if cmd.animate { "animate" } else { "jump" };
    format!("       -> {} to line {} offset {}px", how, cmd.line, cmd.offset)
}

/// Print a lyric file's lines and timing
pub fn cmd_lyrics_show(path: &Path) -> anyhow::Result<()> {
    let document = read_document(path)?;

    println!("Lyrics: {}", document.id());
    if let Some(source) = document.source() {
        println!("Source: {} ({:#010X})", source.display_name(), source.color());
    }
    println!("Sync:   {}", document.sync_type().label());
    println!(
        "Lines:  {}  Terms: {}  Subterms: {}",
        document.line_count(),
        document.term_count(),
        document.subterm_count()
    );
    println!();

    for (index, line) in document.lines().iter().enumerate() {
        let text = document.line_text(index).unwrap_or_default();
        match line.first().and_then(|term| term.start()) {
            Some(start) => println!("{:>4} [{}] {}", index, format_ms(start), text),
            None => println!("{:>4}            {}", index, text),
        }
    }
    Ok(())
}

/// Replay a lyric file against a wall clock, printing each active range
/// and the scroll command it produces.
pub fn cmd_lyrics_follow(
    rt: &Runtime,
    path: &Path,
    offset_ms: i64,
    start_ms: i64,
    duration_secs: Option<u64>,
    config: &LyricsConfig,
) -> anyhow::Result<()> {
    let document = Arc::new(read_document(path)?);

    let run_for = match duration_secs {
        Some(secs) => Duration::from_secs(secs),
        None => {
            let end = last_end_ms(&document).unwrap_or(0.0);
            let remaining = (end - start_ms.saturating_add(offset_ms) as f64).max(0.0);
            Duration::from_millis(remaining as u64 + 500)
        }
    };

    let mut follower = ScrollFollower::new(
        config.follow_config(VIEWPORT_PX, LINE_HEIGHT_PX, LINE_SPACING_PX),
        config.autoscroll,
    );

    rt.block_on(async {
        let clock = Arc::new(ElapsedClock::starting_at(start_ms));
        let (mut session, mut events) = SyncSession::new(clock, config.poll_cap());
        session.set_offset_ms(offset_ms);

        println!("{}", describe_scroll(&follower.initial()));

        session.attach(Arc::clone(&document)).await?;

        let deadline = tokio::time::sleep(run_for);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => break,
                event = events.recv() => {
                    let Some(event) = event else { break };
                    match event {
                        SyncEvent::Unsynced { .. } => {
                            println!("Lyrics are not synced; nothing to follow.");
                            break;
                        }
                        SyncEvent::RangeChanged { position_ms, range, .. } => {
                            match &range {
                                Some(lines) => {
                                    for line in lines.clone() {
                                        let text = document.line_text(line).unwrap_or_default();
                                        println!("[{}] {:>4} {}", format_ms(position_ms as f64), line, text);
                                    }
                                }
                                None => println!("[{}]      ...", format_ms(position_ms as f64)),
                            }
                            if let Some(cmd) = follower.on_range(range.as_ref()) {
                                println!("{}", describe_scroll(&cmd));
                            }
                        }
                    }
                }
            }
        }

        session.detach().await?;
        Ok::<(), anyhow::Error>(())
    })
}
