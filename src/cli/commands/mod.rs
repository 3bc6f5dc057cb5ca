//! CLI command definitions and dispatch.
//!
//! Each command group lives in its own submodule:
//! - `overrides`: list, set and clear per-song overrides
//! - `lyrics`: inspect a lyric file and follow it in real time
//!
//! `config` is small enough to be handled inline.

mod lyrics;
mod overrides;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{self, Config};
use crate::error::ResultExt;
use crate::prefs::{JsonFilePrefs, PreferenceStore};
use crate::registry::Registry;

pub use lyrics::{cmd_lyrics_follow, cmd_lyrics_show};
pub use overrides::{cmd_overrides_clear, cmd_overrides_list, cmd_overrides_set};

/// song-overlay CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: OS config dir)
    #[arg(long, global = true, env = "SONG_OVERLAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Preference file holding the override registry
    #[arg(long, global = true, env = "SONG_OVERLAY_PREFS")]
    pub prefs: Option<PathBuf>,

    /// Start over with an empty registry if the stored one cannot be parsed
    #[arg(long, global = true)]
    pub reset_corrupt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Inspect or edit per-song overrides
    Overrides {
        #[command(subcommand)]
        command: OverridesCommand,
    },
    /// Inspect or follow a lyric file
    Lyrics {
        #[command(subcommand)]
        command: LyricsCommand,
    },
    /// Show or initialize the config file
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,
    /// Write the effective configuration to the config file
    Init,
}

#[derive(Subcommand)]
pub enum OverridesCommand {
    /// List customized songs
    List,
    /// Set overrides for a song
    Set {
        /// Song id
        id: String,
        #[arg(long)]
        title: Option<String>,
        /// #RRGGBB, #AARRGGBB or a decimal ARGB value
        #[arg(long)]
        accent_color: Option<String>,
        /// Lyrics reference, e.g. ptl:81234
        #[arg(long)]
        lyrics_id: Option<String>,
        /// Lyric sync offset in milliseconds
        #[arg(long, allow_hyphen_values = true)]
        sync_offset: Option<i64>,
    },
    /// Clear overrides for a song
    Clear {
        /// Song id
        id: String,
        /// Field to clear (title, accent_color, lyrics_source_id,
        /// lyrics_sync_offset_ms); all fields when omitted
        field: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum LyricsCommand {
    /// Print a lyric file's lines and timing
    Show {
        /// JSON lyric file
        path: PathBuf,
    },
    /// Replay a lyric file against a wall clock, printing active lines
    Follow {
        /// JSON lyric file
        path: PathBuf,
        /// Sync offset in milliseconds (default: config value)
        #[arg(long, allow_hyphen_values = true)]
        offset: Option<i64>,
        /// Playback position to start from
        #[arg(long, default_value = "0")]
        start_ms: i64,
        /// Stop after this many seconds (default: end of lyrics)
        #[arg(long)]
        duration_secs: Option<u64>,
    },
}

/// Run the parsed CLI command.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => config::load_from(path),
        None => config::load(),
    };

    match &cli.command {
        Commands::Overrides { command } => {
            let registry = open_registry(cli, &config)?;
            match command {
                OverridesCommand::List => cmd_overrides_list(&registry),
                OverridesCommand::Set {
                    id,
                    title,
                    accent_color,
                    lyrics_id,
                    sync_offset,
                } => cmd_overrides_set(
                    &registry,
                    id,
                    title.as_deref(),
                    accent_color.as_deref(),
                    lyrics_id.as_deref(),
                    *sync_offset,
                ),
                OverridesCommand::Clear { id, field } => {
                    cmd_overrides_clear(&registry, id, field.as_deref())
                }
            }?;
            registry.shutdown()?;
            Ok(())
        }
        Commands::Lyrics { command } => match command {
            LyricsCommand::Show { path } => cmd_lyrics_show(path),
            LyricsCommand::Follow {
                path,
                offset,
                start_ms,
                duration_secs,
            } => {
                let rt = tokio::runtime::Runtime::new()?;
                cmd_lyrics_follow(
                    &rt,
                    path,
                    offset.unwrap_or(config.lyrics.default_sync_offset_ms),
                    *start_ms,
                    *duration_secs,
                    &config.lyrics,
                )
            }
        },
        Commands::Config { command } => match command {
            ConfigCommand::Show => {
                let path = cli.config.clone().or_else(config::config_path);
                if let Some(path) = path {
                    println!("# {}", path.display());
                }
                println!("{}", toml::to_string_pretty(&config)?);
                Ok(())
            }
            ConfigCommand::Init => {
                match &cli.config {
                    Some(path) => config::save_to(&config, path)?,
                    None => config::save(&config)?,
                }
                println!("Config written.");
                Ok(())
            }
        },
    }
}

/// Open the registry from the preference file named on the command line,
/// in the config, or in the default location.
fn open_registry(cli: &Cli, config: &Config) -> anyhow::Result<Registry> {
    let path = cli
        .prefs
        .clone()
        .or_else(|| config.storage.prefs_path())
        .ok_or_else(|| anyhow::anyhow!("Could not determine preference file location"))?;

    let prefs: Arc<dyn PreferenceStore> = Arc::new(
        JsonFilePrefs::open(&path).with_context(format!("opening {}", path.display()))?,
    );
    tracing::debug!(target: "cli", path = %path.display(), "Opened preferences");

    match Registry::load(Arc::clone(&prefs)).with_context("loading overrides") {
        Ok(registry) => Ok(registry),
        Err(e) if e.is_corrupt_registry() && cli.reset_corrupt => {
            Ok(Registry::load_or_reset(prefs)?)
        }
        Err(e) if e.is_corrupt_registry() => {
            Err(anyhow::Error::new(e).context("Pass --reset-corrupt to discard the stored overrides"))
        }
        Err(e) => Err(e.into()),
    }
}
