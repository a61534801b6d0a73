//! # Command-Line Interface Module
//!
//! Clap derive definitions for the `daylist` binary.
//!
//! ## Commands
//!
//! - `generate`: Build the playlist for the current period and publish it as JSON
//! - `period`: Show which period a moment falls in and when it ends
//! - `init-config`: Write the default configuration file
//! - `completion`: Print a shell completion script
//!
//! ## Examples
//!
//! ```bash
//! daylist generate --library ~/plex-snapshot.db --output ~/daylist.json
//! daylist generate --now "2024-12-10 08:30" --seed 7 --dry-run
//! daylist period
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Main application arguments structure.
#[derive(Parser, Debug)]
#[command(name = "daylist")]
#[command(about = "Daylist: a playlist that follows the time of day")]
#[command(version)]
pub struct Args {
    /// Configuration file
    ///
    /// Defaults to `daylist/config.toml` in the platform configuration
    /// directory. A missing file means built-in defaults.
    #[arg(long, global = true, env = "DAYLIST_CONFIG", value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate the playlist for the current period
    ///
    /// Reads listening history from the library snapshot, selects, orders and
    /// names the tracks, then writes the playlist as JSON. When generation
    /// fails the previous output file is left untouched.
    Generate {
        /// Library snapshot (SQLite, or `.json` for an in-memory snapshot)
        ///
        /// Overrides `library.snapshot` from the configuration.
        #[arg(long, value_hint = clap::ValueHint::FilePath)]
        library: Option<PathBuf>,

        /// Pretend it is this local time ("YYYY-MM-DD HH:MM")
        #[arg(long)]
        now: Option<String>,

        /// Seed for descriptor selection, for repeatable titles
        #[arg(long)]
        seed: Option<u64>,

        /// Write the playlist JSON here instead of stdout
        #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
        output: Option<PathBuf>,

        /// Print a summary only; write nothing and keep the run state as is
        #[arg(long)]
        dry_run: bool,

        /// List every selected track
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show the period for a moment (default: now)
    Period {
        /// Local time ("YYYY-MM-DD HH:MM")
        #[arg(long)]
        now: Option<String>,
    },

    /// Write the default configuration file
    ///
    /// Refuses to overwrite an existing file unless `--force` is given.
    InitConfig {
        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Generate shell completions
    ///
    /// Usage: daylist completion bash > ~/.local/share/bash-completion/completions/daylist
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}
