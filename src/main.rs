//! # Daylist
//!
//! Regenerates a single time-of-day playlist from listening history.
//!
//! ## Usage
//!
//! ```bash
//! # Write a default configuration, then edit it
//! daylist init-config
//!
//! # Build the playlist for right now
//! daylist generate --library ~/plex-snapshot.db --output ~/daylist.json
//!
//! # Which period is it?
//! daylist period
//! ```

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDateTime};
use clap::{CommandFactory, Parser};
use log::{debug, info};
use std::path::{Path, PathBuf};

use daylist::cli::{self, Command};
use daylist::completion;
use daylist::config::{self, Config};
use daylist::generator::{generate, Playlist, RunOptions};
use daylist::library::{MediaLibrary, MemoryLibrary, SqliteLibrary};
use daylist::output::{self, RunState};

/// Main entry point.
///
/// Logging is controlled via `RUST_LOG`:
/// - `RUST_LOG=debug daylist generate` - stage-by-stage counts
/// - `RUST_LOG=daylist::exclusion=trace daylist generate` - every exclusion decision
fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();
    let config_path = match args.config {
        Some(path) => path,
        None => config::get_config_path()?,
    };

    match args.command {
        Command::Generate {
            library,
            now,
            seed,
            output,
            dry_run,
            verbose,
        } => {
            let config = Config::load(&config_path)?;
            let now = parse_now(now.as_deref())?;
            run_generate(&config, library, now, seed, output.as_deref(), dry_run, verbose)?;
        }
        Command::Period { now } => {
            let config = Config::load(&config_path)?;
            let now = parse_now(now.as_deref())?;
            let periods = config.period_table()?;
            let period = periods.classify(now);
            println!("{} ({})", period.name, period.phrase());
            println!(
                "Next update at {}",
                periods.next_boundary(now).format("%Y-%m-%d %H:%M")
            );
        }
        Command::InitConfig { force } => {
            if config_path.exists() && !force {
                bail!(
                    "{} already exists. Use --force to overwrite it.",
                    config_path.display()
                );
            }
            let toml = Config::default().to_toml()?;
            output::write_atomic(&config_path, toml.as_bytes())?;
            println!("Wrote default configuration to {}", config_path.display());
        }
        Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(completion::shell_to_completion_shell(shell), &mut cmd);
        }
    }

    Ok(())
}

fn run_generate(
    config: &Config,
    library_override: Option<PathBuf>,
    now: NaiveDateTime,
    seed: Option<u64>,
    output_path: Option<&Path>,
    dry_run: bool,
    verbose: bool,
) -> Result<()> {
    let snapshot = match library_override.or_else(|| config.library.snapshot.clone()) {
        Some(path) => config.resolve_path(&path)?,
        None => bail!("No library snapshot given. Pass --library or set library.snapshot."),
    };
    let library = open_library(&snapshot)?;
    let moods = config.mood_map()?;

    let state_path = config::get_data_dir()?.join("state.json");
    let state = RunState::load(&state_path);
    debug!("Previous descriptor: {:?}", state.last_descriptor);

    let options = RunOptions {
        seed,
        previous_descriptor: state.last_descriptor.as_deref(),
    };
    let playlist = generate(now, config, &moods, library.as_ref(), &options)
        .context("Playlist generation failed; previous output left untouched")?;

    if dry_run {
        print!("{}", summary(&playlist, verbose));
        return Ok(());
    }
    if verbose {
        // Stdout may be carrying the playlist JSON.
        eprint!("{}", summary(&playlist, verbose));
    }

    match output_path {
        Some(path) => {
            output::write_playlist(path, &playlist)?;
            info!("Playlist written to {}", path.display());
        }
        None => println!("{}", output::playlist_json(&playlist)?),
    }
    RunState::after(&playlist).save(&state_path)?;
    Ok(())
}

fn open_library(path: &Path) -> Result<Box<dyn MediaLibrary>> {
    if !path.exists() {
        bail!("Library snapshot {} does not exist", path.display());
    }
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        Ok(Box::new(MemoryLibrary::load_json(path)?))
    } else {
        Ok(Box::new(SqliteLibrary::open(path)?))
    }
}

fn parse_now(raw: Option<&str>) -> Result<NaiveDateTime> {
    match raw {
        None => Ok(Local::now().naive_local()),
        Some(s) => NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M")
            .or_else(|_| NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S"))
            .with_context(|| format!("Invalid --now '{s}', expected \"YYYY-MM-DD HH:MM\"")),
    }
}

fn summary(playlist: &Playlist, verbose: bool) -> String {
    let mut text = format!(
        "{}\n\n{}\n\n{} tracks for {}\n",
        playlist.title,
        playlist.description,
        playlist.len(),
        playlist.period
    );
    if verbose {
        for (i, track) in playlist.tracks.iter().enumerate() {
            text.push_str(&format!("{:>3}. {track}\n", i + 1));
        }
    }
    text
}
