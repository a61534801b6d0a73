//! Time-of-day playlists built from your own listening history.
//!
//! Core modules, in pipeline order:
//! - [`period`] - Named periods of the day
//! - [`history`] - Play history to ranked seeds
//! - [`exclusion`] - Label and seasonal exclusion rules
//! - [`pool`] - Candidate pool with similarity expansion
//! - [`resolver`] - One recording per logical song
//! - [`diversity`] - Artist and genre caps
//! - [`sequencer`] - Anchored nearest-neighbour ordering with swap refinement
//! - [`mood`] - Title and description
//! - [`generator`] - The whole cycle
//!
//! ### Supporting Modules
//!
//! - [`track`] - Track model and title normalization
//! - [`library`] - Media library access (SQLite and in-memory snapshots)
//! - [`config`] - TOML configuration and data directories
//! - [`output`] - Atomic JSON publishing and run state
//! - [`error`] - Generation errors
//! - [`cli`] / [`completion`] - Command line
//!
//! ## Quick Start Example
//!
//! ```
//! use chrono::NaiveDate;
//! use daylist::config::Config;
//! use daylist::generator::{generate, RunOptions};
//! use daylist::library::MemoryLibrary;
//! use daylist::mood::MoodMap;
//! use daylist::track::{Track, TrackId};
//!
//! let day = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
//! let mut library = MemoryLibrary::new();
//! for id in 1..=3 {
//!     library.add_track(Track::new(TrackId(id), format!("Song {id}"), format!("Artist {id}")));
//!     library.add_play(TrackId(id), day.and_hms_opt(9, 10 * id as u32, 0).unwrap());
//! }
//!
//! let now = NaiveDate::from_ymd_opt(2024, 5, 20).unwrap().and_hms_opt(10, 0, 0).unwrap();
//! let options = RunOptions { seed: Some(1), previous_descriptor: None };
//! let playlist = generate(now, &Config::default(), &MoodMap::default(), &library, &options)?;
//!
//! assert_eq!(playlist.period, "Morning");
//! assert_eq!(playlist.len(), 3);
//! # Ok::<(), daylist::error::GenerateError>(())
//! ```
//!
//! ## How a run works
//!
//! The current time picks a period. Plays from that period in the lookback
//! window become seeds, weighted by frequency and recency; anything played in
//! the last few days is held back. Seeds and their sonic neighbours form the
//! candidate pool after exclusion rules and rating floors. Duplicate
//! recordings collapse to the best version, caps keep one artist from
//! dominating, and the sequencer orders the result from the oldest to the
//! most recent favourite.

pub mod cli;
pub mod completion;
pub mod config;
pub mod diversity;
pub mod error;
pub mod exclusion;
pub mod generator;
pub mod history;
pub mod library;
pub mod mood;
pub mod output;
pub mod period;
pub mod pool;
pub mod resolver;
pub mod sequencer;
pub mod track;
