//! # Playlist Generation
//!
//! [`generate`] runs one full cycle:
//!
//! ```text
//! period → history seeds → candidate pool (exclusions, ratings, similarity)
//!        → version resolution → diversity balancing → sequencing → naming
//! ```
//!
//! It reads from the [`MediaLibrary`] and nothing else; publishing the result is
//! the caller's job. Given the same library contents, configuration, `now` and
//! naming seed, the output is identical.

use chrono::NaiveDateTime;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::config::Config;
use crate::diversity::balance;
use crate::error::GenerateError;
use crate::exclusion::ExclusionFilter;
use crate::history::HistoryCollector;
use crate::library::MediaLibrary;
use crate::mood::{MoodMap, MoodNamer};
use crate::pool::CandidatePool;
use crate::resolver::resolve_versions;
use crate::sequencer::{default_distance, Sequencer};
use crate::track::{Track, TrackId};

/// Per-run inputs that are not configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions<'a> {
    /// Fixes descriptor selection. Entropy-seeded when `None`.
    pub seed: Option<u64>,
    /// Descriptor used by the previous run, avoided when possible.
    pub previous_descriptor: Option<&'a str>,
}

/// One generated playlist, ready for publishing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Playlist {
    pub period: String,
    pub title: String,
    pub description: String,
    pub descriptor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    pub generated_at: NaiveDateTime,
    pub next_update: NaiveDateTime,
    pub tracks: Vec<Track>,
}

impl Playlist {
    #[must_use]
    pub fn track_ids(&self) -> Vec<TrackId> {
        self.tracks.iter().map(|t| t.id).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// Build the playlist for the period containing `now`.
///
/// # Errors
///
/// - [`GenerateError::InsufficientHistory`] when nothing was played in this
///   period inside the lookback window.
/// - [`GenerateError::InsufficientAfterFiltering`] when every candidate was
///   filtered out.
/// - [`GenerateError::Library`] when the play history cannot be fetched or the
///   configuration is unusable.
pub fn generate(
    now: NaiveDateTime,
    config: &Config,
    moods: &MoodMap,
    library: &dyn MediaLibrary,
    options: &RunOptions<'_>,
) -> Result<Playlist, GenerateError> {
    config.validate()?;
    let periods = config.period_table()?;
    let period = periods.classify(now).clone();
    info!("Generating for '{}' at {}", period.name, now.format("%Y-%m-%d %H:%M"));

    let playlist = &config.playlist;
    let collector = HistoryCollector::new(
        playlist.history_lookback_days,
        playlist.exclude_played_days,
        playlist.recency_half_life_days,
    );
    let events = library
        .fetch_play_history(&config.library.section, collector.fetch_since(now))
        .map_err(|e| e.context("Failed to fetch play history"))?;

    let seeds = collector.collect(&events, &period, &periods, now);
    if seeds.is_empty() {
        return Err(GenerateError::InsufficientHistory {
            period: period.name,
        });
    }

    let filter = ExclusionFilter::new(config.exclusion_rules()?, now.date());
    let pool = CandidatePool::build(
        &seeds,
        library,
        &filter,
        collector.recency_cutoff(now),
        &config.pool_options(),
    );

    let resolved = resolve_versions(pool.into_candidates());
    let selected = balance(resolved, &config.diversity_options());
    if selected.is_empty() {
        return Err(GenerateError::InsufficientAfterFiltering {
            period: period.name,
            seeds: seeds.seeds.len(),
        });
    }

    let distance = default_distance(playlist.same_artist_penalty);
    let sequencer = Sequencer::new(&distance, playlist.max_refine_passes);
    let tracks: Vec<Track> = sequencer
        .sequence(selected)
        .into_iter()
        .map(|c| c.track)
        .collect();

    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let next_update = periods.next_boundary(now);
    let namer = MoodNamer::new(
        moods,
        config.naming.title_prefix.clone(),
        config.naming.listener.clone(),
    );
    let naming = namer.name(
        &tracks,
        &period,
        now,
        next_update,
        options.previous_descriptor,
        &mut rng,
    );

    info!("Generated '{}' with {} tracks", naming.title, tracks.len());
    Ok(Playlist {
        period: period.name,
        title: naming.title,
        description: naming.description,
        descriptor: naming.descriptor,
        cover: period.cover,
        generated_at: now,
        next_update,
        tracks,
    })
}
