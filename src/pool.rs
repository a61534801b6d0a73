//! # Candidate Pool
//!
//! Two-stage construction:
//!
//! 1. **History**: every seed is resolved to full metadata, then dropped if an
//!    exclusion rule matches or a rating falls below the floor.
//! 2. **Similarity expansion**: the top seeds are asked for acoustically related
//!    tracks. Those pass the same filters, plus the recency check the seeds
//!    already went through.
//!
//! The pool is keyed by track identity only; different recordings of one song
//! are collapsed later by the resolver.
//!
//! ## Weights
//!
//! Seeds keep their history weight. A similarity-expanded track gets
//!
//! ```text
//! seed_weight × similarity_weight × 1 / (1 + distance) × 1 / (1 + rank × rank_penalty)
//! ```
//!
//! where `rank` is the track's zero-based position in the seed's similarity list.

use chrono::NaiveDateTime;
use log::{debug, warn};
use std::collections::{BTreeMap, HashSet};

use crate::exclusion::ExclusionFilter;
use crate::history::SeedSet;
use crate::library::MediaLibrary;
use crate::track::{Track, TrackId};

/// How a track entered the pool.
#[derive(Debug, Clone, PartialEq)]
pub enum Provenance {
    History {
        plays: u32,
        first_played: NaiveDateTime,
        last_played: NaiveDateTime,
    },
    Similar {
        seed: TrackId,
        distance: f64,
        rank: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub track: Track,
    pub weight: f64,
    pub provenance: Provenance,
}

impl Candidate {
    /// Most recent in-period play, for tracks that came from history.
    #[must_use]
    pub fn anchor_time(&self) -> Option<NaiveDateTime> {
        match self.provenance {
            Provenance::History { last_played, .. } => Some(last_played),
            Provenance::Similar { .. } => None,
        }
    }

    #[must_use]
    pub fn is_historical(&self) -> bool {
        matches!(self.provenance, Provenance::History { .. })
    }
}

/// Tunables for pool construction.
#[derive(Debug, Clone, Copy)]
pub struct PoolOptions {
    /// Tracks (or their album/artist) rated below this many stars are dropped.
    /// Unrated entities always pass. Zero disables the floor.
    pub min_rating: u8,
    /// How many of the top seeds are expanded.
    pub similarity_seeds: usize,
    pub sonic_similar_limit: usize,
    pub similarity_weight: f64,
    pub rank_penalty: f64,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            min_rating: 3,
            similarity_seeds: 10,
            sonic_similar_limit: 10,
            similarity_weight: 0.5,
            rank_penalty: 0.1,
        }
    }
}

/// Candidates keyed by track identity.
#[derive(Debug, Clone, Default)]
pub struct CandidatePool {
    candidates: BTreeMap<TrackId, Candidate>,
}

impl CandidatePool {
    /// Build the pool for one run.
    ///
    /// Metadata and similarity lookups that fail are logged and skipped; a
    /// single unreachable track never sinks the run.
    pub fn build(
        seeds: &SeedSet,
        library: &dyn MediaLibrary,
        filter: &ExclusionFilter,
        recency_cutoff: NaiveDateTime,
        options: &PoolOptions,
    ) -> Self {
        let mut pool = Self::default();

        for seed in &seeds.seeds {
            let track = match library.track_metadata(seed.track) {
                Ok(track) => track,
                Err(e) => {
                    warn!("Skipping seed {}: {e:#}", seed.track);
                    continue;
                }
            };
            if filter.is_excluded(&track) || !passes_rating_floor(&track, options.min_rating) {
                continue;
            }
            pool.candidates.insert(
                seed.track,
                Candidate {
                    track,
                    weight: seed.weight,
                    provenance: Provenance::History {
                        plays: seed.plays,
                        first_played: seed.first_played,
                        last_played: seed.last_played,
                    },
                },
            );
        }
        let from_history = pool.len();

        // Expand only seeds that survived filtering, in weight order.
        let expandable: Vec<(TrackId, f64)> = seeds
            .seeds
            .iter()
            .filter(|s| pool.candidates.contains_key(&s.track))
            .take(options.similarity_seeds)
            .map(|s| (s.track, s.weight))
            .collect();

        for (seed_id, seed_weight) in expandable {
            let similar = match library.fetch_similar(seed_id, options.sonic_similar_limit) {
                Ok(similar) => similar,
                Err(e) => {
                    warn!("Similarity lookup failed for {seed_id}: {e:#}");
                    continue;
                }
            };

            for (rank, (track, distance)) in similar.into_iter().enumerate() {
                if !pool.admits_similar(&track, &seeds.recently_played, recency_cutoff, filter, options) {
                    continue;
                }
                let weight = similarity_weight(seed_weight, distance, rank, options);
                pool.offer_similar(Candidate {
                    track,
                    weight,
                    provenance: Provenance::Similar {
                        seed: seed_id,
                        distance: distance.max(0.0),
                        rank,
                    },
                });
            }
        }

        debug!(
            "Pool: {} seeds -> {} from history, {} after similarity expansion",
            seeds.seeds.len(),
            from_history,
            pool.len()
        );
        pool
    }

    fn admits_similar(
        &self,
        track: &Track,
        recently_played: &HashSet<TrackId>,
        recency_cutoff: NaiveDateTime,
        filter: &ExclusionFilter,
        options: &PoolOptions,
    ) -> bool {
        if recently_played.contains(&track.id) {
            return false;
        }
        if track.last_played.is_some_and(|t| t >= recency_cutoff) {
            return false;
        }
        !filter.is_excluded(track) && passes_rating_floor(track, options.min_rating)
    }

    /// History entries are never displaced; between two similarity offers for the
    /// same track the heavier one wins.
    fn offer_similar(&mut self, candidate: Candidate) {
        match self.candidates.get(&candidate.track.id) {
            Some(existing) if existing.is_historical() || existing.weight >= candidate.weight => {}
            _ => {
                self.candidates.insert(candidate.track.id, candidate);
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: TrackId) -> Option<&Candidate> {
        self.candidates.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.values()
    }

    #[must_use]
    pub fn into_candidates(self) -> Vec<Candidate> {
        self.candidates.into_values().collect()
    }
}

impl FromIterator<Candidate> for CandidatePool {
    fn from_iter<I: IntoIterator<Item = Candidate>>(iter: I) -> Self {
        Self {
            candidates: iter.into_iter().map(|c| (c.track.id, c)).collect(),
        }
    }
}

/// Every rated entity (track, album, artist) must reach `min_rating` stars.
#[must_use]
pub fn passes_rating_floor(track: &Track, min_rating: u8) -> bool {
    [track.rating, track.album_rating, track.artist_rating]
        .into_iter()
        .flatten()
        .all(|stars| stars >= min_rating)
}

#[allow(clippy::cast_precision_loss)]
fn similarity_weight(seed_weight: f64, distance: f64, rank: usize, options: &PoolOptions) -> f64 {
    let distance = if distance.is_finite() { distance.max(0.0) } else { f64::MAX };
    seed_weight * options.similarity_weight / (1.0 + distance)
        / (1.0 + rank as f64 * options.rank_penalty)
}
