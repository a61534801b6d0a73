//! # Diversity Balancing
//!
//! Picks up to `N` candidates in descending weight order while keeping any one
//! artist (and optionally any one primary genre) under a share of `N`. Capped
//! candidates are skipped, not discarded: when the capped scan cannot fill the
//! list, skipped candidates fill the remaining slots in weight order. Size wins
//! over diversity when the pool is scarce.

use log::debug;
use std::collections::HashMap;

use crate::pool::Candidate;
use crate::resolver::sort_by_weight;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiversityOptions {
    /// Target list size.
    pub max_tracks: usize,
    /// Max fraction of `max_tracks` one artist may fill.
    pub artist_cap: f64,
    /// Max fraction of `max_tracks` one primary genre may fill.
    pub genre_cap: Option<f64>,
}

impl DiversityOptions {
    /// Slots available per artist; never below one.
    #[must_use]
    pub fn artist_limit(&self) -> usize {
        cap_to_count(self.artist_cap, self.max_tracks)
    }

    #[must_use]
    pub fn genre_limit(&self) -> Option<usize> {
        self.genre_cap.map(|cap| cap_to_count(cap, self.max_tracks))
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn cap_to_count(cap: f64, n: usize) -> usize {
    ((cap * n as f64).floor() as usize).max(1)
}

/// Select the final set. Output keeps weight order.
#[must_use]
pub fn balance(mut candidates: Vec<Candidate>, options: &DiversityOptions) -> Vec<Candidate> {
    sort_by_weight(&mut candidates);
    let target = options.max_tracks;
    let artist_limit = options.artist_limit();
    let genre_limit = options.genre_limit();

    let mut per_artist: HashMap<String, usize> = HashMap::new();
    let mut per_genre: HashMap<String, usize> = HashMap::new();
    let mut selected = Vec::with_capacity(target.min(candidates.len()));
    let mut skipped = Vec::new();

    for candidate in candidates {
        if selected.len() >= target {
            break;
        }
        let artist = candidate.track.artist_key();
        let genre = candidate.track.primary_genre().map(str::to_lowercase);

        let artist_full = per_artist.get(&artist).copied().unwrap_or(0) >= artist_limit;
        let genre_full = match (&genre, genre_limit) {
            (Some(g), Some(limit)) => per_genre.get(g).copied().unwrap_or(0) >= limit,
            _ => false,
        };

        if artist_full || genre_full {
            skipped.push(candidate);
            continue;
        }

        *per_artist.entry(artist).or_insert(0) += 1;
        if let Some(g) = genre {
            *per_genre.entry(g).or_insert(0) += 1;
        }
        selected.push(candidate);
    }

    let relaxed = target.saturating_sub(selected.len()).min(skipped.len());
    if relaxed > 0 {
        debug!("Diversity: pool too small for caps, relaxing {relaxed} slot(s)");
        selected.extend(skipped.into_iter().take(relaxed));
        sort_by_weight(&mut selected);
    }

    debug!(
        "Diversity: selected {} of target {target} (artist limit {artist_limit}, genre limit {})",
        selected.len(),
        genre_limit.map_or_else(|| "none".to_string(), |g| g.to_string())
    );
    selected
}
