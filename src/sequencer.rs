//! # Sequencing
//!
//! Orders the final selection so that consecutive tracks sound related. This is
//! a heuristic, not an exact solver:
//!
//! 1. **Anchors.** Among tracks that came from listening history, the one whose
//!    latest in-period play is oldest opens the list and the most recently
//!    played one closes it. Similarity-only tracks are never anchors.
//! 2. **Nearest-neighbour chain.** Starting from the opening track, repeatedly
//!    append the closest unplaced interior track.
//! 3. **Adjacent-swap refinement.** Swap neighbours `(i, i+1)` whenever that
//!    strictly lowers the cost of the three transitions they touch. Anchors never
//!    move. Passes repeat until nothing improves or the pass cap is reached;
//!    the cap matters for distances that are not metrics, where swaps can cycle.
//!
//! The distance function is pluggable through [`TrackDistance`].
//!
//! ## Example
//!
//! ```
//! use daylist::sequencer::{MetadataDistance, Sequencer};
//!
//! let distance = MetadataDistance;
//! let sequencer = Sequencer::new(&distance, 50);
//! assert!(sequencer.sequence(Vec::new()).is_empty());
//! ```

use log::debug;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::pool::Candidate;
use crate::track::Track;

/// Improvements smaller than this are treated as ties and rejected.
const EPS: f64 = 1e-9;

/// Non-negative dissimilarity between two tracks.
pub trait TrackDistance: Sync {
    fn distance(&self, a: &Track, b: &Track) -> f64;
}

/// `1 - Jaccard` over lowercased genre and mood tags. Tracks without tags are
/// maximally distant from everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataDistance;

impl TrackDistance for MetadataDistance {
    #[allow(clippy::cast_precision_loss)]
    fn distance(&self, a: &Track, b: &Track) -> f64 {
        let tags = |t: &Track| -> BTreeSet<String> {
            t.genres
                .iter()
                .chain(t.moods.iter())
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        };
        let (ta, tb) = (tags(a), tags(b));
        let union = ta.union(&tb).count();
        if union == 0 {
            return 1.0;
        }
        let shared = ta.intersection(&tb).count();
        1.0 - shared as f64 / union as f64
    }
}

/// Euclidean distance between feature vectors, or the metadata heuristic when
/// either side lacks a usable vector.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureDistance;

impl TrackDistance for FeatureDistance {
    fn distance(&self, a: &Track, b: &Track) -> f64 {
        match (&a.features, &b.features) {
            (Some(fa), Some(fb)) if fa.len() == fb.len() && !fa.is_empty() => fa
                .iter()
                .zip(fb)
                .map(|(x, y)| f64::from(x - y).powi(2))
                .sum::<f64>()
                .sqrt(),
            _ => MetadataDistance.distance(a, b),
        }
    }
}

/// Adds a flat penalty between two tracks by the same artist.
#[derive(Debug, Clone, Copy)]
pub struct ArtistSeparation<D> {
    pub inner: D,
    pub penalty: f64,
}

impl<D: TrackDistance> TrackDistance for ArtistSeparation<D> {
    fn distance(&self, a: &Track, b: &Track) -> f64 {
        let base = self.inner.distance(a, b);
        if self.penalty > 0.0 && a.artist_key() == b.artist_key() {
            base + self.penalty
        } else {
            base
        }
    }
}

/// The distance used by playlist generation.
#[must_use]
pub fn default_distance(same_artist_penalty: f64) -> ArtistSeparation<FeatureDistance> {
    ArtistSeparation {
        inner: FeatureDistance,
        penalty: same_artist_penalty,
    }
}

pub struct Sequencer<'a> {
    distance: &'a dyn TrackDistance,
    max_passes: usize,
}

impl<'a> Sequencer<'a> {
    #[must_use]
    pub fn new(distance: &'a dyn TrackDistance, max_passes: usize) -> Self {
        Self {
            distance,
            max_passes,
        }
    }

    /// Order `candidates`. Fewer than two tracks come back unchanged.
    #[must_use]
    pub fn sequence(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        let n = candidates.len();
        if n < 2 {
            debug!("Sequencer: {n} track(s), nothing to order");
            return candidates;
        }

        let matrix = self.matrix(&candidates);
        let (first, last) = anchors(&candidates);

        let mut order = Vec::with_capacity(n);
        order.push(first);
        let mut remaining: Vec<usize> = (0..n).filter(|&i| i != first && Some(i) != last).collect();

        while !remaining.is_empty() {
            let tail = order[order.len() - 1];
            let slot = (0..remaining.len())
                .min_by(|&p, &q| {
                    let (x, y) = (remaining[p], remaining[q]);
                    matrix[tail][x]
                        .partial_cmp(&matrix[tail][y])
                        .unwrap_or(Ordering::Equal)
                        .then_with(|| x.cmp(&y))
                })
                .unwrap_or(0);
            order.push(remaining.remove(slot));
        }
        if let Some(last) = last {
            order.push(last);
        }

        let swaps = self.refine_order(&mut order, &matrix, last.is_some());
        debug!(
            "Sequencer: {n} tracks, anchors {}..{}, {swaps} refining swap(s)",
            candidates[first].track.id,
            last.map_or_else(|| "-".to_string(), |l| candidates[l].track.id.to_string())
        );

        let mut slots: Vec<Option<Candidate>> = candidates.into_iter().map(Some).collect();
        order.into_iter().filter_map(|i| slots[i].take()).collect()
    }

    /// Run adjacent-swap refinement on an existing order, keeping the first
    /// track (and the last, when `pin_last`) in place. Returns the number of
    /// swaps made.
    pub fn refine(&self, tracks: &mut [Candidate], pin_last: bool) -> usize {
        if tracks.len() < 3 {
            return 0;
        }
        let matrix = self.matrix(tracks);
        let mut order: Vec<usize> = (0..tracks.len()).collect();
        let swaps = self.refine_order(&mut order, &matrix, pin_last);
        if swaps > 0 {
            let mut reordered: Vec<Candidate> = order.iter().map(|&i| tracks[i].clone()).collect();
            tracks.swap_with_slice(&mut reordered);
        }
        swaps
    }

    /// Sum of consecutive transition distances.
    #[must_use]
    pub fn path_cost(&self, tracks: &[Candidate]) -> f64 {
        tracks
            .windows(2)
            .map(|w| clamp(self.distance.distance(&w[0].track, &w[1].track)))
            .sum()
    }

    fn matrix(&self, candidates: &[Candidate]) -> Vec<Vec<f64>> {
        let n = candidates.len();
        (0..n)
            .into_par_iter()
            .map(|i| {
                (0..n)
                    .map(|j| {
                        if i == j {
                            0.0
                        } else {
                            clamp(self.distance.distance(&candidates[i].track, &candidates[j].track))
                        }
                    })
                    .collect()
            })
            .collect()
    }

    fn refine_order(&self, order: &mut [usize], matrix: &[Vec<f64>], pin_last: bool) -> usize {
        let n = order.len();
        // Positions lo..hi may move.
        let lo = 1;
        let hi = if pin_last { n - 1 } else { n };
        if hi < lo + 2 {
            return 0;
        }

        let d = |a: usize, b: usize| matrix[a][b];
        let mut total = 0;
        for pass in 0..self.max_passes {
            let mut swapped = 0;
            for i in lo..hi - 1 {
                let (prev, a, b) = (order[i - 1], order[i], order[i + 1]);
                let next = order.get(i + 2).copied();

                let before = d(prev, a) + d(a, b) + next.map_or(0.0, |nx| d(b, nx));
                let after = d(prev, b) + d(b, a) + next.map_or(0.0, |nx| d(a, nx));
                if after + EPS < before {
                    order.swap(i, i + 1);
                    swapped += 1;
                }
            }
            total += swapped;
            if swapped == 0 {
                break;
            }
            if pass + 1 == self.max_passes {
                debug!("Sequencer: refinement stopped at the pass cap ({})", self.max_passes);
            }
        }
        total
    }
}

/// Opening and closing anchor indices. Without any history track the heaviest
/// candidate opens and nothing is pinned at the end.
fn anchors(candidates: &[Candidate]) -> (usize, Option<usize>) {
    let eligible: Vec<(usize, _)> = candidates
        .iter()
        .enumerate()
        .filter_map(|(i, c)| c.anchor_time().map(|t| (i, (t, c.track.id))))
        .collect();

    let first = eligible.iter().min_by_key(|(_, key)| *key).map(|(i, _)| *i);
    let last = eligible.iter().max_by_key(|(_, key)| *key).map(|(i, _)| *i);

    match (first, last) {
        (Some(f), Some(l)) if f != l => (f, Some(l)),
        (Some(f), _) => (f, None),
        _ => (heaviest(candidates), None),
    }
}

fn heaviest(candidates: &[Candidate]) -> usize {
    candidates
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| {
            a.weight
                .partial_cmp(&b.weight)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.track.id.cmp(&a.track.id))
        })
        .map_or(0, |(i, _)| i)
}

fn clamp(d: f64) -> f64 {
    if d.is_nan() {
        f64::INFINITY
    } else {
        d.max(0.0)
    }
}
