//! # Version Resolution
//!
//! Collapses recordings of one logical song (studio, live, remix, compilation
//! copies) into a single representative. Candidates are compared by a fixed
//! chain of criteria, each consulted only when every earlier one ties:
//!
//! 1. release type priority (studio first, various-artists compilations last)
//! 2. title cleanliness (plain titles first)
//! 3. rating (higher first; any rating beats none)
//! 4. pool weight (higher first)
//! 5. track id (lower first)
//!
//! The last criterion makes the choice total, so resolution never depends on
//! input order.

use log::{debug, trace};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::pool::Candidate;
use crate::track::SongKey;

/// `Less` when `a` is the better representative.
#[must_use]
pub fn compare_versions(a: &Candidate, b: &Candidate) -> Ordering {
    a.track
        .release_type
        .priority()
        .cmp(&b.track.release_type.priority())
        .then_with(|| a.track.title_rank().cmp(&b.track.title_rank()))
        .then_with(|| b.track.rating.cmp(&a.track.rating))
        .then_with(|| b.weight.partial_cmp(&a.weight).unwrap_or(Ordering::Equal))
        .then_with(|| a.track.id.cmp(&b.track.id))
}

/// One candidate per logical song, sorted by weight (highest first, ties by id).
#[must_use]
pub fn resolve_versions(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let total = candidates.len();
    let mut best: HashMap<SongKey, Candidate> = HashMap::with_capacity(total);

    for candidate in candidates {
        let key = candidate.track.song_key();
        match best.get(&key) {
            Some(current) if compare_versions(current, &candidate) != Ordering::Greater => {
                trace!("Dropping {} in favour of {}", candidate.track, current.track);
            }
            _ => {
                if let Some(replaced) = best.insert(key, candidate) {
                    trace!("Dropping {} (better version found)", replaced.track);
                }
            }
        }
    }

    let mut resolved: Vec<Candidate> = best.into_values().collect();
    sort_by_weight(&mut resolved);

    debug!("Resolver: {total} candidates -> {} distinct songs", resolved.len());
    resolved
}

/// Descending weight, then ascending id.
pub fn sort_by_weight(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.weight
            .partial_cmp(&a.weight)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.track.id.cmp(&b.track.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Provenance;
    use crate::track::{ReleaseType, Track, TrackId};

    fn candidate(id: u64, title: &str, release: ReleaseType, rating: Option<u8>, weight: f64) -> Candidate {
        let mut track = Track::new(TrackId(id), title, "Artist");
        track.release_type = release;
        track.rating = rating;
        Candidate {
            track,
            weight,
            provenance: Provenance::Similar {
                seed: TrackId(0),
                distance: 0.0,
                rank: 0,
            },
        }
    }

    fn pick(candidates: Vec<Candidate>) -> TrackId {
        let resolved = resolve_versions(candidates);
        assert_eq!(resolved.len(), 1, "all inputs share one song key");
        resolved[0].track.id
    }

    #[test]
    fn test_studio_beats_compilation_and_live() {
        let chosen = pick(vec![
            candidate(1, "Changa", ReleaseType::VariousArtistsCompilation, Some(5), 9.0),
            candidate(2, "Changa (Live)", ReleaseType::Live, Some(5), 9.0),
            candidate(3, "Changa", ReleaseType::Studio, None, 0.1),
        ]);
        assert_eq!(chosen, TrackId(3));
    }

    #[test]
    fn test_clean_title_beats_qualified_title() {
        let chosen = pick(vec![
            candidate(1, "Changa (Dub Remix)", ReleaseType::Other, None, 5.0),
            candidate(2, "Changa (Original Mix)", ReleaseType::Other, None, 1.0),
        ]);
        assert_eq!(chosen, TrackId(2));
    }

    #[test]
    fn test_rating_then_weight_then_id() {
        assert_eq!(
            pick(vec![
                candidate(1, "Changa", ReleaseType::Studio, Some(3), 9.0),
                candidate(2, "Changa", ReleaseType::Studio, Some(5), 1.0),
            ]),
            TrackId(2)
        );
        assert_eq!(
            pick(vec![
                candidate(1, "Changa", ReleaseType::Studio, None, 1.0),
                candidate(2, "Changa", ReleaseType::Studio, None, 2.0),
            ]),
            TrackId(2)
        );
        assert_eq!(
            pick(vec![
                candidate(7, "Changa", ReleaseType::Studio, None, 1.0),
                candidate(4, "Changa", ReleaseType::Studio, None, 1.0),
            ]),
            TrackId(4)
        );
    }

    #[test]
    fn test_resolution_is_order_independent() {
        let versions = vec![
            candidate(1, "Changa", ReleaseType::Compilation, Some(4), 2.0),
            candidate(2, "Changa (Remastered)", ReleaseType::Studio, Some(4), 2.0),
            candidate(3, "Changa", ReleaseType::Studio, Some(2), 2.0),
            candidate(4, "Changa", ReleaseType::Studio, Some(2), 2.0),
        ];
        let forward = pick(versions.clone());
        for _ in 0..5 {
            let mut reversed = versions.clone();
            reversed.reverse();
            assert_eq!(pick(reversed), forward);
        }
        assert_eq!(forward, TrackId(3));
    }

    #[test]
    fn test_distinct_songs_pass_through_sorted() {
        let resolved = resolve_versions(vec![
            candidate(1, "One", ReleaseType::Studio, None, 1.0),
            candidate(2, "Two", ReleaseType::Live, None, 3.0),
            candidate(3, "Three", ReleaseType::Studio, None, 3.0),
        ]);
        let ids: Vec<_> = resolved.iter().map(|c| c.track.id).collect();
        assert_eq!(ids, vec![TrackId(2), TrackId(3), TrackId(1)]);
    }

    #[test]
    fn test_keyword_only_titles_are_different_songs() {
        let resolved = resolve_versions(vec![
            candidate(1, "Live", ReleaseType::Studio, None, 1.0),
            candidate(2, "Cover", ReleaseType::Studio, None, 2.0),
            candidate(3, "Mix", ReleaseType::Studio, None, 3.0),
            candidate(4, "Dub", ReleaseType::Studio, None, 4.0),
            candidate(5, "Session", ReleaseType::Studio, None, 5.0),
        ]);
        let ids: Vec<_> = resolved.iter().map(|c| c.track.id).collect();
        assert_eq!(ids, vec![TrackId(5), TrackId(4), TrackId(3), TrackId(2), TrackId(1)]);
    }
}
