//! # History Collection
//!
//! Turns raw play events into ranked seeds for one period of the day.
//!
//! A play counts toward a seed when it happened inside the lookback window and
//! its local time of day falls in the target period. A track played anywhere in
//! the recency-exclusion window (any period) is dropped entirely, so that one run
//! never repeats what the listener just heard.
//!
//! Seed weight sums an exponentially decayed contribution per play:
//!
//! ```text
//! weight(seed) = Σ 0.5 ^ (age_days(play) / half_life_days)
//! ```
//!
//! so both frequent and recent plays rank higher.

use chrono::{Duration, NaiveDateTime};
use log::debug;
use std::collections::{HashMap, HashSet};

use crate::period::{Period, PeriodTable};
use crate::track::{HistoryEvent, TrackId};

/// A historically relevant track for the current period.
#[derive(Debug, Clone, PartialEq)]
pub struct Seed {
    pub track: TrackId,
    /// In-period plays inside the lookback window.
    pub plays: u32,
    pub first_played: NaiveDateTime,
    pub last_played: NaiveDateTime,
    pub weight: f64,
}

/// Ranked seeds plus every track heard inside the recency window.
#[derive(Debug, Clone, Default)]
pub struct SeedSet {
    pub seeds: Vec<Seed>,
    pub recently_played: HashSet<TrackId>,
}

impl SeedSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HistoryCollector {
    pub lookback_days: u32,
    pub exclude_played_days: u32,
    pub half_life_days: f64,
}

impl HistoryCollector {
    #[must_use]
    pub fn new(lookback_days: u32, exclude_played_days: u32, half_life_days: f64) -> Self {
        Self {
            lookback_days,
            exclude_played_days,
            half_life_days,
        }
    }

    /// Oldest timestamp either window needs; the history fetch starts here.
    #[must_use]
    pub fn fetch_since(&self, now: NaiveDateTime) -> NaiveDateTime {
        now - Duration::days(i64::from(self.lookback_days.max(self.exclude_played_days)))
    }

    #[must_use]
    pub fn recency_cutoff(&self, now: NaiveDateTime) -> NaiveDateTime {
        now - Duration::days(i64::from(self.exclude_played_days))
    }

    pub fn collect(
        &self,
        events: &[HistoryEvent],
        period: &Period,
        periods: &PeriodTable,
        now: NaiveDateTime,
    ) -> SeedSet {
        let lookback_start = now - Duration::days(i64::from(self.lookback_days));
        let recency_cutoff = self.recency_cutoff(now);

        let recently_played: HashSet<TrackId> = events
            .iter()
            .filter(|e| e.played_at >= recency_cutoff && e.played_at <= now)
            .map(|e| e.track)
            .collect();

        let mut by_track: HashMap<TrackId, Seed> = HashMap::new();
        for event in events {
            if event.played_at < lookback_start || event.played_at > now {
                continue;
            }
            if periods.classify(event.played_at).name != period.name {
                continue;
            }
            if recently_played.contains(&event.track) {
                continue;
            }

            let contribution = self.decay(now - event.played_at);
            by_track
                .entry(event.track)
                .and_modify(|seed| {
                    seed.plays += 1;
                    seed.weight += contribution;
                    seed.first_played = seed.first_played.min(event.played_at);
                    seed.last_played = seed.last_played.max(event.played_at);
                })
                .or_insert(Seed {
                    track: event.track,
                    plays: 1,
                    first_played: event.played_at,
                    last_played: event.played_at,
                    weight: contribution,
                });
        }

        let mut seeds: Vec<Seed> = by_track.into_values().collect();
        seeds.sort_by(|a, b| {
            b.weight
                .partial_cmp(&a.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.last_played.cmp(&a.last_played))
                .then_with(|| a.track.cmp(&b.track))
        });

        debug!(
            "History: {} events -> {} seeds for '{}' ({} tracks held back as recently played)",
            events.len(),
            seeds.len(),
            period.name,
            recently_played.len()
        );

        SeedSet {
            seeds,
            recently_played,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn decay(&self, age: Duration) -> f64 {
        if self.half_life_days <= 0.0 {
            return 1.0;
        }
        let age_days = age.num_seconds().max(0) as f64 / 86_400.0;
        0.5_f64.powf(age_days / self.half_life_days)
    }
}
