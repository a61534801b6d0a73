//! # Periods of the Day
//!
//! A [`PeriodTable`] splits the 24-hour clock into named periods. Each period
//! starts at its configured time and runs until the next period starts, so the
//! table always covers the whole day without gaps or overlaps. Intervals are
//! closed-open (`[start, next_start)`), and the latest period wraps past midnight
//! up to the earliest start.

use anyhow::{bail, Result};
use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A named segment of the day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub name: String,
    /// Local wall-clock start, written as `"HH:MM"`.
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    /// Phrase used in descriptions, e.g. "in the morning".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phrase: Option<String>,
    /// Cover image file handed to the cover compositor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
}

impl Period {
    #[must_use]
    pub fn new(name: impl Into<String>, hour: u32, minute: u32) -> Option<Self> {
        Some(Self {
            name: name.into(),
            start: NaiveTime::from_hms_opt(hour, minute, 0)?,
            phrase: None,
            cover: None,
        })
    }

    #[must_use]
    pub fn phrase(&self) -> String {
        self.phrase
            .clone()
            .unwrap_or_else(|| format!("in the {}", self.name.to_lowercase()))
    }
}

/// Ordered, validated set of periods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodTable {
    periods: Vec<Period>,
}

impl PeriodTable {
    /// # Errors
    ///
    /// Fails when the list is empty, or when two periods share a name or a start time.
    pub fn new(mut periods: Vec<Period>) -> Result<Self> {
        if periods.is_empty() {
            bail!("At least one period must be configured");
        }

        let mut names = HashSet::new();
        let mut starts = HashSet::new();
        for period in &periods {
            if !names.insert(period.name.as_str()) {
                bail!("Duplicate period name '{}'", period.name);
            }
            if !starts.insert(period.start) {
                bail!(
                    "Periods cannot share a start time ({} is used twice)",
                    period.start.format("%H:%M")
                );
            }
        }

        periods.sort_by_key(|p| p.start);
        Ok(Self { periods })
    }

    #[must_use]
    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Period> {
        self.periods.iter().find(|p| p.name == name)
    }

    /// The period whose interval contains `time`.
    #[must_use]
    pub fn classify_time(&self, time: NaiveTime) -> &Period {
        let index = self.index_of(time);
        &self.periods[index]
    }

    #[must_use]
    pub fn classify(&self, at: NaiveDateTime) -> &Period {
        self.classify_time(at.time())
    }

    /// Start of the period that follows `period`.
    #[must_use]
    pub fn end_of(&self, period: &Period) -> NaiveTime {
        let index = self
            .periods
            .iter()
            .position(|p| p.name == period.name)
            .unwrap_or(0);
        self.periods[(index + 1) % self.periods.len()].start
    }

    /// The next moment after `now` at which the period containing `now` ends.
    #[must_use]
    pub fn next_boundary(&self, now: NaiveDateTime) -> NaiveDateTime {
        let end = self.end_of(self.classify(now));
        let candidate = now.date().and_time(end);
        if candidate <= now {
            candidate + Duration::days(1)
        } else {
            candidate
        }
    }

    fn index_of(&self, time: NaiveTime) -> usize {
        // Before the earliest start we are still inside the last (wrapping) period.
        self.periods
            .iter()
            .rposition(|p| p.start <= time)
            .unwrap_or(self.periods.len() - 1)
    }
}

impl Default for PeriodTable {
    fn default() -> Self {
        Self {
            periods: default_periods(),
        }
    }
}

/// Seven periods tuned for a typical listening day.
#[must_use]
pub fn default_periods() -> Vec<Period> {
    [
        ("Dawn", 3, "at dawn", "dawn.webp"),
        ("Early Morning", 6, "in the early morning", "early_morning.webp"),
        ("Morning", 9, "in the morning", "morning.webp"),
        ("Afternoon", 12, "in the afternoon", "afternoon.webp"),
        ("Evening", 16, "in the evening", "evening.webp"),
        ("Night", 19, "at night", "night.webp"),
        ("Late Night", 23, "late at night", "late_night.webp"),
    ]
    .into_iter()
    .filter_map(|(name, hour, phrase, cover)| {
        Period::new(name, hour, 0).map(|p| Period {
            phrase: Some(phrase.to_string()),
            cover: Some(cover.to_string()),
            ..p
        })
    })
    .collect()
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(raw.trim(), "%H:%M")
            .map_err(|e| de::Error::custom(format!("invalid time '{raw}' (expected HH:MM): {e}")))
    }
}
