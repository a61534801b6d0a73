//! # Exclusion Rules
//!
//! Label rules drop any track whose own labels or album labels carry the
//! configured label. Seasonal rules drop every track of a collection unless
//! today's date falls inside the collection's window (inclusive at both ends,
//! wrapping over New Year when the start comes after the end).
//!
//! Seasonal rules are decided once per run from the wall-clock date, never from
//! when a track was played, so one run treats a whole collection the same way.

use chrono::{Datelike, NaiveDate};
use log::trace;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::track::Track;

/// A calendar day without a year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MonthDay {
    pub month: u32,
    pub day: u32,
}

impl MonthDay {
    /// `None` for impossible days. February 29 is allowed.
    #[must_use]
    pub fn new(month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(2000, month, day).map(|_| Self { month, day })
    }

    #[must_use]
    pub fn of(date: NaiveDate) -> Self {
        Self {
            month: date.month(),
            day: date.day(),
        }
    }
}

impl fmt::Display for MonthDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}", self.month, self.day)
    }
}

/// Inclusive `[start, end]` range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonalWindow {
    pub start: MonthDay,
    pub end: MonthDay,
}

impl SeasonalWindow {
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        let today = MonthDay::of(date);
        if self.start <= self.end {
            self.start <= today && today <= self.end
        } else {
            today >= self.start || today <= self.end
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionRule {
    /// Exclude tracks labelled (on the track or its album) with this label.
    Label(String),
    /// Exclude the collection's tracks outside the window.
    Seasonal {
        collection: String,
        window: SeasonalWindow,
    },
}

impl ExclusionRule {
    #[must_use]
    pub fn matches(&self, track: &Track, today: NaiveDate) -> bool {
        match self {
            Self::Label(label) => {
                tag_matches(&track.labels, label) || tag_matches(&track.album_labels, label)
            }
            Self::Seasonal { collection, window } => {
                !window.contains(today) && tag_matches(&track.collections, collection)
            }
        }
    }
}

impl fmt::Display for ExclusionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Label(label) => write!(f, "label '{label}'"),
            Self::Seasonal { collection, window } => write!(
                f,
                "collection '{collection}' outside {}..{}",
                window.start, window.end
            ),
        }
    }
}

/// The rule set bound to one run's date. Rules compose with OR.
#[derive(Debug, Clone)]
pub struct ExclusionFilter {
    rules: Vec<ExclusionRule>,
    today: NaiveDate,
}

impl ExclusionFilter {
    #[must_use]
    pub fn new(rules: Vec<ExclusionRule>, today: NaiveDate) -> Self {
        Self { rules, today }
    }

    /// First rule that excludes `track`, if any.
    #[must_use]
    pub fn matching_rule(&self, track: &Track) -> Option<&ExclusionRule> {
        self.rules.iter().find(|rule| rule.matches(track, self.today))
    }

    #[must_use]
    pub fn is_excluded(&self, track: &Track) -> bool {
        match self.matching_rule(track) {
            Some(rule) => {
                trace!("Excluding {track} ({}): {rule}", track.id);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn rules(&self) -> &[ExclusionRule] {
        &self.rules
    }
}

/// Case-insensitive, whitespace-trimmed tag comparison.
fn tag_matches(tags: &BTreeSet<String>, needle: &str) -> bool {
    let needle = needle.trim().to_lowercase();
    !needle.is_empty() && tags.iter().any(|t| t.trim().to_lowercase() == needle)
}
