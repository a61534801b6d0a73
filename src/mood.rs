//! # Mood Naming
//!
//! Builds the playlist title and description from the tags of the selected
//! tracks. Library mood tags ("Brooding", "Laid-Back/Mellow", ...) are folded
//! into a small [`Mood`] enumeration, and a [`MoodMap`] expands each coarse mood
//! into weighted descriptor words.
//!
//! Randomness only ever picks a descriptor. Pass a seeded RNG for repeatable
//! names.
//!
//! ## Mood map file
//!
//! ```json
//! {
//!   "calm": ["Hushed", {"word": "Serene", "weight": 2.0}],
//!   "Brooding": ["Shadowed"]
//! }
//! ```
//!
//! Keys may be coarse mood names or any library mood tag; entries for tags that
//! fold into the same mood are merged.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use log::{debug, warn};
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::period::Period;
use crate::track::Track;

/// Coarse mood buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Energetic,
    Happy,
    Calm,
    Melancholy,
    Dark,
    Romantic,
    Intense,
    Dreamy,
    /// Anything unrecognized, or no mood tags at all.
    Eclectic,
}

const MOOD_ALIASES: &[(Mood, &[&str])] = &[
    (
        Mood::Energetic,
        &[
            "energetic", "animated", "lively", "rousing", "exuberant", "party", "celebratory",
            "hedonistic", "confident", "bright", "fun", "driving", "upbeat",
        ],
    ),
    (
        Mood::Happy,
        &[
            "happy", "cheerful", "playful", "amiable", "good-natured", "sweet", "uplifting",
            "euphoric", "joyous", "quirky", "whimsical", "carefree",
        ],
    ),
    (
        Mood::Calm,
        &[
            "calm", "peaceful", "relaxed", "laid-back", "mellow", "soothing", "gentle", "warm",
            "elegant", "sophisticated", "smooth", "easygoing",
        ],
    ),
    (
        Mood::Melancholy,
        &[
            "melancholy", "sad", "bittersweet", "wistful", "yearning", "reflective",
            "sentimental", "gloomy", "somber", "lonely", "nostalgic",
        ],
    ),
    (
        Mood::Dark,
        &[
            "dark", "brooding", "eerie", "ominous", "spooky", "menacing", "nocturnal", "cold",
            "paranoid", "tense",
        ],
    ),
    (
        Mood::Romantic,
        &["romantic", "sensual", "tender", "passionate", "intimate", "sexy", "seductive"],
    ),
    (
        Mood::Intense,
        &[
            "intense", "aggressive", "angry", "fiery", "rebellious", "volatile", "visceral",
            "hostile", "raucous", "rowdy",
        ],
    ),
    (
        Mood::Dreamy,
        &[
            "dreamy", "atmospheric", "hypnotic", "ethereal", "spacey", "trippy", "psychedelic",
            "meditative", "mystical",
        ],
    ),
];

impl Mood {
    /// Fold a library mood tag into a coarse mood. Compound tags such as
    /// "Laid-Back/Mellow" match on any part.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.trim().to_lowercase();
        if tag == "eclectic" {
            return Self::Eclectic;
        }
        for part in tag.split('/').map(str::trim) {
            for (mood, aliases) in MOOD_ALIASES {
                if aliases.contains(&part) {
                    return *mood;
                }
            }
        }
        Self::Eclectic
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Energetic => "Energetic",
            Self::Happy => "Happy",
            Self::Calm => "Calm",
            Self::Melancholy => "Melancholy",
            Self::Dark => "Dark",
            Self::Romantic => "Romantic",
            Self::Intense => "Intense",
            Self::Dreamy => "Dreamy",
            Self::Eclectic => "Eclectic",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    pub word: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDescriptor {
    Plain(String),
    Weighted(Descriptor),
}

impl From<RawDescriptor> for Descriptor {
    fn from(raw: RawDescriptor) -> Self {
        match raw {
            RawDescriptor::Plain(word) => Self { word, weight: 1.0 },
            RawDescriptor::Weighted(d) => d,
        }
    }
}

/// Coarse mood to weighted descriptor words.
#[derive(Debug, Clone, PartialEq)]
pub struct MoodMap {
    entries: HashMap<Mood, Vec<Descriptor>>,
}

const BUILTIN_DESCRIPTORS: &[(Mood, &[&str])] = &[
    (Mood::Energetic, &["Electric", "Buzzing", "Kinetic", "Sparkling", "Charged", "Vivid"]),
    (Mood::Happy, &["Sunny", "Bubbly", "Golden", "Breezy", "Radiant", "Carefree"]),
    (Mood::Calm, &["Hushed", "Serene", "Velvet", "Mellow", "Drifting", "Soft-Focus"]),
    (Mood::Melancholy, &["Wistful", "Rainy", "Faded", "Blue", "Longing", "Twilight"]),
    (Mood::Dark, &["Shadowed", "Smoky", "Midnight", "Moody", "Noir", "Haunted"]),
    (Mood::Romantic, &["Tender", "Candlelit", "Heartfelt", "Starry", "Amorous", "Silken"]),
    (Mood::Intense, &["Fierce", "Blazing", "Thunderous", "Raw", "Restless", "Wild"]),
    (Mood::Dreamy, &["Hazy", "Floating", "Cosmic", "Lucid", "Misty", "Weightless"]),
    (Mood::Eclectic, &["Vibrant", "Kaleidoscopic", "Wandering", "Mixed-Up", "Curious"]),
];

impl Default for MoodMap {
    fn default() -> Self {
        let entries = BUILTIN_DESCRIPTORS
            .iter()
            .map(|(mood, words)| {
                let descriptors = words
                    .iter()
                    .map(|w| Descriptor {
                        word: (*w).to_string(),
                        weight: 1.0,
                    })
                    .collect();
                (*mood, descriptors)
            })
            .collect();
        Self { entries }
    }
}

impl MoodMap {
    #[must_use]
    pub fn new(entries: HashMap<Mood, Vec<Descriptor>>) -> Self {
        Self { entries }
    }

    /// # Errors
    ///
    /// Returns an error if the JSON is not an object of descriptor lists.
    pub fn from_json(raw: &str) -> Result<Self> {
        let parsed: HashMap<String, Vec<RawDescriptor>> =
            serde_json::from_str(raw).context("Mood map must be an object of descriptor lists")?;

        let mut entries: HashMap<Mood, Vec<Descriptor>> = HashMap::new();
        for (key, descriptors) in parsed {
            let mood = Mood::from_tag(&key);
            if mood == Mood::Eclectic && !key.trim().eq_ignore_ascii_case("eclectic") {
                debug!("Mood map key '{key}' is not a known mood, filing under Eclectic");
            }
            entries
                .entry(mood)
                .or_default()
                .extend(descriptors.into_iter().map(Descriptor::from));
        }
        Ok(Self { entries })
    }

    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read mood map {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("Invalid mood map {}", path.display()))
    }

    #[must_use]
    pub fn descriptors(&self, mood: Mood) -> &[Descriptor] {
        self.entries.get(&mood).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Weighted random descriptor for `mood`, avoiding `previous` whenever
    /// another word is available. `None` when the mood has no usable words.
    pub fn pick<R: Rng + ?Sized>(&self, mood: Mood, previous: Option<&str>, rng: &mut R) -> Option<String> {
        let usable: Vec<&Descriptor> = self
            .descriptors(mood)
            .iter()
            .filter(|d| !d.word.trim().is_empty() && d.weight.is_finite() && d.weight > 0.0)
            .collect();

        let fresh: Vec<&Descriptor> = match previous {
            Some(prev) => usable
                .iter()
                .copied()
                .filter(|d| !d.word.trim().eq_ignore_ascii_case(prev.trim()))
                .collect(),
            None => usable.clone(),
        };
        let choices = if fresh.is_empty() { usable } else { fresh };

        match WeightedIndex::new(choices.iter().map(|d| d.weight)) {
            Ok(dist) => Some(choices[dist.sample(rng)].word.clone()),
            Err(_) => choices.choose(rng).map(|d| d.word.clone()),
        }
    }
}

/// Title, description and the descriptor that went into them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Naming {
    pub title: String,
    pub description: String,
    pub descriptor: String,
}

pub struct MoodNamer<'a> {
    map: &'a MoodMap,
    title_prefix: String,
    listener: Option<String>,
}

const MAX_HIGHLIGHTS: usize = 6;

impl<'a> MoodNamer<'a> {
    #[must_use]
    pub fn new(map: &'a MoodMap, title_prefix: impl Into<String>, listener: Option<String>) -> Self {
        Self {
            map,
            title_prefix: title_prefix.into(),
            listener,
        }
    }

    /// Compose the title and description for `tracks` played in `period`.
    ///
    /// The descriptor is drawn for the second most common mood tag when there is
    /// one, otherwise for the dominant tag.
    pub fn name<R: Rng + ?Sized>(
        &self,
        tracks: &[Track],
        period: &Period,
        now: NaiveDateTime,
        next_update: NaiveDateTime,
        previous_descriptor: Option<&str>,
        rng: &mut R,
    ) -> Naming {
        let genres = ranked_tags(tracks.iter().flat_map(|t| t.genres.iter()));
        let moods = ranked_tags(tracks.iter().flat_map(|t| t.moods.iter()));

        let top_genre = genres.first().map_or("Eclectic", String::as_str);
        let top_mood = moods.first().map_or("Vibes", String::as_str);
        let second_mood = moods.get(1).map(String::as_str);

        let coarse = Mood::from_tag(second_mood.unwrap_or(top_mood));
        let descriptor = self
            .map
            .pick(coarse, previous_descriptor, rng)
            .or_else(|| self.map.pick(Mood::Eclectic, previous_descriptor, rng))
            .unwrap_or_else(|| {
                warn!("Mood map has no descriptors for {coarse}, using a fixed word");
                "Vibrant".to_string()
            });

        let weekday = now.format("%A").to_string();
        let title = [
            self.title_prefix.as_str(),
            top_mood,
            descriptor.as_str(),
            top_genre,
            weekday.as_str(),
            period.name.as_str(),
        ]
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        let (first, second) = if second_mood.is_some() {
            (top_mood, top_genre)
        } else {
            (top_genre, top_mood)
        };
        let mut description = format!(
            "You listened to {first} and {second} tracks on {weekday} {}.",
            period.phrase()
        );

        let highlights = highlight_styles(&genres, &moods, top_genre, top_mood);
        if !highlights.is_empty() {
            description.push_str(&format!(
                " Here's some {} tracks as well.",
                join_natural(&highlights)
            ));
        }

        let next = next_update.format("%-I:%M %p");
        match &self.listener {
            Some(listener) => {
                description.push_str(&format!("\n\nMade for {listener} • Next update at {next}."));
            }
            None => description.push_str(&format!("\n\nNext update at {next}.")),
        }

        debug!("Naming: mood '{top_mood}' ({coarse}), descriptor '{descriptor}', genre '{top_genre}'");
        Naming {
            title,
            description,
            descriptor,
        }
    }
}

/// Distinct tags, most frequent first. Ties keep first-seen order.
fn ranked_tags<'t>(tags: impl Iterator<Item = &'t String>) -> Vec<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() {
            continue;
        }
        match counts.iter_mut().find(|(t, _)| t == tag) {
            Some((_, n)) => *n += 1,
            None => counts.push((tag.to_string(), 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().map(|(t, _)| t).collect()
}

/// Up to six further styles: top three genres and moods other than the dominant
/// pair, topped up from every remaining tag.
fn highlight_styles(genres: &[String], moods: &[String], top_genre: &str, top_mood: &str) -> Vec<String> {
    let mut styles: Vec<String> = Vec::new();
    for style in genres.iter().take(3).chain(moods.iter().take(3)) {
        if style != top_genre && style != top_mood && !styles.contains(style) {
            styles.push(style.clone());
        }
    }
    for style in genres.iter().chain(moods.iter()) {
        if styles.len() >= MAX_HIGHLIGHTS {
            break;
        }
        if style != top_genre && style != top_mood && !styles.contains(style) {
            styles.push(style.clone());
        }
    }
    styles.truncate(MAX_HIGHLIGHTS);
    styles
}

fn join_natural(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [one] => one.clone(),
        [a, b] => format!("{a} and {b}"),
        [init @ .., last] => format!("{}, and {last}", init.join(", ")),
    }
}
