//! # Track Model
//!
//! Catalog tracks as the media library reports them, play-history events, and the
//! text normalization that turns a title/artist pair into a [`SongKey`].
//!
//! Two recordings share a `SongKey` when their cleaned titles and primary artists
//! normalize to the same strings:
//!
//! ```
//! use daylist::track::{Track, TrackId};
//!
//! let studio = Track::new(TrackId(1), "Wonderwall", "Oasis");
//! let live = Track::new(TrackId(2), "Wonderwall (Live at Knebworth)", "Oasis");
//! assert_eq!(studio.song_key(), live.song_key());
//! ```

use chrono::NaiveDateTime;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use unicode_normalization::UnicodeNormalization;

/// Stable catalog identity of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of release a recording was published on.
///
/// Variants are ranked by [`ReleaseType::priority`]; adding a category only means
/// giving it a rank there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseType {
    #[default]
    Studio,
    Live,
    Remix,
    /// EPs, singles and anything else that is neither studio nor compilation.
    Other,
    Compilation,
    VariousArtistsCompilation,
}

lazy_static! {
    static ref COMPILATION_TITLE: Regex = Regex::new(
        r"(?i)\b(soundtrack|ost|o\.s\.t\.|original\s+(?:motion\s+picture\s+)?soundtrack|motion\s+picture\s+soundtrack|music\s+from\s+the\s+(?:motion\s+picture|film)|various\s+artists|greatest\s+hits|best\s+of|anthology|compilation)\b"
    )
    .unwrap();
    static ref LIVE_TITLE: Regex = Regex::new(r"(?i)\blive\b|unplugged|concert").unwrap();
    static ref REMIX_TITLE: Regex = Regex::new(r"(?i)remix").unwrap();
}

impl ReleaseType {
    /// Lower is preferred when picking between versions of one song.
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::Studio => 0,
            Self::Live | Self::Remix | Self::Other => 1,
            Self::Compilation => 2,
            Self::VariousArtistsCompilation => 3,
        }
    }

    /// Best-effort classification from album metadata, for libraries that do not
    /// report a release type directly.
    ///
    /// The album subtype wins when it is conclusive; otherwise the album title is
    /// searched for compilation, live and remix markers. Unknown albums are studio.
    #[must_use]
    pub fn classify(album_title: &str, subtype: &str, album_artist: &str) -> Self {
        let subtype = subtype.trim().to_lowercase();
        let various = is_various_artists(album_artist);
        let compilation = if various {
            Self::VariousArtistsCompilation
        } else {
            Self::Compilation
        };

        if !subtype.is_empty() {
            if subtype.contains("compilation") || subtype.contains("soundtrack") {
                return compilation;
            }
            if subtype.contains("live") {
                return Self::Live;
            }
            if subtype.contains("remix") {
                return Self::Remix;
            }
            if subtype.split_whitespace().any(|w| w == "ep" || w == "single") {
                return Self::Other;
            }
            if subtype.contains("album") || subtype.contains("studio") {
                return if various { compilation } else { Self::Studio };
            }
        }

        if COMPILATION_TITLE.is_match(album_title) {
            compilation
        } else if LIVE_TITLE.is_match(album_title) {
            Self::Live
        } else if REMIX_TITLE.is_match(album_title) {
            Self::Remix
        } else if various {
            Self::VariousArtistsCompilation
        } else {
            Self::Studio
        }
    }
}

impl std::str::FromStr for ReleaseType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "studio" | "album" => Ok(Self::Studio),
            "live" => Ok(Self::Live),
            "remix" => Ok(Self::Remix),
            "other" | "ep" | "single" => Ok(Self::Other),
            "compilation" | "soundtrack" => Ok(Self::Compilation),
            "various_artists_compilation" | "various_artists" => {
                Ok(Self::VariousArtistsCompilation)
            }
            other => Err(anyhow::anyhow!("Unknown release type '{other}'")),
        }
    }
}

/// A catalog track with everything the selection engine looks at.
///
/// Ratings are in stars (0–5); `None` means unrated. `collections` are the
/// collections the track's album belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub album: String,
    #[serde(default)]
    pub album_artist: String,
    #[serde(default)]
    pub release_type: ReleaseType,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub album_rating: Option<u8>,
    #[serde(default)]
    pub artist_rating: Option<u8>,
    #[serde(default)]
    pub play_count: u32,
    #[serde(default)]
    pub labels: BTreeSet<String>,
    #[serde(default)]
    pub album_labels: BTreeSet<String>,
    #[serde(default)]
    pub collections: BTreeSet<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub moods: Vec<String>,
    /// Audio feature vector, when the library has analyzed the track.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<f32>>,
    #[serde(default)]
    pub last_played: Option<NaiveDateTime>,
}

impl Track {
    /// Minimal studio track; everything else empty or unrated.
    #[must_use]
    pub fn new(id: TrackId, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            artist: artist.into(),
            album: String::new(),
            album_artist: String::new(),
            release_type: ReleaseType::Studio,
            rating: None,
            album_rating: None,
            artist_rating: None,
            play_count: 0,
            labels: BTreeSet::new(),
            album_labels: BTreeSet::new(),
            collections: BTreeSet::new(),
            genres: Vec::new(),
            moods: Vec::new(),
            features: None,
            last_played: None,
        }
    }

    /// The performing artist. Compilations often file the real artist on the
    /// track while the album artist reads "Various Artists", so a VA name is
    /// only returned when nothing better exists.
    #[must_use]
    pub fn display_artist(&self) -> &str {
        let artist = self.artist.trim();
        if !artist.is_empty() && !is_various_artists(artist) {
            return artist;
        }
        let album_artist = self.album_artist.trim();
        if !album_artist.is_empty() && !is_various_artists(album_artist) {
            return album_artist;
        }
        if artist.is_empty() {
            "unknown"
        } else {
            artist
        }
    }

    /// Normalized primary artist, used for diversity caps and dedup.
    #[must_use]
    pub fn artist_key(&self) -> String {
        normalize_text(&primary_artist(self.display_artist()))
    }

    /// Logical-song key. A title that is nothing but a version keyword
    /// ("Live", "Cover") keys on itself rather than on an empty string.
    #[must_use]
    pub fn song_key(&self) -> SongKey {
        let cleaned = normalize_text(&clean_title(&self.title));
        let title = if cleaned.is_empty() {
            normalize_text(&self.title)
        } else {
            cleaned
        };
        SongKey {
            title,
            artist: self.artist_key(),
        }
    }

    #[must_use]
    pub fn primary_genre(&self) -> Option<&str> {
        self.genres.first().map(String::as_str)
    }

    /// Title cleanliness: 0 for a plain title, 1 for explicit "original mix"
    /// style tags, 2 for any other version qualifier.
    #[must_use]
    pub fn title_rank(&self) -> u8 {
        title_variant_rank(&self.title)
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.display_artist(), self.title)
    }
}

/// Identity of "the same song" across studio, live, remix and compilation copies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SongKey {
    pub title: String,
    pub artist: String,
}

/// One play of a track. Only ever produced by the media library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub track: TrackId,
    pub played_at: NaiveDateTime,
}

const VERSION_KEYWORDS: &[&str] = &[
    "extended", "deluxe", "remaster", "remastered", "live", "acoustic", "edit",
    "version", "anniversary", "special edition", "radio edit", "album version",
    "original mix", "remix", "mix", "dub", "instrumental", "karaoke", "cover",
    "rework", "re-edit", "bootleg", "vip", "session", "alternate", "take",
    "mix cut", "cut", "dj mix",
];

fn keyword_alternation() -> String {
    let mut keywords: Vec<&str> = VERSION_KEYWORDS.to_vec();
    keywords.sort_by_key(|k| std::cmp::Reverse(k.len()));
    keywords
        .iter()
        .map(|k| regex::escape(k).replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|")
}

lazy_static! {
    static ref FEATURING: Vec<Regex> = [
        r"(?i)\(feat\.?.*?\)",
        r"(?i)\[feat\.?.*?\]",
        r"(?i)\(ft\.?.*?\)",
        r"(?i)\[ft\.?.*?\]",
        r"(?i)\bfeat\.?\s+\w+",
        r"(?i)\bfeaturing\s+\w+",
        r"(?i)\bft\.?\s+\w+",
        r"(?i) - .*mix$",
        r"(?i) - .*dub$",
        r"(?i) - .*remix$",
        r"(?i) - .*edit$",
        r"(?i) - .*version$",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect();
    static ref PAREN_QUALIFIER: Regex =
        Regex::new(&format!(r"(?i)\(\s*[^)]*(?:{})[^)]*\)\s*", keyword_alternation())).unwrap();
    static ref BRACKET_QUALIFIER: Regex =
        Regex::new(&format!(r"(?i)\[\s*[^\]]*(?:{})[^\]]*\]\s*", keyword_alternation())).unwrap();
    static ref STANDALONE_QUALIFIER: Regex =
        Regex::new(&format!(r"(?i)\b(?:{})\b", keyword_alternation())).unwrap();
    static ref EMPTY_PARENS: Regex = Regex::new(r"\(\s*\)|\[\s*\]").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref TRAILING_DASH: Regex = Regex::new(r"[\s-]+$").unwrap();
    static ref PLAIN_VERSION_TAG: Regex =
        Regex::new(r"\b(original\s+mix|album\s+version|single\s+version)\b").unwrap();
    static ref FEAT_SUFFIX: Regex =
        Regex::new(r"(?i)\s*\b(?:feat\.?|ft\.?|featuring)\s+.*$").unwrap();
}

/// Lowercased title with featuring credits and version qualifiers removed.
#[must_use]
pub fn clean_title(title: &str) -> String {
    let mut cleaned = title.trim().to_lowercase();

    for pattern in FEATURING.iter() {
        cleaned = pattern.replace_all(&cleaned, "").trim().to_string();
    }

    cleaned = PAREN_QUALIFIER.replace_all(&cleaned, " ").into_owned();
    cleaned = BRACKET_QUALIFIER.replace_all(&cleaned, " ").into_owned();
    cleaned = STANDALONE_QUALIFIER.replace_all(&cleaned, " ").into_owned();

    cleaned = EMPTY_PARENS.replace_all(&cleaned, "").into_owned();
    cleaned = WHITESPACE.replace_all(&cleaned, " ").trim().to_string();
    TRAILING_DASH.replace_all(&cleaned, "").into_owned()
}

/// NFKC, typographic quotes and dashes folded, lowercased, whitespace collapsed.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    let folded: String = text
        .nfkc()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{2010}' | '\u{2013}' | '\u{2014}' => '-',
            other => other,
        })
        .collect();
    WHITESPACE
        .replace_all(&folded.to_lowercase(), " ")
        .trim()
        .to_string()
}

/// Artist name without "feat./ft./featuring ..." credits.
#[must_use]
pub fn primary_artist(name: &str) -> String {
    let stripped = FEAT_SUFFIX.replace(name.trim(), "");
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

#[must_use]
pub fn is_various_artists(name: &str) -> bool {
    matches!(name.trim().to_lowercase().as_str(), "various artists" | "various")
}

/// See [`Track::title_rank`].
#[must_use]
pub fn title_variant_rank(title: &str) -> u8 {
    let raw = title.trim().to_lowercase();
    if raw == clean_title(title) {
        0
    } else if PLAIN_VERSION_TAG.is_match(&raw) {
        1
    } else {
        2
    }
}
