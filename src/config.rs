//! # Configuration Module
//!
//! TOML configuration and platform directories for daylist.
//!
//! ## Locations
//!
//! The configuration file lives in the platform configuration directory unless
//! `--config` or `DAYLIST_CONFIG` points elsewhere:
//! - Linux: `~/.config/daylist/config.toml`
//! - macOS: `~/Library/Application Support/daylist/config.toml`
//! - Windows: `%APPDATA%\daylist\config.toml`
//!
//! Run state (the last descriptor used in a title) goes to the platform data
//! directory, e.g. `~/.local/share/daylist/state.json`.
//!
//! ## Layout
//!
//! ```toml
//! [library]
//! snapshot = "library.db"
//! section = "Music"
//!
//! [playlist]
//! exclude_played_days = 4
//! history_lookback_days = 30
//! max_tracks = 50
//! sonic_similar_limit = 15
//!
//! [exclusions]
//! label = "noshare"
//!
//! [seasonal]
//! collection = "Christmas"
//! start_month = 12
//! start_day = 1
//! end_month = 12
//! end_day = 25
//!
//! [naming]
//! title_prefix = "Daylist for"
//! mood_map = "moodmap.json"
//!
//! [[periods]]
//! name = "Morning"
//! start = "09:00"
//! phrase = "in the morning"
//! ```
//!
//! Every key is optional. Relative paths resolve against the directory holding
//! the configuration file.

use anyhow::{bail, Context, Result};
use log::debug;
use path_absolutize::Absolutize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::diversity::DiversityOptions;
use crate::exclusion::{ExclusionRule, MonthDay, SeasonalWindow};
use crate::mood::MoodMap;
use crate::period::{default_periods, Period, PeriodTable};
use crate::pool::PoolOptions;

const APP_DIR: &str = "daylist";

/// Returns the default configuration file path. Does not create anything.
///
/// # Errors
///
/// Returns an error if the platform configuration directory is unknown.
pub fn get_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system config directory. Pass --config or set DAYLIST_CONFIG."
        )
    })?;
    Ok(config_dir.join(APP_DIR).join("config.toml"))
}

/// Returns the daylist data directory, creating it if needed.
///
/// # Errors
///
/// Returns an error if the data directory cannot be determined or created.
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system data directory. Please ensure your platform supports standard data directories."
        )
    })?;

    let dir = data_dir.join(APP_DIR);
    fs::create_dir_all(&dir).with_context(|| {
        format!(
            "Failed to create daylist data directory at {}. Please check file permissions.",
            dir.display()
        )
    })?;
    Ok(dir)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// SQLite snapshot to read. A `.json` file is read as an in-memory snapshot.
    pub snapshot: Option<PathBuf>,
    /// Library section whose history is used.
    pub section: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            snapshot: None,
            section: "Music".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaylistConfig {
    pub exclude_played_days: u32,
    pub history_lookback_days: u32,
    pub max_tracks: usize,
    pub sonic_similar_limit: usize,
    /// Number of top seeds expanded through similarity.
    pub similarity_seeds: usize,
    /// Star floor (1-5); anything rated below is dropped, unrated passes.
    pub min_rating: u8,
    pub artist_cap: f64,
    pub genre_cap: Option<f64>,
    pub recency_half_life_days: f64,
    pub similarity_weight: f64,
    pub rank_penalty: f64,
    pub max_refine_passes: usize,
    pub same_artist_penalty: f64,
}

impl Default for PlaylistConfig {
    fn default() -> Self {
        Self {
            exclude_played_days: 4,
            history_lookback_days: 30,
            max_tracks: 50,
            sonic_similar_limit: 15,
            similarity_seeds: 10,
            min_rating: 3,
            artist_cap: 0.2,
            genre_cap: None,
            recency_half_life_days: 14.0,
            similarity_weight: 0.5,
            rank_penalty: 0.1,
            max_refine_passes: 50,
            same_artist_penalty: 0.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExclusionConfig {
    pub label: Option<String>,
}

impl Default for ExclusionConfig {
    fn default() -> Self {
        Self {
            label: Some("noshare".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonalConfig {
    /// Empty disables the rule.
    pub collection: String,
    pub start_month: u32,
    pub start_day: u32,
    pub end_month: u32,
    pub end_day: u32,
}

impl Default for SeasonalConfig {
    fn default() -> Self {
        Self {
            collection: "Christmas".to_string(),
            start_month: 12,
            start_day: 1,
            end_month: 12,
            end_day: 25,
        }
    }
}

impl SeasonalConfig {
    /// # Errors
    ///
    /// Returns an error if either end is not a real calendar day.
    pub fn window(&self) -> Result<SeasonalWindow> {
        let start = MonthDay::new(self.start_month, self.start_day).with_context(|| {
            format!(
                "Invalid seasonal start {}-{}",
                self.start_month, self.start_day
            )
        })?;
        let end = MonthDay::new(self.end_month, self.end_day)
            .with_context(|| format!("Invalid seasonal end {}-{}", self.end_month, self.end_day))?;
        Ok(SeasonalWindow { start, end })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    pub title_prefix: String,
    /// JSON mood map; the built-in map is used when unset.
    pub mood_map: Option<PathBuf>,
    /// Name shown in "Made for ..." in descriptions.
    pub listener: Option<String>,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            title_prefix: "Daylist for".to_string(),
            mood_map: None,
            listener: None,
        }
    }
}

/// The full configuration bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub library: LibraryConfig,
    pub playlist: PlaylistConfig,
    pub exclusions: ExclusionConfig,
    pub seasonal: SeasonalConfig,
    pub naming: NamingConfig,
    pub periods: Vec<Period>,
    /// Directory relative paths resolve against. Not serialized.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            library: LibraryConfig::default(),
            playlist: PlaylistConfig::default(),
            exclusions: ExclusionConfig::default(),
            seasonal: SeasonalConfig::default(),
            naming: NamingConfig::default(),
            periods: default_periods(),
            base_dir: None,
        }
    }
}

impl Config {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or fails validation.
    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read configuration {}", path.display()))?;
            Self::from_toml(&raw).with_context(|| format!("Invalid configuration {}", path.display()))?
        } else {
            debug!("No configuration at {}, using defaults", path.display());
            Self::default()
        };
        config.base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf);
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error if the default configuration cannot be serialized.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        let p = &self.playlist;
        if p.max_tracks == 0 {
            bail!("playlist.max_tracks must be at least 1");
        }
        if !(p.artist_cap > 0.0 && p.artist_cap <= 1.0) {
            bail!("playlist.artist_cap must be in (0, 1], got {}", p.artist_cap);
        }
        if let Some(cap) = p.genre_cap {
            if !(cap > 0.0 && cap <= 1.0) {
                bail!("playlist.genre_cap must be in (0, 1], got {cap}");
            }
        }
        if p.min_rating > 5 {
            bail!("playlist.min_rating is in stars (0-5), got {}", p.min_rating);
        }
        for (name, value) in [
            ("recency_half_life_days", p.recency_half_life_days),
            ("similarity_weight", p.similarity_weight),
            ("rank_penalty", p.rank_penalty),
            ("same_artist_penalty", p.same_artist_penalty),
        ] {
            if !value.is_finite() || value < 0.0 {
                bail!("playlist.{name} must be a non-negative number, got {value}");
            }
        }
        if !self.seasonal.collection.trim().is_empty() {
            self.seasonal.window()?;
        }
        PeriodTable::new(self.periods.clone()).context("Invalid [[periods]]")?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the configured periods are invalid.
    pub fn period_table(&self) -> Result<PeriodTable> {
        PeriodTable::new(self.periods.clone())
    }

    /// Active exclusion rules, label rule first.
    ///
    /// # Errors
    ///
    /// Returns an error if the seasonal window is invalid.
    pub fn exclusion_rules(&self) -> Result<Vec<ExclusionRule>> {
        let mut rules = Vec::new();
        if let Some(label) = self.exclusions.label.as_deref().map(str::trim) {
            if !label.is_empty() {
                rules.push(ExclusionRule::Label(label.to_string()));
            }
        }
        let collection = self.seasonal.collection.trim();
        if !collection.is_empty() {
            rules.push(ExclusionRule::Seasonal {
                collection: collection.to_string(),
                window: self.seasonal.window()?,
            });
        }
        Ok(rules)
    }

    #[must_use]
    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            min_rating: self.playlist.min_rating,
            similarity_seeds: self.playlist.similarity_seeds,
            sonic_similar_limit: self.playlist.sonic_similar_limit,
            similarity_weight: self.playlist.similarity_weight,
            rank_penalty: self.playlist.rank_penalty,
        }
    }

    #[must_use]
    pub fn diversity_options(&self) -> DiversityOptions {
        DiversityOptions {
            max_tracks: self.playlist.max_tracks,
            artist_cap: self.playlist.artist_cap,
            genre_cap: self.playlist.genre_cap,
        }
    }

    /// Resolve `path` against the configuration directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be made absolute.
    pub fn resolve_path(&self, path: &Path) -> Result<PathBuf> {
        let resolved = match &self.base_dir {
            Some(base) => path.absolutize_from(base.as_path()),
            None => path.absolutize(),
        }
        .with_context(|| format!("Failed to resolve path {}", path.display()))?;
        Ok(resolved.into_owned())
    }

    /// The configured mood map, or the built-in one.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured mood map cannot be loaded.
    pub fn mood_map(&self) -> Result<MoodMap> {
        match &self.naming.mood_map {
            Some(path) => MoodMap::load(&self.resolve_path(path)?),
            None => Ok(MoodMap::default()),
        }
    }
}
