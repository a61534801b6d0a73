//! # Media Library Access
//!
//! The selection engine never talks to a media server itself. Everything it needs
//! arrives through [`MediaLibrary`]: play history, sonic neighbours and track
//! metadata. Two implementations ship with the crate:
//!
//! - [`SqliteLibrary`] reads a library snapshot database (opened read-only).
//! - [`MemoryLibrary`] holds everything in memory and loads JSON snapshots; tests
//!   and benchmarks build it directly.
//!
//! ## Snapshot Schema
//!
//! ```text
//! tracks(id, section, title, artist, album, album_artist, album_subtype,
//!        release_type, rating, album_rating, artist_rating, play_count,
//!        last_played, features)
//! track_tags(track_id, kind, value, position)   kind: label | album_label |
//!                                                     collection | genre | mood
//! plays(track_id, played_at)
//! similar_tracks(track_id, similar_id, distance)
//! ```
//!
//! Timestamps are local wall-clock text in `YYYY-MM-DD HH:MM:SS` form.

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use log::{debug, warn};
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::track::{HistoryEvent, ReleaseType, Track, TrackId};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Everything the engine consumes from the media server.
pub trait MediaLibrary {
    /// Plays in the library section `scope` at or after `since`.
    ///
    /// # Errors
    ///
    /// Returns an error if the history cannot be read.
    fn fetch_play_history(&self, scope: &str, since: NaiveDateTime) -> Result<Vec<HistoryEvent>>;

    /// Up to `limit` acoustically related tracks, closest first, with their
    /// non-negative distance from `track`.
    ///
    /// # Errors
    ///
    /// Returns an error if the similarity lookup fails.
    fn fetch_similar(&self, track: TrackId, limit: usize) -> Result<Vec<(Track, f64)>>;

    /// # Errors
    ///
    /// Returns an error if the track is unknown or cannot be read.
    fn track_metadata(&self, track: TrackId) -> Result<Track>;
}

/// One directed similarity edge in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarEdge {
    pub from: TrackId,
    pub to: TrackId,
    pub distance: f64,
}

/// Serialized form of a [`MemoryLibrary`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibrarySnapshot {
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub history: Vec<HistoryEvent>,
    #[serde(default)]
    pub similar: Vec<SimilarEdge>,
}

/// In-memory library.
#[derive(Debug, Clone, Default)]
pub struct MemoryLibrary {
    tracks: HashMap<TrackId, Track>,
    history: Vec<HistoryEvent>,
    similar: HashMap<TrackId, Vec<(TrackId, f64)>>,
}

impl MemoryLibrary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid snapshot.
    pub fn load_json(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read library snapshot {}", path.display()))?;
        let snapshot: LibrarySnapshot = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid library snapshot {}", path.display()))?;
        Ok(Self::from(snapshot))
    }

    pub fn add_track(&mut self, track: Track) -> &mut Self {
        self.tracks.insert(track.id, track);
        self
    }

    pub fn add_play(&mut self, track: TrackId, played_at: NaiveDateTime) -> &mut Self {
        self.history.push(HistoryEvent { track, played_at });
        self
    }

    pub fn add_similar(&mut self, from: TrackId, to: TrackId, distance: f64) -> &mut Self {
        self.similar.entry(from).or_default().push((to, distance));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

impl From<LibrarySnapshot> for MemoryLibrary {
    fn from(snapshot: LibrarySnapshot) -> Self {
        let mut library = Self::new();
        for track in snapshot.tracks {
            library.add_track(track);
        }
        library.history = snapshot.history;
        for edge in snapshot.similar {
            library.add_similar(edge.from, edge.to, edge.distance);
        }
        library
    }
}

impl MediaLibrary for MemoryLibrary {
    fn fetch_play_history(&self, _scope: &str, since: NaiveDateTime) -> Result<Vec<HistoryEvent>> {
        Ok(self
            .history
            .iter()
            .filter(|e| e.played_at >= since)
            .copied()
            .collect())
    }

    fn fetch_similar(&self, track: TrackId, limit: usize) -> Result<Vec<(Track, f64)>> {
        let mut edges = self.similar.get(&track).cloned().unwrap_or_default();
        edges.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        Ok(edges
            .into_iter()
            .filter_map(|(id, distance)| match self.tracks.get(&id) {
                Some(t) => Some((t.clone(), distance)),
                None => {
                    warn!("Similarity edge {track} -> {id} points at an unknown track");
                    None
                }
            })
            .take(limit)
            .collect())
    }

    fn track_metadata(&self, track: TrackId) -> Result<Track> {
        match self.tracks.get(&track) {
            Some(t) => Ok(t.clone()),
            None => bail!("Track {track} not found in library"),
        }
    }
}

/// Library snapshot stored in SQLite.
pub struct SqliteLibrary {
    conn: Connection,
}

impl SqliteLibrary {
    /// Open a snapshot database read-only.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open library snapshot {}", path.display()))?;
        debug!("Opened library snapshot {}", path.display());
        Ok(Self { conn })
    }

    #[must_use]
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// Create the snapshot tables on a writable connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema statements fail.
    pub fn create_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS tracks (
                id            INTEGER PRIMARY KEY,
                section       TEXT    NOT NULL DEFAULT 'Music',
                title         TEXT    NOT NULL,
                artist        TEXT    NOT NULL,
                album         TEXT    NOT NULL DEFAULT '',
                album_artist  TEXT    NOT NULL DEFAULT '',
                album_subtype TEXT    NOT NULL DEFAULT '',
                release_type  TEXT,
                rating        INTEGER,
                album_rating  INTEGER,
                artist_rating INTEGER,
                play_count    INTEGER NOT NULL DEFAULT 0,
                last_played   TEXT,
                features      TEXT
            );
            CREATE TABLE IF NOT EXISTS track_tags (
                track_id INTEGER NOT NULL REFERENCES tracks(id),
                kind     TEXT    NOT NULL,
                value    TEXT    NOT NULL,
                position INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS plays (
                track_id  INTEGER NOT NULL REFERENCES tracks(id),
                played_at TEXT    NOT NULL
            );
            CREATE TABLE IF NOT EXISTS similar_tracks (
                track_id   INTEGER NOT NULL REFERENCES tracks(id),
                similar_id INTEGER NOT NULL REFERENCES tracks(id),
                distance   REAL    NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_track_tags_track ON track_tags(track_id);
            CREATE INDEX IF NOT EXISTS idx_plays_played_at ON plays(played_at);
            CREATE INDEX IF NOT EXISTS idx_similar_track ON similar_tracks(track_id);",
        )
        .context("Failed to create library snapshot schema")?;
        Ok(())
    }

    fn load_tags(&self, track: &mut Track) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare("SELECT kind, value FROM track_tags WHERE track_id = ?1 ORDER BY position, rowid")
            .context("Failed to prepare tag query")?;
        let rows = stmt
            .query_map([track.id.0], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("Failed to read tags for track {}", track.id))?;

        for (kind, value) in rows {
            match kind.as_str() {
                "label" => {
                    track.labels.insert(value);
                }
                "album_label" => {
                    track.album_labels.insert(value);
                }
                "collection" => {
                    track.collections.insert(value);
                }
                "genre" => track.genres.push(value),
                "mood" => track.moods.push(value),
                other => debug!("Ignoring unknown tag kind '{other}' on track {}", track.id),
            }
        }
        Ok(())
    }
}

/// Raw `tracks` row before text fields are interpreted.
struct TrackRow {
    id: u64,
    title: String,
    artist: String,
    album: String,
    album_artist: String,
    album_subtype: String,
    release_type: Option<String>,
    rating: Option<u8>,
    album_rating: Option<u8>,
    artist_rating: Option<u8>,
    play_count: u32,
    last_played: Option<String>,
    features: Option<String>,
}

impl TrackRow {
    fn into_track(self) -> Result<Track> {
        let release_type = match self.release_type.as_deref() {
            Some(raw) if !raw.trim().is_empty() => raw.parse()?,
            _ => ReleaseType::classify(&self.album, &self.album_subtype, &self.album_artist),
        };
        let last_played = self.last_played.as_deref().map(parse_timestamp).transpose()?;
        let features = self
            .features
            .as_deref()
            .map(serde_json::from_str::<Vec<f32>>)
            .transpose()
            .with_context(|| format!("Invalid feature vector on track {}", self.id))?;

        Ok(Track {
            id: TrackId(self.id),
            title: self.title,
            artist: self.artist,
            album: self.album,
            album_artist: self.album_artist,
            release_type,
            rating: self.rating,
            album_rating: self.album_rating,
            artist_rating: self.artist_rating,
            play_count: self.play_count,
            features,
            last_played,
            ..Track::new(TrackId(self.id), "", "")
        })
    }
}

impl MediaLibrary for SqliteLibrary {
    fn fetch_play_history(&self, scope: &str, since: NaiveDateTime) -> Result<Vec<HistoryEvent>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT p.track_id, p.played_at FROM plays p
                 JOIN tracks t ON t.id = p.track_id
                 WHERE t.section = ?1 AND p.played_at >= ?2
                 ORDER BY p.played_at",
            )
            .context("Failed to prepare history query")?;

        let since = since.format(TIMESTAMP_FORMAT).to_string();
        let rows = stmt
            .query_map((scope, since), |row| {
                Ok((row.get::<_, u64>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read play history")?;

        rows.into_iter()
            .map(|(id, played_at)| {
                Ok(HistoryEvent {
                    track: TrackId(id),
                    played_at: parse_timestamp(&played_at)?,
                })
            })
            .collect()
    }

    fn fetch_similar(&self, track: TrackId, limit: usize) -> Result<Vec<(Track, f64)>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT similar_id, distance FROM similar_tracks
                 WHERE track_id = ?1 ORDER BY distance ASC LIMIT ?2",
            )
            .context("Failed to prepare similarity query")?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map((track.0, limit), |row| {
                Ok((row.get::<_, u64>(0)?, row.get::<_, f64>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("Failed to read tracks similar to {track}"))?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, distance)| match self.track_metadata(TrackId(id)) {
                Ok(t) => Some((t, distance)),
                Err(e) => {
                    warn!("Similarity edge {track} -> #{id} skipped: {e:#}");
                    None
                }
            })
            .collect())
    }

    fn track_metadata(&self, track: TrackId) -> Result<Track> {
        let row = self
            .conn
            .query_row(
                "SELECT id, title, artist, album, album_artist, album_subtype, release_type,
                        rating, album_rating, artist_rating, play_count, last_played, features
                 FROM tracks WHERE id = ?1",
                [track.0],
                |row| {
                    Ok(TrackRow {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        artist: row.get(2)?,
                        album: row.get(3)?,
                        album_artist: row.get(4)?,
                        album_subtype: row.get(5)?,
                        release_type: row.get(6)?,
                        rating: row.get(7)?,
                        album_rating: row.get(8)?,
                        artist_rating: row.get(9)?,
                        play_count: row.get(10)?,
                        last_played: row.get(11)?,
                        features: row.get(12)?,
                    })
                },
            )
            .optional()
            .with_context(|| format!("Failed to read metadata for track {track}"))?;

        let Some(row) = row else {
            bail!("Track {track} not found in library snapshot");
        };
        let mut result = row.into_track()?;
        self.load_tags(&mut result)?;
        Ok(result)
    }
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .with_context(|| format!("Invalid timestamp '{raw}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn seeded_sqlite() -> SqliteLibrary {
        let conn = Connection::open_in_memory().unwrap();
        SqliteLibrary::create_schema(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO tracks (id, title, artist, album, album_artist, album_subtype, rating, features, last_played)
             VALUES (1, 'Changa', 'Artist', 'Changa', 'Artist', 'Album', 4, '[0.1, 0.2]', '2024-05-02 09:00:00'),
                    (2, 'Changa', 'Artist', 'Hits 2020', 'Various Artists', 'Compilation', NULL, NULL, NULL),
                    (3, 'Other', 'Band', 'Live in Oslo', 'Band', '', NULL, NULL, NULL);
             INSERT INTO tracks (id, section, title, artist) VALUES (4, 'Podcasts', 'Episode', 'Host');
             INSERT INTO track_tags (track_id, kind, value, position)
             VALUES (1, 'genre', 'House', 0), (1, 'genre', 'Dance', 1), (1, 'label', 'noshare', 0),
                    (1, 'collection', 'Summer', 0), (1, 'mood', 'Upbeat', 0);
             INSERT INTO plays (track_id, played_at)
             VALUES (1, '2024-05-01 09:00:00'), (3, '2024-05-03 10:00:00'), (4, '2024-05-03 11:00:00');
             INSERT INTO similar_tracks (track_id, similar_id, distance)
             VALUES (1, 3, 0.4), (1, 2, 0.1);",
        )
        .unwrap();
        SqliteLibrary::from_connection(conn)
    }

    #[test]
    fn test_sqlite_track_metadata() {
        let library = seeded_sqlite();
        let track = library.track_metadata(TrackId(1)).unwrap();
        assert_eq!(track.title, "Changa");
        assert_eq!(track.rating, Some(4));
        assert_eq!(track.genres, vec!["House".to_string(), "Dance".to_string()]);
        assert!(track.labels.contains("noshare"));
        assert!(track.collections.contains("Summer"));
        assert_eq!(track.features, Some(vec![0.1, 0.2]));
        assert_eq!(track.last_played, Some(ts(2, 9)));
        assert_eq!(track.release_type, ReleaseType::Studio);
    }

    #[test]
    fn test_sqlite_classifies_release_types() {
        let library = seeded_sqlite();
        assert_eq!(
            library.track_metadata(TrackId(2)).unwrap().release_type,
            ReleaseType::VariousArtistsCompilation
        );
        assert_eq!(
            library.track_metadata(TrackId(3)).unwrap().release_type,
            ReleaseType::Live
        );
    }

    #[test]
    fn test_sqlite_history_is_scoped_and_bounded() {
        let library = seeded_sqlite();
        let events = library.fetch_play_history("Music", ts(2, 0)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].track, TrackId(3));
        assert_eq!(events[0].played_at, ts(3, 10));
    }

    #[test]
    fn test_sqlite_similar_ordered_by_distance() {
        let library = seeded_sqlite();
        let similar = library.fetch_similar(TrackId(1), 5).unwrap();
        let ids: Vec<_> = similar.iter().map(|(t, _)| t.id).collect();
        assert_eq!(ids, vec![TrackId(2), TrackId(3)]);
        assert_eq!(library.fetch_similar(TrackId(1), 1).unwrap().len(), 1);
    }

    #[test]
    fn test_sqlite_similar_skips_dangling_edges() {
        let library = seeded_sqlite();
        library
            .conn
            .execute_batch(
                "PRAGMA foreign_keys = OFF;
                 INSERT INTO similar_tracks (track_id, similar_id, distance) VALUES (1, 77, 0.0);",
            )
            .unwrap();

        let similar = library.fetch_similar(TrackId(1), 5).unwrap();
        let ids: Vec<_> = similar.iter().map(|(t, _)| t.id).collect();
        assert_eq!(ids, vec![TrackId(2), TrackId(3)]);
    }

    #[test]
    fn test_sqlite_unknown_track_errors() {
        let library = seeded_sqlite();
        assert!(library.track_metadata(TrackId(99)).is_err());
    }

    #[test]
    fn test_memory_library_similar_and_history() {
        let mut library = MemoryLibrary::new();
        library
            .add_track(Track::new(TrackId(1), "A", "X"))
            .add_track(Track::new(TrackId(2), "B", "Y"))
            .add_track(Track::new(TrackId(3), "C", "Z"))
            .add_similar(TrackId(1), TrackId(3), 0.9)
            .add_similar(TrackId(1), TrackId(2), 0.2)
            .add_similar(TrackId(1), TrackId(42), 0.1)
            .add_play(TrackId(1), ts(1, 9))
            .add_play(TrackId(2), ts(5, 9));

        let similar = library.fetch_similar(TrackId(1), 10).unwrap();
        let ids: Vec<_> = similar.iter().map(|(t, _)| t.id).collect();
        assert_eq!(ids, vec![TrackId(2), TrackId(3)]);

        let history = library.fetch_play_history("Music", ts(3, 0)).unwrap();
        assert_eq!(history.len(), 1);
        assert!(library.track_metadata(TrackId(9)).is_err());
    }

    #[test]
    fn test_snapshot_json_round_trip() {
        let json = r#"{
            "tracks": [{"id": 1, "title": "A", "artist": "X", "genres": ["Jazz"]}],
            "history": [{"track": 1, "played_at": "2024-05-01T09:00:00"}],
            "similar": []
        }"#;
        let snapshot: LibrarySnapshot = serde_json::from_str(json).unwrap();
        let library = MemoryLibrary::from(snapshot);
        assert_eq!(library.len(), 1);
        assert_eq!(library.track_metadata(TrackId(1)).unwrap().genres, vec!["Jazz".to_string()]);
    }
}
