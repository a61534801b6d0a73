//! # Integration Tests for Daylist
//!
//! End-to-end runs of the generation pipeline against in-memory and SQLite
//! libraries, plus a few checks of the `daylist` binary itself.

use anyhow::Result;
use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

use daylist::config::Config;
use daylist::error::GenerateError;
use daylist::generator::{generate, Playlist, RunOptions};
use daylist::library::{LibrarySnapshot, MediaLibrary, MemoryLibrary, SqliteLibrary};
use daylist::mood::MoodMap;
use daylist::track::{HistoryEvent, ReleaseType, Track, TrackId};

/// Thursday, mid-morning.
fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 20)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap()
}

fn morning(days_ago: i64, minute: u32) -> NaiveDateTime {
    (now().date() - Duration::days(days_ago))
        .and_hms_opt(9, minute, 0)
        .unwrap()
}

fn config() -> Config {
    let mut config = Config::default();
    config.playlist.exclude_played_days = 3;
    config
}

fn track(id: u64, title: &str, artist: &str) -> Track {
    let mut track = Track::new(TrackId(id), title, artist);
    track.genres = vec!["Electronic".to_string()];
    track.moods = vec!["Hypnotic".to_string()];
    track
}

fn run(library: &MemoryLibrary, config: &Config, at: NaiveDateTime) -> Result<Playlist, GenerateError> {
    let options = RunOptions {
        seed: Some(11),
        previous_descriptor: None,
    };
    generate(at, config, &MoodMap::default(), library, &options)
}

fn ids(playlist: &Playlist) -> Vec<u64> {
    playlist.tracks.iter().map(|t| t.id.0).collect()
}

#[cfg(test)]
mod scenario_tests {
    use super::*;

    #[test]
    fn test_recent_live_version_is_held_back() {
        let mut library = MemoryLibrary::new();
        let mut live = track(2, "Changa (Live)", "Artist");
        live.release_type = ReleaseType::Live;
        library
            .add_track(track(1, "Changa", "Artist"))
            .add_track(live)
            .add_play(TrackId(1), morning(10, 30))
            .add_play(TrackId(2), now() - Duration::days(3))
            .add_similar(TrackId(1), TrackId(2), 0.05);

        let playlist = run(&library, &config(), now()).unwrap();
        assert_eq!(ids(&playlist), vec![1], "studio TrackA exactly once");
    }

    #[test]
    fn test_keyword_titled_songs_are_not_merged() {
        let mut library = MemoryLibrary::new();
        library
            .add_track(track(1, "Live", "Band"))
            .add_track(track(2, "Cover", "Band"))
            .add_play(TrackId(1), morning(8, 0))
            .add_play(TrackId(2), morning(9, 0));

        let playlist = run(&library, &config(), now()).unwrap();
        let mut got = ids(&playlist);
        got.sort_unstable();
        assert_eq!(got, vec![1, 2]);
    }

    #[test]
    fn test_excluded_label_never_appears() {
        let mut library = MemoryLibrary::new();
        let mut private = track(5, "Secret", "Hidden");
        private.labels.insert("noshare".to_string());
        library.add_track(private).add_track(track(6, "Open", "Visible"));
        for day in 5..25 {
            library.add_play(TrackId(5), morning(day, 0));
        }
        library
            .add_play(TrackId(6), morning(12, 0))
            .add_similar(TrackId(6), TrackId(5), 0.0);

        let playlist = run(&library, &config(), now()).unwrap();
        assert_eq!(ids(&playlist), vec![6]);
    }

    #[test]
    fn test_christmas_collection_follows_calendar() {
        let build = |at: NaiveDateTime| {
            let mut library = MemoryLibrary::new();
            let mut carol = track(7, "Silent Night", "Choir");
            carol.collections.insert("Christmas".to_string());
            library
                .add_track(carol)
                .add_track(track(8, "Summer Breeze", "Band"))
                .add_play(TrackId(7), (at.date() - Duration::days(5)).and_hms_opt(9, 0, 0).unwrap())
                .add_play(TrackId(8), (at.date() - Duration::days(6)).and_hms_opt(9, 0, 0).unwrap());
            library
        };

        let december = NaiveDate::from_ymd_opt(2024, 12, 10).unwrap().and_hms_opt(10, 0, 0).unwrap();
        let playlist = run(&build(december), &config(), december).unwrap();
        assert!(ids(&playlist).contains(&7));

        let july = NaiveDate::from_ymd_opt(2024, 7, 10).unwrap().and_hms_opt(10, 0, 0).unwrap();
        let playlist = run(&build(july), &config(), july).unwrap();
        assert_eq!(ids(&playlist), vec![8]);
    }

    #[test]
    fn test_artist_cap_with_twenty_slots() {
        let mut library = MemoryLibrary::new();
        for i in 0..10 {
            library.add_track(track(100 + i, &format!("Hit {i}"), "Dominant"));
            for day in 5..10 {
                library.add_play(TrackId(100 + i), morning(day, i as u32));
            }
        }
        for i in 0..20 {
            library
                .add_track(track(200 + i, &format!("Deep Cut {i}"), &format!("Artist {i}")))
                .add_play(TrackId(200 + i), morning(20, i as u32));
        }

        let mut config = config();
        config.playlist.max_tracks = 20;
        config.playlist.artist_cap = 0.25;

        let playlist = run(&library, &config, now()).unwrap();
        assert_eq!(playlist.len(), 20);
        let dominant = playlist.tracks.iter().filter(|t| t.artist == "Dominant").count();
        assert_eq!(dominant, 5);
    }
}

#[cfg(test)]
mod invariant_tests {
    use super::*;

    /// Twelve songs, some in several versions, some only reachable by similarity.
    fn busy_library() -> MemoryLibrary {
        let mut library = MemoryLibrary::new();
        for i in 0..12u64 {
            let mut studio = track(i, &format!("Song {i}"), &format!("Artist {}", i % 4));
            studio.features = Some(vec![i as f32, (i % 3) as f32]);
            library.add_track(studio);

            if i % 3 == 0 {
                let mut comp = track(100 + i, &format!("Song {i} (Remastered)"), &format!("Artist {}", i % 4));
                comp.release_type = ReleaseType::Compilation;
                comp.rating = Some(5);
                library.add_track(comp);
                library.add_play(TrackId(100 + i), morning(8 + i as i64, 5));
            }
            library.add_play(TrackId(i), morning(4 + i as i64, 10));
            library.add_play(TrackId(i), morning(15 + i as i64, 20));
        }
        for i in 0..6u64 {
            let mut extra = track(500 + i, &format!("Neighbour {i}"), "Neighbour Band");
            extra.features = Some(vec![i as f32 + 0.5, 1.0]);
            library.add_track(extra);
            library.add_similar(TrackId(i), TrackId(500 + i), 0.2);
        }
        let mut hidden = track(900, "Private Demo", "Artist 0");
        hidden.album_labels.insert("NoShare".to_string());
        library.add_track(hidden).add_similar(TrackId(0), TrackId(900), 0.01);
        library
    }

    fn latest_in_period_play(library: &MemoryLibrary, id: TrackId) -> Option<NaiveDateTime> {
        let since = now() - Duration::days(30);
        library
            .fetch_play_history("Music", since)
            .unwrap()
            .into_iter()
            .filter(|e: &HistoryEvent| e.track == id && (9..12).contains(&e.played_at.hour()))
            .map(|e| e.played_at)
            .max()
    }

    #[test]
    fn test_playlist_invariants() {
        let library = busy_library();
        let mut config = config();
        config.playlist.max_tracks = 10;
        config.playlist.artist_cap = 0.5;

        let playlist = run(&library, &config, now()).unwrap();
        assert!(!playlist.is_empty());
        assert!(playlist.len() <= 10);

        let keys: HashSet<_> = playlist.tracks.iter().map(Track::song_key).collect();
        assert_eq!(keys.len(), playlist.len(), "no logical song repeats");
        assert!(!ids(&playlist).contains(&900), "label on the album excludes");

        let ids = playlist.track_ids();
        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn test_anchors_are_oldest_and_newest_favourites() {
        let library = busy_library();
        let playlist = run(&library, &config(), now()).unwrap();

        let anchored: Vec<(TrackId, NaiveDateTime)> = playlist
            .tracks
            .iter()
            .filter_map(|t| latest_in_period_play(&library, t.id).map(|p| (t.id, p)))
            .collect();
        assert!(anchored.len() >= 2);

        let oldest = anchored.iter().min_by_key(|(id, p)| (*p, *id)).unwrap().0;
        let newest = anchored.iter().max_by_key(|(id, p)| (*p, *id)).unwrap().0;
        assert_eq!(playlist.tracks.first().unwrap().id, oldest);
        assert_eq!(playlist.tracks.last().unwrap().id, newest);
    }

    #[test]
    fn test_generation_is_deterministic_for_a_seed() {
        let library = busy_library();
        let first = run(&library, &config(), now()).unwrap();
        let second = run(&library, &config(), now()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_previous_descriptor_is_avoided() {
        let library = busy_library();
        let map = MoodMap::from_json(r#"{"dreamy": ["Hazy", "Floating"]}"#).unwrap();
        for seed in 0..20 {
            let options = RunOptions {
                seed: Some(seed),
                previous_descriptor: Some("Hazy"),
            };
            let playlist = generate(now(), &config(), &map, &library, &options).unwrap();
            assert_eq!(playlist.descriptor, "Floating");
            assert!(playlist.title.contains("Floating"));
        }
    }

    #[test]
    fn test_playlist_metadata() {
        let playlist = run(&busy_library(), &config(), now()).unwrap();
        assert_eq!(playlist.period, "Morning");
        assert_eq!(playlist.cover.as_deref(), Some("morning.webp"));
        assert_eq!(playlist.next_update, now().date().and_hms_opt(12, 0, 0).unwrap());
        assert!(playlist.title.starts_with("Daylist for Hypnotic "));
        assert!(playlist.title.ends_with("Electronic Thursday Morning"));
        assert!(playlist.description.contains("on Thursday in the morning"));
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn test_no_history_for_period() {
        let mut library = MemoryLibrary::new();
        library
            .add_track(track(1, "Night Song", "Owl"))
            .add_play(TrackId(1), (now().date() - Duration::days(5)).and_hms_opt(21, 0, 0).unwrap());

        let err = run(&library, &config(), now()).unwrap_err();
        assert!(matches!(err, GenerateError::InsufficientHistory { ref period } if period == "Morning"));
        assert!(err.is_empty_result());
    }

    #[test]
    fn test_everything_filtered() {
        let mut library = MemoryLibrary::new();
        let mut poor = track(1, "Skip Me", "Band");
        poor.rating = Some(1);
        library.add_track(poor).add_play(TrackId(1), morning(6, 0));

        let err = run(&library, &config(), now()).unwrap_err();
        assert!(matches!(err, GenerateError::InsufficientAfterFiltering { seeds: 1, .. }));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut library = MemoryLibrary::new();
        library
            .add_track(track(1, "Known", "Band"))
            .add_play(TrackId(1), morning(6, 0));

        let mut negative_weight = config();
        negative_weight.playlist.similarity_weight = -1.0;
        let err = run(&library, &negative_weight, now()).unwrap_err();
        assert!(matches!(err, GenerateError::Library(_)));
        assert!(err.to_string().contains("similarity_weight"));

        let mut negative_penalty = config();
        negative_penalty.playlist.same_artist_penalty = -0.5;
        assert!(run(&library, &negative_penalty, now()).is_err());
    }

    #[test]
    fn test_missing_metadata_is_skipped() {
        let mut library = MemoryLibrary::new();
        library
            .add_track(track(1, "Known", "Band"))
            .add_play(TrackId(1), morning(6, 0))
            .add_play(TrackId(42), morning(7, 0));

        let playlist = run(&library, &config(), now()).unwrap();
        assert_eq!(ids(&playlist), vec![1]);
    }
}

#[cfg(test)]
mod sqlite_tests {
    use super::*;

    fn create_snapshot() -> Result<(TempDir, PathBuf)> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("library.db");

        let conn = rusqlite::Connection::open(&db_path)?;
        SqliteLibrary::create_schema(&conn)?;
        conn.execute_batch(
            "INSERT INTO tracks (id, title, artist, album, album_artist, album_subtype, rating)
             VALUES (1, 'Changa', 'Artist', 'Changa', 'Artist', 'Album', 5),
                    (2, 'Changa', 'Artist', 'Club Hits 2020', 'Various Artists', 'Compilation', NULL),
                    (3, 'Morning Dew', 'Band', 'Fields', 'Band', 'Album', NULL),
                    (4, 'Bad Take', 'Band', 'Fields', 'Band', 'Album', 1);
             INSERT INTO track_tags (track_id, kind, value) VALUES
                    (1, 'genre', 'House'), (3, 'genre', 'Folk'), (3, 'mood', 'Calm');
             INSERT INTO plays (track_id, played_at) VALUES
                    (1, '2024-06-10 09:15:00'),
                    (2, '2024-06-11 09:15:00'),
                    (3, '2024-06-12 10:45:00'),
                    (4, '2024-06-13 09:00:00'),
                    (3, '2024-06-19 22:00:00');
             INSERT INTO similar_tracks (track_id, similar_id, distance) VALUES (1, 2, 0.0);",
        )?;
        Ok((temp_dir, db_path))
    }

    #[test]
    fn test_generate_from_sqlite_snapshot() -> Result<()> {
        let (_dir, db_path) = create_snapshot()?;
        let library = SqliteLibrary::open(&db_path)?;

        let mut config = config();
        config.seasonal.collection = String::new();
        let options = RunOptions {
            seed: Some(3),
            previous_descriptor: None,
        };
        let result = generate(now(), &config, &MoodMap::default(), &library, &options);

        // Track 3 was heard last night, inside the recency window.
        let playlist = result?;
        assert_eq!(playlist.track_ids(), vec![TrackId(1)]);
        assert_eq!(playlist.tracks[0].release_type, ReleaseType::Studio);
        Ok(())
    }

    #[test]
    fn test_snapshot_is_opened_read_only() -> Result<()> {
        let (_dir, db_path) = create_snapshot()?;
        let library = SqliteLibrary::open(&db_path)?;
        assert!(library.track_metadata(TrackId(1)).is_ok());

        let conn = rusqlite::Connection::open_with_flags(
            &db_path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        )?;
        assert!(conn.execute("DELETE FROM tracks", []).is_err());
        Ok(())
    }
}

#[cfg(test)]
mod cli_tests {
    use super::*;

    fn daylist(home: &TempDir) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_daylist"));
        cmd.env("XDG_DATA_HOME", home.path().join("data"))
            .env("XDG_CONFIG_HOME", home.path().join("config"))
            .env_remove("DAYLIST_CONFIG");
        cmd
    }

    fn write_snapshot(dir: &TempDir) -> Result<PathBuf> {
        let mut snapshot = LibrarySnapshot::default();
        for i in 1..=4u64 {
            snapshot.tracks.push(track(i, &format!("Song {i}"), &format!("Artist {i}")));
            snapshot.history.push(HistoryEvent {
                track: TrackId(i),
                played_at: morning(5 + i as i64, 0),
            });
        }
        let path = dir.path().join("snapshot.json");
        std::fs::write(&path, serde_json::to_string(&snapshot)?)?;
        Ok(path)
    }

    #[test]
    fn test_cli_help_displays_correctly() {
        let home = TempDir::new().unwrap();
        let output = daylist(&home).arg("--help").output().expect("Failed to run help command");

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("daylist"));
        assert!(stdout.contains("generate"));
        assert!(stdout.contains("init-config"));
    }

    #[test]
    fn test_completion_generation() {
        let home = TempDir::new().unwrap();
        let output = daylist(&home)
            .args(["completion", "bash"])
            .output()
            .expect("Failed to run completion command");

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("_daylist"));
        assert!(stdout.contains("complete"));
    }

    #[test]
    fn test_period_command() {
        let home = TempDir::new().unwrap();
        let output = daylist(&home)
            .args(["period", "--now", "2024-06-20 23:30"])
            .output()
            .expect("Failed to run period command");

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("Late Night"));
        assert!(stdout.contains("2024-06-21 03:00"));
    }

    #[test]
    fn test_init_config_refuses_overwrite() {
        let home = TempDir::new().unwrap();
        let config_path = home.path().join("config.toml");
        let path_arg = config_path.to_string_lossy().to_string();

        let first = daylist(&home).args(["--config", &path_arg, "init-config"]).output().unwrap();
        assert!(first.status.success());
        let written = std::fs::read_to_string(&config_path).unwrap();
        assert!(Config::from_toml(&written).is_ok());

        let second = daylist(&home).args(["--config", &path_arg, "init-config"]).output().unwrap();
        assert!(!second.status.success());
    }

    #[test]
    fn test_generate_writes_playlist_json() -> Result<()> {
        let home = TempDir::new()?;
        let snapshot = write_snapshot(&home)?;
        let out = home.path().join("out").join("playlist.json");

        let output = daylist(&home)
            .args(["generate", "--now", "2024-06-20 10:00", "--seed", "5", "--library"])
            .arg(&snapshot)
            .arg("--output")
            .arg(&out)
            .output()?;
        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&out)?)?;
        assert_eq!(json["period"], "Morning");
        assert_eq!(json["tracks"].as_array().map(Vec::len), Some(4));
        assert!(home.path().join("data").join("daylist").join("state.json").exists());
        Ok(())
    }

    #[test]
    fn test_verbose_generate_keeps_stdout_json() -> Result<()> {
        let home = TempDir::new()?;
        let snapshot = write_snapshot(&home)?;

        let output = daylist(&home)
            .args(["generate", "--now", "2024-06-20 10:00", "--seed", "1", "-v", "--library"])
            .arg(&snapshot)
            .output()?;
        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

        let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
        assert_eq!(json["period"], "Morning");
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("4 tracks for Morning"));
        Ok(())
    }

    #[test]
    fn test_failed_generate_leaves_previous_output() -> Result<()> {
        let home = TempDir::new()?;
        let snapshot = write_snapshot(&home)?;
        let out = home.path().join("playlist.json");
        std::fs::write(&out, "previous")?;

        // Nobody listens at 21:00 in this snapshot.
        let output = daylist(&home)
            .args(["generate", "--now", "2024-06-20 21:00", "--library"])
            .arg(&snapshot)
            .arg("--output")
            .arg(&out)
            .output()?;
        assert!(!output.status.success());
        assert_eq!(std::fs::read_to_string(&out)?, "previous");
        Ok(())
    }
}
