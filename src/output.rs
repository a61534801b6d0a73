//! Publishing a generated playlist and remembering what the last run chose.
//!
//! Files are written through a temporary file in the target directory and
//! renamed into place, so a failed run never leaves a half-written playlist
//! behind.

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use crate::generator::Playlist;

/// Replace `path` with `contents` atomically.
///
/// # Errors
///
/// Returns an error if the temporary file cannot be written or renamed.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    tmp.write_all(contents)
        .context("Failed to write temporary file")?;
    tmp.as_file().sync_all().context("Failed to flush temporary file")?;
    tmp.persist(path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    debug!("Wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}

/// # Errors
///
/// Returns an error if the playlist cannot be serialized.
pub fn playlist_json(playlist: &Playlist) -> Result<String> {
    serde_json::to_string_pretty(playlist).context("Failed to serialize playlist")
}

/// # Errors
///
/// Returns an error if serialization or the atomic write fails.
pub fn write_playlist(path: &Path, playlist: &Playlist) -> Result<()> {
    let mut json = playlist_json(playlist)?;
    json.push('\n');
    write_atomic(path, json.as_bytes())
}

/// State carried from one run to the next.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    #[serde(default)]
    pub last_descriptor: Option<String>,
    #[serde(default)]
    pub last_period: Option<String>,
}

impl RunState {
    /// Missing or unreadable state is treated as a first run.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let Ok(raw) = fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(e) => {
                warn!("Ignoring unreadable run state {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// # Errors
    ///
    /// Returns an error if the state file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize run state")?;
        write_atomic(path, json.as_bytes())
    }

    #[must_use]
    pub fn after(playlist: &Playlist) -> Self {
        Self {
            last_descriptor: Some(playlist.descriptor.clone()),
            last_period: Some(playlist.period.clone()),
        }
    }
}
