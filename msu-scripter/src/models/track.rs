//! Tracks, songs, and the PCM output-path convention
//!
//! Output files live next to the `.msu` pack file:
//! - primary song: `<packBase>-<trackNumber>.pcm`
//! - first alternate: `<packBase>-<trackNumber>_alt.pcm`
//! - further alternates: `<packBase>-<trackNumber>_alt<N>.pcm` (N ≥ 2)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use super::render_spec::RenderSpec;

/// Directory and base name of a pack, used to derive PCM paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackPaths {
    pub dir: PathBuf,
    pub base: String,
}

impl PackPaths {
    /// Split `…/Foo.msu` into (`…`, `Foo`)
    pub fn from_msu_path(msu_path: &Path) -> Self {
        let dir = msu_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let base = msu_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { dir, base }
    }

    /// `<base>-<number>`, the prefix every PCM of the track starts with
    pub fn track_prefix(&self, track_number: u32) -> String {
        format!("{}-{}", self.base, track_number)
    }

    /// Output path for the song at `alt_index` (0 = primary)
    pub fn song_path(&self, track_number: u32, alt_index: usize) -> PathBuf {
        let prefix = self.track_prefix(track_number);
        let name = match alt_index {
            0 => format!("{}.pcm", prefix),
            1 => format!("{}_alt.pcm", prefix),
            n => format!("{}_alt{}.pcm", prefix, n),
        };
        self.dir.join(name)
    }

    /// Parking spot for the primary PCM while an alternate is swapped in
    pub fn original_marker_path(&self, track_number: u32) -> PathBuf {
        self.dir
            .join(format!("{}_Original.pcm", self.track_prefix(track_number)))
    }
}

/// Rewrite `<oldBase>-<oldNumber><rest>` to `<newBase>-<newNumber><rest>`
///
/// Only the file name is rewritten; the directory is kept. Returns `None`
/// when the file name does not start with the old prefix, or when the
/// prefix is followed by another digit (`Foo-1` must not match `Foo-10.pcm`).
pub fn substitute_track_prefix(
    path: &Path,
    old_base: &str,
    old_number: u32,
    new_base: &str,
    new_number: u32,
) -> Option<PathBuf> {
    let file_name = path.file_name()?.to_str()?;
    let old_prefix = format!("{}-{}", old_base, old_number);
    let rest = file_name.strip_prefix(&old_prefix)?;
    if rest.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    let new_name = format!("{}-{}{}", new_base, new_number, rest);
    Some(match path.parent() {
        Some(parent) => parent.join(new_name),
        None => PathBuf::from(new_name),
    })
}

/// One audio assignment to a track
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Song {
    pub track_number: u32,
    pub track_name: String,
    pub song_name: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub url: Option<String>,
    pub output_path: PathBuf,
    pub is_alt: bool,
    #[serde(rename = "MsuPcmInfo", skip_serializing_if = "Option::is_none")]
    pub render_spec: Option<RenderSpec>,
}

impl Song {
    /// Copy of this song reassigned to another track slot and output file
    ///
    /// Every metadata field is carried over explicitly.
    pub fn reassigned(&self, track_number: u32, track_name: &str, output_path: PathBuf) -> Song {
        Song {
            track_number,
            track_name: track_name.to_string(),
            song_name: self.song_name.clone(),
            artist: self.artist.clone(),
            album: self.album.clone(),
            url: self.url.clone(),
            output_path,
            is_alt: self.is_alt,
            render_spec: self.render_spec.clone(),
        }
    }
}

/// A numbered slot of the MSU type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Track {
    pub track_number: u32,
    pub track_name: String,
    pub songs: Vec<Song>,
}

impl Track {
    pub fn new(track_number: u32, track_name: impl Into<String>) -> Self {
        Self {
            track_number,
            track_name: track_name.into(),
            songs: Vec::new(),
        }
    }

    pub fn primary(&self) -> Option<&Song> {
        self.songs.iter().find(|s| !s.is_alt)
    }

    pub fn alts(&self) -> impl Iterator<Item = &Song> {
        self.songs.iter().filter(|s| s.is_alt)
    }

    /// Songs with the primary first and alternates in their current order
    pub fn songs_primary_first_mut(&mut self) -> Vec<&mut Song> {
        let mut songs: Vec<&mut Song> = self.songs.iter_mut().collect();
        songs.sort_by_key(|s| s.is_alt);
        songs
    }

    /// Append a song, demoting it to an alternate if a primary already exists
    pub fn push_song(&mut self, mut song: Song) {
        if !song.is_alt && self.primary().is_some() {
            warn!(
                track = self.track_number,
                path = %song.output_path.display(),
                "Track already has a primary song, adding as alternate"
            );
            song.is_alt = true;
        }
        self.songs.push(song);
    }

    pub fn has_song_at(&self, path: &Path) -> bool {
        self.songs.iter().any(|s| s.output_path == path)
    }
}
