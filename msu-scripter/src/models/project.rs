//! MSU project: the root aggregate persisted to the project file

use chrono::{DateTime, Utc};
use msu_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::track::{PackPaths, Song, Track};
use crate::msu_types::TrackSchema;

/// Pack-level metadata and feature flags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BasicInfo {
    pub msu_type: Option<String>,
    pub game: Option<String>,
    pub pack_name: Option<String>,
    pub pack_creator: Option<String>,
    pub pack_version: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub url: Option<String>,
    pub normalization: Option<f64>,
    pub dither: Option<bool>,
    pub is_msu_pcm_project: bool,
    pub is_smz3_project: bool,
    pub create_split_smz3_script: bool,
    pub create_alt_swapper: bool,
    /// Destination pack for the Super Metroid half of a combined pack
    pub metroid_msu_path: Option<PathBuf>,
    /// Destination pack for the A Link to the Past half of a combined pack
    pub zelda_msu_path: Option<PathBuf>,
}

/// An MSU project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Project {
    pub project_file_path: PathBuf,
    pub msu_path: PathBuf,
    pub msu_type_name: String,
    pub last_save_time: Option<DateTime<Utc>>,
    pub backup_file_path: Option<PathBuf>,
    pub basic_info: BasicInfo,
    pub tracks: Vec<Track>,
}

impl Project {
    pub fn pack_paths(&self) -> PackPaths {
        PackPaths::from_msu_path(&self.msu_path)
    }

    pub fn track(&self, number: u32) -> Option<&Track> {
        self.tracks.iter().find(|t| t.track_number == number)
    }

    pub fn track_mut(&mut self, number: u32) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.track_number == number)
    }

    pub fn songs(&self) -> impl Iterator<Item = &Song> {
        self.tracks.iter().flat_map(|t| t.songs.iter())
    }

    pub fn song_count(&self) -> usize {
        self.tracks.iter().map(|t| t.songs.len()).sum()
    }

    pub fn pack_dir(&self) -> &Path {
        self.msu_path.parent().unwrap_or_else(|| Path::new(""))
    }

    /// Check the structural invariants against the project's MSU type
    ///
    /// - every track number is valid for the MSU type
    /// - track numbers are unique
    /// - at most one primary song per track
    pub fn validate(&self, schema: &TrackSchema) -> Result<()> {
        if schema.name() != self.msu_type_name {
            return Err(Error::InvalidInput(format!(
                "Project MSU type '{}' does not match '{}'",
                self.msu_type_name,
                schema.name()
            )));
        }

        let mut seen = HashSet::new();
        for track in &self.tracks {
            if !schema.is_valid(track.track_number) {
                return Err(Error::InvalidInput(format!(
                    "Track {} is not valid for MSU type '{}'",
                    track.track_number,
                    schema.name()
                )));
            }
            if !seen.insert(track.track_number) {
                return Err(Error::InvalidInput(format!(
                    "Track {} appears more than once",
                    track.track_number
                )));
            }
            if track.songs.iter().filter(|s| !s.is_alt).count() > 1 {
                return Err(Error::InvalidInput(format!(
                    "Track {} has more than one primary song",
                    track.track_number
                )));
            }
        }
        Ok(())
    }
}
