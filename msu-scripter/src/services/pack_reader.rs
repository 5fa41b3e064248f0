//! Reading existing MSU packs from disk
//!
//! A pack is a `<base>.msu` file with PCM files next to it named by the
//! output-path convention, optionally described by a `<base>.yml` MSU
//! details document.

use msu_common::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::models::{absolute_path, MsuDetails, MsuDetailsTrack, PackPaths};
use crate::msu_types::TrackSchema;

/// One PCM embedded in a pack
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddedTrack {
    pub number: u32,
    pub track_name: String,
    pub song_name: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub url: Option<String>,
    pub path: PathBuf,
    pub is_alt: bool,
    /// Entry reuses another track's PCM
    pub is_copied: bool,
}

/// Everything a reader found about a pack
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackContents {
    /// MSU type declared by the pack, if any
    pub msu_type: Option<String>,
    pub name: Option<String>,
    pub creator: Option<String>,
    pub version: Option<String>,
    pub tracks: Vec<EmbeddedTrack>,
}

pub trait PackReader: Send + Sync {
    /// Contents of the pack at `msu_path`, or `None` when there is no pack
    fn read_pack(&self, msu_path: &Path, schema: &TrackSchema) -> Result<Option<PackContents>>;
}

/// Split `<base>-<n>[_alt[k]].pcm` into (n, alt index)
pub fn parse_pcm_name(base: &str, file_name: &str) -> Option<(u32, usize)> {
    let rest = file_name.strip_prefix(base)?.strip_prefix('-')?;
    let stem = rest.strip_suffix(".pcm")?;
    let digits_end = stem
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(stem.len());
    let number: u32 = stem[..digits_end].parse().ok()?;
    match &stem[digits_end..] {
        "" => Some((number, 0)),
        "_alt" => Some((number, 1)),
        suffix => {
            let k: usize = suffix.strip_prefix("_alt")?.parse().ok()?;
            (k >= 1).then_some((number, k))
        }
    }
}

/// Scans the pack directory and its details document
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryPackReader;

impl DirectoryPackReader {
    fn read_details(path: &Path) -> Result<Option<MsuDetails>> {
        if !path.is_file() {
            return Ok(None);
        }
        let yaml = std::fs::read_to_string(path).map_err(|e| Error::file_system(path, e))?;
        let details = serde_yaml::from_str(&yaml)
            .map_err(|e| Error::Serialization(format!("{}: {}", path.display(), e)))?;
        Ok(Some(details))
    }
}

impl PackReader for DirectoryPackReader {
    fn read_pack(&self, msu_path: &Path, schema: &TrackSchema) -> Result<Option<PackContents>> {
        if !msu_path.is_file() {
            return Ok(None);
        }

        let paths = PackPaths::from_msu_path(msu_path);
        let details_path = msu_path.with_extension("yml");
        let details = Self::read_details(&details_path)?.unwrap_or_default();

        // Metadata keyed by the PCM path each details entry describes
        let mut described: HashMap<PathBuf, (u32, &MsuDetailsTrack)> = HashMap::new();
        for (key, entry) in &details.tracks {
            let Some(number) = schema
                .track_by_alias(key)
                .map(|t| t.number)
                .or(entry.track_number)
                .filter(|n| schema.is_valid(*n))
            else {
                debug!(key = %key, "Details entry matches no track");
                continue;
            };
            for (index, song) in entry.with_alts().enumerate() {
                let path = match &song.path {
                    Some(p) => absolute_path(&paths.dir, p),
                    None => paths.song_path(number, index),
                };
                described.insert(path, (number, song));
            }
        }

        let mut contents = PackContents {
            msu_type: details.msu_type.clone(),
            name: details.pack_name.clone(),
            creator: details.pack_author.clone(),
            version: details.pack_version.clone(),
            tracks: Vec::new(),
        };

        let mut found: Vec<(u32, usize, PathBuf)> = WalkDir::new(&paths.dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let name = e.file_name().to_str()?;
                let (number, alt) = parse_pcm_name(&paths.base, name)?;
                schema
                    .is_valid(number)
                    .then(|| (number, alt, e.path().to_path_buf()))
            })
            .collect();
        found.sort();

        for (number, alt, path) in found {
            let entry = described.remove(&path).map(|(_, song)| song);
            contents.tracks.push(embedded(schema, number, alt != 0, path, entry, &details, false));
        }

        // Remaining entries point at files belonging to other tracks
        let mut copies: Vec<_> = described
            .into_iter()
            .filter(|(path, _)| path.is_file())
            .collect();
        copies.sort_by(|a, b| a.0.cmp(&b.0));
        for (path, (number, song)) in copies {
            contents.tracks.push(embedded(schema, number, true, path, Some(song), &details, true));
        }

        info!(
            msu = %msu_path.display(),
            tracks = contents.tracks.len(),
            has_details = !details.tracks.is_empty(),
            "Read MSU pack"
        );
        Ok(Some(contents))
    }
}

fn embedded(
    schema: &TrackSchema,
    number: u32,
    is_alt: bool,
    path: PathBuf,
    entry: Option<&MsuDetailsTrack>,
    details: &MsuDetails,
    is_copied: bool,
) -> EmbeddedTrack {
    let track_name = schema
        .track(number)
        .map(|t| t.name.clone())
        .unwrap_or_default();
    EmbeddedTrack {
        number,
        track_name,
        song_name: entry.and_then(|e| e.name.clone()),
        artist: entry.and_then(|e| e.artist.clone()).or_else(|| details.artist.clone()),
        album: entry.and_then(|e| e.album.clone()).or_else(|| details.album.clone()),
        url: entry.and_then(|e| e.url.clone()).or_else(|| details.url.clone()),
        path,
        is_alt,
        is_copied,
    }
}
