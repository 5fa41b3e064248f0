//! Audio tag reading for song metadata seeding
//!
//! Extracts title, artist, album and url (stored in the comment tag) from
//! source audio files using lofty.

use lofty::file::TaggedFileExt;
use lofty::prelude::*;
use lofty::probe::Probe;
use std::path::Path;
use thiserror::Error;

/// Tag reading errors
#[derive(Debug, Error)]
pub enum MetadataError {
    /// lofty could not open or parse the file
    #[error("Failed to read file: {0}")]
    ReadError(String),

    /// I/O error (file read)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Display metadata found in a file's tags
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioTags {
    pub song_name: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub url: Option<String>,
}

impl AudioTags {
    pub fn has_data(&self) -> bool {
        self.song_name.is_some() || self.artist.is_some() || self.album.is_some() || self.url.is_some()
    }
}

/// Source of audio tags for render-config import
pub trait TagReader: Send + Sync {
    fn read_tags(&self, path: &Path) -> Result<AudioTags, MetadataError>;
}

/// lofty backed tag reader
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataExtractor;

impl MetadataExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl TagReader for MetadataExtractor {
    fn read_tags(&self, path: &Path) -> Result<AudioTags, MetadataError> {
        if !path.is_file() {
            return Err(MetadataError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )));
        }

        let tagged_file = Probe::open(path)
            .map_err(|e| MetadataError::ReadError(e.to_string()))?
            .read()
            .map_err(|e| MetadataError::ReadError(e.to_string()))?;

        let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) else {
            tracing::debug!(file = %path.display(), "No tags found");
            return Ok(AudioTags::default());
        };

        let non_empty = |value: Option<std::borrow::Cow<'_, str>>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let tags = AudioTags {
            song_name: non_empty(tag.title()),
            artist: non_empty(tag.artist()),
            album: non_empty(tag.album()),
            url: non_empty(tag.comment()),
        };

        tracing::debug!(
            file = %path.display(),
            title = ?tags.song_name,
            artist = ?tags.artist,
            "Read audio tags"
        );
        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let result = MetadataExtractor::new().read_tags(&dir.path().join("missing.mp3"));
        assert!(matches!(result, Err(MetadataError::IoError(_))));
    }

    #[test]
    fn test_unrecognized_file_is_read_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"not audio").unwrap();
        let result = MetadataExtractor::new().read_tags(&path);
        assert!(matches!(result, Err(MetadataError::ReadError(_))));
    }

    #[test]
    fn test_has_data() {
        assert!(!AudioTags::default().has_data());
        let tags = AudioTags {
            artist: Some("Koji Kondo".to_string()),
            ..Default::default()
        };
        assert!(tags.has_data());
    }
}
