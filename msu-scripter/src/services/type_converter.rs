//! MSU type conversion engine
//!
//! Renumbers a project's tracks for another MSU type, rewrites song output
//! paths to the new numbers, and optionally relocates the PCM files on disk.
//! Schema compatibility and the remap are resolved before anything is
//! touched, so a rejected conversion leaves both project and disk unchanged.
//! Once relocation starts, failures are per file and are not rolled back.

use msu_common::{Error, EventBus, Result};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::file_relocator::FileRelocator;
use super::file_system::FileSystem;
use crate::models::{substitute_track_prefix, Project, Song, Track};
use crate::msu_types::{TrackSchema, TrackSchemaRegistry};

/// What a conversion did beyond renumbering
#[derive(Debug, Default)]
pub struct ConversionReport {
    /// Source track numbers with no destination track
    pub dropped_tracks: Vec<u32>,
    /// Songs whose output file did not belong to their track
    pub skipped_songs: Vec<PathBuf>,
    pub swapped_files: usize,
    pub moved_files: usize,
    /// Relocations that failed; the project still records the new paths
    pub failures: Vec<(PathBuf, String)>,
}

pub struct TypeConverter<'a> {
    registry: &'a TrackSchemaRegistry,
    fs: &'a dyn FileSystem,
    events: Option<&'a EventBus>,
}

impl<'a> TypeConverter<'a> {
    pub fn new(registry: &'a TrackSchemaRegistry, fs: &'a dyn FileSystem) -> Self {
        Self {
            registry,
            fs,
            events: None,
        }
    }

    pub fn with_events(mut self, events: &'a EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Convert `project` to `destination` numbering
    pub fn convert(
        &self,
        project: &mut Project,
        destination: &TrackSchema,
        swap_files: bool,
    ) -> Result<ConversionReport> {
        let source = self.registry.lookup(&project.msu_type_name)?;
        if !self.registry.are_compatible(&source, destination) {
            return Err(Error::IncompatibleSchema {
                from: source.name().to_string(),
                to: destination.name().to_string(),
            });
        }
        let remap = self.registry.remap(&source, destination)?;

        info!(
            from = %source.name(),
            to = %destination.name(),
            tracks = project.tracks.len(),
            swap_files,
            "Converting project MSU type"
        );

        let base = project.pack_paths().base;
        let mut relocator = FileRelocator::new(self.fs);
        if let Some(events) = self.events {
            relocator = relocator.with_events(events);
        }

        let mut report = ConversionReport::default();
        let mut relocated: HashSet<PathBuf> = HashSet::new();
        let mut new_tracks: Vec<Track> = Vec::with_capacity(project.tracks.len());

        for old_track in std::mem::take(&mut project.tracks) {
            let old_number = old_track.track_number;
            let Some(new_number) = remap.apply(old_number) else {
                debug!(track = old_number, "No destination track number, dropping");
                report.dropped_tracks.push(old_number);
                continue;
            };

            if new_number == old_number {
                new_tracks.push(old_track);
                continue;
            }

            let Some(definition) = destination.track(new_number) else {
                debug!(
                    track = old_number,
                    new_track = new_number,
                    "Destination MSU type has no such track, dropping"
                );
                report.dropped_tracks.push(old_number);
                continue;
            };

            let mut new_track = Track::new(new_number, definition.name.clone());
            for old_song in &old_track.songs {
                let Some(new_path) =
                    substitute_track_prefix(&old_song.output_path, &base, old_number, &base, new_number)
                else {
                    warn!(
                        track = old_number,
                        file = %old_song.output_path.display(),
                        "Song file does not belong to track, skipping"
                    );
                    report.skipped_songs.push(old_song.output_path.clone());
                    continue;
                };

                let new_song = old_song.reassigned(new_number, &definition.name, new_path);
                if swap_files {
                    self.relocate(&relocator, old_song, &new_song, &mut relocated, &mut report);
                }
                new_track.songs.push(new_song);
            }
            new_tracks.push(new_track);
        }

        // Two source tracks can land on one destination number; keep the first
        let mut seen = HashSet::new();
        new_tracks.retain(|track| {
            let first = seen.insert(track.track_number);
            if !first {
                warn!(track = track.track_number, "Duplicate destination track, dropping");
            }
            first
        });
        new_tracks.sort_by_key(|t| t.track_number);

        project.tracks = new_tracks;
        project.msu_type_name = destination.name().to_string();
        project.basic_info.msu_type = Some(destination.name().to_string());
        project.basic_info.is_smz3_project = self.registry.is_combined(destination);

        info!(
            to = %destination.name(),
            dropped = report.dropped_tracks.len(),
            skipped = report.skipped_songs.len(),
            swapped = report.swapped_files,
            moved = report.moved_files,
            failed = report.failures.len(),
            "Project conversion complete"
        );
        Ok(report)
    }

    /// Swap or move one song's file; every path already touched is final
    fn relocate(
        &self,
        relocator: &FileRelocator<'_>,
        old_song: &Song,
        new_song: &Song,
        relocated: &mut HashSet<PathBuf>,
        report: &mut ConversionReport,
    ) {
        let old = &old_song.output_path;
        let new = &new_song.output_path;
        if relocated.contains(old) || relocated.contains(new) || !self.fs.is_file(old) {
            return;
        }

        let result = if self.fs.is_file(new) {
            relocator.swap(old, new).map(|_| report.swapped_files += 1)
        } else {
            relocator.move_file(old, new).map(|_| report.moved_files += 1)
        };
        match result {
            Ok(()) => {
                relocated.insert(old.clone());
                relocated.insert(new.clone());
            }
            Err(e) => {
                warn!(file = %old.display(), error = %e, "Could not relocate PCM file");
                report.failures.push((old.clone(), e.to_string()));
            }
        }
    }
}
