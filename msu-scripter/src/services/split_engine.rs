//! Split a combined SMZ3 project into its Super Metroid and A Link to the
//! Past halves
//!
//! Derived songs point at hard links of the combined pack's PCM files, so
//! both layouts share bytes on disk. Every rewritten path is recorded in the
//! translation table that the split/combine toggle script is generated from.

use msu_common::{Error, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::file_relocator::FileRelocator;
use super::file_system::FileSystem;
use crate::models::{substitute_track_prefix, PackPaths, Project, Track};
use crate::msu_types::{TrackSchema, TrackSchemaRegistry, A_LINK_TO_THE_PAST, SUPER_METROID};

/// Derived projects plus combined → split path translations
#[derive(Debug, Default)]
pub struct SplitResult {
    pub projects: Vec<Project>,
    pub translations: BTreeMap<PathBuf, PathBuf>,
    /// Hard links that could not be created
    pub failures: Vec<(PathBuf, String)>,
}

pub struct SplitEngine<'a> {
    registry: &'a TrackSchemaRegistry,
    fs: &'a dyn FileSystem,
}

impl<'a> SplitEngine<'a> {
    pub fn new(registry: &'a TrackSchemaRegistry, fs: &'a dyn FileSystem) -> Self {
        Self { registry, fs }
    }

    /// Derive one project per constituent game
    ///
    /// Requires a combined MSU type and both destination pack paths. Nothing
    /// is derived and no file is touched when either is missing.
    pub fn split(&self, project: &Project) -> Result<SplitResult> {
        let combined = self.registry.lookup(&project.msu_type_name)?;
        if !self.registry.is_combined(&combined) {
            return Err(Error::MissingPrerequisite(format!(
                "Invalid MSU Type '{}' for splitting",
                combined.name()
            )));
        }

        let info = &project.basic_info;
        let (Some(metroid_path), Some(zelda_path)) = (
            info.metroid_msu_path.as_ref().filter(|p| !p.as_os_str().is_empty()),
            info.zelda_msu_path.as_ref().filter(|p| !p.as_os_str().is_empty()),
        ) else {
            return Err(Error::MissingPrerequisite(
                "Missing Metroid or Zelda MSU path".to_string(),
            ));
        };

        let metroid = self.registry.lookup(SUPER_METROID)?;
        let zelda = self.registry.lookup(A_LINK_TO_THE_PAST)?;
        self.split_into(project, &combined, &[(metroid, metroid_path), (zelda, zelda_path)])
    }

    /// Derive one project per `(schema, pack path)` destination
    pub fn split_into<S: AsRef<TrackSchema>>(
        &self,
        project: &Project,
        combined: &TrackSchema,
        destinations: &[(S, &PathBuf)],
    ) -> Result<SplitResult> {
        // Resolve every remap before linking anything
        let remaps = destinations
            .iter()
            .map(|(schema, _)| self.registry.remap(combined, schema.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let relocator = FileRelocator::new(self.fs);
        let old_paths = project.pack_paths();
        let mut result = SplitResult::default();

        for ((schema, msu_path), remap) in destinations.iter().zip(remaps) {
            let schema = schema.as_ref();
            let new_paths = PackPaths::from_msu_path(msu_path);
            let mut tracks = Vec::new();

            for track in &project.tracks {
                let old_number = track.track_number;
                let Some(new_number) = remap.apply(old_number).filter(|n| schema.is_valid(*n)) else {
                    continue;
                };
                let track_name = schema
                    .track(new_number)
                    .map(|t| t.name.clone())
                    .unwrap_or_else(|| track.track_name.clone());

                if track.songs.len() > 1 {
                    result.translations.insert(
                        old_paths.original_marker_path(old_number),
                        old_paths.dir.join(format!(
                            "{}_Original.pcm",
                            new_paths.track_prefix(new_number)
                        )),
                    );
                }

                let mut new_track = Track::new(new_number, track_name.clone());
                for song in &track.songs {
                    let new_path = substitute_track_prefix(
                        &song.output_path,
                        &old_paths.base,
                        old_number,
                        &new_paths.base,
                        new_number,
                    )
                    .unwrap_or_else(|| song.output_path.clone());

                    if new_path != song.output_path {
                        result
                            .translations
                            .insert(song.output_path.clone(), new_path.clone());
                        self.link(&relocator, &song.output_path, &new_path, &mut result);
                    } else {
                        debug!(
                            file = %song.output_path.display(),
                            "Song file does not follow the pack naming, not linked"
                        );
                    }

                    new_track
                        .songs
                        .push(song.reassigned(new_number, &track_name, new_path));
                }
                tracks.push(new_track);
            }

            info!(
                msu_type = %schema.name(),
                msu = %msu_path.display(),
                tracks = tracks.len(),
                "Derived split project"
            );

            let mut basic_info = project.basic_info.clone();
            basic_info.msu_type = Some(schema.name().to_string());
            basic_info.is_smz3_project = false;
            basic_info.create_split_smz3_script = false;

            result.projects.push(Project {
                project_file_path: PathBuf::new(),
                msu_path: msu_path.to_path_buf(),
                msu_type_name: schema.name().to_string(),
                last_save_time: None,
                backup_file_path: None,
                basic_info,
                tracks,
            });
        }

        Ok(result)
    }

    fn link(&self, relocator: &FileRelocator<'_>, source: &Path, dest: &Path, result: &mut SplitResult) {
        if self.fs.is_file(dest) || !self.fs.is_file(source) {
            return;
        }
        if let Err(e) = relocator.link(source, dest) {
            warn!(file = %dest.display(), error = %e, "Could not create hard link");
            result.failures.push((dest.to_path_buf(), e.to_string()));
        }
    }
}
