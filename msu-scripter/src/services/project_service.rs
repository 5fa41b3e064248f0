//! Project lifecycle: create, load, save, and enrich from existing packs
//!
//! Collaborators (schema registry, file system, pack reader, tag reader) are
//! passed in at construction; nothing here reaches for global state.

use chrono::Utc;
use msu_common::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::file_system::FileSystem;
use super::metadata_extractor::TagReader;
use super::pack_reader::{EmbeddedTrack, PackContents, PackReader};
use super::render_config::{self, ImportReport, RenderConfigImporter};
use super::type_converter::TypeConverter;
use crate::models::{MsuDetails, MsuDetailsTrack, Project, Song, Track};
use crate::msu_types::TrackSchemaRegistry;

pub struct ProjectService {
    registry: Arc<TrackSchemaRegistry>,
    fs: Arc<dyn FileSystem>,
    packs: Arc<dyn PackReader>,
    tags: Arc<dyn TagReader>,
}

impl ProjectService {
    pub fn new(
        registry: Arc<TrackSchemaRegistry>,
        fs: Arc<dyn FileSystem>,
        packs: Arc<dyn PackReader>,
        tags: Arc<dyn TagReader>,
    ) -> Self {
        Self {
            registry,
            fs,
            packs,
            tags,
        }
    }

    /// Load a project file; unknown keys are ignored
    ///
    /// Fails with `InvalidInput` when the tracks break the MSU type's
    /// numbering or a track holds more than one primary song.
    pub fn load(&self, path: &Path) -> Result<Project> {
        if !self.fs.is_file(path) {
            return Err(Error::NotFound(format!("Project {}", path.display())));
        }
        let yaml = self.fs.read_to_string(path)?;
        let mut project: Project = serde_yaml::from_str(&yaml)
            .map_err(|e| Error::Serialization(format!("{}: {}", path.display(), e)))?;
        project.project_file_path = path.to_path_buf();

        let schema = self.registry.lookup(&project.msu_type_name)?;
        project.validate(&schema)?;
        if self.registry.is_combined(&schema) {
            project.basic_info.is_smz3_project = true;
        }

        info!(
            project = %path.display(),
            msu_type = %schema.name(),
            tracks = project.tracks.len(),
            "Loaded project"
        );
        Ok(project)
    }

    /// Stamp the save time and write to the project's own path
    pub fn save(&self, project: &mut Project) -> Result<()> {
        project.last_save_time = Some(Utc::now());
        let target = project.project_file_path.clone();
        self.write_project(project, &target)?;
        info!(project = %target.display(), "Saved project");
        Ok(())
    }

    /// Write a copy to the backup path, when one is configured
    pub fn save_backup(&self, project: &Project) -> Result<Option<PathBuf>> {
        let Some(backup) = project.backup_file_path.clone() else {
            return Ok(None);
        };
        self.write_project(project, &backup)?;
        debug!(backup = %backup.display(), "Saved project backup");
        Ok(Some(backup))
    }

    fn write_project(&self, project: &Project, target: &Path) -> Result<()> {
        if target.as_os_str().is_empty() {
            return Err(Error::InvalidInput("Project has no file path".to_string()));
        }
        let yaml = serde_yaml::to_string(project)
            .map_err(|e| Error::Serialization(e.to_string()))?;

        let mut temp = target.as_os_str().to_owned();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);
        self.fs.write(&temp, yaml.as_bytes())?;
        self.fs.rename(&temp, target)
    }

    /// Create and save a project with one empty track per schema track
    ///
    /// Imports the pack at `msu_path` when it exists and the renderer config
    /// when given. `working_dir` defaults to the config's directory.
    pub fn new_project(
        &self,
        project_path: &Path,
        msu_type_name: &str,
        msu_path: &Path,
        renderer_config: Option<&Path>,
        working_dir: Option<&Path>,
    ) -> Result<Project> {
        let schema = self.registry.lookup(msu_type_name)?;

        let mut project = Project {
            project_file_path: project_path.to_path_buf(),
            msu_path: msu_path.to_path_buf(),
            msu_type_name: schema.name().to_string(),
            tracks: schema
                .tracks()
                .map(|t| Track::new(t.number, t.name.clone()))
                .collect(),
            ..Default::default()
        };
        project.basic_info.msu_type = Some(schema.name().to_string());
        project.basic_info.game = Some(schema.name().to_string());

        if self.fs.is_file(msu_path) {
            self.import_pack(&mut project, msu_path)?;
        }

        if let Some(config) = renderer_config {
            if self.fs.is_file(config) {
                let dir = working_dir
                    .map(Path::to_path_buf)
                    .or_else(|| config.parent().map(Path::to_path_buf))
                    .unwrap_or_default();
                self.import_render_config(&mut project, config, &dir, false)?;
            } else {
                warn!(config = %config.display(), "Renderer config not found, skipping import");
            }
        }

        if self.registry.is_combined(&schema) {
            project.basic_info.is_smz3_project = true;
            project.basic_info.create_split_smz3_script = true;
        }

        self.save(&mut project)?;
        Ok(project)
    }

    /// Seed songs from an existing pack
    ///
    /// Returns false when there is no pack to read.
    pub fn import_pack(&self, project: &mut Project, msu_path: &Path) -> Result<bool> {
        let schema = self.registry.lookup(&project.msu_type_name)?;
        let Some(mut pack) = self.packs.read_pack(msu_path, &schema)? else {
            return Ok(false);
        };

        if let Some(pack_type) = pack.msu_type.as_deref().and_then(|n| self.registry.get(n)) {
            if pack_type.name() != schema.name()
                && self.registry.are_compatible(&schema, &pack_type)
            {
                info!(
                    from = %schema.name(),
                    to = %pack_type.name(),
                    "Pack uses another MSU type, converting project"
                );
                TypeConverter::new(&self.registry, &*self.fs).convert(project, &pack_type, false)?;
                // Track numbers in the pack follow its own MSU type
                if let Some(reread) = self.packs.read_pack(msu_path, &pack_type)? {
                    pack = reread;
                }
            }
        }

        apply_pack(project, &pack);
        Ok(true)
    }

    /// Attach a renderer config's render specs to the project's songs
    pub fn import_render_config(
        &self,
        project: &mut Project,
        config_path: &Path,
        working_dir: &Path,
        force: bool,
    ) -> Result<ImportReport> {
        let config = render_config::load_config(config_path)?;
        Ok(RenderConfigImporter::new(&*self.tags).import(project, &config, working_dir, force))
    }

    /// Delete every song's PCM; returns how many were removed
    pub fn remove_pcms(&self, project: &Project) -> usize {
        let mut removed = 0;
        for song in project.songs() {
            if !self.fs.is_file(&song.output_path) {
                continue;
            }
            match self.fs.remove_file(&song.output_path) {
                Ok(()) => removed += 1,
                Err(e) => warn!(file = %song.output_path.display(), error = %e, "Could not delete PCM"),
            }
        }
        info!(removed, "Removed project PCM files");
        removed
    }

    /// Write `<packBase>.yml` next to the pack
    pub fn export_msu_details(&self, project: &Project) -> Result<PathBuf> {
        let details = self.msu_details(project)?;
        let yaml = serde_yaml::to_string(&details)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        let path = project.msu_path.with_extension("yml");
        self.fs.write(&path, yaml.as_bytes())?;
        info!(details = %path.display(), tracks = details.tracks.len(), "Exported MSU details");
        Ok(path)
    }

    /// MSU details document describing the project
    pub fn msu_details(&self, project: &Project) -> Result<MsuDetails> {
        let schema = self.registry.lookup(&project.msu_type_name)?;
        let paths = project.pack_paths();
        let info = &project.basic_info;
        let folder_name = paths
            .dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());

        let mut details = MsuDetails {
            pack_name: info.pack_name.clone().or(folder_name),
            pack_author: info.pack_creator.clone(),
            pack_version: info.pack_version.clone(),
            msu_type: Some(schema.name().to_string()),
            artist: info.artist.clone(),
            album: info.album.clone(),
            url: info.url.clone(),
            ..Default::default()
        };

        for track in &project.tracks {
            let mut songs: Vec<&Song> = track.songs.iter().collect();
            songs.sort_by_key(|s| s.is_alt);
            let mut entries = songs.into_iter().map(|song| MsuDetailsTrack {
                track_number: Some(track.track_number),
                name: song.song_name.clone(),
                artist: song.artist.clone(),
                album: song.album.clone(),
                url: song.url.clone(),
                path: Some(
                    song.output_path
                        .strip_prefix(&paths.dir)
                        .unwrap_or(&song.output_path)
                        .to_path_buf(),
                ),
                ..Default::default()
            });
            let Some(mut entry) = entries.next() else {
                continue;
            };
            entry.alts = entries.collect();

            let key = schema
                .track(track.track_number)
                .and_then(|t| t.primary_alias())
                .map(str::to_string)
                .unwrap_or_else(|| track.track_number.to_string());
            details.tracks.insert(key, entry);
        }
        Ok(details)
    }
}

/// Copy pack metadata and add songs for embedded PCMs not yet in the project
fn apply_pack(project: &mut Project, pack: &PackContents) {
    let info = &mut project.basic_info;
    info.pack_name = pack.name.clone();
    info.pack_creator = pack.creator.clone();
    info.pack_version = pack.version.clone();

    if let Some(value) = agreed(pack, |t| &t.artist) {
        info.artist = value;
    }
    if let Some(value) = agreed(pack, |t| &t.album) {
        info.album = value;
    }
    if let Some(value) = agreed(pack, |t| &t.url) {
        info.url = value;
    }

    let mut added = 0;
    for embedded in pack.tracks.iter().filter(|t| !t.is_copied) {
        let Some(track) = project.track_mut(embedded.number) else {
            continue;
        };
        if track.has_song_at(&embedded.path) {
            continue;
        }
        track.push_song(Song {
            track_number: embedded.number,
            track_name: embedded.track_name.clone(),
            song_name: embedded.song_name.clone(),
            artist: embedded.artist.clone(),
            album: embedded.album.clone(),
            url: embedded.url.clone(),
            output_path: embedded.path.clone(),
            is_alt: embedded.is_alt,
            render_spec: None,
        });
        added += 1;
    }
    info!(songs = added, "Imported songs from pack");
}

/// The value every embedded track shares, if they all agree
fn agreed<F>(pack: &PackContents, field: F) -> Option<Option<String>>
where
    F: Fn(&EmbeddedTrack) -> &Option<String>,
{
    let mut values = pack.tracks.iter().map(&field);
    let first = values.next()?;
    values.all(|v| v == first).then(|| first.clone())
}
