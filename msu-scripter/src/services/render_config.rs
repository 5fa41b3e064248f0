//! Render-tree import and export for the external renderer configuration
//!
//! Import flattens each config track into an ordered list of [`RenderSpec`]s
//! and matches them by position to the project's songs (primary first).
//! Export rebuilds config nodes from render specs; the node variant comes
//! from the caller's nesting context.

use msu_common::{Error, Result};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

use super::metadata_extractor::{AudioTags, TagReader};
use crate::models::{
    absolute_path, ConfigNode, ConfigSubChannel, ConfigSubTrack, ConfigTrack, MsuPcmConfig,
    NodeFields, NodeRole, Project, RenderChildren, RenderSpec, Song,
};

/// Counts of what an import touched
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub updated_songs: usize,
    pub created_songs: usize,
    /// Config track numbers with no matching project track
    pub unknown_tracks: Vec<u32>,
}

/// Read a renderer config document from disk
pub fn load_config(path: &Path) -> Result<MsuPcmConfig> {
    if !path.is_file() {
        return Err(Error::NotFound(format!("Renderer config {}", path.display())));
    }
    let json = std::fs::read_to_string(path).map_err(|e| Error::file_system(path, e))?;
    Ok(serde_json::from_str(&json)?)
}

/// Write a renderer config document
pub fn save_config(config: &MsuPcmConfig, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json).map_err(|e| Error::file_system(path, e))?;
    info!(path = %path.display(), tracks = config.tracks.len(), "Wrote renderer config");
    Ok(())
}

/// Flatten one config track into render specs, in-use option first
///
/// A track with options yields one spec per option; shared fields set on
/// the track fill the option's unset fields. A track without options yields
/// exactly one spec. Relative file references resolve against `root`.
pub fn flatten_track(track: &ConfigTrack, root: &Path) -> Vec<RenderSpec> {
    if track.options.is_empty() {
        let children = children_of(&track.sub_channels, &track.sub_tracks, root);
        return vec![spec_from_fields(&track.fields, children, root)];
    }

    let mut options: Vec<_> = track.options.iter().collect();
    // Stable: ties keep their original order
    options.sort_by_key(|o| Some(o.option) != track.use_option);

    options
        .into_iter()
        .map(|option| {
            let mut fields = option.fields.clone();
            fields.inherit_from(&track.fields);
            let children = children_of(&option.sub_channels, &option.sub_tracks, root);
            spec_from_fields(&fields, children, root)
        })
        .collect()
}

fn children_of(
    sub_channels: &[ConfigSubChannel],
    sub_tracks: &[ConfigSubTrack],
    root: &Path,
) -> RenderChildren {
    if !sub_channels.is_empty() {
        if !sub_tracks.is_empty() {
            warn!(
                sub_channels = sub_channels.len(),
                sub_tracks = sub_tracks.len(),
                "Node has both sub-channels and sub-tracks, keeping sub-channels"
            );
        }
        RenderChildren::SubChannels(sub_channels.iter().map(|c| sub_channel_spec(c, root)).collect())
    } else if !sub_tracks.is_empty() {
        RenderChildren::SubTracks(sub_tracks.iter().map(|t| sub_track_spec(t, root)).collect())
    } else {
        RenderChildren::None
    }
}

fn sub_channel_spec(channel: &ConfigSubChannel, root: &Path) -> RenderSpec {
    let children = children_of(&[], &channel.sub_tracks, root);
    spec_from_fields(&channel.fields, children, root)
}

fn sub_track_spec(track: &ConfigSubTrack, root: &Path) -> RenderSpec {
    let children = children_of(&track.sub_channels, &[], root);
    spec_from_fields(&track.fields, children, root)
}

fn spec_from_fields(fields: &NodeFields, children: RenderChildren, root: &Path) -> RenderSpec {
    RenderSpec {
        file: fields.file.as_deref().map(|f| absolute_path(root, f)),
        output: fields.output.clone(),
        trim_start: fields.trim_start,
        trim_end: fields.trim_end,
        loop_point: fields.loop_point,
        fade_in: fields.fade_in,
        fade_out: fields.fade_out,
        cross_fade: fields.cross_fade,
        pad_start: fields.pad_start,
        pad_end: fields.pad_end,
        tempo: fields.tempo,
        normalization: fields.normalization,
        compression: fields.compression,
        last_modified: None,
        children,
    }
}

fn fields_from_spec(spec: &RenderSpec) -> NodeFields {
    NodeFields {
        file: spec.file.clone(),
        output: spec.output.clone(),
        trim_start: spec.trim_start,
        trim_end: spec.trim_end,
        loop_point: spec.loop_point,
        fade_in: spec.fade_in,
        fade_out: spec.fade_out,
        cross_fade: spec.cross_fade,
        pad_start: spec.pad_start,
        pad_end: spec.pad_end,
        tempo: spec.tempo,
        normalization: spec.normalization,
        compression: spec.compression,
    }
}

/// Rebuild the config node for `spec` at the given nesting position
///
/// Sub-channels hold only sub-tracks and sub-tracks hold only sub-channels;
/// children of the other kind cannot be expressed there and are dropped.
pub fn export_node(spec: &RenderSpec, role: NodeRole) -> ConfigNode {
    let fields = fields_from_spec(spec);
    let sub_channels = || -> Vec<ConfigSubChannel> {
        spec.sub_channels()
            .iter()
            .filter_map(|c| match export_node(c, NodeRole::SubChannel) {
                ConfigNode::SubChannel(c) => Some(c),
                _ => None,
            })
            .collect()
    };
    let sub_tracks = || -> Vec<ConfigSubTrack> {
        spec.sub_tracks()
            .iter()
            .filter_map(|t| match export_node(t, NodeRole::SubTrack) {
                ConfigNode::SubTrack(t) => Some(t),
                _ => None,
            })
            .collect()
    };

    match role {
        NodeRole::Track => ConfigNode::Track(ConfigTrack {
            fields,
            sub_channels: sub_channels(),
            sub_tracks: sub_tracks(),
            ..Default::default()
        }),
        NodeRole::SubChannel => {
            if !spec.sub_channels().is_empty() {
                warn!("Sub-channel cannot hold sub-channels, dropping them");
            }
            ConfigNode::SubChannel(ConfigSubChannel {
                fields,
                sub_tracks: sub_tracks(),
            })
        }
        NodeRole::SubTrack => {
            if !spec.sub_tracks().is_empty() {
                warn!("Sub-track cannot hold sub-tracks, dropping them");
            }
            ConfigNode::SubTrack(ConfigSubTrack {
                fields,
                sub_channels: sub_channels(),
            })
        }
    }
}

/// Renderer config for every song of `project` that has a render spec
///
/// Each song becomes one config track whose `output` is the song's PCM path.
pub fn export_project(project: &Project) -> MsuPcmConfig {
    let paths = project.pack_paths();
    let info = &project.basic_info;

    let tracks = project
        .tracks
        .iter()
        .flat_map(|track| {
            let mut songs: Vec<&Song> = track.songs.iter().collect();
            songs.sort_by_key(|s| s.is_alt);
            songs.into_iter().filter_map(move |song| {
                let spec = song.render_spec.as_ref()?;
                let ConfigNode::Track(mut node) = export_node(spec, NodeRole::Track) else {
                    return None;
                };
                node.track_number = track.track_number;
                node.title = Some(track.track_name.clone());
                node.fields.output = Some(song.output_path.clone());
                Some(node)
            })
        })
        .collect::<Vec<_>>();

    MsuPcmConfig {
        pack: info.pack_name.clone(),
        artist: info.artist.clone(),
        game: info.game.clone(),
        output_prefix: Some(paths.dir.join(&paths.base).to_string_lossy().into_owned()),
        normalization: info.normalization,
        dither: info.dither,
        first_track: tracks.iter().map(|t| t.track_number).min(),
        last_track: tracks.iter().map(|t| t.track_number).max(),
        tracks,
        ..Default::default()
    }
}

/// Applies renderer configs to projects
pub struct RenderConfigImporter<'a> {
    tags: &'a dyn TagReader,
}

impl<'a> RenderConfigImporter<'a> {
    pub fn new(tags: &'a dyn TagReader) -> Self {
        Self { tags }
    }

    /// Attach the config's render specs to `project`'s songs
    ///
    /// Flattened specs are matched to existing songs by position (primary
    /// first, then alternates in current order). Extra specs become new
    /// alternate songs. Song metadata is seeded from audio tags only when a
    /// spec references exactly one file, and only into blank fields unless
    /// `force` is set.
    pub fn import(
        &self,
        project: &mut Project,
        config: &MsuPcmConfig,
        working_dir: &Path,
        force: bool,
    ) -> ImportReport {
        let mut report = ImportReport::default();
        let paths = project.pack_paths();

        let info = &mut project.basic_info;
        info.is_msu_pcm_project = true;
        if config.pack.is_some() {
            info.pack_name = config.pack.clone();
        }
        if config.artist.is_some() {
            info.artist = config.artist.clone();
        }
        if config.game.is_some() {
            info.game = config.game.clone();
        }
        if config.normalization.is_some() {
            info.normalization = config.normalization;
        }
        if config.dither.is_some() {
            info.dither = config.dither;
        }

        let mut groups: BTreeMap<u32, Vec<RenderSpec>> = BTreeMap::new();
        for track in &config.tracks {
            groups
                .entry(track.track_number)
                .or_default()
                .extend(flatten_track(track, working_dir));
        }

        for (number, specs) in groups {
            let Some(track) = project.track_mut(number) else {
                warn!(track = number, "Renderer config track not in project, skipping");
                report.unknown_tracks.push(number);
                continue;
            };

            let existing = track.songs.len();
            for (index, spec) in specs.into_iter().enumerate() {
                let tags = self.tags_for(&spec);

                if index < existing {
                    let mut ordered = track.songs_primary_first_mut();
                    let song = &mut ordered[index];
                    if let Some(tags) = &tags {
                        seed_metadata(song, tags, force);
                    }
                    song.render_spec = Some(spec);
                    report.updated_songs += 1;
                    continue;
                }

                let output_path = match &spec.output {
                    Some(output) => absolute_path(working_dir, output),
                    None => paths.song_path(number, index),
                };
                let tags = tags.unwrap_or_default();
                debug!(track = number, file = %output_path.display(), "Adding song from renderer config");
                track.push_song(Song {
                    track_number: number,
                    track_name: track.track_name.clone(),
                    song_name: tags.song_name,
                    artist: tags.artist,
                    album: tags.album,
                    url: tags.url,
                    output_path,
                    is_alt: index != 0,
                    render_spec: Some(spec),
                });
                report.created_songs += 1;
            }
        }

        info!(
            updated = report.updated_songs,
            created = report.created_songs,
            unknown_tracks = report.unknown_tracks.len(),
            "Imported renderer config"
        );
        report
    }

    fn tags_for(&self, spec: &RenderSpec) -> Option<AudioTags> {
        let files = spec.files();
        let [file] = files.as_slice() else {
            return None;
        };
        match self.tags.read_tags(file) {
            Ok(tags) if tags.has_data() => Some(tags),
            Ok(_) => None,
            Err(e) => {
                debug!(file = %file.display(), error = %e, "Could not read tags");
                None
            }
        }
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Copy tag values into blank song fields (every field when `force`)
fn seed_metadata(song: &mut Song, tags: &AudioTags, force: bool) {
    fn fill(slot: &mut Option<String>, value: &Option<String>, replace: bool) {
        if replace && value.is_some() {
            *slot = value.clone();
        }
    }

    let placeholder_name = song
        .song_name
        .as_deref()
        .map_or(false, |n| n.starts_with("Track #"));
    let replace = force || placeholder_name || is_blank(&song.song_name);
    fill(&mut song.song_name, &tags.song_name, replace);
    let replace = force || is_blank(&song.artist);
    fill(&mut song.artist, &tags.artist, replace);
    let replace = force || is_blank(&song.album);
    fill(&mut song.album, &tags.album, replace);
    let replace = force || is_blank(&song.url);
    fill(&mut song.url, &tags.url, replace);
}
