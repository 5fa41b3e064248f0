//! Project lifecycle through ProjectService: creation from an existing
//! pack, renderer config import and export, persistence, and MSU details

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use msu_common::Error;
use msu_scripter::models::{MsuDetails, Project, Song, Track};
use msu_scripter::msu_types::{TrackSchemaRegistry, A_LINK_TO_THE_PAST, SMZ3};
use msu_scripter::services::render_config::{load_config, save_config};
use msu_scripter::services::{
    export_project, AudioTags, DirectoryPackReader, ImportReport, LocalFileSystem, MetadataError,
    ProjectService, RenderConfigImporter, TagReader,
};
use tempfile::TempDir;

/// Tag reader answering from a fixed table
#[derive(Default)]
struct FakeTags {
    tags: HashMap<PathBuf, AudioTags>,
}

impl TagReader for FakeTags {
    fn read_tags(&self, path: &Path) -> Result<AudioTags, MetadataError> {
        Ok(self.tags.get(path).cloned().unwrap_or_default())
    }
}

fn service_with_tags(tags: FakeTags) -> ProjectService {
    ProjectService::new(
        Arc::new(TrackSchemaRegistry::builtin().unwrap()),
        Arc::new(LocalFileSystem),
        Arc::new(DirectoryPackReader),
        Arc::new(tags),
    )
}

fn service() -> ProjectService {
    service_with_tags(FakeTags::default())
}

const DETAILS_YAML: &str = r#"
pack_name: My Pack
pack_author: Someone
artist: Various
tracks:
  light_world:
    name: Overworld
    alts:
      - name: Overworld Alt
  dark_world:
    name: Dark Overworld
"#;

#[test]
fn test_new_project_imports_existing_pack() {
    let dir = TempDir::new().unwrap();
    let msu = dir.path().join("Pack.msu");
    fs::write(&msu, b"").unwrap();
    fs::write(dir.path().join("Pack-2.pcm"), b"pcm").unwrap();
    fs::write(dir.path().join("Pack-2_alt.pcm"), b"pcm").unwrap();
    fs::write(dir.path().join("Pack-9.pcm"), b"pcm").unwrap();
    fs::write(dir.path().join("Pack.yml"), DETAILS_YAML).unwrap();

    let service = service();
    let project_path = dir.path().join("Pack.msup");
    let project = service
        .new_project(&project_path, A_LINK_TO_THE_PAST, &msu, None, None)
        .unwrap();

    assert!(project_path.is_file());
    assert_eq!(project.basic_info.pack_name.as_deref(), Some("My Pack"));
    assert_eq!(project.basic_info.pack_creator.as_deref(), Some("Someone"));
    assert_eq!(project.basic_info.artist.as_deref(), Some("Various"));
    assert_eq!(project.song_count(), 3);

    let light_world = project.track(2).unwrap();
    assert_eq!(light_world.primary().unwrap().song_name.as_deref(), Some("Overworld"));
    let alt = light_world.alts().next().unwrap();
    assert_eq!(alt.song_name.as_deref(), Some("Overworld Alt"));
    assert_eq!(alt.output_path, dir.path().join("Pack-2_alt.pcm"));

    assert_eq!(
        project.track(9).unwrap().songs[0].song_name.as_deref(),
        Some("Dark Overworld")
    );
    // Every schema track exists even without songs
    assert!(project.track(1).unwrap().songs.is_empty());
}

#[test]
fn test_saved_project_loads_back() {
    let dir = TempDir::new().unwrap();
    let service = service();
    let project_path = dir.path().join("Combo.msup");
    let created = service
        .new_project(&project_path, SMZ3, &dir.path().join("Combo.msu"), None, None)
        .unwrap();

    assert!(created.basic_info.is_smz3_project);
    assert!(created.basic_info.create_split_smz3_script);
    assert!(created.last_save_time.is_some());

    let loaded = service.load(&project_path).unwrap();
    assert_eq!(loaded.msu_type_name, SMZ3);
    assert_eq!(loaded.tracks, created.tracks);
    assert_eq!(loaded.basic_info, created.basic_info);
    assert_eq!(loaded.project_file_path, project_path);
    assert!(!dir.path().join("Combo.msup.tmp").exists());
}

#[test]
fn test_load_missing_project_is_not_found() {
    let dir = TempDir::new().unwrap();
    let result = service().load(&dir.path().join("nothing.msup"));
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[test]
fn test_load_rejects_track_with_two_primaries() {
    let dir = TempDir::new().unwrap();
    let service = service();
    let project_path = dir.path().join("Pack.msup");
    let mut project = service
        .new_project(&project_path, A_LINK_TO_THE_PAST, &dir.path().join("Pack.msu"), None, None)
        .unwrap();

    let track = project.track_mut(2).unwrap();
    for name in ["Pack-2.pcm", "Other-2.pcm"] {
        track.songs.push(Song {
            track_number: 2,
            output_path: dir.path().join(name),
            ..Default::default()
        });
    }
    fs::write(&project_path, serde_yaml::to_string(&project).unwrap()).unwrap();

    let result = service.load(&project_path);
    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

#[test]
fn test_import_updates_primary_and_adds_alternates() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("tracks.json");
    fs::write(
        &config_path,
        r#"{"tracks": [
            {
                "track_number": 2,
                "use_option": 1,
                "options": [
                    {"option": 1, "file": "a.wav"},
                    {"option": 2, "file": "b.wav"},
                    {"option": 3, "file": "c.wav"}
                ]
            },
            {"track_number": 5, "file": "woods.wav"}
        ]}"#,
    )
    .unwrap();

    let msu_path = dir.path().join("Pack.msu");
    let mut track = Track::new(2, "Light World");
    track.push_song(Song {
        track_number: 2,
        song_name: Some("Track #2".to_string()),
        artist: Some("Mine".to_string()),
        output_path: dir.path().join("Pack-2.pcm"),
        ..Default::default()
    });
    let mut project = Project {
        msu_path,
        msu_type_name: A_LINK_TO_THE_PAST.to_string(),
        tracks: vec![track],
        ..Default::default()
    };

    let mut tags = FakeTags::default();
    tags.tags.insert(
        dir.path().join("a.wav"),
        AudioTags {
            song_name: Some("Alpha".to_string()),
            artist: Some("Tagged".to_string()),
            ..Default::default()
        },
    );
    tags.tags.insert(
        dir.path().join("c.wav"),
        AudioTags {
            song_name: Some("Gamma".to_string()),
            ..Default::default()
        },
    );

    let config = load_config(&config_path).unwrap();
    let report = RenderConfigImporter::new(&tags).import(&mut project, &config, dir.path(), false);

    assert_eq!(
        report,
        ImportReport {
            updated_songs: 1,
            created_songs: 2,
            unknown_tracks: vec![5],
        }
    );
    assert!(project.basic_info.is_msu_pcm_project);

    let track = project.track(2).unwrap();
    let primary = track.primary().unwrap();
    // Placeholder name is replaced, the user's artist is kept
    assert_eq!(primary.song_name.as_deref(), Some("Alpha"));
    assert_eq!(primary.artist.as_deref(), Some("Mine"));
    assert_eq!(
        primary.render_spec.as_ref().unwrap().file,
        Some(dir.path().join("a.wav"))
    );

    let alts: Vec<_> = track.alts().collect();
    assert_eq!(alts.len(), 2);
    assert_eq!(alts[0].output_path, dir.path().join("Pack-2_alt.pcm"));
    assert_eq!(alts[0].song_name, None);
    assert_eq!(alts[1].output_path, dir.path().join("Pack-2_alt2.pcm"));
    assert_eq!(alts[1].song_name.as_deref(), Some("Gamma"));
    assert_eq!(alts[1].track_name, "Light World");

    // Forced re-import overwrites the user's values
    RenderConfigImporter::new(&tags).import(&mut project, &config, dir.path(), true);
    let primary = project.track(2).unwrap().primary().unwrap();
    assert_eq!(primary.artist.as_deref(), Some("Tagged"));
}

#[test]
fn test_renderer_config_creates_songs_in_use_option_first() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("tracks.json");
    fs::write(
        &config_path,
        r#"{
            "pack": "Config Pack",
            "artist": "Config Artist",
            "tracks": [{
                "track_number": 2,
                "title": "Light World",
                "use_option": 2,
                "normalization": -20,
                "options": [
                    {"option": 1, "file": "a.wav"},
                    {"option": 2, "file": "b.wav"},
                    {"option": 3, "file": "c.wav", "normalization": -18}
                ]
            }]
        }"#,
    )
    .unwrap();

    let mut tags = FakeTags::default();
    tags.tags.insert(
        dir.path().join("b.wav"),
        AudioTags {
            song_name: Some("Bee".to_string()),
            artist: Some("Band".to_string()),
            ..Default::default()
        },
    );
    let service = service_with_tags(tags);
    let project = service
        .new_project(
            &dir.path().join("Pack.msup"),
            A_LINK_TO_THE_PAST,
            &dir.path().join("Pack.msu"),
            Some(&config_path),
            None,
        )
        .unwrap();

    assert!(project.basic_info.is_msu_pcm_project);
    assert_eq!(project.basic_info.pack_name.as_deref(), Some("Config Pack"));
    assert_eq!(project.basic_info.artist.as_deref(), Some("Config Artist"));

    let track = project.track(2).unwrap();
    assert_eq!(track.songs.len(), 3);

    let primary = track.primary().unwrap();
    assert_eq!(primary.output_path, dir.path().join("Pack-2.pcm"));
    assert_eq!(primary.song_name.as_deref(), Some("Bee"));
    assert_eq!(primary.artist.as_deref(), Some("Band"));
    let spec = primary.render_spec.as_ref().unwrap();
    assert_eq!(spec.file, Some(dir.path().join("b.wav")));
    assert_eq!(spec.normalization, Some(-20.0));

    let alts: Vec<_> = track.alts().collect();
    assert_eq!(alts[0].output_path, dir.path().join("Pack-2_alt.pcm"));
    assert_eq!(alts[0].render_spec.as_ref().unwrap().file, Some(dir.path().join("a.wav")));
    assert_eq!(alts[1].output_path, dir.path().join("Pack-2_alt2.pcm"));
    assert_eq!(alts[1].render_spec.as_ref().unwrap().normalization, Some(-18.0));
}

#[test]
fn test_exported_config_reimports_to_same_songs() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("tracks.json");
    fs::write(
        &config_path,
        r#"{"tracks": [
            {"track_number": 5, "file": "woods.wav", "loop": 1000},
            {"track_number": 5, "file": "woods_remix.wav"}
        ]}"#,
    )
    .unwrap();

    let service = service();
    let original = service
        .new_project(
            &dir.path().join("Pack.msup"),
            A_LINK_TO_THE_PAST,
            &dir.path().join("Pack.msu"),
            Some(&config_path),
            None,
        )
        .unwrap();

    let exported_path = dir.path().join("exported.json");
    save_config(&export_project(&original), &exported_path).unwrap();

    let copy = service
        .new_project(
            &dir.path().join("Copy.msup"),
            A_LINK_TO_THE_PAST,
            &dir.path().join("Pack.msu"),
            Some(&exported_path),
            None,
        )
        .unwrap();

    let before = original.track(5).unwrap();
    let after = copy.track(5).unwrap();
    assert_eq!(after.songs.len(), 2);
    for (a, b) in before.songs.iter().zip(&after.songs) {
        assert_eq!(a.output_path, b.output_path);
        assert_eq!(a.is_alt, b.is_alt);
        let (a, b) = (a.render_spec.as_ref().unwrap(), b.render_spec.as_ref().unwrap());
        assert_eq!(a.file, b.file);
        assert_eq!(a.loop_point, b.loop_point);
    }
}

#[test]
fn test_msu_details_export_uses_alias_keys() {
    let dir = TempDir::new().unwrap();
    let msu = dir.path().join("Pack.msu");
    fs::write(&msu, b"").unwrap();
    fs::write(dir.path().join("Pack-2.pcm"), b"pcm").unwrap();
    fs::write(dir.path().join("Pack-2_alt.pcm"), b"pcm").unwrap();
    fs::write(dir.path().join("Pack.yml"), DETAILS_YAML).unwrap();

    let service = service();
    let project = service
        .new_project(&dir.path().join("Pack.msup"), A_LINK_TO_THE_PAST, &msu, None, None)
        .unwrap();
    fs::remove_file(dir.path().join("Pack.yml")).unwrap();

    let path = service.export_msu_details(&project).unwrap();
    assert_eq!(path, dir.path().join("Pack.yml"));

    let details: MsuDetails = serde_yaml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(details.msu_type.as_deref(), Some(A_LINK_TO_THE_PAST));
    assert_eq!(details.pack_name.as_deref(), Some("My Pack"));

    let light_world = &details.tracks["light_world"];
    assert_eq!(light_world.track_number, Some(2));
    assert_eq!(light_world.path, Some(PathBuf::from("Pack-2.pcm")));
    assert_eq!(light_world.alts.len(), 1);
    assert_eq!(light_world.alts[0].name.as_deref(), Some("Overworld Alt"));
}

#[test]
fn test_remove_pcms_deletes_only_existing_files() {
    let dir = TempDir::new().unwrap();
    let msu = dir.path().join("Pack.msu");
    fs::write(&msu, b"").unwrap();
    fs::write(dir.path().join("Pack-2.pcm"), b"pcm").unwrap();
    fs::write(dir.path().join("Pack-3.pcm"), b"pcm").unwrap();

    let service = service();
    let project = service
        .new_project(&dir.path().join("Pack.msup"), A_LINK_TO_THE_PAST, &msu, None, None)
        .unwrap();
    fs::remove_file(dir.path().join("Pack-3.pcm")).unwrap();

    assert_eq!(service.remove_pcms(&project), 1);
    assert!(!dir.path().join("Pack-2.pcm").exists());
    assert!(msu.exists());
}
