//! Splitting a combined SMZ3 pack and the toggle scripts built from it

use std::fs;
use std::path::{Path, PathBuf};

use msu_common::config::ScriptFlavor;
use msu_common::Error;
use msu_scripter::models::{BasicInfo, PackPaths, Project, Song, Track};
use msu_scripter::msu_types::{
    RangeShift, SchemaDefinition, TrackDefinition, TrackMapping, TrackSchemaRegistry, A_LINK_TO_THE_PAST, SMZ3,
    SUPER_METROID,
};
use msu_scripter::services::{LocalFileSystem, ScriptWriter, SplitEngine};
use tempfile::TempDir;

/// Combined pack with one Super Metroid track (5) and one Zelda track
/// (105) holding a primary and an alternate
fn combined_project(dir: &Path) -> Project {
    let msu_path = dir.join("combo.msu");
    let paths = PackPaths::from_msu_path(&msu_path);

    let mut metroid = Track::new(5, "Brinstar");
    metroid.push_song(Song {
        track_number: 5,
        song_name: Some("Green Brinstar".to_string()),
        output_path: paths.song_path(5, 0),
        ..Default::default()
    });

    let mut zelda = Track::new(105, "Lost Woods");
    zelda.push_song(Song {
        track_number: 105,
        song_name: Some("Woods".to_string()),
        output_path: paths.song_path(105, 0),
        ..Default::default()
    });
    zelda.push_song(Song {
        track_number: 105,
        song_name: Some("Woods Remix".to_string()),
        output_path: paths.song_path(105, 1),
        is_alt: true,
        ..Default::default()
    });

    Project {
        msu_path,
        msu_type_name: SMZ3.to_string(),
        basic_info: BasicInfo {
            is_smz3_project: true,
            create_split_smz3_script: true,
            metroid_msu_path: Some(dir.join("sm.msu")),
            zelda_msu_path: Some(dir.join("z3.msu")),
            ..Default::default()
        },
        tracks: vec![metroid, zelda],
        ..Default::default()
    }
}

fn write_pcms(dir: &Path) {
    for (name, bytes) in [
        ("combo-5.pcm", b"brinstar".as_slice()),
        ("combo-105.pcm", b"woods".as_slice()),
        ("combo-105_alt.pcm", b"remix".as_slice()),
    ] {
        fs::write(dir.join(name), bytes).unwrap();
    }
}

#[test]
fn test_split_derives_both_games_and_links_files() {
    let dir = TempDir::new().unwrap();
    write_pcms(dir.path());
    let registry = TrackSchemaRegistry::builtin().unwrap();
    let project = combined_project(dir.path());

    let result = SplitEngine::new(&registry, &LocalFileSystem)
        .split(&project)
        .unwrap();

    assert!(result.failures.is_empty());
    assert_eq!(result.projects.len(), 2);

    let metroid = &result.projects[0];
    assert_eq!(metroid.msu_type_name, SUPER_METROID);
    assert_eq!(metroid.tracks.len(), 1);
    assert_eq!(metroid.tracks[0].songs[0].output_path, dir.path().join("sm-5.pcm"));
    assert!(!metroid.basic_info.is_smz3_project);
    assert!(!metroid.basic_info.create_split_smz3_script);

    let zelda = &result.projects[1];
    assert_eq!(zelda.msu_type_name, A_LINK_TO_THE_PAST);
    let woods = zelda.track(5).unwrap();
    assert_eq!(woods.songs.len(), 2);
    assert_eq!(woods.primary().unwrap().output_path, dir.path().join("z3-5.pcm"));
    assert_eq!(
        woods.alts().next().unwrap().output_path,
        dir.path().join("z3-5_alt.pcm")
    );
    assert_eq!(woods.primary().unwrap().song_name.as_deref(), Some("Woods"));

    // Both layouts share the same bytes
    assert_eq!(fs::read(dir.path().join("z3-5_alt.pcm")).unwrap(), b"remix");
    assert_eq!(fs::read(dir.path().join("sm-5.pcm")).unwrap(), b"brinstar");
    assert!(dir.path().join("combo-105.pcm").exists());

    assert_eq!(result.translations.len(), 4);
    assert_eq!(
        result.translations.get(&dir.path().join("combo-105_Original.pcm")),
        Some(&dir.path().join("z3-5_Original.pcm"))
    );
    assert_eq!(
        result.translations.get(&dir.path().join("combo-5.pcm")),
        Some(&dir.path().join("sm-5.pcm"))
    );
}

fn definition(name: &str, numbers: &[u32]) -> SchemaDefinition {
    SchemaDefinition {
        name: name.to_string(),
        tracks: numbers
            .iter()
            .map(|&number| TrackDefinition {
                number,
                name: format!("Track {}", number),
                aliases: Vec::new(),
            })
            .collect(),
        conversions: Default::default(),
        compatible_with: Vec::new(),
    }
}

#[test]
fn test_split_into_renumbered_destination_keeps_alternates() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("combo-5.pcm"), b"main").unwrap();
    fs::write(dir.path().join("combo-5_alt.pcm"), b"alt").unwrap();

    let combined = definition("Combined", &[5]);
    let mut shifted = definition("Shifted", &[105]);
    shifted.conversions.insert(
        "Combined".to_string(),
        TrackMapping::Shift {
            ranges: vec![RangeShift {
                first: 1,
                last: 10,
                offset: 100,
            }],
        },
    );
    let registry = TrackSchemaRegistry::from_definitions(vec![combined, shifted]).unwrap();

    let msu_path = dir.path().join("combo.msu");
    let paths = PackPaths::from_msu_path(&msu_path);
    let mut track = Track::new(5, "Track 5");
    track.push_song(Song {
        track_number: 5,
        output_path: paths.song_path(5, 0),
        ..Default::default()
    });
    track.push_song(Song {
        track_number: 5,
        output_path: paths.song_path(5, 1),
        is_alt: true,
        ..Default::default()
    });
    let project = Project {
        msu_path,
        msu_type_name: "Combined".to_string(),
        tracks: vec![track],
        ..Default::default()
    };

    let destination_path = dir.path().join("out.msu");
    let result = SplitEngine::new(&registry, &LocalFileSystem)
        .split_into(
            &project,
            &registry.lookup("Combined").unwrap(),
            &[(registry.lookup("Shifted").unwrap(), &destination_path)],
        )
        .unwrap();

    let derived = &result.projects[0];
    assert_eq!(derived.tracks.len(), 1);
    assert_eq!(derived.tracks[0].track_number, 105);
    assert_eq!(derived.tracks[0].track_name, "Track 105");
    assert_eq!(derived.tracks[0].songs.len(), 2);
    assert_eq!(
        result.translations.get(&dir.path().join("combo-5_Original.pcm")),
        Some(&dir.path().join("out-105_Original.pcm"))
    );
    assert_eq!(fs::read(dir.path().join("out-105_alt.pcm")).unwrap(), b"alt");
}

#[test]
fn test_split_requires_both_destinations() {
    let dir = TempDir::new().unwrap();
    write_pcms(dir.path());
    let registry = TrackSchemaRegistry::builtin().unwrap();
    let mut project = combined_project(dir.path());
    project.basic_info.zelda_msu_path = None;

    let result = SplitEngine::new(&registry, &LocalFileSystem).split(&project);

    match result {
        Err(Error::MissingPrerequisite(message)) => {
            assert_eq!(message, "Missing Metroid or Zelda MSU path")
        }
        other => panic!("expected missing prerequisite, got {:?}", other),
    }
    assert!(!dir.path().join("sm-5.pcm").exists());
}

#[test]
fn test_split_rejects_single_game_project() {
    let dir = TempDir::new().unwrap();
    let registry = TrackSchemaRegistry::builtin().unwrap();
    let mut project = combined_project(dir.path());
    project.msu_type_name = SUPER_METROID.to_string();

    let result = SplitEngine::new(&registry, &LocalFileSystem).split(&project);
    assert!(matches!(result, Err(Error::MissingPrerequisite(_))));
}

#[test]
fn test_split_script_toggles_every_translation() {
    let dir = TempDir::new().unwrap();
    write_pcms(dir.path());
    let registry = TrackSchemaRegistry::builtin().unwrap();
    let project = combined_project(dir.path());
    let result = SplitEngine::new(&registry, &LocalFileSystem)
        .split(&project)
        .unwrap();

    let writer = ScriptWriter::new(&LocalFileSystem, ScriptFlavor::Batch);
    let path = writer.write_split_script(&project, &result.translations).unwrap();
    let script = fs::read_to_string(&path).unwrap();

    assert_eq!(path.file_name().unwrap(), "!Split_Or_Combine_SMZ3_ALttP_SM_MSUs.bat");
    // Combined layout is detected by the first Zelda track's primary
    assert!(script.starts_with("IF EXIST \"combo-105.pcm\" (\r\n"));
    assert!(script.contains("\tIF EXIST \"combo-105_alt.pcm\" ( RENAME \"combo-105_alt.pcm\" \"z3-5_alt.pcm\" )\r\n"));
    assert!(script.contains("\tIF EXIST \"z3-5_alt.pcm\" ( RENAME \"z3-5_alt.pcm\" \"combo-105_alt.pcm\" )\r\n"));
    assert!(script.contains("combo-105_Original.pcm"));
}

#[test]
fn test_alt_swapper_covers_split_projects() {
    let dir = TempDir::new().unwrap();
    write_pcms(dir.path());
    let registry = TrackSchemaRegistry::builtin().unwrap();
    let project = combined_project(dir.path());
    let result = SplitEngine::new(&registry, &LocalFileSystem)
        .split(&project)
        .unwrap();

    let writer = ScriptWriter::new(&LocalFileSystem, ScriptFlavor::Shell);
    let path: PathBuf = writer
        .write_alt_swapper(&project, &result.projects)
        .unwrap()
        .unwrap();
    let script = fs::read_to_string(path).unwrap();

    assert!(script.starts_with("#!/bin/sh\n"));
    assert!(script.contains("if [ -e \"combo-105_Original.pcm\" ]; then\n"));
    assert!(script.contains("if [ -e \"z3-5_Original.pcm\" ]; then\n"));
    assert!(script.contains("  mv \"z3-5_alt.pcm\" \"z3-5.pcm\"\n"));
}
