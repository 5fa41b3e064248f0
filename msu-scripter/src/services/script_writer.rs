//! Toggle scripts shipped next to generated packs
//!
//! Both scripts are self-reversing: running one again undoes the previous
//! run. The split/combine script tests for a file that only exists in the
//! combined layout; the alt swapper tests for the `_Original` parking file.

use msu_common::config::ScriptFlavor;
use msu_common::{Error, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use super::file_system::FileSystem;
use crate::models::{Project, Song};

pub const SPLIT_SCRIPT_NAME: &str = "!Split_Or_Combine_SMZ3_ALttP_SM_MSUs";
pub const ALT_SWAPPER_NAME: &str = "!Swap_Alt_Tracks";

pub struct ScriptWriter<'a> {
    fs: &'a dyn FileSystem,
    flavor: ScriptFlavor,
}

impl<'a> ScriptWriter<'a> {
    pub fn new(fs: &'a dyn FileSystem, flavor: ScriptFlavor) -> Self {
        Self { fs, flavor }
    }

    fn newline(&self) -> &'static str {
        match self.flavor {
            ScriptFlavor::Batch => "\r\n",
            ScriptFlavor::Shell => "\n",
        }
    }

    /// Join script lines with the flavor's line ending, shell header first
    fn assemble(&self, lines: &[String]) -> String {
        let nl = self.newline();
        let mut out = String::new();
        if self.flavor == ScriptFlavor::Shell {
            out.push_str(SHELL_HEADER);
        }
        for line in lines {
            out.push_str(line);
            out.push_str(nl);
        }
        out
    }

    /// Script toggling a combined pack between combined and split file names
    pub fn render_split_script(
        &self,
        combined: &Project,
        translations: &BTreeMap<PathBuf, PathBuf>,
    ) -> Result<String> {
        let marker = split_marker_path(combined).ok_or_else(|| {
            Error::MissingPrerequisite("Project has no songs to build a split script".to_string())
        })?;

        let paths = combined.pack_paths();
        let folder = paths.dir.as_path();
        let test_path = relative(folder, &marker);
        let pairs: Vec<(String, String)> = translations
            .iter()
            .map(|(from, to)| (relative(folder, from), relative(folder, to)))
            .collect();

        let mut lines = Vec::with_capacity(pairs.len() * 2 + 3);
        match self.flavor {
            ScriptFlavor::Batch => {
                lines.push(format!("IF EXIST \"{}\" (", test_path));
                for (combined, split) in &pairs {
                    lines.push(format!(
                        "\tIF EXIST \"{0}\" ( RENAME \"{0}\" \"{1}\" )",
                        combined,
                        file_name(split)
                    ));
                }
                lines.push(") ELSE (".to_string());
                for (combined, split) in &pairs {
                    lines.push(format!(
                        "\tIF EXIST \"{0}\" ( RENAME \"{0}\" \"{1}\" )",
                        split,
                        file_name(combined)
                    ));
                }
                lines.push(")".to_string());
            }
            ScriptFlavor::Shell => {
                lines.push(format!("if [ -e \"{}\" ]; then", test_path));
                for (combined, split) in &pairs {
                    lines.push(format!("  [ -e \"{0}\" ] && mv \"{0}\" \"{1}\"", combined, split));
                }
                lines.push("else".to_string());
                for (combined, split) in &pairs {
                    lines.push(format!("  [ -e \"{0}\" ] && mv \"{0}\" \"{1}\"", split, combined));
                }
                lines.push("fi".to_string());
            }
        }
        Ok(self.assemble(&lines))
    }

    pub fn write_split_script(
        &self,
        combined: &Project,
        translations: &BTreeMap<PathBuf, PathBuf>,
    ) -> Result<PathBuf> {
        let script = self.render_split_script(combined, translations)?;
        let path = combined.pack_paths().dir.join(self.script_file_name(SPLIT_SCRIPT_NAME));
        self.write_script(&path, &script)?;
        Ok(path)
    }

    /// Script swapping each track's primary with its first alternate
    ///
    /// `None` when no track of any project has an alternate.
    pub fn render_alt_swapper(&self, project: &Project, others: &[Project]) -> Option<String> {
        let folder = project.pack_paths().dir;
        let combos: Vec<(&Song, &Song, PathBuf)> = std::iter::once(project)
            .chain(others.iter())
            .flat_map(|p| {
                let paths = p.pack_paths();
                p.tracks
                    .iter()
                    .filter(|t| t.songs.len() > 1)
                    .filter_map(move |t| {
                        let primary = t.primary()?;
                        let alt = t.alts().next()?;
                        Some((primary, alt, paths.original_marker_path(t.track_number)))
                    })
            })
            .collect();
        if combos.is_empty() {
            return None;
        }

        let mut lines = Vec::with_capacity(combos.len() * 7);
        for (primary, alt, original) in combos {
            let base = relative(&folder, &primary.output_path);
            let parked = relative(&folder, &original);
            let alt = relative(&folder, &alt.output_path);
            match self.flavor {
                ScriptFlavor::Batch => lines.extend([
                    format!("IF EXIST \"{}\" (", parked),
                    format!("\tRENAME \"{}\" \"{}\"", base, file_name(&alt)),
                    format!("\tRENAME \"{}\" \"{}\"", parked, file_name(&base)),
                    format!(") ELSE IF EXIST \"{}\" (", alt),
                    format!("\tRENAME \"{}\" \"{}\"", base, file_name(&parked)),
                    format!("\tRENAME \"{}\" \"{}\"", alt, file_name(&base)),
                    ")".to_string(),
                ]),
                ScriptFlavor::Shell => lines.extend([
                    format!("if [ -e \"{}\" ]; then", parked),
                    format!("  mv \"{}\" \"{}\"", base, alt),
                    format!("  mv \"{}\" \"{}\"", parked, base),
                    format!("elif [ -e \"{}\" ]; then", alt),
                    format!("  mv \"{}\" \"{}\"", base, parked),
                    format!("  mv \"{}\" \"{}\"", alt, base),
                    "fi".to_string(),
                ]),
            }
            lines.push(String::new());
        }
        Some(self.assemble(&lines))
    }

    pub fn write_alt_swapper(&self, project: &Project, others: &[Project]) -> Result<Option<PathBuf>> {
        let Some(script) = self.render_alt_swapper(project, others) else {
            info!(msu = %project.msu_path.display(), "No alternate tracks, skipping alt swapper");
            return Ok(None);
        };
        let path = project.pack_paths().dir.join(self.script_file_name(ALT_SWAPPER_NAME));
        self.write_script(&path, &script)?;
        Ok(Some(path))
    }

    fn script_file_name(&self, stem: &str) -> String {
        format!("{}.{}", stem, self.flavor.extension())
    }

    fn write_script(&self, path: &Path, script: &str) -> Result<()> {
        self.fs.write(path, script.as_bytes())?;

        #[cfg(unix)]
        {
            if self.flavor == ScriptFlavor::Shell && path.is_file() {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
                    .map_err(|e| Error::file_system(path, e))?;
            }
        }

        info!(script = %path.display(), "Wrote toggle script");
        Ok(())
    }
}

const SHELL_HEADER: &str = "#!/bin/sh\ncd \"$(dirname \"$0\")\" || exit 1\n\n";

/// Path relative to the pack folder when inside it, else as given
fn relative(folder: &Path, path: &Path) -> String {
    path.strip_prefix(folder)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

/// Batch RENAME takes a bare file name as its target
fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

/// File whose presence means the pack is in the combined layout
///
/// The primary PCM of the first track above 100 with songs, falling back to
/// the first track with songs.
pub fn split_marker_path(combined: &Project) -> Option<PathBuf> {
    let paths = combined.pack_paths();
    combined
        .tracks
        .iter()
        .find(|t| t.track_number > 100 && !t.songs.is_empty())
        .or_else(|| combined.tracks.iter().find(|t| !t.songs.is_empty()))
        .map(|t| paths.song_path(t.track_number, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Track;
    use crate::services::file_system::LocalFileSystem;

    fn project_with_alt() -> Project {
        let mut track = Track::new(2, "Light World");
        track.songs.push(Song {
            track_number: 2,
            output_path: PathBuf::from("/msu/Pack-2.pcm"),
            ..Default::default()
        });
        track.songs.push(Song {
            track_number: 2,
            output_path: PathBuf::from("/msu/Pack-2_alt.pcm"),
            is_alt: true,
            ..Default::default()
        });
        Project {
            msu_path: PathBuf::from("/msu/Pack.msu"),
            tracks: vec![Track::new(1, "Opening"), track],
            ..Default::default()
        }
    }

    #[test]
    fn test_alt_swapper_batch_is_reversible() {
        let writer = ScriptWriter::new(&LocalFileSystem, ScriptFlavor::Batch);
        let script = writer.render_alt_swapper(&project_with_alt(), &[]).unwrap();

        assert!(script.contains("IF EXIST \"Pack-2_Original.pcm\" ("));
        assert!(script.contains("\tRENAME \"Pack-2.pcm\" \"Pack-2_alt.pcm\""));
        assert!(script.contains(") ELSE IF EXIST \"Pack-2_alt.pcm\" ("));
        assert!(script.contains("\tRENAME \"Pack-2_alt.pcm\" \"Pack-2.pcm\""));
    }

    #[test]
    fn test_batch_lines_all_end_with_crlf() {
        let writer = ScriptWriter::new(&LocalFileSystem, ScriptFlavor::Batch);
        let script = writer.render_alt_swapper(&project_with_alt(), &[]).unwrap();

        assert!(script.ends_with(")\r\n\r\n"));
        assert_eq!(script.matches('\n').count(), script.matches("\r\n").count());
    }

    #[test]
    fn test_alt_swapper_without_alts_is_none() {
        let writer = ScriptWriter::new(&LocalFileSystem, ScriptFlavor::Shell);
        let mut project = project_with_alt();
        project.tracks[1].songs.truncate(1);
        assert!(writer.render_alt_swapper(&project, &[]).is_none());
    }

    #[test]
    fn test_split_script_prefers_track_above_100() {
        let mut project = project_with_alt();
        let mut high = Track::new(105, "ALttP - Kakariko");
        high.songs.push(Song {
            output_path: PathBuf::from("/msu/Pack-105.pcm"),
            ..Default::default()
        });
        project.tracks.push(high);

        let mut translations = BTreeMap::new();
        translations.insert(PathBuf::from("/msu/Pack-105.pcm"), PathBuf::from("/msu/Zelda-5.pcm"));

        let writer = ScriptWriter::new(&LocalFileSystem, ScriptFlavor::Shell);
        let script = writer.render_split_script(&project, &translations).unwrap();

        assert_eq!(split_marker_path(&project), Some(PathBuf::from("/msu/Pack-105.pcm")));
        assert!(script.starts_with("#!/bin/sh"));
        assert!(script.contains("if [ -e \"Pack-105.pcm\" ]; then"));
        assert!(script.contains("[ -e \"Pack-105.pcm\" ] && mv \"Pack-105.pcm\" \"Zelda-5.pcm\""));
        assert!(script.contains("[ -e \"Zelda-5.pcm\" ] && mv \"Zelda-5.pcm\" \"Pack-105.pcm\""));
    }

    #[test]
    fn test_split_script_without_songs_is_error() {
        let project = Project {
            msu_path: PathBuf::from("/msu/Pack.msu"),
            tracks: vec![Track::new(101, "Empty")],
            ..Default::default()
        };
        let writer = ScriptWriter::new(&LocalFileSystem, ScriptFlavor::Batch);
        assert!(writer.render_split_script(&project, &BTreeMap::new()).is_err());
    }
}
