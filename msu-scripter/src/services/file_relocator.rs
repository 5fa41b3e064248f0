//! PCM relocation: name swaps, moves, and recovery of interrupted swaps
//!
//! No portable atomic dual-rename exists, so two files trade names through
//! temporary names in four renames:
//!
//! 1. `new` → `new.tmp`
//! 2. `old` → `old.tmp`
//! 3. `new.tmp` → `old`
//! 4. `old.tmp` → `new`
//!
//! A sidecar marker `<old>.swap` is written before step 1, updated after
//! every step, and removed once step 4 completes. A marker left on disk means
//! the swap was interrupted; [`recover_interrupted_swaps`] finishes it.

use chrono::{DateTime, Utc};
use msu_common::events::RelocationKind;
use msu_common::{Error, EventBus, Result, ScripterEvent};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use super::file_system::FileSystem;

const MARKER_EXTENSION: &str = "swap";
const SWAP_STEPS: usize = 4;

/// Sidecar describing a swap in progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapMarker {
    pub old: PathBuf,
    pub new: PathBuf,
    pub started_at: DateTime<Utc>,
    /// Renames known to have finished; may lag the disk by one step
    #[serde(default)]
    pub completed_steps: usize,
}

impl SwapMarker {
    fn steps(&self) -> [(PathBuf, PathBuf); SWAP_STEPS] {
        let old_tmp = with_suffix(&self.old, "tmp");
        let new_tmp = with_suffix(&self.new, "tmp");
        [
            (self.new.clone(), new_tmp.clone()),
            (self.old.clone(), old_tmp.clone()),
            (new_tmp, self.old.clone()),
            (old_tmp, self.new.clone()),
        ]
    }
}

/// `path` with `.suffix` appended to the full file name
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

pub fn marker_path(old: &Path) -> PathBuf {
    with_suffix(old, MARKER_EXTENSION)
}

/// Performs relocations and reports them on the event bus
pub struct FileRelocator<'a> {
    fs: &'a dyn FileSystem,
    events: Option<&'a EventBus>,
}

impl<'a> FileRelocator<'a> {
    pub fn new(fs: &'a dyn FileSystem) -> Self {
        Self { fs, events: None }
    }

    pub fn with_events(mut self, events: &'a EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Trade the names of two existing files
    pub fn swap(&self, old: &Path, new: &Path) -> Result<()> {
        let mut marker = SwapMarker {
            old: old.to_path_buf(),
            new: new.to_path_buf(),
            started_at: Utc::now(),
            completed_steps: 0,
        };
        self.write_marker(&marker)?;
        self.run_steps(&mut marker)?;
        self.fs.remove_file(&marker_path(old))?;

        info!(old = %old.display(), new = %new.display(), "Swapped PCM files");
        self.emit(old, new, RelocationKind::Swapped);
        Ok(())
    }

    /// Rename `from` onto a free path
    pub fn move_file(&self, from: &Path, to: &Path) -> Result<()> {
        self.fs.rename(from, to)?;
        info!(from = %from.display(), to = %to.display(), "Moved PCM file");
        self.emit(from, to, RelocationKind::Moved);
        Ok(())
    }

    /// Hard link `link` to `original`
    pub fn link(&self, original: &Path, link: &Path) -> Result<()> {
        self.fs.hard_link(original, link)?;
        info!(from = %original.display(), to = %link.display(), "Created hard link");
        self.emit(original, link, RelocationKind::Linked);
        Ok(())
    }

    /// Finish the swap described by a marker left on disk
    pub fn resume(&self, marker: &mut SwapMarker) -> Result<()> {
        warn!(
            old = %marker.old.display(),
            new = %marker.new.display(),
            completed_steps = marker.completed_steps,
            "Resuming interrupted swap"
        );
        self.run_steps(marker)?;
        self.fs.remove_file(&marker_path(&marker.old))?;
        self.emit(&marker.old, &marker.new, RelocationKind::Swapped);
        Ok(())
    }

    /// Run each remaining rename whose source is still present
    ///
    /// A step whose source is gone already happened before the marker was
    /// updated. A step whose destination is occupied cannot proceed without
    /// clobbering data and aborts the swap, leaving the marker in place.
    fn run_steps(&self, marker: &mut SwapMarker) -> Result<()> {
        let steps = marker.steps();
        for (index, (from, to)) in steps.iter().enumerate().skip(marker.completed_steps) {
            if !self.fs.is_file(from) {
                debug!(step = index + 1, from = %from.display(), "Swap step already applied");
            } else if self.fs.is_file(to) {
                return Err(Error::file_system(
                    to,
                    std::io::Error::new(
                        std::io::ErrorKind::AlreadyExists,
                        "swap destination already exists",
                    ),
                ));
            } else {
                self.fs.rename(from, to)?;
            }
            marker.completed_steps = index + 1;
            if marker.completed_steps < SWAP_STEPS {
                self.write_marker(marker)?;
            }
        }
        Ok(())
    }

    fn write_marker(&self, marker: &SwapMarker) -> Result<()> {
        let json = serde_json::to_vec_pretty(marker)?;
        self.fs.write(&marker_path(&marker.old), &json)
    }

    fn emit(&self, from: &Path, to: &Path, kind: RelocationKind) {
        if let Some(events) = self.events {
            events.emit_lossy(ScripterEvent::FileRelocated {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
                kind,
            });
        }
    }
}

/// Outcome of a recovery scan
#[derive(Debug, Default)]
pub struct RecoveryReport {
    pub recovered: Vec<SwapMarker>,
    pub failed: Vec<(PathBuf, String)>,
}

/// Find `*.swap` markers in `dir` and complete the swaps they describe
pub fn recover_interrupted_swaps(fs: &dyn FileSystem, dir: &Path) -> Result<RecoveryReport> {
    if !dir.is_dir() {
        return Err(Error::NotFound(format!("Directory {}", dir.display())));
    }

    let relocator = FileRelocator::new(fs);
    let mut report = RecoveryReport::default();

    for entry in WalkDir::new(dir).max_depth(1).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().and_then(|e| e.to_str()) != Some(MARKER_EXTENSION)
        {
            continue;
        }

        let result = fs
            .read_to_string(path)
            .and_then(|json| serde_json::from_str::<SwapMarker>(&json).map_err(Error::from))
            .and_then(|mut marker| relocator.resume(&mut marker).map(|_| marker));

        match result {
            Ok(marker) => {
                info!(marker = %path.display(), "Recovered interrupted swap");
                report.recovered.push(marker);
            }
            Err(e) => {
                error!(marker = %path.display(), error = %e, "Could not recover swap");
                report.failed.push((path.to_path_buf(), e.to_string()));
            }
        }
    }

    Ok(report)
}
