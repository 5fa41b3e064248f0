//! Recursive render specification consumed by the external PCM renderer
//!
//! A node describes one source file with trim/loop/normalization settings.
//! It may own child nodes of exactly one kind: sub-channels (layers mixed in
//! parallel) or sub-tracks (segments played in sequence). The kind can
//! alternate between nesting levels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Children of a render node; one kind per level
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum RenderChildren {
    #[default]
    None,
    SubChannels(Vec<RenderSpec>),
    SubTracks(Vec<RenderSpec>),
}

impl RenderChildren {
    pub fn is_none(&self) -> bool {
        matches!(self, RenderChildren::None)
    }

    pub fn nodes(&self) -> &[RenderSpec] {
        match self {
            RenderChildren::None => &[],
            RenderChildren::SubChannels(nodes) | RenderChildren::SubTracks(nodes) => nodes,
        }
    }
}

/// One node of a render tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RenderSpec {
    pub file: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub trim_start: Option<i64>,
    pub trim_end: Option<i64>,
    #[serde(rename = "Loop")]
    pub loop_point: Option<i64>,
    pub fade_in: Option<i64>,
    pub fade_out: Option<i64>,
    pub cross_fade: Option<i64>,
    pub pad_start: Option<i64>,
    pub pad_end: Option<i64>,
    pub tempo: Option<f64>,
    pub normalization: Option<f64>,
    pub compression: Option<bool>,
    #[serde(rename = "LastModifiedDate")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "RenderChildren::is_none")]
    pub children: RenderChildren,
}

impl RenderSpec {
    pub fn sub_channels(&self) -> &[RenderSpec] {
        match &self.children {
            RenderChildren::SubChannels(nodes) => nodes,
            _ => &[],
        }
    }

    pub fn sub_tracks(&self) -> &[RenderSpec] {
        match &self.children {
            RenderChildren::SubTracks(nodes) => nodes,
            _ => &[],
        }
    }

    /// Every source file referenced anywhere in the tree, depth-first
    pub fn files(&self) -> Vec<&Path> {
        let mut files = Vec::new();
        self.collect_files(&mut files);
        files
    }

    fn collect_files<'a>(&'a self, out: &mut Vec<&'a Path>) {
        if let Some(file) = &self.file {
            out.push(file);
        }
        for child in self.children.nodes() {
            child.collect_files(out);
        }
    }
}

/// `path` if already absolute, otherwise `root/path`
pub fn absolute_path(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
