//! External renderer (msupcm++) configuration document
//!
//! The renderer reads a JSON document with snake_case keys describing a
//! forest of track nodes. Every node kind shares the same payload
//! ([`NodeFields`]); the kinds differ only in which children they may own.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Fields shared by tracks, options, sub-tracks and sub-channels
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trim_start: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trim_end: Option<i64>,
    #[serde(rename = "loop", skip_serializing_if = "Option::is_none")]
    pub loop_point: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fade_in: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fade_out: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cross_fade: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pad_start: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pad_end: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tempo: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalization: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression: Option<bool>,
}

impl NodeFields {
    /// Fill every unset field from `parent`
    pub fn inherit_from(&mut self, parent: &NodeFields) {
        fn fill<T: Clone>(slot: &mut Option<T>, parent: &Option<T>) {
            if slot.is_none() {
                *slot = parent.clone();
            }
        }
        fill(&mut self.file, &parent.file);
        fill(&mut self.output, &parent.output);
        fill(&mut self.trim_start, &parent.trim_start);
        fill(&mut self.trim_end, &parent.trim_end);
        fill(&mut self.loop_point, &parent.loop_point);
        fill(&mut self.fade_in, &parent.fade_in);
        fill(&mut self.fade_out, &parent.fade_out);
        fill(&mut self.cross_fade, &parent.cross_fade);
        fill(&mut self.pad_start, &parent.pad_start);
        fill(&mut self.pad_end, &parent.pad_end);
        fill(&mut self.tempo, &parent.tempo);
        fill(&mut self.normalization, &parent.normalization);
        fill(&mut self.compression, &parent.compression);
    }
}

/// Top-level renderer document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MsuPcmConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pack: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalization: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dither: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbosity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_temps: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_track: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_track: Option<u32>,
    pub tracks: Vec<ConfigTrack>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigTrack {
    pub track_number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub fields: NodeFields,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_option: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ConfigTrackOption>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_channels: Vec<ConfigSubChannel>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_tracks: Vec<ConfigSubTrack>,
}

/// Alternative rendering of a track, selected by `use_option`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigTrackOption {
    pub option: i64,
    #[serde(flatten)]
    pub fields: NodeFields,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_channels: Vec<ConfigSubChannel>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_tracks: Vec<ConfigSubTrack>,
}

/// Parallel mix layer; may hold sequential sub-tracks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigSubChannel {
    #[serde(flatten)]
    pub fields: NodeFields,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_tracks: Vec<ConfigSubTrack>,
}

/// Sequential segment; may hold parallel sub-channels
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigSubTrack {
    #[serde(flatten)]
    pub fields: NodeFields,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_channels: Vec<ConfigSubChannel>,
}

/// Position of a node in the renderer tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Track,
    SubTrack,
    SubChannel,
}

/// A renderer node of any role, produced by export
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigNode {
    Track(ConfigTrack),
    SubTrack(ConfigSubTrack),
    SubChannel(ConfigSubChannel),
}

impl ConfigNode {
    pub fn role(&self) -> NodeRole {
        match self {
            ConfigNode::Track(_) => NodeRole::Track,
            ConfigNode::SubTrack(_) => NodeRole::SubTrack,
            ConfigNode::SubChannel(_) => NodeRole::SubChannel,
        }
    }
}
