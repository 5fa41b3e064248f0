//! Project data model and the external document shapes it exchanges

pub mod msu_details;
pub mod msupcm_config;
pub mod project;
pub mod render_spec;
pub mod track;

pub use msu_details::{MsuDetails, MsuDetailsTrack};
pub use msupcm_config::{
    ConfigNode, ConfigSubChannel, ConfigSubTrack, ConfigTrack, ConfigTrackOption, MsuPcmConfig,
    NodeFields, NodeRole,
};
pub use project::{BasicInfo, Project};
pub use render_spec::{absolute_path, RenderChildren, RenderSpec};
pub use track::{substitute_track_prefix, PackPaths, Song, Track};
