//! msu-scripter library interface
//!
//! Project model, MSU type registry, and the conversion, split, render-config
//! and loudness engines. The `msu-scripter` binary is a thin CLI over these.

pub mod config;
pub mod models;
pub mod msu_types;
pub mod services;

pub use models::{BasicInfo, Project, RenderSpec, Song, Track};
pub use msu_types::{TrackSchema, TrackSchemaRegistry};
