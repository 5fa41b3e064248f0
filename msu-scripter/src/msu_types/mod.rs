//! MSU type registry and track-number remapping

pub mod mapping;
pub mod registry;

pub use mapping::{RangeShift, Remap, TrackMapping};
pub use registry::{
    builtin_definitions, read_definitions, SchemaDefinition, TrackDefinition, TrackSchema,
    TrackSchemaRegistry, A_LINK_TO_THE_PAST, SMZ3, SMZ3_LEGACY, SUPER_METROID,
};
