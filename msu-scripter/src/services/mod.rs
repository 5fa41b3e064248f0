//! Engines and collaborators operating on projects

pub mod analysis_runner;
pub mod details_converter;
pub mod file_relocator;
pub mod file_system;
pub mod loudness_analyzer;
pub mod loudness_meter;
pub mod metadata_extractor;
pub mod pack_reader;
pub mod project_service;
pub mod render_config;
pub mod script_writer;
pub mod split_engine;
pub mod type_converter;

pub use analysis_runner::{AnalysisOutcome, AnalysisRunner};
pub use details_converter::convert_msu_details;
pub use file_relocator::{recover_interrupted_swaps, FileRelocator, RecoveryReport, SwapMarker};
pub use file_system::{FileSystem, LocalFileSystem};
pub use loudness_analyzer::{analysis_rows, LoudnessAnalyzer, LoudnessSummary, SongLoudness};
pub use loudness_meter::{LoudnessMeter, Measurement, MeterError, PcmLoudnessMeter};
pub use metadata_extractor::{AudioTags, MetadataError, MetadataExtractor, TagReader};
pub use pack_reader::{DirectoryPackReader, EmbeddedTrack, PackContents, PackReader};
pub use project_service::ProjectService;
pub use render_config::{export_node, export_project, flatten_track, ImportReport, RenderConfigImporter};
pub use script_writer::{ScriptWriter, ALT_SWAPPER_NAME, SPLIT_SCRIPT_NAME};
pub use split_engine::{SplitEngine, SplitResult};
pub use type_converter::{ConversionReport, TypeConverter};
