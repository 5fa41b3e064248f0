//! Common error types for MSU Scripter

use std::path::PathBuf;
use thiserror::Error;

/// Common result type for MSU Scripter operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the MSU Scripter engines
#[derive(Error, Debug)]
pub enum Error {
    /// Missing project, pack, or schema
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conversion requested between schemas with no declared relation
    #[error("MSU type '{from}' is not compatible with '{to}'")]
    IncompatibleSchema { from: String, to: String },

    /// Compatible schemas, but no remap registered for the pair
    #[error("No track conversion registered from '{from}' to '{to}'")]
    UnsupportedConversion { from: String, to: String },

    /// Operation requires project data that is not present
    #[error("Missing prerequisite: {0}")]
    MissingPrerequisite(String),

    /// A single file operation failed
    #[error("File operation failed for {path}: {source}")]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Document could not be parsed or written
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Wrap an I/O error with the path it happened on
    pub fn file_system(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::FileSystem {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incompatible_schema_message_names_both_types() {
        let err = Error::IncompatibleSchema {
            from: "Super Metroid".to_string(),
            to: "Mega Man X".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Super Metroid"));
        assert!(msg.contains("Mega Man X"));
    }

    #[test]
    fn test_file_system_error_keeps_path_and_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = Error::file_system("/tmp/pack-1.pcm", io);
        assert!(err.to_string().contains("/tmp/pack-1.pcm"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
