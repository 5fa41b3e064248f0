//! Runtime configuration for msu-scripter
//!
//! Resolves the TOML bootstrap config, the MSU type registry it points at,
//! and the log filter.

use msu_common::config::{ConfigResolver, TomlConfig};
use msu_common::Result;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::msu_types::TrackSchemaRegistry;

/// Load the TOML config
///
/// **Priority:** CLI path → `MSU_SCRIPTER_CONFIG` → user config dir → defaults
pub fn load_config(cli_path: Option<PathBuf>) -> TomlConfig {
    ConfigResolver::new(cli_path).load()
}

/// Registry for this run: built-ins, overridden by the configured file
///
/// An unreadable custom file is reported and the built-ins are used.
pub fn resolve_registry(config: &TomlConfig) -> Result<TrackSchemaRegistry> {
    let Some(path) = &config.msu_types_path else {
        return TrackSchemaRegistry::builtin();
    };

    match TrackSchemaRegistry::builtin_with_overrides(path) {
        Ok(registry) => {
            info!(path = %path.display(), "Using custom MSU type definitions");
            Ok(registry)
        }
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "Could not load custom MSU type definitions, using built-ins"
            );
            TrackSchemaRegistry::builtin()
        }
    }
}

/// Log filter directive
///
/// **Priority:** `RUST_LOG` → config `[logging] level` → `info`
pub fn log_directive(config: &TomlConfig) -> String {
    std::env::var("RUST_LOG")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| {
            let level = config.logging.level.trim();
            if level.is_empty() {
                "info".to_string()
            } else {
                level.to_string()
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msu_types::SUPER_METROID;
    use tempfile::TempDir;

    #[test]
    fn test_missing_custom_types_fall_back_to_builtin() {
        let config = TomlConfig {
            msu_types_path: Some(PathBuf::from("/nonexistent/msu_types.json")),
            ..Default::default()
        };
        let registry = resolve_registry(&config).unwrap();
        assert!(registry.get(SUPER_METROID).is_some());
    }

    #[test]
    fn test_custom_types_extend_builtin() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("types.json");
        std::fs::write(
            &path,
            r#"[{"name": "Custom", "tracks": [{"number": 1, "name": "Theme"}]}]"#,
        )
        .unwrap();
        let config = TomlConfig {
            msu_types_path: Some(path),
            ..Default::default()
        };

        let registry = resolve_registry(&config).unwrap();
        assert!(registry.get("Custom").is_some());
        assert!(registry.get(SUPER_METROID).is_some());
    }
}
