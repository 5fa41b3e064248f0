//! Configuration loading and config file resolution
//!
//! Bootstrap settings come from a TOML file. Resolution priority:
//! 1. Explicit path (command-line argument)
//! 2. `MSU_SCRIPTER_CONFIG` environment variable
//! 3. Platform config directory (`~/.config/msu-scripter/config.toml` on Linux)
//! 4. Compiled defaults
//!
//! A missing or unreadable file never aborts startup: a warning is logged
//! and the compiled defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "MSU_SCRIPTER_CONFIG";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Optional MSU type definition file; same-named types override the built-ins
    #[serde(default)]
    pub msu_types_path: Option<PathBuf>,

    /// Loudness analysis settings
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Generated toggle script settings
    #[serde(default)]
    pub scripts: ScriptConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Loudness analysis settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Upper bound on songs measured at the same time
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_measurements: usize,

    /// Distance from the project average (dB) above which a song is flagged
    #[serde(default = "default_outlier_threshold")]
    pub outlier_threshold_db: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_concurrent_measurements: default_max_concurrent(),
            outlier_threshold_db: default_outlier_threshold(),
        }
    }
}

/// Platform flavour of generated toggle scripts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptFlavor {
    /// Windows batch file (`.bat`)
    #[default]
    Batch,
    /// POSIX shell script (`.sh`)
    Shell,
}

impl ScriptFlavor {
    /// File extension (without dot)
    pub fn extension(&self) -> &'static str {
        match self {
            ScriptFlavor::Batch => "bat",
            ScriptFlavor::Shell => "sh",
        }
    }
}

/// Generated toggle script settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptConfig {
    #[serde(default)]
    pub flavor: ScriptFlavor,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_concurrent() -> usize {
    4
}

fn default_outlier_threshold() -> f64 {
    4.0
}

/// Config file resolution following the documented priority order
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }

    /// Resolve the config file location, if any candidate exists
    ///
    /// An explicit CLI or environment path is returned even if it does not
    /// exist, so the subsequent load can warn about it.
    pub fn resolve_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.cli_path {
            return Some(path.clone());
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        default_config_path().filter(|p| p.exists())
    }

    /// Resolve and load configuration, degrading to defaults
    pub fn load(&self) -> TomlConfig {
        match self.resolve_path() {
            Some(path) => load_toml_config(&path).unwrap_or_else(|e| {
                warn!("Using default configuration: {}", e);
                TomlConfig::default()
            }),
            None => {
                info!("No config file found, using compiled defaults");
                TomlConfig::default()
            }
        }
    }
}

/// Platform default config file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("msu-scripter").join("config.toml"))
}

/// Load a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    #[cfg(unix)]
    {
        if check_toml_permissions_loose(path).unwrap_or(false) {
            warn!(
                "Config file {} is readable by other users (expected 0600)",
                path.display()
            );
        }
    }

    info!("Configuration loaded from {}", path.display());
    Ok(config)
}

/// Write TOML config atomically (temp file + rename)
///
/// Creates the parent directory when missing. On Unix the file is
/// restricted to 0600 before it is moved into place.
pub fn write_toml_config(config: &TomlConfig, target: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let temp_path = target.with_extension("toml.tmp");
    std::fs::write(&temp_path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&temp_path)?.permissions();
        perms.set_mode(0o600);
        std::fs::set_permissions(&temp_path, perms)?;
    }

    std::fs::rename(&temp_path, target)?;
    Ok(())
}

/// Returns true when group/other permission bits are set
#[cfg(unix)]
pub fn check_toml_permissions_loose(path: &Path) -> Result<bool> {
    use std::os::unix::fs::PermissionsExt;
    let mode = std::fs::metadata(path)?.permissions().mode();
    Ok(mode & 0o077 != 0)
}
