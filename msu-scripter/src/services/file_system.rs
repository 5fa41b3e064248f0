//! File-system primitives used by the conversion and split engines
//!
//! Engines receive a `&dyn FileSystem` so tests can observe or fail
//! individual operations without touching the real disk layout.

use msu_common::{Error, Result};
use std::path::Path;

pub trait FileSystem: Send + Sync {
    /// True for an existing regular file
    fn is_file(&self, path: &Path) -> bool;

    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Create `link` as a hard link to the content of `original`
    fn hard_link(&self, original: &Path, link: &Path) -> Result<()>;

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;

    fn read_to_string(&self, path: &Path) -> Result<String>;

    fn remove_file(&self, path: &Path) -> Result<()>;
}

/// `std::fs` backed implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl FileSystem for LocalFileSystem {
    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        std::fs::rename(from, to).map_err(|e| Error::file_system(from, e))
    }

    fn hard_link(&self, original: &Path, link: &Path) -> Result<()> {
        std::fs::hard_link(original, link).map_err(|e| Error::file_system(link, e))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::file_system(parent, e))?;
        }
        std::fs::write(path, contents).map_err(|e| Error::file_system(path, e))
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).map_err(|e| Error::file_system(path, e))
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        std::fs::remove_file(path).map_err(|e| Error::file_system(path, e))
    }
}
