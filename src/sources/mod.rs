//! Concrete source adapters.
//!
//! - [`EnvFileSource`]: `KEY=VALUE` files
//! - [`StructuredFileSource`]: YAML and JSON documents, flattened to dotted keys
//! - [`IniFileSource`]: INI sections, flattened to `section.key`
//! - [`RedisKeyValueSource`]: keys of a Redis database, optionally under a prefix
//! - [`GitHubEnvSource`]: variables of a GitHub deployment environment
//! - [`MemorySource`]: in-process map, for injection and tests

mod env_file;
mod github_env;
mod ini_file;
mod memory;
mod redis_kv;
mod structured;

pub use env_file::EnvFileSource;
pub use github_env::{GitHubEnvSource, GitHubTarget};
pub use ini_file::IniFileSource;
pub use memory::MemorySource;
pub use redis_kv::RedisKeyValueSource;
pub use structured::{StructuredFileSource, StructuredFormat};

use crate::error::{ConfettiError, Result};
use std::path::Path;

/// Stable id for a file-backed source: the canonical path when the file
/// exists, the absolute path otherwise.
pub(crate) fn source_id_for_path(path: &Path) -> String {
    let resolved = std::fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf());
    resolved.to_string_lossy().into_owned()
}

/// Default display name, `<prefix>:<file name>`.
pub(crate) fn file_label(prefix: &str, path: &Path) -> String {
    let file = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    format!("{}:{}", prefix, file)
}

/// Read a file, treating a missing file as absent.
pub(crate) fn read_optional(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(ConfettiError::io(path, err)),
    }
}

pub(crate) fn write_file(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).map_err(|err| ConfettiError::io(path, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_source_id_is_absolute() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("app.env");
        std::fs::write(&file, "A=1\n").unwrap();
        let id = source_id_for_path(&file);
        assert!(Path::new(&id).is_absolute());
        assert!(id.ends_with("app.env"));

        let missing = source_id_for_path(Path::new("not-there.env"));
        assert!(Path::new(&missing).is_absolute());
    }

    #[test]
    fn test_file_label() {
        assert_eq!(file_label("env", Path::new("/srv/app/.env")), "env:.env");
    }

    #[test]
    fn test_read_optional_missing_file() {
        let temp = TempDir::new().unwrap();
        assert!(read_optional(&temp.path().join("nope")).unwrap().is_none());
    }
}
