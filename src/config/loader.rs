//! `confetti.yaml` discovery and parsing.
//!
//! The project file lists, per named environment, the sources to register:
//!
//! ```yaml
//! environments:
//!   development:
//!     sources:
//!       - path: .env
//!       - path: config/app.yaml
//!         depth: 2
//!         filter:
//!           include_regex: "^database"
//!       - uri: github://acme/web#staging
//!         writable: false
//!       - uri: redis://localhost:6379/0
//!         prefix: "web:"
//! ```

use super::filters::{Filter, FilterSpec};
use crate::error::{ConfettiError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const CONFIG_FILE_NAME: &str = "confetti.yaml";

/// Environment variable naming an explicit project file.
pub const CONFIG_PATH_ENV: &str = "CONFETTI_CONFIG_PATH";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectFile {
    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSpec {
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
}

/// One source entry as written in the project file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub writable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterSpec>,
    /// Key prefix for key-value store sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

/// A source entry resolved into registration arguments.
#[derive(Debug, Clone)]
pub struct ParsedSource {
    /// File path (resolved against the project file) or URI.
    pub location: String,
    pub filter: Option<Filter>,
    pub depth: Option<i64>,
    pub name: Option<String>,
    pub is_writable: Option<bool>,
    pub prefix: Option<String>,
}

/// Finds, reads and caches the project file.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    project: Option<ProjectFile>,
}

impl ConfigLoader {
    /// Locate the project file: `CONFETTI_CONFIG_PATH`, then the current
    /// directory and its ancestors, then the user config directory.
    pub fn discover() -> Self {
        Self::from_path(find_config_file())
    }

    /// Use an explicit project file. A path that does not exist means no
    /// project file.
    pub fn with_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "confetti.yaml not found");
            return Self::default();
        }
        Self::from_path(Some(path.to_path_buf()))
    }

    /// Search `dir` and its ancestors only.
    pub fn search_from(dir: impl AsRef<Path>) -> Self {
        Self::from_path(search_upwards(dir.as_ref()))
    }

    fn from_path(config_path: Option<PathBuf>) -> Self {
        if let Some(path) = &config_path {
            debug!(path = %path.display(), "Using confetti.yaml");
        }
        Self {
            config_path,
            project: None,
        }
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Parse the project file once and cache it.
    ///
    /// No project file, or one that cannot be read, yields an empty
    /// project. Invalid YAML is a configuration error.
    pub fn load(&mut self) -> Result<&ProjectFile> {
        if self.project.is_none() {
            let project = match &self.config_path {
                Some(path) => read_project_file(path)?,
                None => ProjectFile::default(),
            };
            self.project = Some(project);
        }
        Ok(&*self.project.get_or_insert_with(ProjectFile::default))
    }

    /// Source entries listed for `environment`; empty when it is not defined.
    pub fn sources(&mut self, environment: &str) -> Result<Vec<SourceSpec>> {
        Ok(self
            .load()?
            .environments
            .get(environment)
            .map(|env| env.sources.clone())
            .unwrap_or_default())
    }

    /// Turn a source entry into registration arguments.
    ///
    /// Depth comes from the entry itself, else from its filter. Relative
    /// paths resolve against the directory holding the project file.
    pub fn parse_source(&self, spec: &SourceSpec) -> Result<ParsedSource> {
        let location = match (&spec.path, &spec.uri) {
            (Some(path), _) => self.resolve_path(path),
            (None, Some(uri)) => uri.clone(),
            (None, None) => {
                return Err(ConfettiError::configuration(
                    "Source must have either 'path' or 'uri'",
                ));
            }
        };
        let filter = match &spec.filter {
            Some(filter) => Filter::from_spec(filter)?,
            None => None,
        };
        let depth = spec
            .depth
            .or_else(|| spec.filter.as_ref().and_then(|f| f.depth));

        Ok(ParsedSource {
            location,
            filter,
            depth,
            name: spec.name.clone(),
            is_writable: spec.writable,
            prefix: spec.prefix.clone(),
        })
    }

    fn resolve_path(&self, path: &str) -> String {
        let raw = Path::new(path);
        if raw.is_absolute() {
            return path.to_string();
        }
        match self.config_path.as_deref().and_then(Path::parent) {
            Some(base) if !base.as_os_str().is_empty() => base.join(raw).to_string_lossy().into_owned(),
            _ => path.to_string(),
        }
    }
}

fn read_project_file(path: &Path) -> Result<ProjectFile> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Could not read confetti.yaml");
            return Ok(ProjectFile::default());
        }
    };
    if content.trim().is_empty() {
        return Ok(ProjectFile::default());
    }
    serde_yaml::from_str::<Option<ProjectFile>>(&content)
        .map(Option::unwrap_or_default)
        .map_err(|e| {
            ConfettiError::configuration(format!(
                "Invalid confetti.yaml at {}: {}",
                path.display(),
                e
            ))
        })
}

fn find_config_file() -> Option<PathBuf> {
    if let Ok(explicit) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(explicit);
        if path.is_file() {
            return Some(path);
        }
        warn!(path = %path.display(), "{} points to a missing file", CONFIG_PATH_ENV);
    }

    if let Some(found) = std::env::current_dir()
        .ok()
        .and_then(|cwd| search_upwards(&cwd))
    {
        return Some(found);
    }

    dirs::config_dir()
        .map(|dir| dir.join("confetti").join(CONFIG_FILE_NAME))
        .filter(|path| path.is_file())
}

fn search_upwards(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use tempfile::TempDir;

    const PROJECT: &str = r#"
environments:
  development:
    sources:
      - path: .env
      - path: config/app.yaml
        name: app
        filter:
          include_regex: "^database"
          depth: 2
      - uri: github://acme/web#staging
        writable: false
        depth: 1
        filter:
          depth: 5
      - uri: redis://localhost:6379/0
        prefix: "web:"
  production: {}
"#;

    fn write_project(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join(CONFIG_FILE_NAME);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_search_from_finds_ancestor_file() {
        let temp = TempDir::new().unwrap();
        let path = write_project(temp.path(), PROJECT);
        let nested = temp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let loader = ConfigLoader::search_from(&nested);
        assert_eq!(loader.config_path(), Some(path.as_path()));
    }

    #[test]
    fn test_missing_explicit_path_means_no_file() {
        let temp = TempDir::new().unwrap();
        let mut loader = ConfigLoader::with_path(temp.path().join("nope.yaml"));
        assert!(loader.config_path().is_none());
        assert!(loader.load().unwrap().environments.is_empty());
    }

    #[test]
    fn test_sources_for_environment() {
        let temp = TempDir::new().unwrap();
        let path = write_project(temp.path(), PROJECT);
        let mut loader = ConfigLoader::with_path(&path);

        assert_eq!(loader.sources("development").unwrap().len(), 4);
        assert!(loader.sources("production").unwrap().is_empty());
        assert!(loader.sources("unknown").unwrap().is_empty());
    }

    #[test]
    fn test_parse_source_resolves_relative_paths() {
        let temp = TempDir::new().unwrap();
        let path = write_project(temp.path(), PROJECT);
        let mut loader = ConfigLoader::with_path(&path);
        let specs = loader.sources("development").unwrap();

        let app = loader.parse_source(&specs[1]).unwrap();
        assert_eq!(
            PathBuf::from(&app.location),
            temp.path().join("config/app.yaml")
        );
        assert_eq!(app.name.as_deref(), Some("app"));
        assert_eq!(app.depth, Some(2));
        let filter = app.filter.unwrap();
        assert!(filter.includes("database.host"));
        assert!(!filter.includes("cache.ttl"));
    }

    #[test]
    fn test_parse_source_depth_precedence_and_uri() {
        let temp = TempDir::new().unwrap();
        let path = write_project(temp.path(), PROJECT);
        let mut loader = ConfigLoader::with_path(&path);
        let specs = loader.sources("development").unwrap();

        let remote = loader.parse_source(&specs[2]).unwrap();
        assert_eq!(remote.location, "github://acme/web#staging");
        assert_eq!(remote.depth, Some(1));
        assert_eq!(remote.is_writable, Some(false));

        let store = loader.parse_source(&specs[3]).unwrap();
        assert_eq!(store.location, "redis://localhost:6379/0");
        assert_eq!(store.prefix.as_deref(), Some("web:"));
    }

    #[test]
    fn test_parse_source_requires_location() {
        let loader = ConfigLoader::default();
        let err = loader.parse_source(&SourceSpec::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Configuration);
    }

    #[test]
    fn test_invalid_yaml_is_configuration_error() {
        let temp = TempDir::new().unwrap();
        let path = write_project(temp.path(), "environments: [unclosed");
        let mut loader = ConfigLoader::with_path(&path);
        let err = loader.load().unwrap_err();
        assert_eq!(err.code(), ErrorCode::Configuration);
        assert!(err.to_string().contains("confetti.yaml"));
    }

    #[test]
    fn test_empty_file_is_empty_project() {
        let temp = TempDir::new().unwrap();
        let path = write_project(temp.path(), "# nothing yet\n");
        let mut loader = ConfigLoader::with_path(&path);
        assert!(loader.load().unwrap().environments.is_empty());
    }
}
