//! Named environments and the source factory.

use super::filters::Filter;
use super::loader::ConfigLoader;
use super::source::{RegisteredSource, Source};
use super::unified::Config;
use crate::error::{ConfettiError, Result};
use crate::sources::{
    EnvFileSource, GitHubEnvSource, IniFileSource, RedisKeyValueSource, StructuredFileSource,
    StructuredFormat,
};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Registration options for a source.
#[derive(Debug, Clone, Default)]
pub struct SourceOptions {
    pub filter: Option<Filter>,
    pub depth: Option<i64>,
    pub name: Option<String>,
    /// Defaults to writable.
    pub is_writable: Option<bool>,
    /// Key prefix for key-value store sources.
    pub prefix: Option<String>,
}

impl SourceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn depth(mut self, depth: i64) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn writable(mut self, is_writable: bool) -> Self {
        self.is_writable = Some(is_writable);
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }
}

/// Build the adapter for a path or URI.
///
/// - `github://owner/repo#env`: GitHub environment variables
/// - `redis://` / `rediss://`: Redis keys, under `options.prefix` if set
/// - `.ini`: INI file
/// - `.yaml` / `.yml`: YAML file
/// - `.json`: JSON file
/// - `.env`, `.env.*`, or any other existing file: env file
///
/// Only `name` and `prefix` of `options` are used here.
pub fn create_source(location: &str, options: &SourceOptions) -> Result<Box<dyn Source>> {
    let name = options.name.as_deref();
    if location.starts_with("redis://") || location.starts_with("rediss://") {
        let mut source = RedisKeyValueSource::new(location)?;
        if let Some(prefix) = &options.prefix {
            source = source.with_prefix(prefix.as_str());
        }
        return Ok(match name {
            Some(name) => Box::new(source.with_name(name)),
            None => Box::new(source),
        });
    }
    if location.starts_with("github://") {
        let source = GitHubEnvSource::new(location, None)?;
        return Ok(match name {
            Some(name) => Box::new(source.with_name(name)),
            None => Box::new(source),
        });
    }
    if location.contains("://") {
        return Err(ConfettiError::unsupported(location));
    }

    let path = Path::new(location);
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    if extension.as_deref() == Some("ini") {
        let source = IniFileSource::new(path);
        return Ok(match name {
            Some(name) => Box::new(source.with_name(name)),
            None => Box::new(source),
        });
    }
    if let Some(format) = StructuredFormat::from_path(path) {
        let source = StructuredFileSource::new(path, format);
        return Ok(match name {
            Some(name) => Box::new(source.with_name(name)),
            None => Box::new(source),
        });
    }
    if is_env_file_name(path, extension.as_deref()) || path.is_file() {
        let source = EnvFileSource::new(path);
        return Ok(match name {
            Some(name) => Box::new(source.with_name(name)),
            None => Box::new(source),
        });
    }
    Err(ConfettiError::unsupported(location))
}

fn is_env_file_name(path: &Path, extension: Option<&str>) -> bool {
    if extension == Some("env") {
        return true;
    }
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name == ".env" || name.starts_with(".env."))
}

/// An ordered set of sources for one named environment.
#[derive(Debug)]
pub struct Environment {
    name: String,
    registered: Vec<RegisteredSource>,
    config_file: Option<PathBuf>,
}

impl Environment {
    /// An environment with no sources.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registered: Vec::new(),
            config_file: None,
        }
    }

    /// Register every source `loader` lists for `name`.
    ///
    /// Entries that fail to parse or build are skipped with a warning; an
    /// invalid project file is an error.
    pub fn from_loader(name: impl Into<String>, loader: &mut ConfigLoader) -> Result<Self> {
        let mut env = Self::new(name);
        env.config_file = loader.config_path().map(Path::to_path_buf);

        for spec in loader.sources(&env.name)? {
            let registered = loader.parse_source(&spec).and_then(|parsed| {
                let options = SourceOptions {
                    filter: parsed.filter,
                    depth: parsed.depth,
                    name: parsed.name,
                    is_writable: parsed.is_writable,
                    prefix: parsed.prefix,
                };
                env.register_source(&parsed.location, options)
            });
            if let Err(err) = registered {
                warn!(
                    environment = %env.name,
                    error = %err,
                    "Skipping source from confetti.yaml"
                );
            }
        }
        Ok(env)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The project file this environment was read from, if any.
    pub fn config_file_path(&self) -> Option<&Path> {
        self.config_file.as_deref()
    }

    /// Create and register a source after the ones already present.
    pub fn register_source(&mut self, location: &str, options: SourceOptions) -> Result<()> {
        let source = create_source(location, &options)?;
        let mut registered =
            RegisteredSource::from_boxed(source).writable(options.is_writable.unwrap_or(true));
        registered.filter = options.filter;
        registered.depth = options.depth;
        debug!(
            environment = %self.name,
            source_id = %registered.id(),
            "Registered source"
        );
        self.registered.push(registered);
        Ok(())
    }

    /// Register several locations with default options, in order.
    pub fn register_sources<I, S>(&mut self, locations: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for location in locations {
            self.register_source(location.as_ref(), SourceOptions::default())?;
        }
        Ok(())
    }

    /// Register a ready-made source, writable and unfiltered.
    pub fn add_source(&mut self, source: impl Source + 'static) {
        self.registered.push(RegisteredSource::new(source));
    }

    /// Register a source with its registration settings already chosen.
    pub fn add_registered(&mut self, registered: RegisteredSource) {
        self.registered.push(registered);
    }

    pub fn sources(&self) -> &[RegisteredSource] {
        &self.registered
    }

    /// Build the merged configuration and materialize it.
    pub fn into_config(self) -> Result<Config> {
        let mut config = Config::new(self.registered);
        config.materialize()?;
        Ok(config)
    }
}
