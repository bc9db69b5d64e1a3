//! `.env` file source.

use super::{file_label, read_optional, source_id_for_path, write_file};
use crate::config::{Filter, FlatMap, Source, SourceCache, retain_included, value_to_text};
use crate::dotenv;
use crate::error::{ConfettiError, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Flat `KEY=VALUE` file. Every value loads as a string.
#[derive(Debug)]
pub struct EnvFileSource {
    path: PathBuf,
    id: String,
    name: String,
    cache: SourceCache,
}

impl EnvFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            id: source_id_for_path(&path),
            name: file_label("env", &path),
            path,
            cache: SourceCache::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<FlatMap> {
        let content = read_optional(&self.path)?.unwrap_or_default();
        Ok(dotenv::parse(&content)
            .into_iter()
            .map(|(key, value)| (key, Value::String(value)))
            .collect())
    }
}

impl Source for EnvFileSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn extension(&self) -> Option<&str> {
        Some(".env")
    }

    fn load(&mut self, filter: Option<&Filter>, _depth: Option<i64>) -> Result<FlatMap> {
        let values = self.read()?;
        self.cache.replace(values.clone());
        Ok(retain_included(values, filter))
    }

    /// Fails without touching the file when a staged key is not a valid
    /// variable name.
    fn save(&mut self) -> Result<()> {
        if let Some((key, _)) = self
            .cache
            .staged()
            .iter()
            .find(|(key, value)| value.is_some() && !dotenv::is_valid_key(key))
        {
            return Err(ConfettiError::format(
                &self.path,
                format!("'{}' is not a valid env variable name", key),
            ));
        }
        let changes: Vec<(String, Option<String>)> = self
            .cache
            .staged()
            .iter()
            .map(|(key, value)| (key.clone(), value.as_ref().map(value_to_text)))
            .collect();
        let current = read_optional(&self.path)?.unwrap_or_default();
        write_file(&self.path, &dotenv::rewrite(&current, &changes))?;
        debug!(path = %self.path.display(), changes = changes.len(), "Wrote env file");
        self.cache.clear_staged();
        self.reload()
    }

    fn reload(&mut self) -> Result<()> {
        let values = self.read()?;
        self.cache.replace(values);
        Ok(())
    }

    fn cache(&self) -> &SourceCache {
        &self.cache
    }

    fn cache_mut(&mut self) -> &mut SourceCache {
        &mut self.cache
    }
}
