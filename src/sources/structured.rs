//! YAML and JSON document sources.
//!
//! Documents are flattened into dotted keys on load. On save the staged
//! dotted keys are written back into the nested document.

use super::{file_label, read_optional, source_id_for_path, write_file};
use crate::config::{
    Filter, FlatMap, Source, SourceCache, filter_hierarchical, flatten, normalize_leaves,
    retain_included,
};
use crate::error::{ConfettiError, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Serialization format of a structured document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuredFormat {
    Yaml,
    Json,
}

impl StructuredFormat {
    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Self::Yaml => ".yaml",
            Self::Json => ".json",
        }
    }

    fn parse(self, path: &Path, content: &str) -> Result<Value> {
        match self {
            Self::Yaml => serde_yaml::from_str(content).map_err(|e| ConfettiError::format(path, e)),
            Self::Json => serde_json::from_str(content).map_err(|e| ConfettiError::format(path, e)),
        }
    }

    fn render(self, path: &Path, document: &Value) -> Result<String> {
        match self {
            Self::Yaml => serde_yaml::to_string(document).map_err(|e| ConfettiError::format(path, e)),
            Self::Json => serde_json::to_string_pretty(document)
                .map(|mut out| {
                    out.push('\n');
                    out
                })
                .map_err(|e| ConfettiError::format(path, e)),
        }
    }
}

impl std::fmt::Display for StructuredFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A YAML or JSON file presented as a flat dotted-key view.
#[derive(Debug)]
pub struct StructuredFileSource {
    path: PathBuf,
    format: StructuredFormat,
    id: String,
    name: String,
    cache: SourceCache,
}

impl StructuredFileSource {
    pub fn new(path: impl AsRef<Path>, format: StructuredFormat) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            id: source_id_for_path(&path),
            name: file_label(format.label(), &path),
            path,
            format,
            cache: SourceCache::new(),
        }
    }

    pub fn yaml(path: impl AsRef<Path>) -> Self {
        Self::new(path, StructuredFormat::Yaml)
    }

    pub fn json(path: impl AsRef<Path>) -> Self {
        Self::new(path, StructuredFormat::Json)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> StructuredFormat {
        self.format
    }

    /// Top-level mapping of the document. Missing, empty and non-mapping
    /// documents read as empty.
    fn read_document(&self) -> Result<Map<String, Value>> {
        let Some(content) = read_optional(&self.path)? else {
            return Ok(Map::new());
        };
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        match self.format.parse(&self.path, &content)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }
}

impl Source for StructuredFileSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn extension(&self) -> Option<&str> {
        Some(self.format.extension())
    }

    fn load(&mut self, filter: Option<&Filter>, depth: Option<i64>) -> Result<FlatMap> {
        let document = self.read_document()?;
        let flattened = match filter {
            // The filter's own depth overrides the registered one
            Some(f) if f.shapes_hierarchy() => {
                filter_hierarchical(&document, f.hierarchical_spec(), f.depth().or(depth))
            }
            _ => flatten(&document, depth),
        };
        let normalized = normalize_leaves(flattened);
        self.cache.replace(normalized.clone());
        Ok(retain_included(normalized, filter))
    }

    fn save(&mut self) -> Result<()> {
        let mut document = self.read_document()?;
        for (key, value) in self.cache.staged() {
            let path: Vec<&str> = key.split('.').collect();
            match value {
                Some(value) => set_nested(&mut document, &path, value.clone()),
                None => unset_nested(&mut document, &path),
            }
        }
        let rendered = self.format.render(&self.path, &Value::Object(document))?;
        write_file(&self.path, &rendered)?;
        debug!(
            path = %self.path.display(),
            format = %self.format,
            changes = self.cache.staged().len(),
            "Wrote structured file"
        );
        self.cache.clear_staged();
        self.reload()
    }

    fn reload(&mut self) -> Result<()> {
        self.load(None, None).map(|_| ())
    }

    fn cache(&self) -> &SourceCache {
        &self.cache
    }

    fn cache_mut(&mut self) -> &mut SourceCache {
        &mut self.cache
    }
}

/// Set a dotted path, creating intermediate mappings and replacing any
/// scalar in the way.
fn set_nested(map: &mut Map<String, Value>, path: &[&str], value: Value) {
    match path {
        [] => {}
        [last] => {
            map.insert(last.to_string(), value);
        }
        [head, rest @ ..] => {
            let entry = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(child) = entry {
                set_nested(child, rest, value);
            }
        }
    }
}

/// Remove a dotted path; missing paths are ignored.
fn unset_nested(map: &mut Map<String, Value>, path: &[&str]) {
    match path {
        [] => {}
        [last] => {
            map.remove(*last);
        }
        [head, rest @ ..] => {
            if let Some(Value::Object(child)) = map.get_mut(*head) {
                unset_nested(child, rest);
            }
        }
    }
}
