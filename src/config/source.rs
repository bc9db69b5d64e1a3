//! Source capability trait and source registration.

use super::filters::Filter;
use super::types::FlatMap;
use crate::error::Result;
use serde_json::Value;

/// Last-loaded snapshot plus staged writes, shared by every adapter.
///
/// Staged entries keep the position of the first write to a key; a later
/// write to the same key replaces the value in place. `None` stages removal.
#[derive(Debug, Clone, Default)]
pub struct SourceCache {
    values: FlatMap,
    staged: Vec<(String, Option<Value>)>,
}

impl SourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot with freshly loaded values.
    pub fn replace(&mut self, values: FlatMap) {
        self.values = values;
    }

    pub fn values(&self) -> &FlatMap {
        &self.values
    }

    pub fn stage(&mut self, key: &str, value: Option<Value>) {
        match self.staged.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.staged.push((key.to_string(), value)),
        }
    }

    pub fn staged(&self) -> &[(String, Option<Value>)] {
        &self.staged
    }

    pub fn has_staged(&self) -> bool {
        !self.staged.is_empty()
    }

    pub fn clear_staged(&mut self) {
        self.staged.clear();
    }
}

/// A named backend that loads and persists a flat key-value view.
///
/// Reads (`get`, `exists`, `keys`, `values`, `size`) answer from the
/// last-loaded cache. `set`, `unset` and `clear` only stage; `save` is the
/// single point where backing storage changes, after which the cache is
/// refreshed.
///
/// Implementors provide identity, `load`, `save`, `reload` and access to
/// their [`SourceCache`]; the rest has default implementations.
pub trait Source: Send {
    /// Stable id, unique across the process. Used for provenance and save routing.
    fn id(&self) -> &str;

    /// Display name.
    fn name(&self) -> &str;

    /// Format hint such as `.env` or `.yaml`.
    fn extension(&self) -> Option<&str>;

    /// Re-read the backing store and return a flattened view honoring
    /// `filter` and `depth`.
    fn load(&mut self, filter: Option<&Filter>, depth: Option<i64>) -> Result<FlatMap>;

    /// Persist staged changes, clear them, and refresh the cache.
    fn save(&mut self) -> Result<()>;

    /// Discard the cache and re-read the backing store.
    fn reload(&mut self) -> Result<()>;

    fn cache(&self) -> &SourceCache;

    fn cache_mut(&mut self) -> &mut SourceCache;

    fn get(&self, key: &str) -> Option<Value> {
        self.cache().values().get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) {
        self.cache_mut().stage(key, Some(value));
    }

    fn unset(&mut self, key: &str) {
        self.cache_mut().stage(key, None);
    }

    fn exists(&self, key: &str) -> bool {
        self.cache().values().contains_key(key)
    }

    fn keys(&self) -> Vec<String> {
        self.cache().values().keys().cloned().collect()
    }

    fn values(&self) -> FlatMap {
        self.cache().values().clone()
    }

    /// Stage removal of every currently known key.
    fn clear(&mut self) {
        for key in self.keys() {
            self.unset(&key);
        }
    }

    fn size(&self) -> usize {
        self.cache().values().len()
    }
}

/// A source at a fixed precedence position, with its filter, depth
/// override and writability.
pub struct RegisteredSource {
    pub source: Box<dyn Source>,
    pub filter: Option<Filter>,
    pub depth: Option<i64>,
    pub is_writable: bool,
}

impl RegisteredSource {
    /// Register a writable source with no filter and no depth limit.
    pub fn new(source: impl Source + 'static) -> Self {
        Self::from_boxed(Box::new(source))
    }

    pub fn from_boxed(source: Box<dyn Source>) -> Self {
        Self {
            source,
            filter: None,
            depth: None,
            is_writable: true,
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_depth(mut self, depth: i64) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn writable(mut self, is_writable: bool) -> Self {
        self.is_writable = is_writable;
        self
    }

    pub fn read_only(self) -> Self {
        self.writable(false)
    }

    pub fn id(&self) -> &str {
        self.source.id()
    }
}

impl std::fmt::Debug for RegisteredSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredSource")
            .field("id", &self.source.id())
            .field("name", &self.source.name())
            .field("filter", &self.filter)
            .field("depth", &self.depth)
            .field("is_writable", &self.is_writable)
            .finish()
    }
}
