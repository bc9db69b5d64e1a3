//! In-process source.

use crate::config::{Filter, FlatMap, Source, SourceCache, retain_included};
use crate::error::Result;
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};

/// Source backed by a shared in-memory map.
///
/// The backing map plays the role of the file: `save` writes staged changes
/// into it and `load` reads it back. Clones of [`store`](MemorySource::store)
/// observe saved values.
#[derive(Debug)]
pub struct MemorySource {
    id: String,
    name: String,
    store: Arc<Mutex<FlatMap>>,
    cache: SourceCache,
}

impl MemorySource {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            store: Arc::new(Mutex::new(FlatMap::new())),
            cache: SourceCache::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Seed the backing map.
    pub fn with_value(self, key: impl Into<String>, value: Value) -> Self {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value);
        self
    }

    /// Shared handle to the backing map.
    pub fn store(&self) -> Arc<Mutex<FlatMap>> {
        Arc::clone(&self.store)
    }

    fn snapshot(&self) -> FlatMap {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Source for MemorySource {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn extension(&self) -> Option<&str> {
        None
    }

    fn load(&mut self, filter: Option<&Filter>, _depth: Option<i64>) -> Result<FlatMap> {
        let values = self.snapshot();
        self.cache.replace(values.clone());
        Ok(retain_included(values, filter))
    }

    fn save(&mut self) -> Result<()> {
        {
            let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
            for (key, value) in self.cache.staged() {
                match value {
                    Some(value) => store.insert(key.clone(), value.clone()),
                    None => store.remove(key),
                };
            }
        }
        self.cache.clear_staged();
        self.reload()
    }

    fn reload(&mut self) -> Result<()> {
        let values = self.snapshot();
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
