//! Redis key-value source.
//!
//! Every key under an optional prefix is one flat config key, with the
//! prefix stripped. Values are stored as strings.

use crate::config::{Filter, FlatMap, Source, SourceCache, retain_included, value_to_text};
use crate::error::{ConfettiError, Result};
use redis::{Client, Commands, Connection};
use serde_json::Value;
use tracing::debug;

#[derive(Debug)]
pub struct RedisKeyValueSource {
    uri: String,
    name: String,
    prefix: String,
    client: Client,
    cache: SourceCache,
}

impl RedisKeyValueSource {
    /// Build a source for a `redis://` URI. No connection is made until the
    /// first load.
    pub fn new(uri: &str) -> Result<Self> {
        let client = Client::open(uri).map_err(|e| {
            ConfettiError::configuration(format!("Invalid Redis URI '{}': {}", uri, e))
        })?;
        Ok(Self {
            uri: uri.to_string(),
            name: format!("redis:{}", uri),
            prefix: String::new(),
            client,
            cache: SourceCache::new(),
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Only expose keys starting with `prefix`.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn unprefixed<'a>(&self, key: &'a str) -> &'a str {
        key.strip_prefix(self.prefix.as_str()).unwrap_or(key)
    }

    fn connect(&self) -> Result<Connection> {
        self.client
            .get_connection()
            .map_err(|e| ConfettiError::key_value(&self.uri, e))
    }

    fn fetch_all(&self) -> Result<FlatMap> {
        let mut con = self.connect()?;
        let keys: Vec<String> = con
            .keys(self.prefixed("*"))
            .map_err(|e| ConfettiError::key_value(&self.uri, e))?;
        if keys.is_empty() {
            return Ok(FlatMap::new());
        }
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query(&mut con)
            .map_err(|e| ConfettiError::key_value(&self.uri, e))?;

        // Keys can vanish between KEYS and MGET
        let loaded: FlatMap = keys
            .iter()
            .zip(values)
            .filter_map(|(key, value)| {
                value.map(|v| (self.unprefixed(key).to_string(), Value::String(v)))
            })
            .collect();
        debug!(source_id = %self.uri, keys = loaded.len(), "Fetched Redis keys");
        Ok(loaded)
    }
}

impl Source for RedisKeyValueSource {
    fn id(&self) -> &str {
        &self.uri
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn extension(&self) -> Option<&str> {
        None
    }

    fn load(&mut self, filter: Option<&Filter>, _depth: Option<i64>) -> Result<FlatMap> {
        let values = self.fetch_all()?;
        self.cache.replace(values.clone());
        Ok(retain_included(values, filter))
    }

    /// Sends every staged change in one atomic pipeline.
    fn save(&mut self) -> Result<()> {
        if self.cache.has_staged() {
            let mut pipe = redis::pipe();
            pipe.atomic();
            for (key, value) in self.cache.staged() {
                match value {
                    Some(value) => {
                        pipe.set(self.prefixed(key), value_to_text(value)).ignore();
                    }
                    None => {
                        pipe.del(self.prefixed(key)).ignore();
                    }
                }
            }
            let mut con = self.connect()?;
            pipe.query::<()>(&mut con)
                .map_err(|e| ConfettiError::key_value(&self.uri, e))?;
            debug!(
                source_id = %self.uri,
                changes = self.cache.staged().len(),
                "Wrote Redis keys"
            );
        }
        self.cache.clear_staged();
        self.reload()
    }

    fn reload(&mut self) -> Result<()> {
        let values = self.fetch_all()?;
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
