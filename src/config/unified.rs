//! Unified configuration view with provenance and staged writes.

use super::merge::merge_sources;
use super::source::{RegisteredSource, Source};
use super::types::{ChangeOp, ConfigChange, FlatMap, ProvenanceRecord};
use crate::error::{ConfettiError, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Merged configuration over an ordered list of sources.
///
/// Reads materialize the merged view lazily on first access. Writes are
/// staged with [`set`](Config::set) and [`unset`](Config::unset), show up in
/// the effective map immediately, and reach the sources only on
/// [`save`](Config::save).
///
/// Not synchronized: wrap in a mutex to share across threads.
#[derive(Debug)]
pub struct Config {
    sources: Vec<RegisteredSource>,
    effective: FlatMap,
    provenance: BTreeMap<String, ProvenanceRecord>,
    staged: Vec<ConfigChange>,
    initialized: bool,
}

impl Config {
    /// Create a config over `sources`, lowest precedence first. Nothing is
    /// loaded until the first read or an explicit [`materialize`](Config::materialize).
    pub fn new(sources: Vec<RegisteredSource>) -> Self {
        Self {
            sources,
            effective: FlatMap::new(),
            provenance: BTreeMap::new(),
            staged: Vec::new(),
            initialized: false,
        }
    }

    /// Reload every source and rebuild the merged view from scratch.
    ///
    /// On error the previous view is kept.
    pub fn materialize(&mut self) -> Result<()> {
        let merged = merge_sources(&mut self.sources)?;
        self.effective = merged.effective;
        self.provenance = merged.provenance;
        self.initialized = true;
        debug!(
            sources = self.sources.len(),
            keys = self.effective.len(),
            "Materialized configuration"
        );
        Ok(())
    }

    fn ensure_materialized(&mut self) -> Result<()> {
        if !self.initialized {
            self.materialize()?;
        }
        Ok(())
    }

    /// Snapshot of every effective key and value.
    pub fn values(&mut self) -> Result<FlatMap> {
        self.ensure_materialized()?;
        Ok(self.effective.clone())
    }

    pub fn get(&mut self, key: &str) -> Result<Option<Value>> {
        self.ensure_materialized()?;
        Ok(self.effective.get(key).cloned())
    }

    /// Value for `key`, or `default` when absent.
    pub fn get_or(&mut self, key: &str, default: Value) -> Result<Value> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// Which source supplied `key`.
    ///
    /// Absent for keys introduced by [`set`](Config::set) until the next save
    /// or materialize.
    pub fn provenance(&mut self, key: &str) -> Result<Option<ProvenanceRecord>> {
        self.ensure_materialized()?;
        Ok(self.provenance.get(key).cloned())
    }

    /// Stage `key = value`.
    ///
    /// The change targets `source` when given, else the source that
    /// currently supplies the key, else the first registered source.
    pub fn set(&mut self, key: &str, value: impl Into<Value>, source: Option<&str>) -> Result<()> {
        self.ensure_materialized()?;
        let value = value.into();
        let target = self.resolve_target_source_id(key, source)?;
        debug!(key, source_id = %target, "Staged set");
        self.effective.insert(key.to_string(), value.clone());
        self.staged.push(ConfigChange::set(key, value, target));
        Ok(())
    }

    /// Stage removal of `key` from the source that supplies it.
    ///
    /// A key with no provenance is only dropped from the effective map;
    /// there is no source to route the removal to.
    pub fn unset(&mut self, key: &str) -> Result<()> {
        self.ensure_materialized()?;
        self.effective.remove(key);
        let Some(record) = self.provenance.get(key) else {
            debug!(key, "Unset of untracked key, nothing staged");
            return Ok(());
        };
        let target = record.source_id.clone();
        debug!(key, source_id = %target, "Staged unset");
        self.staged.push(ConfigChange::unset(key, target));
        Ok(())
    }

    /// Pick the source a write of `key` should go to.
    pub fn resolve_target_source_id(&self, key: &str, preferred: Option<&str>) -> Result<String> {
        if let Some(preferred) = preferred.filter(|p| !p.is_empty()) {
            if !self.sources.iter().any(|rs| rs.id() == preferred) {
                return Err(ConfettiError::configuration(format!(
                    "Unknown source: {}",
                    preferred
                )));
            }
            return Ok(preferred.to_string());
        }
        if let Some(record) = self.provenance.get(key) {
            return Ok(record.source_id.clone());
        }
        // Default target is the first registered source
        self.sources
            .first()
            .map(|rs| rs.id().to_string())
            .ok_or_else(|| ConfettiError::configuration("No sources registered"))
    }

    /// Apply staged changes to their sources, then rebuild the merged view.
    ///
    /// Sources are processed in registration order, each receiving its
    /// changes in staging order followed by its own `save`. A read-only
    /// target fails the call with a permission error. Sources saved before a
    /// failure stay saved; the staged list is only cleared once every source
    /// succeeded, so retrying is safe.
    pub fn save(&mut self) -> Result<()> {
        if self.staged.is_empty() {
            return self.materialize();
        }

        for rs in self.sources.iter_mut() {
            let changes: Vec<&ConfigChange> = self
                .staged
                .iter()
                .filter(|change| change.target_source_id == rs.source.id())
                .collect();
            if changes.is_empty() {
                continue;
            }
            if !rs.is_writable {
                return Err(ConfettiError::permission_denied(rs.source.id()));
            }
            for change in &changes {
                match (change.op, &change.value) {
                    (ChangeOp::Set, Some(value)) => rs.source.set(&change.key, value.clone()),
                    (ChangeOp::Set, None) | (ChangeOp::Unset, _) => rs.source.unset(&change.key),
                }
            }
            rs.source.save()?;
            info!(
                source_id = %rs.source.id(),
                changes = changes.len(),
                "Saved staged changes"
            );
        }

        self.staged.clear();
        self.materialize()
    }

    /// Drop a source and every staged change aimed at it.
    pub fn remove_source(&mut self, id: &str) -> Result<()> {
        self.sources.retain(|rs| rs.id() != id);
        self.staged.retain(|change| change.target_source_id != id);
        info!(source_id = %id, "Removed source");
        self.materialize()
    }

    /// Force every source to re-read its backing store, then rebuild.
    pub fn reload(&mut self) -> Result<()> {
        for rs in self.sources.iter_mut() {
            rs.source.reload()?;
        }
        self.materialize()
    }

    pub fn sources(&self) -> &[RegisteredSource] {
        &self.sources
    }

    /// Look up a registered source by id.
    pub fn source(&self, id: &str) -> Option<&dyn Source> {
        self.sources
            .iter()
            .find(|rs| rs.id() == id)
            .map(|rs| rs.source.as_ref())
    }

    pub fn staged(&self) -> &[ConfigChange] {
        &self.staged
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.staged.is_empty()
    }
}
