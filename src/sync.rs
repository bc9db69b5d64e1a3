//! Pushing a merged view into a single target source.
//!
//! Used to mirror local configuration into a remote store such as a GitHub
//! environment. Values are compared and written as text.

use crate::config::{Config, FlatMap, Source, value_to_text};
use crate::error::Result;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

/// Changes needed to make a target match a set of values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncPlan {
    /// Keys missing from the target or holding a different value.
    pub set: BTreeMap<String, String>,
    /// Keys only the target has.
    pub delete: Vec<String>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.delete.is_empty()
    }

    pub fn change_count(&self) -> usize {
        self.set.len() + self.delete.len()
    }
}

impl fmt::Display for SyncPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "Target is up to date.");
        }
        for (key, value) in &self.set {
            writeln!(f, "  ~ {} = {}", key, value)?;
        }
        for key in &self.delete {
            writeln!(f, "  - {}", key)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Compute the plan without touching the target.
    pub dry_run: bool,
    /// Also delete target keys absent from the values.
    pub prune: bool,
}

/// Compare `values` against what `target` currently holds.
pub fn plan_sync(values: &FlatMap, target: &FlatMap) -> SyncPlan {
    let set = values
        .iter()
        .map(|(key, value)| (key, value_to_text(value)))
        .filter(|(key, text)| {
            target
                .get(key.as_str())
                .is_none_or(|current| value_to_text(current) != *text)
        })
        .map(|(key, text)| (key.clone(), text))
        .collect();
    let delete = target
        .keys()
        .filter(|key| !values.contains_key(key.as_str()))
        .cloned()
        .collect();
    SyncPlan { set, delete }
}

/// Make `target` hold the merged values of `config`.
///
/// Deletes are planned but only applied with `prune`. The returned plan
/// always lists every difference found.
pub fn sync_to_source(
    config: &mut Config,
    target: &mut dyn Source,
    options: SyncOptions,
) -> Result<SyncPlan> {
    let values = config.values()?;
    let current = target.load(None, None)?;
    let plan = plan_sync(&values, &current);
    if options.dry_run || plan.is_empty() {
        return Ok(plan);
    }

    for (key, text) in &plan.set {
        target.set(key, Value::String(text.clone()));
    }
    if options.prune {
        for key in &plan.delete {
            target.unset(key);
        }
    }
    target.save()?;
    info!(
        source_id = %target.id(),
        set = plan.set.len(),
        deleted = if options.prune { plan.delete.len() } else { 0 },
        "Synced configuration"
    );
    Ok(plan)
}
