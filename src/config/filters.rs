//! Key filters and hierarchical flattening.
//!
//! A [`Filter`] decides which flat keys a source contributes. Structured
//! sources additionally use its hierarchical spec and depth to decide how a
//! nested document collapses into dotted keys.

use super::types::FlatMap;
use crate::error::{ConfettiError, Result};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One node of a [`HierarchicalSpec`].
///
/// In YAML, `true` includes everything below the node, `false` excludes it,
/// and a mapping descends one more level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpecNode {
    Include(bool),
    Branch(HierarchicalSpec),
}

/// Nested inclusion mask selecting which flattened paths survive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HierarchicalSpec(BTreeMap<String, SpecNode>);

impl HierarchicalSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a dotted path, and everything below it, as included.
    pub fn include(mut self, path: &str) -> Self {
        let segments: Vec<&str> = path.split('.').collect();
        insert_path(&mut self.0, &segments);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether a dotted key falls under an included node.
    ///
    /// The first `true` met while walking the segments includes the key.
    /// A missing segment, a `false` node, or running out of segments while
    /// still inside a branch excludes it.
    pub fn covers(&self, path: &str) -> bool {
        let mut nodes = &self.0;
        for segment in path.split('.') {
            match nodes.get(segment) {
                Some(SpecNode::Include(true)) => return true,
                Some(SpecNode::Branch(child)) => nodes = &child.0,
                Some(SpecNode::Include(false)) | None => return false,
            }
        }
        false
    }
}

fn insert_path(nodes: &mut BTreeMap<String, SpecNode>, segments: &[&str]) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    if rest.is_empty() {
        nodes.insert(head.to_string(), SpecNode::Include(true));
        return;
    }
    let node = nodes
        .entry(head.to_string())
        .or_insert_with(|| SpecNode::Branch(HierarchicalSpec::default()));
    match node {
        // Already covered by an ancestor
        SpecNode::Include(true) => {}
        SpecNode::Include(false) => {
            let mut child = HierarchicalSpec::default();
            insert_path(&mut child.0, rest);
            *node = SpecNode::Branch(child);
        }
        SpecNode::Branch(child) => insert_path(&mut child.0, rest),
    }
}

/// On-disk form of a [`Filter`], as written in `confetti.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hierarchical_spec: Option<HierarchicalSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<i64>,
}

impl FilterSpec {
    pub fn is_empty(&self) -> bool {
        self.include_regex.is_none() && self.hierarchical_spec.is_none() && self.depth.is_none()
    }
}

/// Immutable key filter attached to a registered source.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    include_regex: Option<Regex>,
    hierarchical_spec: Option<HierarchicalSpec>,
    depth: Option<i64>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only keys in which `pattern` matches somewhere (search, not full match).
    pub fn with_include_regex(mut self, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|source| ConfettiError::InvalidFilter {
            pattern: pattern.to_string(),
            source,
        })?;
        self.include_regex = Some(regex);
        Ok(self)
    }

    pub fn with_hierarchical_spec(mut self, spec: HierarchicalSpec) -> Self {
        self.hierarchical_spec = Some(spec);
        self
    }

    pub fn with_depth(mut self, depth: i64) -> Self {
        self.depth = Some(depth);
        self
    }

    /// Build a filter from its on-disk form. An empty spec means no filter.
    pub fn from_spec(spec: &FilterSpec) -> Result<Option<Self>> {
        if spec.is_empty() {
            return Ok(None);
        }
        let mut filter = Filter::new();
        if let Some(pattern) = &spec.include_regex {
            filter = filter.with_include_regex(pattern)?;
        }
        if let Some(hierarchical) = &spec.hierarchical_spec {
            filter = filter.with_hierarchical_spec(hierarchical.clone());
        }
        if let Some(depth) = spec.depth {
            filter = filter.with_depth(depth);
        }
        Ok(Some(filter))
    }

    pub fn include_regex(&self) -> Option<&Regex> {
        self.include_regex.as_ref()
    }

    pub fn hierarchical_spec(&self) -> Option<&HierarchicalSpec> {
        self.hierarchical_spec.as_ref()
    }

    pub fn depth(&self) -> Option<i64> {
        self.depth
    }

    /// Whether this filter controls how nested documents are flattened.
    pub fn shapes_hierarchy(&self) -> bool {
        self.hierarchical_spec.is_some() || self.depth.is_some()
    }

    /// Regex test only; the hierarchical spec is applied at flatten time.
    pub fn includes(&self, flat_key: &str) -> bool {
        self.include_regex
            .as_ref()
            .is_none_or(|regex| regex.is_match(flat_key))
    }
}

/// Whether `flat_key` passes `filter`. No filter includes everything.
pub fn should_include_key(flat_key: &str, filter: Option<&Filter>) -> bool {
    filter.is_none_or(|f| f.includes(flat_key))
}

/// Keep the entries of `map` that pass `filter`.
pub fn retain_included(mut map: FlatMap, filter: Option<&Filter>) -> FlatMap {
    if filter.is_some() {
        map.retain(|key, _| should_include_key(key, filter));
    }
    map
}

/// Flatten a nested mapping into dotted keys.
///
/// `depth` bounds how many levels are descended; whatever lies below is
/// emitted as an opaque leaf. `None` descends without limit and a negative
/// depth yields nothing. Sequences are always leaves.
pub fn flatten(data: &Map<String, Value>, depth: Option<i64>) -> FlatMap {
    let mut out = FlatMap::new();
    flatten_into(data, "", depth, &mut out);
    out
}

fn flatten_into(data: &Map<String, Value>, parent: &str, depth: Option<i64>, out: &mut FlatMap) {
    if depth.is_some_and(|d| d < 0) {
        return;
    }
    for (key, value) in data {
        let full_key = if parent.is_empty() {
            key.clone()
        } else {
            format!("{parent}.{key}")
        };
        match value {
            Value::Object(children) if depth.is_none_or(|d| d > 0) => {
                flatten_into(children, &full_key, depth.map(|d| d - 1), out);
            }
            _ => {
                out.insert(full_key, value.clone());
            }
        }
    }
}

/// Depth-limited flatten, then keep only the keys `spec` covers.
pub fn filter_hierarchical(
    data: &Map<String, Value>,
    spec: Option<&HierarchicalSpec>,
    depth: Option<i64>,
) -> FlatMap {
    let mut flattened = flatten(data, depth);
    if let Some(spec) = spec {
        flattened.retain(|key, _| spec.covers(key));
    }
    flattened
}

/// Render mapping and sequence leaves as compact JSON text so the flat map
/// stays scalar-valued.
pub fn normalize_leaves(map: FlatMap) -> FlatMap {
    map.into_iter()
        .map(|(key, value)| match value {
            Value::Object(_) | Value::Array(_) => (key, Value::String(value.to_string())),
            scalar => (key, scalar),
        })
        .collect()
}
