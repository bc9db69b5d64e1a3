//! Shared value types for the merge engine and the staged-write protocol.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Flat dotted-key view of a source or of the merged configuration.
///
/// Ordered by key so listings and serialized output are deterministic.
pub type FlatMap = BTreeMap<String, Value>;

/// Record of which source last supplied a key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProvenanceRecord {
    /// Key in the effective map.
    pub key: String,
    /// Id of the source that supplied the value.
    pub source_id: String,
    /// Key as it appeared in the source.
    pub source_key: String,
    /// When the value was loaded.
    pub timestamp_loaded: DateTime<Utc>,
}

/// Kind of a staged mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Set,
    Unset,
}

impl std::fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeOp::Set => write!(f, "set"),
            ChangeOp::Unset => write!(f, "unset"),
        }
    }
}

/// A pending change, routed to one source and applied on save.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigChange {
    pub op: ChangeOp,
    pub key: String,
    /// New value; `None` for unset.
    pub value: Option<Value>,
    pub target_source_id: String,
}

impl ConfigChange {
    pub fn set(key: impl Into<String>, value: Value, target_source_id: impl Into<String>) -> Self {
        Self {
            op: ChangeOp::Set,
            key: key.into(),
            value: Some(value),
            target_source_id: target_source_id.into(),
        }
    }

    pub fn unset(key: impl Into<String>, target_source_id: impl Into<String>) -> Self {
        Self {
            op: ChangeOp::Unset,
            key: key.into(),
            value: None,
            target_source_id: target_source_id.into(),
        }
    }
}

/// Render a value the way text-only backends store it.
///
/// Strings are written bare; every other value uses its compact JSON form.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_to_text() {
        assert_eq!(value_to_text(&json!("plain")), "plain");
        assert_eq!(value_to_text(&json!(8080)), "8080");
        assert_eq!(value_to_text(&json!(true)), "true");
        assert_eq!(value_to_text(&json!(["a", 1])), r#"["a",1]"#);
    }

    #[test]
    fn test_change_constructors() {
        let set = ConfigChange::set("PORT", json!("9090"), "env");
        assert_eq!(set.op, ChangeOp::Set);
        assert_eq!(set.value, Some(json!("9090")));

        let unset = ConfigChange::unset("PORT", "env");
        assert_eq!(unset.op, ChangeOp::Unset);
        assert!(unset.value.is_none());
        assert_eq!(unset.target_source_id, "env");
    }
}
