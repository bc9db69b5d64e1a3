//! Merge engine: ordered sources in, effective map and provenance out.
//!
//! Sources are merged in registration order and the last source to supply a
//! key wins. There is no deep merge here: every source already presents a
//! flat dotted-key view, so a collision simply overwrites.

use super::filters::should_include_key;
use super::source::RegisteredSource;
use super::types::{FlatMap, ProvenanceRecord};
use crate::error::Result;
use chrono::Utc;
use std::collections::BTreeMap;
use tracing::debug;

/// Result of one merge pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedView {
    /// Effective key → value map.
    pub effective: FlatMap,
    /// Key → record of the source that last supplied it.
    pub provenance: BTreeMap<String, ProvenanceRecord>,
}

/// Load every source in order and merge, with later sources taking precedence.
///
/// The source's own filter is applied once more to the loaded keys, so an
/// adapter that ignores the filter still cannot leak excluded keys.
///
/// # Example
/// ```
/// use serde_json::json;
/// use confetti::config::{RegisteredSource, merge_sources};
/// use confetti::sources::MemorySource;
///
/// let mut sources = vec![
///     RegisteredSource::new(MemorySource::new("base").with_value("X", json!("1"))),
///     RegisteredSource::new(MemorySource::new("override").with_value("X", json!("2"))),
/// ];
/// let merged = merge_sources(&mut sources).unwrap();
/// assert_eq!(merged.effective["X"], json!("2"));
/// assert_eq!(merged.provenance["X"].source_id, "override");
/// ```
pub fn merge_sources(registered: &mut [RegisteredSource]) -> Result<MergedView> {
    let mut merged = MergedView::default();

    for rs in registered.iter_mut() {
        let payload = rs.source.load(rs.filter.as_ref(), rs.depth)?;
        let source_id = rs.source.id().to_string();
        let loaded_at = Utc::now();
        let mut contributed = 0usize;

        for (key, value) in payload {
            if !should_include_key(&key, rs.filter.as_ref()) {
                continue;
            }
            // Last source wins
            merged.provenance.insert(
                key.clone(),
                ProvenanceRecord {
                    key: key.clone(),
                    source_id: source_id.clone(),
                    source_key: key.clone(),
                    timestamp_loaded: loaded_at,
                },
            );
            merged.effective.insert(key, value);
            contributed += 1;
        }

        debug!(source_id = %source_id, keys = contributed, "Merged source");
    }

    Ok(merged)
}
