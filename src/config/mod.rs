//! Layered configuration with provenance.
//!
//! Sources are registered lowest precedence first and merged into one flat
//! key-value view; the last source supplying a key wins and is recorded as
//! that key's provenance. Writes are staged on [`Config`] and routed back to
//! their owning sources on save.
//!
//! ## Project file
//! `confetti.yaml` lists the sources of each named environment. It is found
//! through `CONFETTI_CONFIG_PATH`, the current directory and its ancestors,
//! or the user config directory (see [`ConfigLoader`]).

mod environment;
mod filters;
mod loader;
mod merge;
mod source;
mod types;
mod unified;

pub use environment::{Environment, SourceOptions, create_source};
pub use filters::{
    Filter, FilterSpec, HierarchicalSpec, SpecNode, filter_hierarchical, flatten,
    normalize_leaves, retain_included, should_include_key,
};
pub use loader::{
    CONFIG_FILE_NAME, CONFIG_PATH_ENV, ConfigLoader, EnvironmentSpec, ParsedSource, ProjectFile,
    SourceSpec,
};
pub use merge::{MergedView, merge_sources};
pub use source::{RegisteredSource, Source, SourceCache};
pub use types::{ChangeOp, ConfigChange, FlatMap, ProvenanceRecord, value_to_text};
pub use unified::Config;
