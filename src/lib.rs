//! Layered configuration with provenance and staged writes.
//!
//! Values from `.env`, YAML, JSON and INI files, GitHub environments and
//! in-memory maps are merged into one flat view. Every key remembers which
//! source supplied it, and edits are routed back to that source on save.

pub mod cli;
pub mod config;
pub mod dotenv;
pub mod error;
pub mod logging;
pub mod sources;
pub mod sync;
