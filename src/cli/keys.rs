//! Key-level subcommands: get, set and unset.

use clap::Args;

/// Arguments for the get subcommand
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Flattened key, e.g. `database.host`
    pub key: String,
}

/// Arguments for the set subcommand
#[derive(Args, Debug)]
pub struct SetArgs {
    /// Flattened key
    pub key: String,

    /// New value, stored as a string
    pub value: String,

    /// Id of the source to write to (defaults to the key's current source)
    #[arg(long, value_name = "ID")]
    pub source: Option<String>,

    /// Save immediately; without it the staged change is discarded on exit
    #[arg(long)]
    pub save: bool,
}

/// Arguments for the unset subcommand
#[derive(Args, Debug)]
pub struct UnsetArgs {
    /// Flattened key
    pub key: String,

    /// Save immediately; without it the staged change is discarded on exit
    #[arg(long)]
    pub save: bool,
}
