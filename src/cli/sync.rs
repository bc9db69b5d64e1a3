//! sync-github subcommand

use clap::Args;

/// Arguments for the sync-github subcommand
#[derive(Args, Debug)]
pub struct SyncGithubArgs {
    /// Target environment, `github://owner/repo#environment`
    #[arg(value_name = "URI")]
    pub uri: String,

    /// GitHub token (defaults to GITHUB_TOKEN)
    #[arg(long)]
    pub token: Option<String>,

    /// Print the planned changes without applying them
    #[arg(long)]
    pub dry_run: bool,

    /// Delete variables that are not in the merged configuration
    #[arg(long)]
    pub prune: bool,
}
