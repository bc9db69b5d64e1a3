//! confetti command-line tool
//!
//! Loads the sources of one environment from `confetti.yaml` and inspects or
//! edits the merged configuration.

use anyhow::{Context, Result};
use clap::Parser;
use confetti::cli::keys::{GetArgs, SetArgs, UnsetArgs};
use confetti::cli::sync::SyncGithubArgs;
use confetti::cli::{Cli, Command};
use confetti::config::{Config, ConfigLoader, Environment};
use confetti::logging;
use confetti::sources::GitHubEnvSource;
use confetti::sync::{SyncOptions, sync_to_source};
use serde_json::json;
use tracing::{debug, info};

fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log, cli.verbose)?;

    let mut loader = match &cli.config {
        Some(path) => ConfigLoader::with_path(path),
        None => ConfigLoader::discover(),
    };
    let environment = Environment::from_loader(&cli.env, &mut loader)?;
    debug!(
        environment = %environment.name(),
        config_file = ?environment.config_file_path(),
        sources = environment.sources().len(),
        "Loaded environment"
    );
    let mut config = environment
        .into_config()
        .with_context(|| format!("Failed to load environment '{}'", cli.env))?;

    match cli.command {
        Command::Sources => run_sources(&config)?,
        Command::Values => run_values(&mut config)?,
        Command::Get(args) => run_get(&mut config, args)?,
        Command::Set(args) => run_set(&mut config, args)?,
        Command::Unset(args) => run_unset(&mut config, args)?,
        Command::Save => {
            config.save()?;
            println!("Saved");
        }
        Command::SyncGithub(args) => run_sync_github(&mut config, args)?,
    }

    Ok(())
}

fn run_sources(config: &Config) -> Result<()> {
    let sources: Vec<_> = config
        .sources()
        .iter()
        .map(|rs| {
            json!({
                "id": rs.source.id(),
                "name": rs.source.name(),
                "writable": rs.is_writable,
                "depth": rs.depth,
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&sources)?);
    Ok(())
}

fn run_values(config: &mut Config) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&config.values()?)?);
    Ok(())
}

fn run_get(config: &mut Config, args: GetArgs) -> Result<()> {
    let value = config.get(&args.key)?;
    let source = config.provenance(&args.key)?.map(|record| record.source_id);
    let output = json!({
        "key": args.key,
        "value": value,
        "source": source,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_set(config: &mut Config, args: SetArgs) -> Result<()> {
    config.set(&args.key, args.value, args.source.as_deref())?;
    finish_staged(config, args.save)
}

fn run_unset(config: &mut Config, args: UnsetArgs) -> Result<()> {
    config.unset(&args.key)?;
    finish_staged(config, args.save)
}

/// Save when asked; otherwise say the staged change is dropped on exit.
fn finish_staged(config: &mut Config, save: bool) -> Result<()> {
    if save {
        config.save()?;
        println!("OK");
    } else {
        println!("OK (staged only, discarded on exit; pass --save to write it)");
    }
    Ok(())
}

fn run_sync_github(config: &mut Config, args: SyncGithubArgs) -> Result<()> {
    let mut target = GitHubEnvSource::new(&args.uri, args.token.as_deref())?;
    let options = SyncOptions {
        dry_run: args.dry_run,
        prune: args.prune,
    };
    let plan = sync_to_source(config, &mut target, options)?;

    if args.dry_run {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }
    info!(target_id = %target.target(), changes = plan.change_count(), "Sync finished");
    println!("Synced to GitHub environment {}", target.target());
    if !args.prune && !plan.delete.is_empty() {
        println!(
            "{} variable(s) exist only in GitHub; rerun with --prune to delete them",
            plan.delete.len()
        );
    }
    Ok(())
}
