//! Restore Pattern Hook
//!
//! Runs once per restored resource: reads the resource from stdin, applies
//! the cluster's substitution rules, advances the volume restores of
//! restored Pods, and writes the resource back to stdout.

#![forbid(unsafe_code)]

mod commands;
mod hook;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use rph_common::{
    ApiClient, ConfigMapRuleSource, HookConfig, LogConfig, RestoreHook, RuleSource,
    StaticRuleSource, init_logging, load_config,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

#[derive(Parser)]
#[command(name = "rph")]
#[command(author, version, about = "Restore pattern hook - rewrites restored resources")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (default: $RPH_CONFIG, then ~/.config/rph/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Read substitution rules from a JSON or TOML file instead of the cluster
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Process one resource from stdin (default)
    Execute,

    /// Print the resource selector the hook registers for
    AppliesTo,

    /// Fetch and print the effective substitution rules
    Rules {
        /// Exit non-zero if any rules overlap
        #[arg(long)]
        check: bool,
    },

    /// Print the effective configuration and where each value came from
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Describe an error code (e.g. RPH-E102)
    Explain { code: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Explain { code }) = &cli.command {
        return commands::explain(code);
    }

    let loaded = load_config(cli.config.as_deref()).map_err(|e| {
        anyhow!(
            "[{}] failed to load configuration: {}",
            e.code().code_string(),
            e
        )
    })?;
    let mut config = loaded.config.clone();
    if let Some(rules) = &cli.rules {
        config.rules.file = Some(rules.clone());
    }

    let mut log_config =
        LogConfig::from_env(&config.logging.level).with_format(config.logging.format);
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    let _logging_guards = init_logging(&log_config)?;
    if let Some(path) = &loaded.path {
        debug!("Using configuration from {}", path.display());
    }

    match cli.command.unwrap_or(Commands::Execute) {
        Commands::Execute => hook::run_hook(&build_hook(config)).await,
        Commands::AppliesTo => commands::applies_to(&build_hook(config)),
        Commands::Rules { check } => commands::rules(&build_hook(config), check).await,
        Commands::Config { json } => commands::config(&loaded, json),
        Commands::Explain { .. } => Ok(()),
    }
}

/// Wire the hook to the cluster, or to a local rules file if one is set.
fn build_hook(config: HookConfig) -> RestoreHook {
    let client = ApiClient::connect_or_disconnected(&config.cluster);
    let rules: Arc<dyn RuleSource> = match &config.rules.file {
        Some(path) => {
            debug!("Reading substitution rules from {}", path.display());
            Arc::new(StaticRuleSource::from_file(path.clone()))
        }
        None => Arc::new(ConfigMapRuleSource::new(
            client.clone(),
            config.correlation.operator_namespace.clone(),
        )),
    };
    RestoreHook::new(rules, Arc::new(client), config)
}
