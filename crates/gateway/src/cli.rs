//! Command-line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use tl_domain::config::{Config, ConfigSeverity};

/// Threadline — a durable agent session service.
#[derive(Debug, Parser)]
#[command(name = "threadline", version, about)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(long, default_value = "threadline.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the server (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print the version.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Validate the configuration file and report issues.
    Validate,
    /// Print the effective configuration as TOML.
    Show,
}

pub fn load_config(path: &PathBuf) -> anyhow::Result<Config> {
    let config = Config::load(path)?;
    Ok(config)
}

/// Print validation issues; returns false when any is an error.
pub fn validate(config: &Config) -> bool {
    let issues = config.validate();
    for issue in &issues {
        println!("{issue}");
    }
    let ok = !issues
        .iter()
        .any(|i| i.severity == ConfigSeverity::Error);
    if ok {
        println!("configuration OK");
    }
    ok
}

pub fn show(config: &Config) {
    match toml::to_string_pretty(config) {
        Ok(rendered) => println!("{rendered}"),
        Err(e) => eprintln!("failed to render config: {e}"),
    }
}
