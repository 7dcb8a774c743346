//! CLI module for Berth
//!
//! Command-line interface definitions and handlers.
//!
//! # Commands
//!
//! - `serve` - Answer newline-delimited JSON scheduling requests on stdin
//! - `schedule` - Run one scheduling request from a file
//! - `pools` - List pools known to the host source
//! - `config` - Configuration utilities (init)
//! - `completions` - Generate shell completions
//!
//! # Example
//!
//! ```bash
//! # Place one share against a host report file
//! berth schedule --hosts hosts.json --request create.json
//!
//! # List pools of one backend
//! berth pools --hosts hosts.json --backend 'netapp*'
//!
//! # Generate shell completions
//! berth completions bash > ~/.bash_completion.d/berth
//! ```

pub mod completions;
pub mod config;
pub mod output;
pub mod pools;
pub mod schedule;
pub mod serve;

pub use completions::handle_completions;
pub use config::handle_config_init;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Berth - filter-and-weigh share scheduler
#[derive(Parser, Debug)]
#[command(
    name = "berth",
    version,
    about = "Filter-and-weigh placement for share backends"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer scheduling requests read from stdin
    Serve(ServeArgs),
    /// Run a single scheduling request
    Schedule(ScheduleArgs),
    /// List pools and their capacity
    Pools(PoolsArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Options shared by every command that builds a scheduler.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "berth.toml")]
    pub config: PathBuf,

    /// Host capability report file (JSON array)
    #[arg(long)]
    pub hosts: Option<PathBuf>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Override the maximum scheduling attempts
    #[arg(long)]
    pub max_attempts: Option<u32>,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Do not reload the host source periodically
    #[arg(long)]
    pub no_refresh: bool,
}

#[derive(Args, Debug)]
pub struct ScheduleArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Scheduling request (JSON, tagged by "operation")
    #[arg(short, long)]
    pub request: PathBuf,

    /// Filter properties of a previous attempt (JSON)
    #[arg(short, long)]
    pub properties: Option<PathBuf>,

    /// Pretty-print the decision
    #[arg(long)]
    pub pretty: bool,
}

#[derive(Args, Debug)]
pub struct PoolsArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Glob over the host part of pool names
    #[arg(long = "host-filter", value_name = "GLOB")]
    pub host: Option<String>,

    /// Glob over backend names
    #[arg(short, long, value_name = "GLOB")]
    pub backend: Option<String>,

    /// Glob over pool names
    #[arg(short, long, value_name = "GLOB")]
    pub pool: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "berth.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
