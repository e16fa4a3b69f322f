//! CLI module for policyset
//!
//! Command-line interface definitions and handlers.
//!
//! # Commands
//!
//! - `plan` - Show the changes needed to converge the remote policy set
//! - `apply` - Converge the remote policy set on the declared state
//! - `show` - Print the current remote policy set
//! - `destroy` - Delete the declared policy set
//! - `config` - Configuration utilities (init)
//! - `completions` - Generate shell completions
//!
//! # Example
//!
//! ```bash
//! # Preview changes
//! policyset plan -c policyset.toml
//!
//! # Converge, printing the refreshed state as JSON
//! policyset apply --json
//!
//! # Generate shell completions
//! policyset completions bash > ~/.bash_completion.d/policyset
//! ```

pub mod completions;
pub mod config;
pub mod output;
pub mod run;

pub use completions::handle_completions;
pub use config::handle_config_init;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// policyset - declarative policy set reconciliation
#[derive(Parser, Debug)]
#[command(
    name = "policyset",
    version,
    about = "Keep a remote policy set converged on a declared configuration"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the changes needed to converge
    Plan(RunArgs),
    /// Apply the declared configuration
    Apply(RunArgs),
    /// Show the current remote policy set
    Show(RunArgs),
    /// Delete the declared policy set
    Destroy(DestroyArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "policyset.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "POLICYSET_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Override the filter update strategy (recreate, preserve)
    #[arg(long)]
    pub filter_strategy: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct DestroyArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Confirm deletion of the policy set
    #[arg(long)]
    pub yes: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "policyset.toml")]
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
