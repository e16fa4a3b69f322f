//! Config command handlers

use crate::cli::ConfigInitArgs;
use crate::config::ConfigError;
use std::fs;

const EXAMPLE_CONFIG: &str = include_str!("../../policyset.example.toml");

/// Handle `policyset config init` command
pub fn handle_config_init(args: &ConfigInitArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.output.exists() && !args.force {
        return Err(ConfigError::AlreadyExists(args.output.clone()).into());
    }

    fs::write(&args.output, EXAMPLE_CONFIG)?;

    println!("✓ Configuration file created: {}", args.output.display());
    println!("  Edit the [connection] and [policy_set] sections, then run `policyset plan`.");

    Ok(())
}
