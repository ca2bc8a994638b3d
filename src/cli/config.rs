//! Configuration CLI commands.
//!
//! Shows the configuration as resolved from env > file > default.

use clap::Subcommand;

use crate::config::Config;

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// List all settings and their resolved values
    List,

    /// Get a specific setting value
    Get {
        /// Setting name (e.g., "stop_grace_secs")
        key: String,
    },
}

/// Settings as `(name, value)` pairs, in display order.
pub fn config_entries(config: &Config) -> Vec<(&'static str, String)> {
    vec![
        ("stop_grace_secs", config.stop_grace_secs.to_string()),
        ("mount_path", config.mount_path.clone()),
        ("source_path", config.source_path.clone()),
        ("strict_resolve", config.strict_resolve.to_string()),
        ("keep_failed_loader", config.keep_failed_loader.to_string()),
    ]
}

/// Run a config command.
pub fn run_config_command(cmd: &ConfigCommand, config: &Config, json: bool) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::List => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
                return Ok(());
            }
            let entries = config_entries(config);
            let width = entries.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
            for (key, value) in entries {
                println!("  {:width$}  {}", key, value, width = width);
            }
            Ok(())
        }
        ConfigCommand::Get { key } => {
            let value = config_entries(config)
                .into_iter()
                .find(|(k, _)| *k == key.as_str())
                .map(|(_, v)| v)
                .ok_or_else(|| anyhow::anyhow!("Unknown setting: {}", key))?;
            println!("{}", value);
            Ok(())
        }
    }
}
