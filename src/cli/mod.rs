//! CLI command handling.
//!
//! Provides subcommands for:
//! - Listing the containers attached to a volume (`attached`)
//! - Stopping or starting attached containers (`stop`, `start`)
//! - Running the loader on its own (`load`)
//! - The guarded stop, load, restart flow (`restore`)
//! - Inspecting resolved configuration (`config list`, `config get`)

mod config;
mod volume;

pub use config::{ConfigCommand, config_entries, run_config_command};
pub use volume::run_volume_command;

use clap::{ColorChoice, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "volume-loader")]
#[command(
    about = "Replace a container volume's contents from an image, pausing the containers that use it"
)]
#[command(
    long_about = "Use 'volume-loader <subcommand> --help' for details.\nExamples:\n  volume-loader restore pgdata --image backups/pgdata:latest\n  volume-loader attached pgdata"
)]
#[command(version)]
#[command(color = ColorChoice::Auto)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file path (optional, env vars take precedence)
    #[arg(short, long, global = true, env = "VOLUME_LOADER_CONFIG")]
    pub config: Option<std::path::PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List containers that mount a volume
    #[command(
        about = "List containers attached to a volume",
        long_about = "Lists every container, running or not, that mounts the volume.\nExample: volume-loader attached pgdata"
    )]
    Attached {
        /// Volume name
        volume: String,
    },

    /// Stop the running containers that mount a volume
    #[command(
        about = "Stop containers attached to a volume",
        long_about = "Stops only the attached containers that are running and prints them.\nExample: volume-loader stop pgdata"
    )]
    Stop {
        /// Volume name
        volume: String,
    },

    /// Start containers by name
    #[command(
        about = "Start containers",
        long_about = "Starts the named containers, typically the set printed by 'stop'.\nExample: volume-loader start db api"
    )]
    Start {
        /// Container names
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Run the loader without stopping anything
    #[command(
        about = "Load a volume from an image",
        long_about = "Overwrites the volume with the image's data. Does not stop attached containers.\nExample: volume-loader load pgdata --image backups/pgdata:latest"
    )]
    Load {
        /// Volume name
        volume: String,

        /// Image holding the data to load
        #[arg(short, long)]
        image: String,
    },

    /// Stop attached containers, load the volume, restart what was stopped
    #[command(
        about = "Restore a volume from an image",
        long_about = "Stops running attached containers, loads the volume, then restarts them.\nExample: volume-loader restore pgdata --image backups/pgdata:latest"
    )]
    Restore {
        /// Volume name
        volume: String,

        /// Image holding the data to load
        #[arg(short, long)]
        image: String,
    },

    /// Inspect resolved configuration
    #[command(subcommand, about = "Show configuration")]
    Config(ConfigCommand),
}
