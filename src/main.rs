//! volume-loader - main entry point.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use volume_loader::{
    cli::{Cli, Command, run_config_command, run_volume_command},
    config::Config,
    engine::DockerEngine,
    volumes::VolumeOrchestrator,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = Config::resolve(cli.config.as_deref())?;

    // Config commands don't need the engine
    if let Command::Config(cmd) = &cli.command {
        return run_config_command(cmd, &config, cli.json);
    }

    let engine = DockerEngine::connect().await.map_err(|e| {
        anyhow::anyhow!("{e}\nIs the Docker daemon running? Point DOCKER_HOST at it if it is not local.")
    })?;
    tracing::debug!(?config, "Connected to container engine");

    let orchestrator = VolumeOrchestrator::new(Arc::new(engine), config.volume_config());
    run_volume_command(&cli.command, &orchestrator, cli.json).await
}

/// Logs go to stderr so command output on stdout stays parseable.
fn init_tracing(json: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("volume_loader=info"));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .init();
    }
}
