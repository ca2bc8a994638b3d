//! Volume CLI commands.

use serde::Serialize;

use crate::cli::Command;
use crate::volumes::{RestoreError, VolumeOrchestrator};

/// Run a volume command against `orchestrator`.
pub async fn run_volume_command(
    cmd: &Command,
    orchestrator: &VolumeOrchestrator,
    json: bool,
) -> anyhow::Result<()> {
    match cmd {
        Command::Attached { volume } => {
            let names = orchestrator.resolve_attached(volume).await?;
            print_names(&names, json, "No containers attached to", volume)
        }
        Command::Stop { volume } => {
            let report = match orchestrator.stop_attached(volume).await {
                Ok(report) => report,
                Err(failure) => {
                    if !failure.report.stopped.is_empty() {
                        eprintln!(
                            "Stopped before failure: {}",
                            failure.report.stopped.join(" ")
                        );
                    }
                    return Err(failure.into());
                }
            };
            if json {
                return print_json(&report);
            }
            if report.stopped.is_empty() {
                println!("No running containers attached to {}", volume);
            }
            for name in &report.stopped {
                println!("{}", name);
            }
            Ok(())
        }
        Command::Start { names } => {
            orchestrator.start_attached(names).await?;
            if !json {
                println!("Started {} container(s)", names.len());
            }
            Ok(())
        }
        Command::Load { volume, image } => {
            let job = orchestrator.load(volume, image).await?;
            if json {
                return print_json(&job);
            }
            println!("Loaded {} from {}", job.volume, job.image);
            Ok(())
        }
        Command::Restore { volume, image } => match orchestrator.restore(volume, image).await {
            Ok(report) => {
                if json {
                    return print_json(&report);
                }
                println!("Restored {} from {}", volume, image);
                if !report.containers.stopped.is_empty() {
                    println!("Restarted: {}", report.containers.stopped.join(" "));
                }
                Ok(())
            }
            Err(e) => {
                if let RestoreError::Load { stopped, .. } = &e
                    && !stopped.is_empty()
                {
                    eprintln!("Left stopped: {}", stopped.join(" "));
                }
                Err(e.into())
            }
        },
        Command::Config(_) => anyhow::bail!("config commands do not use the container engine"),
    }
}

fn print_names(names: &[String], json: bool, empty_message: &str, volume: &str) -> anyhow::Result<()> {
    if json {
        return print_json(&names);
    }
    if names.is_empty() {
        println!("{} {}", empty_message, volume);
    }
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
