//! Volume load orchestration.
//!
//! Loading a volume from an image must never happen while a container that
//! mounts the volume is running. The pieces here enforce that:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                         VolumeOrchestrator                           │
//! │                                                                      │
//! │   restore(volume, image)                                             │
//! │         │                                                            │
//! │         ▼                                                            │
//! │   ┌──────────────┐    ┌──────────────┐    ┌──────────────────────┐   │
//! │   │ Resolve      │───▶│ Stop running │───▶│ Run loader container │   │
//! │   │ attachments  │    │ (fan-out)    │    │ create/start/wait/rm │   │
//! │   └──────────────┘    └──────────────┘    └──────────────────────┘   │
//! │                              │                       │               │
//! │                              ▼                       ▼               │
//! │                       stopped set ─────────▶ ┌──────────────────┐    │
//! │                                              │ Restart stopped  │    │
//! │                                              │ (fan-out)        │    │
//! │                                              └──────────────────┘    │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only containers this flow stopped are restarted. A container the user had
//! already stopped stays stopped.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use volume_loader::engine::DockerEngine;
//! use volume_loader::volumes::{VolumeConfig, VolumeOrchestrator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Arc::new(DockerEngine::connect().await?);
//! let orchestrator = VolumeOrchestrator::new(engine, VolumeConfig::default());
//!
//! let report = orchestrator.restore("pgdata", "backups/pgdata:2024-01-01").await?;
//! println!("restarted {:?}", report.containers.stopped);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod loader;
pub mod orchestrator;
pub mod resolver;

pub use config::VolumeConfig;
pub use error::{RestoreError, Result, StopFailure, VolumeError};
pub use loader::{LoaderJob, VolumeLoader, check_inputs};
pub use orchestrator::{RestoreReport, StopReport, VolumeOrchestrator};
pub use resolver::{resolve_attached, try_resolve_attached};
