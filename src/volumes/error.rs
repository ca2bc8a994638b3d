//! Error types for volume orchestration.

use thiserror::Error;

use crate::engine::EngineError;
use crate::volumes::orchestrator::StopReport;

/// Result type for volume operations.
pub type Result<T> = std::result::Result<T, VolumeError>;

/// Errors from resolving, stopping, starting or loading.
///
/// Every variant names the container, image or volume involved.
#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("Volume name must not be empty")]
    EmptyVolume,

    /// Not a valid engine volume name.
    #[error("Invalid volume name '{volume}': expected [a-zA-Z0-9][a-zA-Z0-9_.-]*")]
    InvalidVolume { volume: String },

    #[error("Loader image must not be empty")]
    EmptyImage,

    /// Listing the containers attached to a volume failed.
    #[error("Failed to list containers attached to volume '{volume}': {source}")]
    ListFailed {
        volume: String,
        #[source]
        source: EngineError,
    },

    /// Checking whether an attached container is running failed.
    #[error("Failed to check whether container '{container}' is running: {source}")]
    StatusCheckFailed {
        container: String,
        #[source]
        source: EngineError,
    },

    #[error("Failed to stop container '{container}': {source}")]
    StopFailed {
        container: String,
        #[source]
        source: EngineError,
    },

    #[error("Failed to start container '{container}': {source}")]
    StartFailed {
        container: String,
        #[source]
        source: EngineError,
    },

    #[error("Failed to create loader container from image '{image}': {source}")]
    LoaderCreateFailed {
        image: String,
        #[source]
        source: EngineError,
    },

    #[error("Failed to start loader container {container_id}: {source}")]
    LoaderStartFailed {
        container_id: String,
        #[source]
        source: EngineError,
    },

    #[error("Failed waiting for loader container {container_id}: {source}")]
    LoaderWaitFailed {
        container_id: String,
        #[source]
        source: EngineError,
    },

    #[error("Failed to read logs of loader container {container_id}: {source}")]
    LoaderLogsFailed {
        container_id: String,
        #[source]
        source: EngineError,
    },

    /// The loader ran but its copy command failed.
    #[error("Loader container {container_id} exited with status code {exit_code}")]
    LoaderExited { container_id: String, exit_code: i64 },

    #[error("Failed to remove loader container {container_id}: {source}")]
    LoaderRemoveFailed {
        container_id: String,
        #[source]
        source: EngineError,
    },

    /// A fan-out task panicked or was torn down outside the orchestrator.
    #[error("Container task did not complete: {reason}")]
    TaskFailed { reason: String },
}

impl VolumeError {
    /// Exit code of a failed loader run, if that is what this error is.
    pub fn exit_code(&self) -> Option<i64> {
        match self {
            VolumeError::LoaderExited { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }
}

/// Stopping attached containers failed part way.
///
/// `report` still lists every attached container and the ones stopped
/// before the failure, so the caller can decide what to restart.
#[derive(Debug, Error)]
#[error(
    "Stopped {} of {} attached container(s) before failing",
    .report.stopped.len(),
    .report.attached.len()
)]
pub struct StopFailure {
    pub report: StopReport,
    #[source]
    pub source: VolumeError,
}

/// A step of the restore flow failed.
#[derive(Debug, Error)]
pub enum RestoreError {
    /// Rejected before any engine call.
    #[error("Invalid restore request")]
    InvalidInput(#[source] VolumeError),

    #[error("Could not stop containers attached to volume '{volume}'")]
    Stop {
        volume: String,
        #[source]
        source: StopFailure,
    },

    /// The loader failed. `stopped` were left stopped.
    #[error("Could not load volume '{volume}' ({} container(s) left stopped)", .stopped.len())]
    Load {
        volume: String,
        stopped: Vec<String>,
        #[source]
        source: VolumeError,
    },

    #[error("Volume '{volume}' was loaded but restarting its containers failed")]
    Restart {
        volume: String,
        #[source]
        source: VolumeError,
    },
}
