//! Container engine facade.
//!
//! The volume orchestration code never talks to Docker directly. It goes
//! through [`ContainerEngine`], which exposes only the calls the load flow
//! needs:
//!
//! - list containers by volume or by name
//! - create, start, stop, wait for, read logs of, and remove a container
//!
//! [`DockerEngine`] is the production implementation over the Docker Engine
//! API. Tests use [`crate::testing::StubEngine`].

pub mod docker;
pub mod error;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

pub use docker::{DockerEngine, connect_docker};
pub use error::{EngineError, Result};

/// Filter applied when listing containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerFilter {
    /// Containers whose mounts reference this volume.
    Volume(String),
    /// The container with exactly this name (without the leading `/`).
    Name(String),
}

impl fmt::Display for ContainerFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerFilter::Volume(v) => write!(f, "volume={}", v),
            ContainerFilter::Name(n) => write!(f, "name={}", n),
        }
    }
}

/// A container as reported by the engine's list call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDescriptor {
    /// Engine-assigned container ID.
    pub id: String,
    /// Names as reported by the engine, each with a leading `/`.
    pub names: Vec<String>,
}

impl ContainerDescriptor {
    /// The first reported name with its leading separator removed.
    pub fn canonical_name(&self) -> Option<&str> {
        self.names.first().map(|n| canonical_name(n))
    }
}

/// Strip the engine's leading `/` from a container name.
pub fn canonical_name(raw: &str) -> &str {
    raw.strip_prefix('/').unwrap_or(raw)
}

/// What to create for a one-shot job container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSpec {
    /// Image to run.
    pub image: String,
    /// Command and arguments.
    pub cmd: Vec<String>,
    /// Bind specs in `source:target` form.
    pub binds: Vec<String>,
    /// Attach stdout and stderr so logs can be read afterwards.
    pub capture_output: bool,
}

/// Drained output of a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContainerLogs {
    pub stdout: String,
    pub stderr: String,
}

/// Operations consumed from a running container engine.
///
/// Containers are addressed by name or ID; engines accept either.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// List containers matching `filter`. Stopped containers are included
    /// only when `include_stopped` is set.
    async fn list_containers(
        &self,
        filter: &ContainerFilter,
        include_stopped: bool,
    ) -> Result<Vec<ContainerDescriptor>>;

    /// Create a container and return its ID.
    async fn create_container(&self, spec: &CreateSpec) -> Result<String>;

    async fn start_container(&self, id: &str) -> Result<()>;

    /// Stop a container, giving it `grace` to shut down before it is killed.
    async fn stop_container(&self, id: &str, grace: Duration) -> Result<()>;

    /// Block until the container is no longer running and return its exit code.
    async fn wait_for_exit(&self, id: &str) -> Result<i64>;

    /// Read and drain the container's stdout and stderr.
    async fn fetch_logs(&self, id: &str) -> Result<ContainerLogs>;

    async fn remove_container(&self, id: &str) -> Result<()>;
}
