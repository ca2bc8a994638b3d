//! [`ContainerEngine`] backed by the Docker Engine API.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions, WaitContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::models::HostConfig;
use futures::StreamExt;

use crate::engine::error::{EngineError, Result};
use crate::engine::{ContainerDescriptor, ContainerEngine, ContainerFilter, ContainerLogs, CreateSpec};

/// Seconds bollard waits on a socket request before giving up.
const SOCKET_TIMEOUT_SECS: u64 = 120;

/// Connect to the Docker daemon.
///
/// Tries bollard's local defaults first (which honour `DOCKER_HOST`), then
/// the per-user sockets used by Docker Desktop and rootless Docker. Every
/// candidate must answer a ping before it is returned.
pub async fn connect_docker() -> Result<Docker> {
    let mut last_error = match Docker::connect_with_local_defaults() {
        Ok(docker) => match docker.ping().await {
            Ok(_) => return Ok(docker),
            Err(e) => e.to_string(),
        },
        Err(e) => e.to_string(),
    };

    for socket in fallback_sockets() {
        if !socket.exists() {
            continue;
        }
        let path = socket.to_string_lossy();
        match Docker::connect_with_socket(&path, SOCKET_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
        {
            Ok(docker) => match docker.ping().await {
                Ok(_) => {
                    tracing::debug!(socket = %path, "Connected to Docker via fallback socket");
                    return Ok(docker);
                }
                Err(e) => last_error = e.to_string(),
            },
            Err(e) => last_error = e.to_string(),
        }
    }

    Err(EngineError::Unavailable { reason: last_error })
}

/// Per-user socket locations, in the order they are tried.
fn fallback_sockets() -> Vec<PathBuf> {
    let mut sockets = Vec::new();
    if cfg!(unix) {
        if let Some(home) = dirs::home_dir() {
            sockets.push(home.join(".docker").join("run").join("docker.sock"));
        }
        if let Some(runtime_dir) = dirs::runtime_dir() {
            sockets.push(runtime_dir.join("docker.sock"));
        }
    }
    sockets
}

/// Docker-backed container engine.
#[derive(Debug, Clone)]
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connect to the local daemon.
    pub async fn connect() -> Result<Self> {
        Ok(Self {
            docker: connect_docker().await?,
        })
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn list_containers(
        &self,
        filter: &ContainerFilter,
        include_stopped: bool,
    ) -> Result<Vec<ContainerDescriptor>> {
        let options = ListContainersOptions {
            all: include_stopped,
            filters: list_filters(filter),
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| map_error("list containers", filter.to_string(), e))?;

        Ok(containers
            .into_iter()
            .map(|c| ContainerDescriptor {
                id: c.id.unwrap_or_default(),
                names: c.names.unwrap_or_default(),
            })
            .filter(|c| match filter {
                ContainerFilter::Name(name) => c.canonical_name() == Some(name.as_str()),
                ContainerFilter::Volume(_) => true,
            })
            .collect())
    }

    async fn create_container(&self, spec: &CreateSpec) -> Result<String> {
        let host_config = HostConfig {
            binds: if spec.binds.is_empty() {
                None
            } else {
                Some(spec.binds.clone())
            },
            ..Default::default()
        };

        let config = Config {
            image: Some(spec.image.clone()),
            cmd: Some(spec.cmd.clone()),
            attach_stdout: Some(spec.capture_output),
            attach_stderr: Some(spec.capture_output),
            host_config: Some(host_config),
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(None::<CreateContainerOptions<String>>, config)
            .await
            .map_err(|e| map_error("create container", spec.image.as_str(), e))?;

        for warning in &response.warnings {
            tracing::warn!(container_id = %response.id, "Engine warning on create: {}", warning);
        }

        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| map_error("start container", id, e))
    }

    async fn stop_container(&self, id: &str, grace: Duration) -> Result<()> {
        let options = StopContainerOptions {
            t: stop_timeout_secs(grace),
        };
        self.docker
            .stop_container(id, Some(options))
            .await
            .map_err(|e| map_error("stop container", id, e))
    }

    async fn wait_for_exit(&self, id: &str) -> Result<i64> {
        let options = WaitContainerOptions {
            condition: "not-running",
        };
        let mut stream = self.docker.wait_container(id, Some(options));

        // The first item settles it: either a status or an error.
        match stream.next().await {
            Some(Ok(response)) => {
                if let Some(message) = response.error.and_then(|e| e.message) {
                    tracing::warn!(container_id = %id, "Wait reported: {}", message);
                }
                Ok(response.status_code)
            }
            // bollard turns a non-zero exit into an error item
            Some(Err(BollardError::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(map_error("wait for container", id, e)),
            None => Err(EngineError::request(
                "wait for container",
                id,
                "wait stream closed without a status",
            )),
        }
    }

    async fn fetch_logs(&self, id: &str) -> Result<ContainerLogs> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            tail: "all".to_string(),
            ..Default::default()
        };
        let mut stream = self.docker.logs(id, Some(options));

        let mut logs = ContainerLogs::default();
        while let Some(item) = stream.next().await {
            match item.map_err(|e| map_error("read container logs", id, e))? {
                LogOutput::StdOut { message } | LogOutput::Console { message } => {
                    logs.stdout.push_str(&String::from_utf8_lossy(&message));
                }
                LogOutput::StdErr { message } => {
                    logs.stderr.push_str(&String::from_utf8_lossy(&message));
                }
                LogOutput::StdIn { .. } => {}
            }
        }

        Ok(logs)
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        self.docker
            .remove_container(id, None::<RemoveContainerOptions>)
            .await
            .map_err(|e| map_error("remove container", id, e))
    }
}

/// Translate a filter into Docker list filters.
///
/// Docker's `name` filter is an unanchored regex over `/name`, so the name
/// is escaped and anchored here to match one container exactly.
fn list_filters(filter: &ContainerFilter) -> HashMap<String, Vec<String>> {
    let (key, value) = match filter {
        ContainerFilter::Volume(volume) => ("volume", volume.clone()),
        ContainerFilter::Name(name) => ("name", format!("^/{}$", regex::escape(name))),
    };
    HashMap::from([(key.to_string(), vec![value])])
}

/// Stop timeout in whole seconds, saturating at the API's `i64` limit.
fn stop_timeout_secs(grace: Duration) -> i64 {
    i64::try_from(grace.as_secs()).unwrap_or(i64::MAX)
}

fn map_error(operation: &'static str, target: impl Into<String>, e: BollardError) -> EngineError {
    match e {
        BollardError::DockerResponseServerError {
            status_code: 404, ..
        } => EngineError::NotFound {
            target: target.into(),
        },
        other => EngineError::request(operation, target, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_filter() {
        let filters = list_filters(&ContainerFilter::Volume("pgdata".to_string()));
        assert_eq!(filters.get("volume"), Some(&vec!["pgdata".to_string()]));
        assert_eq!(filters.len(), 1);
    }

    #[test]
    fn test_name_filter_is_anchored() {
        let filters = list_filters(&ContainerFilter::Name("db".to_string()));
        assert_eq!(filters.get("name"), Some(&vec!["^/db$".to_string()]));
    }

    #[test]
    fn test_name_filter_escapes_regex() {
        let filters = list_filters(&ContainerFilter::Name("db.1".to_string()));
        assert_eq!(filters.get("name"), Some(&vec![r"^/db\.1$".to_string()]));
    }

    #[test]
    fn test_stop_timeout_saturates() {
        assert_eq!(stop_timeout_secs(Duration::from_secs(10)), 10);
        assert_eq!(stop_timeout_secs(Duration::from_secs(u64::MAX)), i64::MAX);
    }

    #[test]
    fn test_not_found_mapping() {
        let err = map_error(
            "stop container",
            "db",
            BollardError::DockerResponseServerError {
                status_code: 404,
                message: "No such container: db".to_string(),
            },
        );
        assert!(matches!(err, EngineError::NotFound { ref target } if target == "db"));
    }

    #[test]
    fn test_server_error_mapping_keeps_operation() {
        let err = map_error(
            "stop container",
            "db",
            BollardError::DockerResponseServerError {
                status_code: 500,
                message: "boom".to_string(),
            },
        );
        match err {
            EngineError::Request {
                operation, target, ..
            } => {
                assert_eq!(operation, "stop container");
                assert_eq!(target, "db");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
