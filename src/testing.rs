//! Test doubles for the container engine.
//!
//! Provides [`StubEngine`], an in-memory [`ContainerEngine`] that:
//! - tracks which containers exist, which volumes they mount and whether they run
//! - runs "loader" containers to a configurable exit code and output
//! - fails chosen operations on chosen targets via [`fail_on()`](StubEngine::fail_on)
//! - delays chosen stops and starts so fail-fast cancellation can be observed
//! - records every call for assertions
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use volume_loader::testing::StubEngine;
//! use volume_loader::volumes::{VolumeConfig, VolumeOrchestrator};
//!
//! # async fn example() {
//! let engine = Arc::new(StubEngine::new().with_container("db", &["pgdata"], true));
//! let orchestrator = VolumeOrchestrator::new(engine.clone(), VolumeConfig::default());
//! let report = orchestrator.stop_attached("pgdata").await.unwrap();
//! assert_eq!(report.stopped, vec!["db".to_string()]);
//! assert!(!engine.is_running("db"));
//! # }
//! ```

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::engine::{
    ContainerDescriptor, ContainerEngine, ContainerFilter, ContainerLogs, CreateSpec, EngineError,
    Result,
};

/// Engine operations, used to target failures and count calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StubOp {
    List,
    Create,
    Start,
    Stop,
    Wait,
    Logs,
    Remove,
}

impl StubOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            StubOp::List => "list containers",
            StubOp::Create => "create container",
            StubOp::Start => "start container",
            StubOp::Stop => "stop container",
            StubOp::Wait => "wait for container",
            StubOp::Logs => "read container logs",
            StubOp::Remove => "remove container",
        }
    }
}

#[derive(Debug, Clone)]
struct StubContainer {
    id: String,
    name: String,
    volumes: Vec<String>,
    running: bool,
    exit_code: i64,
    output: ContainerLogs,
}

impl StubContainer {
    fn matches(&self, id_or_name: &str) -> bool {
        self.id == id_or_name || self.name == id_or_name
    }
}

#[derive(Debug, Default)]
struct StubState {
    containers: Vec<StubContainer>,
    created: Vec<String>,
    calls: Vec<(StubOp, String)>,
    last_stop_grace: Option<Duration>,
    last_create_spec: Option<CreateSpec>,
}

/// In-memory container engine for tests.
///
/// Use this instead of ad-hoc engine implementations.
#[derive(Debug, Default)]
pub struct StubEngine {
    state: Mutex<StubState>,
    failures: HashMap<(StubOp, String), String>,
    stop_delays: HashMap<String, Duration>,
    start_delays: HashMap<String, Duration>,
    loader_exit_code: i64,
    loader_output: ContainerLogs,
}

impl StubEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a container named `name` mounting `volumes`.
    pub fn with_container(self, name: &str, volumes: &[&str], running: bool) -> Self {
        self.lock().containers.push(StubContainer {
            id: format!("id-{}", name),
            name: name.to_string(),
            volumes: volumes.iter().map(|v| v.to_string()).collect(),
            running,
            exit_code: 0,
            output: ContainerLogs::default(),
        });
        self
    }

    /// Make `op` on `target` fail.
    ///
    /// `target` is the container name or ID for most operations, the image
    /// for [`StubOp::Create`], and the filter (`volume=…` / `name=…`) for
    /// [`StubOp::List`].
    pub fn fail_on(mut self, op: StubOp, target: &str) -> Self {
        self.failures
            .insert((op, target.to_string()), "simulated engine failure".to_string());
        self
    }

    /// Delay stopping `name` by `delay`. The call is recorded once the delay
    /// has passed.
    pub fn with_stop_delay(mut self, name: &str, delay: Duration) -> Self {
        self.stop_delays.insert(name.to_string(), delay);
        self
    }

    /// Delay starting `name` by `delay`, like [`with_stop_delay()`](Self::with_stop_delay).
    pub fn with_start_delay(mut self, name: &str, delay: Duration) -> Self {
        self.start_delays.insert(name.to_string(), delay);
        self
    }

    /// Exit code of containers created through the engine.
    pub fn with_loader_exit_code(mut self, code: i64) -> Self {
        self.loader_exit_code = code;
        self
    }

    /// Output reported for containers created through the engine.
    pub fn with_loader_output(mut self, stdout: &str, stderr: &str) -> Self {
        self.loader_output = ContainerLogs {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        };
        self
    }

    /// Whether a container with this name or ID exists and is running.
    pub fn is_running(&self, id_or_name: &str) -> bool {
        self.lock()
            .containers
            .iter()
            .any(|c| c.matches(id_or_name) && c.running)
    }

    /// Whether a container with this name or ID exists.
    pub fn exists(&self, id_or_name: &str) -> bool {
        self.lock().containers.iter().any(|c| c.matches(id_or_name))
    }

    /// IDs of containers created through the engine, in creation order.
    pub fn created_ids(&self) -> Vec<String> {
        self.lock().created.clone()
    }

    /// Number of calls made for `op`.
    pub fn calls_for(&self, op: StubOp) -> usize {
        self.lock().calls.iter().filter(|(o, _)| *o == op).count()
    }

    /// Targets of the calls made for `op`, in call order.
    pub fn targets_for(&self, op: StubOp) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter(|(o, _)| *o == op)
            .map(|(_, t)| t.clone())
            .collect()
    }

    pub fn last_stop_grace(&self) -> Option<Duration> {
        self.lock().last_stop_grace
    }

    pub fn last_create_spec(&self) -> Option<CreateSpec> {
        self.lock().last_create_spec.clone()
    }

    fn lock(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().expect("stub engine state poisoned")
    }

    /// Record the call and return the configured failure, if any.
    fn enter(&self, op: StubOp, target: &str) -> Result<()> {
        self.lock().calls.push((op, target.to_string()));
        match self.failures.get(&(op, target.to_string())) {
            Some(reason) => Err(EngineError::request(op.as_str(), target, reason)),
            None => Ok(()),
        }
    }

    fn with_existing<T>(
        &self,
        id_or_name: &str,
        f: impl FnOnce(&mut StubContainer) -> T,
    ) -> Result<T> {
        let mut state = self.lock();
        state
            .containers
            .iter_mut()
            .find(|c| c.matches(id_or_name))
            .map(f)
            .ok_or_else(|| EngineError::NotFound {
                target: id_or_name.to_string(),
            })
    }
}

#[async_trait]
impl ContainerEngine for StubEngine {
    async fn list_containers(
        &self,
        filter: &ContainerFilter,
        include_stopped: bool,
    ) -> Result<Vec<ContainerDescriptor>> {
        self.enter(StubOp::List, &filter.to_string())?;

        let state = self.lock();
        Ok(state
            .containers
            .iter()
            .filter(|c| include_stopped || c.running)
            .filter(|c| match filter {
                ContainerFilter::Volume(v) => c.volumes.contains(v),
                ContainerFilter::Name(n) => &c.name == n,
            })
            .map(|c| ContainerDescriptor {
                id: c.id.clone(),
                names: vec![format!("/{}", c.name)],
            })
            .collect())
    }

    async fn create_container(&self, spec: &CreateSpec) -> Result<String> {
        self.enter(StubOp::Create, &spec.image)?;

        let mut state = self.lock();
        let seq = state.created.len() + 1;
        let id = format!("stub-{}", seq);
        state.containers.push(StubContainer {
            id: id.clone(),
            name: format!("loader-{}", seq),
            volumes: spec
                .binds
                .iter()
                .filter_map(|b| b.split(':').next())
                .map(str::to_string)
                .collect(),
            running: false,
            exit_code: self.loader_exit_code,
            output: self.loader_output.clone(),
        });
        state.created.push(id.clone());
        state.last_create_spec = Some(spec.clone());
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        if let Some(delay) = self.start_delays.get(id) {
            tokio::time::sleep(*delay).await;
        }
        self.enter(StubOp::Start, id)?;
        self.with_existing(id, |c| c.running = true)
    }

    async fn stop_container(&self, id: &str, grace: Duration) -> Result<()> {
        self.lock().last_stop_grace = Some(grace);

        // The delay also applies to stops configured to fail.
        if let Some(delay) = self.stop_delays.get(id) {
            tokio::time::sleep(*delay).await;
        }
        self.enter(StubOp::Stop, id)?;
        self.with_existing(id, |c| c.running = false)
    }

    async fn wait_for_exit(&self, id: &str) -> Result<i64> {
        self.enter(StubOp::Wait, id)?;
        self.with_existing(id, |c| {
            c.running = false;
            c.exit_code
        })
    }

    async fn fetch_logs(&self, id: &str) -> Result<ContainerLogs> {
        self.enter(StubOp::Logs, id)?;
        self.with_existing(id, |c| c.output.clone())
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        self.enter(StubOp::Remove, id)?;

        let mut state = self.lock();
        let before = state.containers.len();
        state.containers.retain(|c| !c.matches(id));
        if state.containers.len() == before {
            return Err(EngineError::NotFound {
                target: id.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_filters_by_volume_and_state() {
        let engine = StubEngine::new()
            .with_container("a", &["data"], true)
            .with_container("b", &["data"], false);

        let all = engine
            .list_containers(&ContainerFilter::Volume("data".to_string()), true)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let running = engine
            .list_containers(&ContainerFilter::Volume("data".to_string()), false)
            .await
            .unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].names, vec!["/a".to_string()]);
    }

    #[tokio::test]
    async fn test_configured_failure() {
        let engine = StubEngine::new()
            .with_container("a", &["data"], true)
            .fail_on(StubOp::Stop, "a");

        let err = engine
            .stop_container("a", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("stop container failed for 'a'"));
        assert!(engine.is_running("a"));
        assert_eq!(engine.calls_for(StubOp::Stop), 1);
    }

    #[tokio::test]
    async fn test_unknown_container_is_not_found() {
        let engine = StubEngine::new();
        let err = engine.start_container("ghost").await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_created_container_runs_to_exit_code() {
        let engine = StubEngine::new().with_loader_exit_code(3);
        let spec = CreateSpec {
            image: "seed".to_string(),
            cmd: vec!["true".to_string()],
            binds: vec!["data:/mnt".to_string()],
            capture_output: true,
        };

        let id = engine.create_container(&spec).await.unwrap();
        engine.start_container(&id).await.unwrap();
        assert!(engine.is_running(&id));
        assert_eq!(engine.wait_for_exit(&id).await.unwrap(), 3);
        assert!(!engine.is_running(&id));
        assert_eq!(engine.last_create_spec(), Some(spec));
    }
}
