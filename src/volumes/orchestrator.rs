//! Stop and restart the containers attached to a volume.
//!
//! Both directions fan out one task per container on a [`JoinSet`] and fail
//! fast: the first error aborts the tasks still in flight. Results of tasks
//! that had already finished are still collected, so a [`StopReport`] lists
//! exactly the containers that were stopped.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::{JoinError, JoinSet};
use tracing::Instrument;

use crate::engine::{ContainerEngine, ContainerFilter};
use crate::volumes::config::VolumeConfig;
use crate::volumes::error::{RestoreError, Result, StopFailure, VolumeError};
use crate::volumes::loader::{LoaderJob, VolumeLoader, check_inputs};
use crate::volumes::resolver::{resolve_attached, try_resolve_attached};

/// Containers attached to a volume and the subset this call stopped.
///
/// Only `stopped` may be restarted afterwards. Containers that were already
/// stopped are attached but never stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StopReport {
    pub attached: Vec<String>,
    pub stopped: Vec<String>,
}

/// Outcome of a full restore.
#[derive(Debug, Clone, Serialize)]
pub struct RestoreReport {
    pub containers: StopReport,
    pub job: LoaderJob,
}

/// Coordinates the engine calls around a volume load.
pub struct VolumeOrchestrator {
    engine: Arc<dyn ContainerEngine>,
    config: VolumeConfig,
    loader: VolumeLoader,
}

impl VolumeOrchestrator {
    pub fn new(engine: Arc<dyn ContainerEngine>, config: VolumeConfig) -> Self {
        let loader = VolumeLoader::new(config.clone());
        Self {
            engine,
            config,
            loader,
        }
    }

    /// Names of the containers attached to `volume`.
    ///
    /// With `strict_resolve` off a failed engine query yields an empty list.
    pub async fn resolve_attached(&self, volume: &str) -> Result<Vec<String>> {
        if self.config.strict_resolve {
            try_resolve_attached(self.engine.as_ref(), volume).await
        } else {
            Ok(resolve_attached(self.engine.as_ref(), volume).await)
        }
    }

    /// Stop every running container attached to `volume`.
    pub async fn stop_attached(&self, volume: &str) -> std::result::Result<StopReport, StopFailure> {
        let attached = self
            .resolve_attached(volume)
            .await
            .map_err(|source| StopFailure {
                report: StopReport::default(),
                source,
            })?;

        let mut tasks = JoinSet::new();
        for name in &attached {
            let engine = Arc::clone(&self.engine);
            let grace = self.config.stop_grace;
            let span = tracing::info_span!("stop_attached", volume = %volume, container = %name);
            let name = name.clone();
            tasks.spawn(
                async move {
                    let outcome = stop_if_running(engine.as_ref(), &name, grace).await;
                    (name, outcome)
                }
                .instrument(span),
            );
        }

        let mut stopped = Vec::new();
        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok((name, Ok(true))) => {
                    stopped.push(name);
                    continue;
                }
                Ok((_, Ok(false))) => continue,
                Ok((_, Err(e))) => e,
                Err(e) => match task_failure(e) {
                    Some(e) => e,
                    None => continue,
                },
            };
            if failure.is_none() {
                tasks.abort_all();
                failure = Some(outcome);
            }
        }

        let report = StopReport { attached, stopped };
        match failure {
            Some(source) => {
                tracing::error!(volume = %volume, "Stopping attached containers failed: {}", source);
                Err(StopFailure { report, source })
            }
            None => Ok(report),
        }
    }

    /// Start each of `names`.
    ///
    /// The first failure aborts the remaining starts and is returned; which
    /// of the others got started is not reported.
    pub async fn start_attached(&self, names: &[String]) -> Result<()> {
        let mut tasks = JoinSet::new();
        for name in names {
            let engine = Arc::clone(&self.engine);
            let span = tracing::info_span!("start_attached", container = %name);
            let name = name.clone();
            tasks.spawn(
                async move {
                    tracing::info!("Starting container");
                    engine
                        .start_container(&name)
                        .await
                        .map_err(|source| VolumeError::StartFailed {
                            container: name.clone(),
                            source,
                        })?;
                    tracing::info!("Container started");
                    Ok::<_, VolumeError>(())
                }
                .instrument(span),
            );
        }

        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(e) => match task_failure(e) {
                    Some(e) => e,
                    None => continue,
                },
            };
            if failure.is_none() {
                tasks.abort_all();
                failure = Some(outcome);
            }
        }

        failure.map_or(Ok(()), Err)
    }

    /// Overwrite `volume` with the data in `image`.
    ///
    /// Does not stop anything; see [`Self::restore`] for the guarded flow.
    pub async fn load(&self, volume: &str, image: &str) -> Result<LoaderJob> {
        self.loader.load(self.engine.as_ref(), volume, image).await
    }

    /// Stop the attached containers, load the volume, and restart what was stopped.
    ///
    /// If stopping or loading fails nothing is restarted and the error says
    /// which step failed.
    pub async fn restore(
        &self,
        volume: &str,
        image: &str,
    ) -> std::result::Result<RestoreReport, RestoreError> {
        check_inputs(volume, image).map_err(RestoreError::InvalidInput)?;

        tracing::info!(volume = %volume, image = %image, "Restoring volume from image");

        let containers = self
            .stop_attached(volume)
            .await
            .map_err(|source| RestoreError::Stop {
                volume: volume.to_string(),
                source,
            })?;

        let job = match self.load(volume, image).await {
            Ok(job) => job,
            Err(source) => {
                return Err(RestoreError::Load {
                    volume: volume.to_string(),
                    stopped: containers.stopped,
                    source,
                });
            }
        };

        self.start_attached(&containers.stopped)
            .await
            .map_err(|source| RestoreError::Restart {
                volume: volume.to_string(),
                source,
            })?;

        Ok(RestoreReport { containers, job })
    }
}

/// Stop `name` if the engine reports it running. Returns whether it was stopped.
async fn stop_if_running(engine: &dyn ContainerEngine, name: &str, grace: Duration) -> Result<bool> {
    let running = engine
        .list_containers(&ContainerFilter::Name(name.to_string()), false)
        .await
        .map_err(|source| VolumeError::StatusCheckFailed {
            container: name.to_string(),
            source,
        })?;

    if running.is_empty() {
        tracing::info!("Container is not running, no need to stop it");
        return Ok(false);
    }

    tracing::info!(grace_secs = grace.as_secs(), "Stopping container");
    engine
        .stop_container(name, grace)
        .await
        .map_err(|source| VolumeError::StopFailed {
            container: name.to_string(),
            source,
        })?;
    tracing::info!("Container stopped");

    Ok(true)
}

/// Map a join error to a failure. Tasks aborted by fail-fast are not failures.
fn task_failure(e: JoinError) -> Option<VolumeError> {
    if e.is_cancelled() {
        return None;
    }
    tracing::error!("Container task panicked: {}", e);
    Some(VolumeError::TaskFailed {
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubEngine, StubOp};
    use pretty_assertions::assert_eq;

    fn orchestrator(engine: &Arc<StubEngine>) -> VolumeOrchestrator {
        VolumeOrchestrator::new(engine.clone(), VolumeConfig::default())
    }

    fn sorted(mut names: Vec<String>) -> Vec<String> {
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_stop_only_running_containers() {
        let engine = Arc::new(
            StubEngine::new()
                .with_container("web", &["data"], true)
                .with_container("worker", &["data"], false)
                .with_container("unrelated", &["other"], true),
        );

        let report = orchestrator(&engine).stop_attached("data").await.unwrap();

        assert_eq!(sorted(report.attached), vec!["web", "worker"]);
        assert_eq!(report.stopped, vec!["web"]);
        assert!(!engine.is_running("web"));
        assert!(engine.is_running("unrelated"));
        assert_eq!(engine.calls_for(StubOp::Stop), 1);
    }

    #[tokio::test]
    async fn test_stop_uses_grace_period() {
        let engine = Arc::new(StubEngine::new().with_container("web", &["data"], true));

        orchestrator(&engine).stop_attached("data").await.unwrap();

        assert_eq!(engine.last_stop_grace(), Some(Duration::from_secs(10)));
    }

    #[tokio::test]
    async fn test_no_attachments() {
        let engine = Arc::new(StubEngine::new());

        let report = orchestrator(&engine).stop_attached("data").await.unwrap();

        assert_eq!(report, StopReport::default());
    }

    #[tokio::test]
    async fn test_strict_resolve_fails_stop() {
        let engine = Arc::new(
            StubEngine::new()
                .with_container("web", &["data"], true)
                .fail_on(StubOp::List, "volume=data"),
        );
        let orchestrator = VolumeOrchestrator::new(
            engine.clone(),
            VolumeConfig {
                strict_resolve: true,
                ..Default::default()
            },
        );

        let failure = orchestrator.stop_attached("data").await.unwrap_err();

        assert!(matches!(failure.source, VolumeError::ListFailed { .. }));
        assert!(engine.is_running("web"));
    }

    #[tokio::test]
    async fn test_start_attached_starts_all() {
        let engine = Arc::new(
            StubEngine::new()
                .with_container("a", &["data"], false)
                .with_container("b", &["data"], false),
        );

        orchestrator(&engine)
            .start_attached(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();

        assert!(engine.is_running("a"));
        assert!(engine.is_running("b"));
    }

    #[tokio::test]
    async fn test_start_attached_reports_failing_container() {
        let engine = Arc::new(
            StubEngine::new()
                .with_container("a", &["data"], false)
                .fail_on(StubOp::Start, "a"),
        );

        let err = orchestrator(&engine)
            .start_attached(&["a".to_string()])
            .await
            .unwrap_err();

        assert!(matches!(err, VolumeError::StartFailed { ref container, .. } if container == "a"));
    }

    #[tokio::test]
    async fn test_failed_start_cancels_slow_siblings() {
        let engine = Arc::new(
            StubEngine::new()
                .with_container("broken", &["data"], false)
                .with_container("slow", &["data"], false)
                .with_start_delay("slow", Duration::from_secs(30))
                .fail_on(StubOp::Start, "broken"),
        );

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            orchestrator(&engine).start_attached(&["broken".to_string(), "slow".to_string()]),
        )
        .await
        .expect("fail-fast should not wait for the slow start")
        .unwrap_err();

        assert!(matches!(err, VolumeError::StartFailed { ref container, .. } if container == "broken"));
        assert!(!engine.is_running("slow"));
        assert_eq!(engine.targets_for(StubOp::Start), vec!["broken"]);
    }

    #[tokio::test]
    async fn test_start_attached_empty_is_noop() {
        let engine = Arc::new(StubEngine::new());

        orchestrator(&engine).start_attached(&[]).await.unwrap();

        assert_eq!(engine.calls_for(StubOp::Start), 0);
    }
}
