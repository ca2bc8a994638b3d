//! Replace a volume's contents with data baked into an image.
//!
//! The loader runs one throwaway container per call:
//!
//! ```text
//! create ──▶ start ──▶ wait ──▶ logs ──▶ exit code == 0 ? remove : fail
//! ```
//!
//! Each step runs only if the previous one succeeded. A loader that exits
//! non-zero is left in place unless `keep_failed_loader` is off.

use serde::Serialize;

use crate::engine::{ContainerEngine, ContainerLogs, CreateSpec};
use crate::volumes::config::VolumeConfig;
use crate::volumes::error::{Result, VolumeError};

/// Record of one loader run.
#[derive(Debug, Clone, Serialize)]
pub struct LoaderJob {
    pub volume: String,
    pub image: String,
    /// Mount path of the volume inside the loader.
    pub mount_path: String,
    pub container_id: String,
    pub exit_code: i64,
    /// Output captured from the copy command.
    pub output: ContainerLogs,
    /// Whether the loader container was removed afterwards.
    pub removed: bool,
}

/// Runs loader containers.
#[derive(Debug, Clone)]
pub struct VolumeLoader {
    config: VolumeConfig,
}

impl VolumeLoader {
    pub fn new(config: VolumeConfig) -> Self {
        Self { config }
    }

    /// Shell command that empties the mount path and copies the image data in.
    ///
    /// `..?*` matches dot-dot files other than `..`, and `.[!.]*` matches dot
    /// files other than `.`, so hidden entries are cleared too. `cp -Rp`
    /// keeps modes and timestamps.
    pub fn command(&self) -> Vec<String> {
        let mount = self.config.mount_path.trim_end_matches('/');
        let source = self.config.source_path.trim_end_matches('/');
        let script = format!(
            "rm -rf {m}/..?* {m}/.[!.]* {m}/* && cp -Rp {s}/. {m}/;",
            m = mount,
            s = source
        );
        vec!["/bin/sh".to_string(), "-c".to_string(), script]
    }

    /// Container definition for loading `volume` from `image`.
    pub fn create_spec(&self, volume: &str, image: &str) -> CreateSpec {
        CreateSpec {
            image: image.to_string(),
            cmd: self.command(),
            binds: vec![self.config.bind_for(volume)],
            capture_output: true,
        }
    }

    /// Overwrite `volume` with the contents of `image`.
    ///
    /// Callers must make sure no running container has the volume mounted.
    pub async fn load(
        &self,
        engine: &dyn ContainerEngine,
        volume: &str,
        image: &str,
    ) -> Result<LoaderJob> {
        check_inputs(volume, image)?;

        let container_id = engine
            .create_container(&self.create_spec(volume, image))
            .await
            .map_err(|source| VolumeError::LoaderCreateFailed {
                image: image.to_string(),
                source,
            })?;

        tracing::info!(
            volume = %volume,
            image = %image,
            container_id = %container_id,
            "Created loader container"
        );

        engine
            .start_container(&container_id)
            .await
            .map_err(|source| VolumeError::LoaderStartFailed {
                container_id: container_id.clone(),
                source,
            })?;

        let exit_code = engine.wait_for_exit(&container_id).await.map_err(|source| {
            VolumeError::LoaderWaitFailed {
                container_id: container_id.clone(),
                source,
            }
        })?;

        tracing::info!(container_id = %container_id, exit_code, "Loader container finished");

        let output = engine.fetch_logs(&container_id).await.map_err(|source| {
            VolumeError::LoaderLogsFailed {
                container_id: container_id.clone(),
                source,
            }
        })?;
        log_output(&container_id, &output);

        let mut job = LoaderJob {
            volume: volume.to_string(),
            image: image.to_string(),
            mount_path: self.config.mount_path.clone(),
            container_id,
            exit_code,
            output,
            removed: false,
        };

        if exit_code != 0 {
            if !self.config.keep_failed_loader {
                self.discard_failed(engine, &job.container_id).await;
            } else {
                tracing::warn!(
                    container_id = %job.container_id,
                    "Leaving failed loader container in place for inspection"
                );
            }
            return Err(VolumeError::LoaderExited {
                container_id: job.container_id,
                exit_code,
            });
        }

        engine
            .remove_container(&job.container_id)
            .await
            .map_err(|source| VolumeError::LoaderRemoveFailed {
                container_id: job.container_id.clone(),
                source,
            })?;
        job.removed = true;

        tracing::info!(volume = %volume, image = %image, "Volume loaded");
        Ok(job)
    }

    async fn discard_failed(&self, engine: &dyn ContainerEngine, container_id: &str) {
        if let Err(e) = engine.remove_container(container_id).await {
            tracing::warn!(
                container_id = %container_id,
                "Could not remove failed loader container: {}",
                e
            );
        }
    }
}

/// Reject a volume or image the loader must not be pointed at.
///
/// Volume names follow the engine's grammar `[a-zA-Z0-9][a-zA-Z0-9_.-]*`. A
/// leading `/` would make the bind a host path and a `:` would add mount
/// options, so neither can reach the bind spec.
pub fn check_inputs(volume: &str, image: &str) -> Result<()> {
    if volume.is_empty() {
        return Err(VolumeError::EmptyVolume);
    }
    if !is_volume_name(volume) {
        return Err(VolumeError::InvalidVolume {
            volume: volume.to_string(),
        });
    }
    if image.is_empty() {
        return Err(VolumeError::EmptyImage);
    }
    Ok(())
}

fn is_volume_name(volume: &str) -> bool {
    let mut chars = volume.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphanumeric())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

fn log_output(container_id: &str, output: &ContainerLogs) {
    for line in output.stdout.lines() {
        tracing::debug!(container_id = %container_id, stream = "stdout", "{}", line);
    }
    for line in output.stderr.lines() {
        tracing::warn!(container_id = %container_id, stream = "stderr", "{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubEngine, StubOp};

    fn loader() -> VolumeLoader {
        VolumeLoader::new(VolumeConfig::default())
    }

    #[test]
    fn test_command_clears_hidden_entries_and_copies() {
        let cmd = loader().command();
        assert_eq!(cmd[0], "/bin/sh");
        assert_eq!(cmd[1], "-c");
        assert_eq!(
            cmd[2],
            "rm -rf /mount-volume/..?* /mount-volume/.[!.]* /mount-volume/* \
             && cp -Rp /volume-data/. /mount-volume/;"
        );
    }

    #[test]
    fn test_command_respects_custom_paths() {
        let loader = VolumeLoader::new(VolumeConfig {
            mount_path: "/target/".to_string(),
            source_path: "/seed".to_string(),
            ..Default::default()
        });
        let cmd = loader.command();
        assert!(cmd[2].starts_with("rm -rf /target/..?* /target/.[!.]* /target/*"));
        assert!(cmd[2].ends_with("cp -Rp /seed/. /target/;"));
    }

    #[test]
    fn test_create_spec_binds_volume() {
        let spec = loader().create_spec("pgdata", "backup:latest");
        assert_eq!(spec.image, "backup:latest");
        assert_eq!(spec.binds, vec!["pgdata:/mount-volume".to_string()]);
        assert!(spec.capture_output);
    }

    #[tokio::test]
    async fn test_successful_load_removes_container() {
        let engine = StubEngine::new().with_loader_output("copied\n", "");

        let job = loader().load(&engine, "data", "seed:1").await.unwrap();

        assert_eq!(job.exit_code, 0);
        assert!(job.removed);
        assert_eq!(job.output.stdout, "copied\n");
        assert!(!engine.exists(&job.container_id));
    }

    #[tokio::test]
    async fn test_non_zero_exit_keeps_container() {
        let engine = StubEngine::new().with_loader_exit_code(1);

        let err = loader().load(&engine, "data", "seed:1").await.unwrap_err();

        assert_eq!(err.exit_code(), Some(1));
        assert!(err.to_string().contains("status code 1"));
        let created = engine.created_ids();
        assert_eq!(created.len(), 1);
        assert!(engine.exists(&created[0]));
        assert_eq!(engine.calls_for(StubOp::Remove), 0);
    }

    #[tokio::test]
    async fn test_non_zero_exit_discarded_when_configured() {
        let engine = StubEngine::new().with_loader_exit_code(2);
        let loader = VolumeLoader::new(VolumeConfig {
            keep_failed_loader: false,
            ..Default::default()
        });

        let err = loader.load(&engine, "data", "seed:1").await.unwrap_err();

        assert_eq!(err.exit_code(), Some(2));
        assert!(!engine.exists(&engine.created_ids()[0]));
    }

    #[tokio::test]
    async fn test_start_failure_skips_later_steps() {
        let engine = StubEngine::new().fail_on(StubOp::Start, "stub-1");

        let err = loader().load(&engine, "data", "seed:1").await.unwrap_err();

        assert!(matches!(err, VolumeError::LoaderStartFailed { .. }));
        assert_eq!(engine.calls_for(StubOp::Wait), 0);
        assert_eq!(engine.calls_for(StubOp::Logs), 0);
        assert_eq!(engine.calls_for(StubOp::Remove), 0);
    }

    #[tokio::test]
    async fn test_rejects_empty_arguments() {
        let engine = StubEngine::new();

        assert!(matches!(
            loader().load(&engine, "", "seed").await,
            Err(VolumeError::EmptyVolume)
        ));
        assert!(matches!(
            loader().load(&engine, "data", "").await,
            Err(VolumeError::EmptyImage)
        ));
        assert!(engine.created_ids().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_host_paths_and_mount_options() {
        let engine = StubEngine::new();

        for volume in ["/home/user", "data:/etc", "data:/mnt:rw", ".hidden", "../up", "a b"] {
            let err = loader().load(&engine, volume, "seed:1").await.unwrap_err();
            assert!(
                matches!(err, VolumeError::InvalidVolume { volume: ref v } if v == volume),
                "{volume} should be rejected, got {err}"
            );
        }
        assert_eq!(engine.calls_for(StubOp::Create), 0);
    }

    #[test]
    fn test_accepts_engine_volume_names() {
        for volume in ["data", "pg_data-1", "app.v2", "0abc"] {
            assert!(check_inputs(volume, "seed").is_ok(), "{volume} should be accepted");
        }
    }
}
