//! Runtime settings for volume orchestration.

use std::time::Duration;

/// Settings used by the orchestrators and the loader.
#[derive(Debug, Clone)]
pub struct VolumeConfig {
    /// Grace period given to a container's own shutdown before it is killed.
    pub stop_grace: Duration,
    /// Where the target volume is bound inside the loader container.
    pub mount_path: String,
    /// Path inside the loader image whose contents are copied into the volume.
    pub source_path: String,
    /// Propagate list failures from the resolver instead of treating them as
    /// "no attached containers".
    pub strict_resolve: bool,
    /// Leave a loader container that exited non-zero in place for inspection.
    pub keep_failed_loader: bool,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            stop_grace: Duration::from_secs(10),
            mount_path: "/mount-volume".to_string(),
            source_path: "/volume-data".to_string(),
            strict_resolve: false,
            keep_failed_loader: true,
        }
    }
}

impl VolumeConfig {
    /// Bind spec mounting `volume` at the loader mount path.
    pub fn bind_for(&self, volume: &str) -> String {
        format!("{}:{}", volume, self.mount_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = VolumeConfig::default();
        assert_eq!(config.stop_grace, Duration::from_secs(10));
        assert_eq!(config.mount_path, "/mount-volume");
        assert_eq!(config.source_path, "/volume-data");
        assert!(!config.strict_resolve);
        assert!(config.keep_failed_loader);
    }

    #[test]
    fn test_bind_for() {
        let config = VolumeConfig::default();
        assert_eq!(config.bind_for("pgdata"), "pgdata:/mount-volume");
    }
}
