//! Aggregates every collector into a [`StatusSnapshot`].

use crate::cache::StatusSource;
use crate::config::Config;
use crate::probe::{self, ServiceTarget};
use crate::snapshot::SnapshotStore;
use crate::tailscale::Tailscale;
use crate::types::StatusSnapshot;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

pub struct DevboxStatus {
    config: Config,
    targets: Vec<ServiceTarget>,
    store: Arc<SnapshotStore>,
    tailscale: Arc<Tailscale>,
}

impl DevboxStatus {
    pub fn new(config: Config, store: Arc<SnapshotStore>, tailscale: Arc<Tailscale>) -> Self {
        let targets = probe::targets(&config);
        Self {
            config,
            targets,
            store,
            tailscale,
        }
    }

    fn probe_timeout(&self) -> Duration {
        self.config.probe_timeout
    }
}

pub fn local_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

#[async_trait]
impl StatusSource for DevboxStatus {
    async fn collect(&self) -> StatusSnapshot {
        let (services, tailscale, cloudflared_active) = tokio::join!(
            probe::probe_all(&self.config.probe_host, &self.targets, self.probe_timeout()),
            self.tailscale.status(),
            self.tailscale.cloudflared_active(),
        );

        StatusSnapshot {
            captured_at: Utc::now(),
            container_name: self.config.container_name.clone(),
            username: self.config.username.clone(),
            database: self.config.database.name.clone(),
            dev_service_port: self.config.dev_service_port,
            hostname: local_hostname(),
            services,
            snapshots: self.store.list(),
            tailscale,
            cloudflared_active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::testing::RecordingRunner;
    use crate::runner::ProcessRunner;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_collect_degrades_without_tools() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            snapshots_dir: tmp.path().join("absent"),
            probe_host: "127.0.0.1".into(),
            probe_timeout: Duration::from_millis(200),
            container_name: "box-1".into(),
            ..Config::default()
        };
        let runner: Arc<dyn ProcessRunner> = Arc::new(RecordingRunner::new(|_| {
            Err(crate::error::ApiError::ToolUnavailable("missing".into()))
        }));
        let store = Arc::new(SnapshotStore::from_config(&config, runner.clone()));
        let tailscale = Arc::new(Tailscale::new(&config, runner));
        let source = DevboxStatus::new(config, store, tailscale);

        let snapshot = source.collect().await;
        assert_eq!(snapshot.container_name, "box-1");
        assert_eq!(snapshot.database, "devdb");
        assert_eq!(snapshot.services.len(), 9);
        assert_eq!(snapshot.services[1].name, "PostgreSQL");
        assert_eq!(snapshot.services[1].port, 5432);
        assert!(snapshot.snapshots.is_empty());
        assert!(!snapshot.tailscale.enabled);
        assert!(!snapshot.cloudflared_active);
        assert!(!snapshot.hostname.is_empty());
    }

    #[tokio::test]
    async fn test_collect_lists_snapshots() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("2025-01-01T0000.sql"), "x").unwrap();
        let config = Config {
            snapshots_dir: tmp.path().to_path_buf(),
            probe_host: "127.0.0.1".into(),
            probe_timeout: Duration::from_millis(200),
            ..Config::default()
        };
        let runner: Arc<dyn ProcessRunner> = Arc::new(RecordingRunner::succeeding());
        let store = Arc::new(SnapshotStore::from_config(&config, runner.clone()));
        let tailscale = Arc::new(Tailscale::new(&config, runner));

        let snapshot = DevboxStatus::new(config, store, tailscale).collect().await;
        assert_eq!(snapshot.snapshots.len(), 1);
        assert_eq!(snapshot.snapshots[0].filename, "2025-01-01T0000.sql");
    }
}
