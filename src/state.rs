use crate::cache::{StatusCache, StatusSource};
use crate::config::Config;
use crate::runner::{ProcessRunner, SystemRunner};
use crate::snapshot::SnapshotStore;
use crate::status::DevboxStatus;
use crate::tailscale::Tailscale;
use std::sync::Arc;
use std::time::Instant;

pub struct AppState {
    pub config: Config,
    pub store: Arc<SnapshotStore>,
    pub tailscale: Arc<Tailscale>,
    pub cache: StatusCache,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: Config) -> Arc<Self> {
        Self::with_runner(config, Arc::new(SystemRunner))
    }

    /// Build the state around a specific process runner; the status page is
    /// collected live from the store, Tailscale and the port probes.
    pub fn with_runner(config: Config, runner: Arc<dyn ProcessRunner>) -> Arc<Self> {
        let store = Arc::new(SnapshotStore::from_config(&config, Arc::clone(&runner)));
        let tailscale = Arc::new(Tailscale::new(&config, runner));
        let source = Arc::new(DevboxStatus::new(
            config.clone(),
            Arc::clone(&store),
            Arc::clone(&tailscale),
        ));
        Self::assemble(config, store, tailscale, source)
    }

    /// Like [`AppState::with_runner`], but the status page reads from `source`.
    pub fn with_source(
        config: Config,
        runner: Arc<dyn ProcessRunner>,
        source: Arc<dyn StatusSource>,
    ) -> Arc<Self> {
        let store = Arc::new(SnapshotStore::from_config(&config, Arc::clone(&runner)));
        let tailscale = Arc::new(Tailscale::new(&config, runner));
        Self::assemble(config, store, tailscale, source)
    }

    fn assemble(
        config: Config,
        store: Arc<SnapshotStore>,
        tailscale: Arc<Tailscale>,
        source: Arc<dyn StatusSource>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            store,
            tailscale,
            cache: StatusCache::new(source),
            start_time: Instant::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::testing::RecordingRunner;
    use tempfile::TempDir;

    #[test]
    fn test_state_wires_snapshot_dir() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            snapshots_dir: tmp.path().join("snaps"),
            ..Config::default()
        };
        let state = AppState::with_runner(config, Arc::new(RecordingRunner::succeeding()));
        assert_eq!(state.store.dir(), tmp.path().join("snaps"));
        assert_eq!(state.cache.ttl(), crate::cache::DEFAULT_TTL);
    }

    #[tokio::test]
    async fn test_state_cache_serves_live_status() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("2025-01-01T0000.sql"), "select 1;").unwrap();
        let config = Config {
            snapshots_dir: tmp.path().to_path_buf(),
            probe_host: "127.0.0.1".into(),
            probe_timeout: std::time::Duration::from_millis(200),
            ..Config::default()
        };
        let state = AppState::with_runner(config, Arc::new(RecordingRunner::succeeding()));

        let status = state.cache.get().await;
        assert_eq!(status.snapshots.len(), 1);
        assert_eq!(status.services.len(), 9);
    }
}
