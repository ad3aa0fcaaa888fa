use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Services ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Running,
    Stopped,
}

impl ServiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceProbe {
    pub name: String,
    pub port: u16,
    pub status: ServiceState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

// ── Snapshots ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub filename: String,
    pub size_bytes: u64,
    /// Human-readable size, e.g. `1.5 MB`.
    pub size: String,
    pub modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotList {
    pub snapshots: Vec<SnapshotRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotCreated {
    pub filename: String,
}

// ── Tunnel ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TailscaleStatus {
    pub enabled: bool,
    pub tailnet_ip: String,
    pub hostname: String,
    pub full_hostname: String,
    pub funnel_enabled: bool,
    pub public_url: String,
}

impl TailscaleStatus {
    pub fn disabled() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunnelToggled {
    pub message: String,
}

// ── Aggregated status ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub captured_at: DateTime<Utc>,
    pub container_name: String,
    pub username: String,
    pub database: String,
    pub dev_service_port: u16,
    pub hostname: String,
    pub services: Vec<ServiceProbe>,
    pub snapshots: Vec<SnapshotRecord>,
    pub tailscale: TailscaleStatus,
    pub cloudflared_active: bool,
}
