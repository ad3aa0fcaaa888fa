//! TCP reachability probes for the services running inside the devbox.

use crate::config::Config;
use crate::types::{ServiceProbe, ServiceState};
use std::time::Duration;
use tokio::net::TcpStream;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceTarget {
    pub name: String,
    pub port: u16,
    pub url: Option<String>,
}

impl ServiceTarget {
    fn new(name: &str, port: u16, url: Option<String>) -> Self {
        Self {
            name: name.into(),
            port,
            url,
        }
    }
}

/// The fixed set of devbox services, plus the user's dev service when it
/// runs on a non-default port.
pub fn targets(config: &Config) -> Vec<ServiceTarget> {
    let root = &config.service_root;
    let under_root = |path: &str| Some(format!("{}{}", root, path));

    let mut targets = vec![
        ServiceTarget::new("SSH", 22, None),
        ServiceTarget::new("PostgreSQL", 5432, None),
        ServiceTarget::new("Valkey", 6379, None),
        ServiceTarget::new("Caddy", 8443, Some("/".into())),
        ServiceTarget::new("code-server", 8080, under_root("code/")),
        ServiceTarget::new("pgweb", 8081, under_root("db/")),
        ServiceTarget::new("Redis Commander", 8084, under_root("valkey/")),
        ServiceTarget::new("MailHog", 8025, under_root("mail/")),
        ServiceTarget::new("File Browser", 8083, under_root("files/")),
    ];

    if config.dev_service_port != 3000 {
        targets.push(ServiceTarget::new(
            &format!("Dev Service (:{})", config.dev_service_port),
            config.dev_service_port,
            Some("/".into()),
        ));
    }

    targets
}

/// A refused, unreachable or slow port is `Stopped`; probing never fails.
pub async fn probe_port(host: &str, port: u16, timeout: Duration) -> ServiceState {
    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_)) => ServiceState::Running,
        Ok(Err(e)) => {
            tracing::debug!(host, port, error = %e, "Service unreachable");
            ServiceState::Stopped
        }
        Err(_) => {
            tracing::debug!(host, port, "Service probe timed out");
            ServiceState::Stopped
        }
    }
}

/// Probe every target concurrently, preserving target order.
pub async fn probe_all(host: &str, targets: &[ServiceTarget], timeout: Duration) -> Vec<ServiceProbe> {
    let probes = targets.iter().map(|target| async move {
        ServiceProbe {
            name: target.name.clone(),
            port: target.port,
            status: probe_port(host, target.port, timeout).await,
            url: target.url.clone(),
        }
    });
    futures::future::join_all(probes).await
}
