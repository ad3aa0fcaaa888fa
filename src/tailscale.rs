//! Tailscale tunnel status and Funnel toggle, via the `tailscale` CLI.
//!
//! The current funnel state is always re-derived from the CLI; nothing is
//! kept locally.

use crate::config::Config;
use crate::error::ApiError;
use crate::runner::{CommandOutput, Invocation, ProcessRunner};
use crate::types::TailscaleStatus;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const TAILSCALE: &str = "tailscale";

pub struct Tailscale {
    runner: Arc<dyn ProcessRunner>,
    hostname: String,
    full_hostname: String,
    public_url: String,
    timeout: Duration,
}

impl Tailscale {
    pub fn new(config: &Config, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            runner,
            hostname: config.ts_hostname.clone(),
            full_hostname: config.full_hostname(),
            public_url: config.public_url(),
            timeout: config.tool_timeout,
        }
    }

    fn cli<I, S>(&self, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Invocation::new(TAILSCALE).args(args).timeout(self.timeout)
    }

    async fn run(&self, args: &[&str]) -> Result<CommandOutput, ApiError> {
        self.runner.run(&self.cli(args.iter().copied())).await
    }

    /// Never fails: a missing CLI, a stopped daemon or unparsable output all
    /// read as "not enabled".
    pub async fn status(&self) -> TailscaleStatus {
        let output = match self.run(&["status", "--json"]).await {
            Ok(output) if output.success() => output,
            Ok(output) => {
                tracing::debug!(exit_code = output.exit_code, "Tailscale not running");
                return TailscaleStatus::disabled();
            }
            Err(e) => {
                tracing::debug!(error = %e, "Tailscale status unavailable");
                return TailscaleStatus::disabled();
            }
        };

        let Some(tailnet_ip) = parse_tailnet_ip(&output.stdout) else {
            tracing::warn!("Unrecognised `tailscale status --json` output");
            return TailscaleStatus::disabled();
        };

        TailscaleStatus {
            enabled: true,
            tailnet_ip,
            hostname: self.hostname.clone(),
            full_hostname: self.full_hostname.clone(),
            funnel_enabled: self.funnel_enabled().await,
            public_url: self.public_url.clone(),
        }
    }

    async fn funnel_enabled(&self) -> bool {
        match self.run(&["serve", "status"]).await {
            Ok(output) => output.combined().contains("funnel"),
            Err(e) => {
                tracing::debug!(error = %e, "tailscale serve status failed");
                false
            }
        }
    }

    /// Flip public exposure of port 443. Returns a message for the operator.
    pub async fn toggle_funnel(&self) -> Result<String, ApiError> {
        let not_enabled =
            || ApiError::ToolUnavailable("Tailscale not enabled on this container".into());
        match self.run(&["status"]).await {
            Ok(output) if output.success() => {}
            Ok(_) | Err(ApiError::ToolUnavailable(_)) => return Err(not_enabled()),
            Err(e) => return Err(e),
        }

        let enable = !self.funnel_enabled().await;
        let switch = if enable { "on" } else { "off" };
        let output = self
            .run(&["funnel", "--bg", "--https=443", switch])
            .await?;
        if !output.success() {
            return Err(ApiError::Internal(format!(
                "tailscale funnel {} failed: {}",
                switch,
                output.combined()
            )));
        }

        tracing::info!(funnel = switch, "Tailscale funnel toggled");
        Ok(if enable {
            format!(
                "Public access enabled! Your service is now available at: {}",
                self.public_url
            )
        } else {
            "Public access disabled. Your services are now only accessible on your Tailnet."
                .to_string()
        })
    }

    /// Whether a `cloudflared` process is running.
    pub async fn cloudflared_active(&self) -> bool {
        let pgrep = Invocation::new("pgrep")
            .args(["-x", "cloudflared"])
            .timeout(self.timeout);
        matches!(self.runner.run(&pgrep).await, Ok(output) if output.success())
    }
}

// ── `tailscale status --json` adapter ──────────────────────────

#[derive(Debug, Deserialize)]
struct StatusJson {
    #[serde(rename = "Self")]
    self_node: Option<SelfNode>,
}

#[derive(Debug, Deserialize)]
struct SelfNode {
    #[serde(rename = "TailscaleIPs", default)]
    tailscale_ips: Vec<String>,
}

/// First address of `Self.TailscaleIPs`; empty when the node has none yet.
/// `None` when the document lacks a `Self` node or is not JSON at all.
pub fn parse_tailnet_ip(json: &str) -> Option<String> {
    let status: StatusJson = serde_json::from_str(json).ok()?;
    let node = status.self_node?;
    Some(node.tailscale_ips.into_iter().next().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::testing::{exit, RecordingRunner};

    const STATUS_JSON: &str = r#"{
        "Version": "1.70.0",
        "BackendState": "Running",
        "Self": {
            "ID": "n123",
            "HostName": "devbox",
            "DNSName": "devbox.tail1234.ts.net.",
            "TailscaleIPs": ["100.101.102.103", "fd7a:115c:a1e0::1"],
            "Online": true
        },
        "Peer": {}
    }"#;

    fn tailscale_with(runner: Arc<RecordingRunner>) -> Tailscale {
        let config = Config {
            ts_hostname: "devbox".into(),
            ts_suffix: "tail1234.ts.net".into(),
            ..Config::default()
        };
        Tailscale::new(&config, runner)
    }

    #[test]
    fn test_parse_tailnet_ip() {
        assert_eq!(
            parse_tailnet_ip(STATUS_JSON),
            Some("100.101.102.103".to_string())
        );
    }

    #[test]
    fn test_parse_tailnet_ip_without_addresses() {
        assert_eq!(
            parse_tailnet_ip(r#"{"Self": {"HostName": "devbox"}}"#),
            Some(String::new())
        );
    }

    #[test]
    fn test_parse_tailnet_ip_rejects_garbage() {
        assert_eq!(parse_tailnet_ip("not json"), None);
        assert_eq!(parse_tailnet_ip(r#"{"BackendState": "Stopped"}"#), None);
    }

    #[tokio::test]
    async fn test_status_enabled_with_funnel() {
        let runner = Arc::new(RecordingRunner::new(|inv| {
            Ok(match inv.args.first().map(String::as_str) {
                Some("status") => exit(0, STATUS_JSON, ""),
                Some("serve") => exit(0, "https://devbox.tail1234.ts.net (Funnel on)\n|-- / proxy http://127.0.0.1:8443\n# Funnel on:\n#     - https://devbox.tail1234.ts.net\n\nfunnel enabled", ""),
                _ => exit(1, "", "unexpected"),
            })
        }));
        let ts = tailscale_with(runner.clone());

        let status = ts.status().await;
        assert!(status.enabled);
        assert_eq!(status.tailnet_ip, "100.101.102.103");
        assert_eq!(status.full_hostname, "devbox.tail1234.ts.net");
        assert_eq!(status.public_url, "https://devbox.tail1234.ts.net");
        assert!(status.funnel_enabled);

        let calls = runner.calls();
        assert_eq!(calls[0].args, vec!["status", "--json"]);
        assert_eq!(calls[1].args, vec!["serve", "status"]);
    }

    #[tokio::test]
    async fn test_status_disabled_when_cli_missing() {
        let runner = Arc::new(RecordingRunner::new(|_| {
            Err(ApiError::ToolUnavailable("tailscale is not installed".into()))
        }));
        let status = tailscale_with(runner).status().await;
        assert_eq!(status, TailscaleStatus::disabled());
    }

    #[tokio::test]
    async fn test_status_disabled_when_daemon_stopped() {
        let runner = Arc::new(RecordingRunner::new(|_| {
            Ok(exit(1, "", "failed to connect to local tailscaled"))
        }));
        let status = tailscale_with(runner.clone()).status().await;
        assert!(!status.enabled);
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_toggle_enables_when_off() {
        let runner = Arc::new(RecordingRunner::new(|inv| {
            Ok(match inv.args.first().map(String::as_str) {
                Some("serve") => exit(0, "No serve config", ""),
                _ => exit(0, "", ""),
            })
        }));
        let ts = tailscale_with(runner.clone());

        let message = ts.toggle_funnel().await.unwrap();
        assert!(message.contains("enabled"));
        assert!(message.contains("https://devbox.tail1234.ts.net"));

        let calls = runner.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[2].args, vec!["funnel", "--bg", "--https=443", "on"]);
    }

    #[tokio::test]
    async fn test_toggle_disables_when_on() {
        let runner = Arc::new(RecordingRunner::new(|inv| {
            Ok(match inv.args.first().map(String::as_str) {
                Some("serve") => exit(0, "# Funnel on:\nfunnel", ""),
                _ => exit(0, "", ""),
            })
        }));
        let ts = tailscale_with(runner.clone());

        let message = ts.toggle_funnel().await.unwrap();
        assert!(message.contains("disabled"));
        assert_eq!(
            runner.calls().last().unwrap().args,
            vec!["funnel", "--bg", "--https=443", "off"]
        );
    }

    #[tokio::test]
    async fn test_toggle_without_tailscale() {
        let runner = Arc::new(RecordingRunner::new(|_| Ok(exit(1, "", "not logged in"))));
        let ts = tailscale_with(runner.clone());

        match ts.toggle_funnel().await.unwrap_err() {
            ApiError::ToolUnavailable(msg) => {
                assert_eq!(msg, "Tailscale not enabled on this container")
            }
            other => panic!("Expected ToolUnavailable, got {:?}", other),
        }
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_toggle_funnel_command_failure() {
        let runner = Arc::new(RecordingRunner::new(|inv| {
            Ok(match inv.args.first().map(String::as_str) {
                Some("funnel") => exit(1, "", "Funnel not available; HTTPS must be enabled"),
                _ => exit(0, "", ""),
            })
        }));
        match tailscale_with(runner).toggle_funnel().await.unwrap_err() {
            ApiError::Internal(msg) => assert!(msg.contains("HTTPS must be enabled")),
            other => panic!("Expected Internal, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cloudflared_active() {
        let runner = Arc::new(RecordingRunner::new(|inv| {
            Ok(if inv.program == "pgrep" {
                exit(0, "4242\n", "")
            } else {
                exit(1, "", "")
            })
        }));
        let ts = tailscale_with(runner.clone());
        assert!(ts.cloudflared_active().await);
        assert_eq!(runner.calls()[0].args, vec!["-x", "cloudflared"]);
    }
}
