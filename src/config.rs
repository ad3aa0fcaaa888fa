use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub container_name: String,
    pub username: String,
    pub database: DatabaseConfig,
    pub dev_service_port: u16,
    /// URL prefix the web tools are mounted under. Always ends with `/`.
    pub service_root: String,
    pub snapshots_dir: PathBuf,
    pub ts_hostname: String,
    pub ts_suffix: String,
    /// Host the service probes connect to.
    pub probe_host: String,
    pub probe_timeout: Duration,
    /// Bound for short CLI calls made while collecting status.
    pub tool_timeout: Duration,
    /// Bound for `pg_dump` / `psql` runs.
    pub command_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
}

/// Empty values count as unset.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.into())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    parse_or(std::env::var(key).ok(), default)
}

/// Absent, empty or unparsable values fall back to `default`.
fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

pub fn normalize_service_root(root: &str) -> String {
    if root.ends_with('/') {
        root.to_string()
    } else {
        format!("{}/", root)
    }
}

impl Config {
    pub fn from_env() -> Self {
        let port = parse_or(
            std::env::var("PORT").ok(),
            env_parse("STATUS_PORT", 8082),
        );

        Self {
            host: env_or("HOST", "0.0.0.0"),
            port,
            container_name: env_or("CONTAINER_NAME", "devbox"),
            username: env_or("USERNAME", "devbox"),
            database: DatabaseConfig {
                host: env_or("POSTGRES_HOST", "localhost"),
                port: env_parse("POSTGRES_PORT", 5432),
                user: env_or("POSTGRES_USER", "postgres"),
                password: env_or("POSTGRES_PASSWORD", "postgres"),
                name: env_or("POSTGRES_DB", "devdb"),
            },
            dev_service_port: env_parse("DEV_SERVICE_PORT", 3000),
            service_root: normalize_service_root(&env_or("SERVICE_ROOT", "/devbox/")),
            snapshots_dir: PathBuf::from(env_or("SNAPSHOTS_DIR", "/snapshots")),
            ts_hostname: env_or("TS_HOSTNAME", "devbox"),
            ts_suffix: env_or("TS_SUFFIX", ""),
            probe_host: env_or("PROBE_HOST", "localhost"),
            probe_timeout: Duration::from_secs(1),
            tool_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(env_parse("COMMAND_TIMEOUT_SECS", 300)),
        }
    }

    /// `TS_HOSTNAME[.TS_SUFFIX]`
    pub fn full_hostname(&self) -> String {
        if self.ts_suffix.is_empty() {
            self.ts_hostname.clone()
        } else {
            format!("{}.{}", self.ts_hostname, self.ts_suffix)
        }
    }

    pub fn public_url(&self) -> String {
        if self.ts_suffix.is_empty() {
            format!("https://{}.ts.net", self.ts_hostname)
        } else {
            format!("https://{}", self.full_hostname())
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8082,
            container_name: "devbox".into(),
            username: "devbox".into(),
            database: DatabaseConfig::default(),
            dev_service_port: 3000,
            service_root: "/devbox/".into(),
            snapshots_dir: PathBuf::from("/snapshots"),
            ts_hostname: "devbox".into(),
            ts_suffix: String::new(),
            probe_host: "localhost".into(),
            probe_timeout: Duration::from_secs(1),
            tool_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(300),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 5432,
            user: "postgres".into(),
            password: "postgres".into(),
            name: "devdb".into(),
        }
    }
}
