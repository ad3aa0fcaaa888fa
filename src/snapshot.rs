//! PostgreSQL snapshot files: listing, `pg_dump` creation, `psql` restore, deletion.
//!
//! Snapshots are plain-format dumps named `<YYYY-MM-DDThhmm>[_<label>].sql`
//! in a single directory. Two snapshots created in the same minute with the
//! same label share a filename and the later one overwrites the earlier.

use crate::config::{Config, DatabaseConfig};
use crate::error::ApiError;
use crate::runner::{Invocation, ProcessRunner};
use crate::types::SnapshotRecord;
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

pub const SNAPSHOT_EXTENSION: &str = "sql";
const FILENAME_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H%M";
const MAX_LABEL_LEN: usize = 64;
const MAX_FILENAME_LEN: usize = 128;

pub struct SnapshotStore {
    dir: PathBuf,
    db: DatabaseConfig,
    runner: Arc<dyn ProcessRunner>,
    timeout: Duration,
}

impl SnapshotStore {
    pub fn new(
        dir: PathBuf,
        db: DatabaseConfig,
        runner: Arc<dyn ProcessRunner>,
        timeout: Duration,
    ) -> Self {
        Self {
            dir,
            db,
            runner,
            timeout,
        }
    }

    pub fn from_config(config: &Config, runner: Arc<dyn ProcessRunner>) -> Self {
        Self::new(
            config.snapshots_dir.clone(),
            config.database.clone(),
            runner,
            config.command_timeout,
        )
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // ── Listing ────────────────────────────────────────────────

    /// All `*.sql` files in the snapshot directory that restore and delete
    /// accept, newest first.
    /// An absent or unreadable directory yields an empty list.
    pub fn list(&self) -> Vec<SnapshotRecord> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(
                        dir = %self.dir.display(),
                        error = %e,
                        "Snapshot directory unreadable"
                    );
                }
                return Vec::new();
            }
        };

        let mut records: Vec<SnapshotRecord> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some(SNAPSHOT_EXTENSION) {
                    return None;
                }
                let filename = path.file_name()?.to_str()?.to_string();
                if validate_filename(&filename).is_err() {
                    tracing::debug!(filename = %filename, "Skipping unaddressable snapshot file");
                    return None;
                }
                let meta = fs::metadata(&path).ok()?;
                if !meta.is_file() {
                    return None;
                }
                Some(record_from(filename, &meta))
            })
            .collect();

        records.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| b.filename.cmp(&a.filename))
        });
        records
    }

    // ── Mutations ──────────────────────────────────────────────

    /// Dump the database into a new snapshot file.
    pub async fn create(&self, label: Option<&str>) -> Result<SnapshotRecord, ApiError> {
        let label = validate_label(label)?;
        let filename = snapshot_filename(Local::now().naive_local(), label.as_deref());

        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(&filename);

        let dump = self
            .connection("pg_dump")
            .args(["-F", "p", "-f"])
            .arg(path.to_string_lossy());
        // pg_dump opens its output file before connecting, so every failure
        // path leaves a partial file behind.
        let output = match self.runner.run(&dump).await {
            Ok(output) if output.success() => output,
            Ok(output) => {
                tracing::warn!(
                    filename = %filename,
                    exit_code = output.exit_code,
                    output = %output.combined(),
                    "pg_dump failed"
                );
                let _ = fs::remove_file(&path);
                return Err(ApiError::DumpFailed(format!(
                    "pg_dump exited with status {}: {}",
                    output.exit_code,
                    output.combined()
                )));
            }
            Err(e) => {
                tracing::warn!(filename = %filename, error = %e, "pg_dump did not complete");
                let _ = fs::remove_file(&path);
                return Err(e);
            }
        };

        let meta = fs::metadata(&path)?;
        let record = record_from(filename, &meta);
        tracing::info!(filename = %record.filename, bytes = record.size_bytes, "Snapshot created");
        Ok(record)
    }

    /// Replace the database contents with a snapshot.
    ///
    /// Drops every non-system schema first. Irreversible.
    pub async fn restore(&self, filename: &str) -> Result<(), ApiError> {
        let filename = validate_filename(filename)?;
        let path = self.dir.join(filename);
        if !path.is_file() {
            return Err(ApiError::NotFound(format!("Snapshot not found: {}", filename)));
        }

        let reset = self
            .connection("psql")
            .args(["-v", "ON_ERROR_STOP=1", "-c"])
            .arg(reset_schemas_sql(&self.db.user));
        let output = self.runner.run(&reset).await?;
        if !output.success() {
            tracing::warn!(
                filename = %filename,
                output = %output.combined(),
                "Schema reset failed, restore aborted"
            );
            return Err(ApiError::RestoreFailed(format!(
                "schema reset failed: {}",
                output.combined()
            )));
        }

        let replay = self
            .connection("psql")
            .arg("-f")
            .arg(path.to_string_lossy());
        let output = self.runner.run(&replay).await?;
        if !output.success() {
            tracing::warn!(
                filename = %filename,
                exit_code = output.exit_code,
                output = %output.combined(),
                "psql restore failed"
            );
            return Err(ApiError::RestoreFailed(format!(
                "psql exited with status {}: {}",
                output.exit_code,
                output.combined()
            )));
        }

        tracing::info!(filename = %filename, database = %self.db.name, "Snapshot restored");
        Ok(())
    }

    pub fn delete(&self, filename: &str) -> Result<(), ApiError> {
        let filename = validate_filename(filename)?;
        let path = self.dir.join(filename);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(filename = %filename, "Snapshot deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ApiError::NotFound(format!("Snapshot not found: {}", filename)))
            }
            Err(e) => Err(ApiError::Io(e)),
        }
    }

    /// `<program> -h .. -p .. -U .. -d ..` with `PGPASSWORD` set.
    fn connection(&self, program: &str) -> Invocation {
        Invocation::new(program)
            .args(["-h", self.db.host.as_str()])
            .args(["-p".to_string(), self.db.port.to_string()])
            .args(["-U", self.db.user.as_str()])
            .args(["-d", self.db.name.as_str()])
            .env("PGPASSWORD", &self.db.password)
            .timeout(self.timeout)
    }
}

fn record_from(filename: String, meta: &fs::Metadata) -> SnapshotRecord {
    let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    SnapshotRecord {
        filename,
        size_bytes: meta.len(),
        size: format_size(meta.len()),
        modified: DateTime::<Utc>::from(modified),
    }
}

// ── Naming ─────────────────────────────────────────────────────

pub fn snapshot_filename(timestamp: NaiveDateTime, label: Option<&str>) -> String {
    let stamp = timestamp.format(FILENAME_TIMESTAMP_FORMAT);
    match label {
        Some(label) if !label.is_empty() => format!("{}_{}.{}", stamp, label, SNAPSHOT_EXTENSION),
        _ => format!("{}.{}", stamp, SNAPSHOT_EXTENSION),
    }
}

fn is_safe_label(label: &str) -> bool {
    !label.contains("..")
        && !label.starts_with('.')
        && !label.ends_with('.')
        && label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// An absent or blank label means no label. Anything outside
/// `[A-Za-z0-9._-]` is rejected, which rules out path separators,
/// control characters and shell metacharacters. A leading or trailing `.`
/// is rejected so the built filename never contains `..`.
pub fn validate_label(label: Option<&str>) -> Result<Option<String>, ApiError> {
    let label = match label {
        Some(l) if !l.trim().is_empty() => l,
        _ => return Ok(None),
    };
    if label.len() > MAX_LABEL_LEN {
        return Err(ApiError::BadRequest(format!(
            "Label must be at most {} characters",
            MAX_LABEL_LEN
        )));
    }
    if !is_safe_label(label) {
        return Err(ApiError::BadRequest(
            "Label may only contain letters, digits, '.', '_' and '-', and may not start or end with '.'"
                .into(),
        ));
    }
    Ok(Some(label.to_string()))
}

/// A bare `*.sql` name inside the snapshot directory: no separators, no
/// `..`, no leading `.` and no control characters. Names reach `psql` as a
/// single argument, never through a shell.
pub fn validate_filename(filename: &str) -> Result<&str, ApiError> {
    let valid = filename.chars().count() <= MAX_FILENAME_LEN
        && !filename.starts_with('.')
        && !filename.contains("..")
        && !filename
            .chars()
            .any(|c| matches!(c, '/' | '\\') || c.is_control())
        && Path::new(filename).extension().and_then(|e| e.to_str()) == Some(SNAPSHOT_EXTENSION);
    if valid {
        Ok(filename)
    } else {
        Err(ApiError::BadRequest(format!(
            "Invalid snapshot filename: {:?}",
            filename
        )))
    }
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Drops all non-system schemas and recreates `public` with default grants.
fn reset_schemas_sql(user: &str) -> String {
    format!(
        r#"DO $$ DECLARE
    r RECORD;
BEGIN
    FOR r IN (SELECT schema_name FROM information_schema.schemata
              WHERE schema_name NOT IN ('pg_catalog', 'information_schema')
                AND schema_name NOT LIKE 'pg_toast%'
                AND schema_name NOT LIKE 'pg_temp%')
    LOOP
        EXECUTE 'DROP SCHEMA IF EXISTS ' || quote_ident(r.schema_name) || ' CASCADE';
    END LOOP;
END $$;
CREATE SCHEMA IF NOT EXISTS public;
GRANT ALL ON SCHEMA public TO {};
GRANT ALL ON SCHEMA public TO public;"#,
        quote_ident(user)
    )
}

/// 1024-based, one decimal above bytes: `512 B`, `1.5 KB`, `3.0 MB`.
pub fn format_size(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{} B", bytes);
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT && exp < 5 {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let prefix = ['K', 'M', 'G', 'T', 'P', 'E'][exp];
    format!("{:.1} {}B", bytes as f64 / div as f64, prefix)
}
