//! Backup snapshots of rule files.
//!
//! # Responsibilities
//! - Copy a rule's live file to `{backups}/{name}-{timestamp}.yaml` before it changes
//! - Keep only the `max_backups` most recently modified snapshots per rule name
//!
//! # Design Decisions
//! - Snapshots are never read back by the service; they exist for manual recovery
//! - Callers treat every error here as advisory
//! - Snapshot names are matched strictly so `api` never prunes `api-v2` backups

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::Utc;
use regex::Regex;
use tokio::fs;

use crate::storage::fs::{copy_if_exists, ensure_dir, remove_if_exists};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S-%6fZ";

/// Writes and prunes backup snapshots.
#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
    max_backups: usize,
}

impl BackupStore {
    pub fn new(dir: impl Into<PathBuf>, max_backups: usize) -> Self {
        Self {
            dir: dir.into(),
            max_backups,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy `source` into a new snapshot for `name`.
    ///
    /// Returns `None` when `source` does not exist (nothing to back up).
    pub async fn snapshot(&self, name: &str, source: &Path) -> io::Result<Option<PathBuf>> {
        ensure_dir(&self.dir).await?;

        let stamp = Utc::now().format(TIMESTAMP_FORMAT).to_string();
        let mut target = self.dir.join(format!("{}-{}.yaml", name, stamp));
        let mut attempt = 1;
        while fs::try_exists(&target).await? {
            target = self.dir.join(format!("{}-{}-{}.yaml", name, stamp, attempt));
            attempt += 1;
        }

        if copy_if_exists(source, &target).await? {
            tracing::debug!(
                rule = %name,
                backup = %target.display(),
                "Backup snapshot written"
            );
            Ok(Some(target))
        } else {
            Ok(None)
        }
    }

    /// List snapshots for `name`, newest first.
    pub async fn list(&self, name: &str) -> io::Result<Vec<PathBuf>> {
        let pattern = snapshot_pattern(name)?;
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut snapshots: Vec<(SystemTime, PathBuf)> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else { continue };
            if !pattern.is_match(file_name) {
                continue;
            }
            let modified = entry.metadata().await?.modified()?;
            snapshots.push((modified, entry.path()));
        }

        snapshots.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
        Ok(snapshots.into_iter().map(|(_, path)| path).collect())
    }

    /// Delete all but the `max_backups` newest snapshots for `name`.
    ///
    /// Returns the number of snapshots removed.
    pub async fn prune(&self, name: &str) -> io::Result<usize> {
        let snapshots = self.list(name).await?;
        let mut removed = 0;
        for stale in snapshots.iter().skip(self.max_backups) {
            if remove_if_exists(stale).await? {
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::debug!(rule = %name, removed, "Pruned old backups");
        }
        Ok(removed)
    }
}

fn snapshot_pattern(name: &str) -> io::Result<Regex> {
    let pattern = format!(
        r"^{}-\d{{4}}-\d{{2}}-\d{{2}}T\d{{2}}-\d{{2}}-\d{{2}}-\d{{6}}Z(-\d+)?\.yaml$",
        regex::escape(name)
    );
    Regex::new(&pattern).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}
