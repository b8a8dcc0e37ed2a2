//! Backup manager (spec §4.6, component F): periodic snapshots of the
//! projects tree to a retention-bounded backup root.
//!
//! Grounded on the teacher's `server/scheduler.rs` (interval-driven
//! background task shape) for `needs_backup`/`auto_backup`, and on
//! `indexer/scanner.rs`'s walk style for the recursive copy.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

const SENTINEL_FILE: &str = ".complete";
const SNAPSHOT_PREFIX: &str = "sessions-";

pub struct BackupManager {
    projects_root: PathBuf,
    backup_root: PathBuf,
    interval: Duration,
    max_backups: usize,
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub path: PathBuf,
    pub timestamp: String,
}

impl BackupManager {
    pub fn new(projects_root: PathBuf, backup_root: PathBuf, interval_minutes: u64, max_backups: usize) -> Self {
        Self {
            projects_root,
            backup_root,
            interval: Duration::from_secs(interval_minutes * 60),
            max_backups,
        }
    }

    /// Create `<backup_root>/sessions-<ISO>/` as a recursive copy of the
    /// projects tree. Fails if the tree is absent; unreadable individual
    /// files are logged and skipped.
    pub fn backup(&self) -> Result<Snapshot> {
        if !self.projects_root.exists() {
            anyhow::bail!("projects tree not found at {}", self.projects_root.display());
        }

        let timestamp = chrono::Utc::now().to_rfc3339();
        let snapshot_dir = self.backup_root.join(format!("{SNAPSHOT_PREFIX}{timestamp}"));
        fs::create_dir_all(&snapshot_dir)
            .with_context(|| format!("failed to create {}", snapshot_dir.display()))?;

        copy_tree(&self.projects_root, &snapshot_dir.join("projects"))?;

        fs::write(snapshot_dir.join(SENTINEL_FILE), b"")
            .with_context(|| format!("failed to write sentinel in {}", snapshot_dir.display()))?;

        tracing::info!("backup created at {}", snapshot_dir.display());
        self.evict_oldest()?;

        Ok(Snapshot {
            path: snapshot_dir,
            timestamp,
        })
    }

    /// Enumerate backups by timestamp, descending. Partial snapshots
    /// (missing sentinel, indicating a crash mid-copy) are removed and
    /// excluded.
    pub fn list(&self) -> Result<Vec<Snapshot>> {
        let mut snapshots = Vec::new();
        let entries = match fs::read_dir(&self.backup_root) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(snapshots),
            Err(e) => return Err(e).with_context(|| format!("failed to read {}", self.backup_root.display())),
        };

        for entry in entries {
            let entry = entry.context("failed to read backup root entry")?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let Some(timestamp) = name.strip_prefix(SNAPSHOT_PREFIX) else {
                continue;
            };

            if !path.join(SENTINEL_FILE).exists() {
                tracing::warn!("removing partial backup snapshot {}", path.display());
                let _ = fs::remove_dir_all(&path);
                continue;
            }

            snapshots.push(Snapshot {
                path,
                timestamp: timestamp.to_string(),
            });
        }

        snapshots.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(snapshots)
    }

    /// True iff no backup exists or the most recent predates the
    /// configured interval.
    pub fn needs_backup(&self) -> Result<bool> {
        let snapshots = self.list()?;
        let Some(latest) = snapshots.first() else {
            return Ok(true);
        };
        let parsed = chrono::DateTime::parse_from_rfc3339(&latest.timestamp)
            .context("failed to parse snapshot timestamp")?;
        let age = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default().as_secs() as i64
            - parsed.timestamp();
        Ok(age as u64 >= self.interval.as_secs())
    }

    /// Called at process startup: run `backup()` iff `needs_backup()`.
    pub fn auto_backup(&self) -> Result<Option<Snapshot>> {
        if self.needs_backup()? {
            Ok(Some(self.backup()?))
        } else {
            Ok(None)
        }
    }

    /// Find the most recent snapshot that still contains a JSONL for
    /// `session_id`, searching `sessions-*/projects/*/<session_id>.jsonl`.
    pub fn find_latest_containing(&self, session_id: &str) -> Result<Option<PathBuf>> {
        for snapshot in self.list()? {
            let projects_dir = snapshot.path.join("projects");
            let Ok(project_dirs) = fs::read_dir(&projects_dir) else {
                continue;
            };
            for project_entry in project_dirs.filter_map(|e| e.ok()) {
                let candidate = project_entry.path().join(format!("{session_id}.jsonl"));
                if candidate.is_file() {
                    return Ok(Some(candidate));
                }
            }
        }
        Ok(None)
    }

    fn evict_oldest(&self) -> Result<()> {
        let snapshots = self.list()?;
        if snapshots.len() <= self.max_backups {
            return Ok(());
        }
        for stale in &snapshots[self.max_backups..] {
            tracing::info!("evicting old backup {}", stale.path.display());
            fs::remove_dir_all(&stale.path)
                .with_context(|| format!("failed to evict {}", stale.path.display()))?;
        }
        Ok(())
    }
}

fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    fs::create_dir_all(to).with_context(|| format!("failed to create {}", to.display()))?;
    for entry in fs::read_dir(from).with_context(|| format!("failed to read {}", from.display()))? {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("skipping unreadable entry under {}: {e}", from.display());
                continue;
            }
        };
        let src = entry.path();
        let dst = to.join(entry.file_name());
        let file_type = match entry.file_type() {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!("skipping {}: {e}", src.display());
                continue;
            }
        };
        if file_type.is_dir() {
            copy_tree(&src, &dst)?;
        } else if file_type.is_file() {
            if let Err(e) = fs::copy(&src, &dst) {
                tracing::warn!("skipping unreadable file {}: {e}", src.display());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, BackupManager) {
        let tmp = TempDir::new().unwrap();
        let projects = tmp.path().join("projects");
        fs::create_dir_all(projects.join("-proj")).unwrap();
        fs::write(projects.join("-proj/abc.jsonl"), "{}\n").unwrap();
        let backup_root = tmp.path().join("backups");
        let mgr = BackupManager::new(projects, backup_root, 60, 2);
        (tmp, mgr)
    }

    #[test]
    fn test_backup_creates_snapshot_with_sentinel() {
        let (_tmp, mgr) = setup();
        let snap = mgr.backup().unwrap();
        assert!(snap.path.join(SENTINEL_FILE).exists());
        assert!(snap.path.join("projects/-proj/abc.jsonl").exists());
    }

    #[test]
    fn test_needs_backup_true_when_empty() {
        let (_tmp, mgr) = setup();
        assert!(mgr.needs_backup().unwrap());
    }

    #[test]
    fn test_needs_backup_false_right_after_backup() {
        let (_tmp, mgr) = setup();
        mgr.backup().unwrap();
        assert!(!mgr.needs_backup().unwrap());
    }

    #[test]
    fn test_list_ignores_partial_snapshot() {
        let (_tmp, mgr) = setup();
        mgr.backup().unwrap();
        fs::create_dir_all(mgr.backup_root.join("sessions-2020-01-01T00:00:00+00:00")).unwrap();

        let listed = mgr.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert!(!mgr.backup_root.join("sessions-2020-01-01T00:00:00+00:00").exists());
    }

    #[test]
    fn test_retention_evicts_oldest() {
        let (_tmp, mgr) = setup();
        for _ in 0..3 {
            mgr.backup().unwrap();
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        let listed = mgr.list().unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[test]
    fn test_find_latest_containing_session() {
        let (_tmp, mgr) = setup();
        mgr.backup().unwrap();
        let found = mgr.find_latest_containing("abc").unwrap();
        assert!(found.is_some());
        assert!(mgr.find_latest_containing("missing").unwrap().is_none());
    }
}
