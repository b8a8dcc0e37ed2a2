//! Fingerprint-based change detection (spec §3 "File fingerprint", §4.4.1
//! `sync()`). Extends the teacher's `indexer/change.rs` comparison shape
//! with the Deleted→Restored transition this spec's soft-delete model
//! needs.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::collections::HashSet;

use super::scanner::ScannedFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    /// Never indexed before.
    New,
    /// Indexed, fingerprint differs, currently live.
    Modified,
    /// Indexed, fingerprint identical, currently live.
    Unchanged,
    /// Indexed as `is_deleted=1`, file has reappeared on disk — needs a
    /// reparse and a deletion-flag clear (counted separately from
    /// `Modified` per spec §4.4.1).
    Restored,
}

pub struct ChangePlan {
    pub to_process: Vec<(ScannedFile, ChangeStatus)>,
    pub unchanged_count: usize,
    /// session_ids present in the index but absent from this scan.
    pub deleted_session_ids: Vec<String>,
}

struct PriorFingerprint {
    size: u64,
    mtime_ms: i64,
    is_deleted: bool,
}

fn mtime_ms(t: std::time::SystemTime) -> i64 {
    t.duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Compare a scan manifest against the `files` table and produce a plan.
pub fn detect_changes(conn: &Connection, scanned: &[ScannedFile]) -> Result<ChangePlan> {
    let mut to_process = Vec::new();
    let mut unchanged_count = 0;

    let mut stmt = conn
        .prepare("SELECT fp_size, fp_mtime, is_deleted FROM files WHERE session_id = ?1")
        .context("failed to prepare fingerprint lookup")?;

    for entry in scanned {
        let prior = stmt
            .query_row(params![entry.session_id], |row| {
                Ok(PriorFingerprint {
                    size: row.get::<_, i64>(0)? as u64,
                    mtime_ms: row.get(1)?,
                    is_deleted: row.get::<_, i64>(2)? != 0,
                })
            })
            .optional()
            .context("failed to query prior fingerprint")?;

        let new_mtime = mtime_ms(entry.mtime);

        match prior {
            None => to_process.push((entry.clone(), ChangeStatus::New)),
            Some(p) if p.is_deleted => {
                to_process.push((entry.clone(), ChangeStatus::Restored));
            }
            Some(p) if p.size == entry.size && p.mtime_ms == new_mtime => {
                unchanged_count += 1;
            }
            Some(_) => to_process.push((entry.clone(), ChangeStatus::Modified)),
        }
    }

    let scanned_ids: HashSet<&str> = scanned.iter().map(|e| e.session_id.as_str()).collect();
    let mut all_stmt = conn
        .prepare("SELECT session_id FROM files WHERE is_deleted = 0")
        .context("failed to prepare indexed-ids query")?;
    let deleted_session_ids: Vec<String> = all_stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .filter_map(|r| r.ok())
        .filter(|id| !scanned_ids.contains(id.as_str()))
        .collect();

    if !deleted_session_ids.is_empty() {
        tracing::info!("detected {} deleted sessions", deleted_session_ids.len());
    }

    Ok(ChangePlan {
        to_process,
        unchanged_count,
        deleted_session_ids,
    })
}

trait OptionalExt<T> {
    fn optional(self) -> std::result::Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> std::result::Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use std::path::PathBuf;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn entry(session_id: &str, size: u64, mtime: SystemTime) -> ScannedFile {
        ScannedFile {
            session_id: session_id.to_string(),
            encoded_dir: "-tmp".to_string(),
            absolute_path: PathBuf::from(format!("/tmp/{session_id}.jsonl")),
            size,
            mtime,
        }
    }

    fn insert_file_row(conn: &Connection, session_id: &str, size: u64, mtime: SystemTime, is_deleted: bool) {
        conn.execute(
            "INSERT INTO files (session_id, working_directory, encoded_path, file_path,
                created_at, last_accessed_at, is_deleted, fp_size, fp_mtime)
             VALUES (?1, '/tmp', '-tmp', ?2, '2026-01-01', '2026-01-01', ?3, ?4, ?5)",
            params![
                session_id,
                format!("/tmp/{session_id}.jsonl"),
                is_deleted as i64,
                size as i64,
                mtime_ms(mtime),
            ],
        )
        .unwrap();
    }

    #[test]
    fn test_new_file() {
        let tmp = TempDir::new().unwrap();
        let conn = db::open(&tmp.path().join("t.db")).unwrap();
        let scanned = vec![entry("abc", 500, SystemTime::now())];
        let plan = detect_changes(&conn, &scanned).unwrap();
        assert_eq!(plan.to_process.len(), 1);
        assert_eq!(plan.to_process[0].1, ChangeStatus::New);
    }

    #[test]
    fn test_unchanged_file() {
        let tmp = TempDir::new().unwrap();
        let conn = db::open(&tmp.path().join("t.db")).unwrap();
        let now = SystemTime::now();
        insert_file_row(&conn, "abc", 500, now, false);

        let scanned = vec![entry("abc", 500, now)];
        let plan = detect_changes(&conn, &scanned).unwrap();
        assert_eq!(plan.to_process.len(), 0);
        assert_eq!(plan.unchanged_count, 1);
    }

    #[test]
    fn test_modified_file() {
        let tmp = TempDir::new().unwrap();
        let conn = db::open(&tmp.path().join("t.db")).unwrap();
        let t0 = SystemTime::now();
        insert_file_row(&conn, "abc", 500, t0, false);

        let t1 = t0 + std::time::Duration::from_secs(5);
        let scanned = vec![entry("abc", 900, t1)];
        let plan = detect_changes(&conn, &scanned).unwrap();
        assert_eq!(plan.to_process.len(), 1);
        assert_eq!(plan.to_process[0].1, ChangeStatus::Modified);
    }

    #[test]
    fn test_restored_file() {
        let tmp = TempDir::new().unwrap();
        let conn = db::open(&tmp.path().join("t.db")).unwrap();
        let now = SystemTime::now();
        insert_file_row(&conn, "abc", 500, now, true);

        let scanned = vec![entry("abc", 500, now)];
        let plan = detect_changes(&conn, &scanned).unwrap();
        assert_eq!(plan.to_process.len(), 1);
        assert_eq!(plan.to_process[0].1, ChangeStatus::Restored);
    }

    #[test]
    fn test_deleted_file() {
        let tmp = TempDir::new().unwrap();
        let conn = db::open(&tmp.path().join("t.db")).unwrap();
        let now = SystemTime::now();
        insert_file_row(&conn, "abc", 500, now, false);
        insert_file_row(&conn, "def", 500, now, false);

        let scanned = vec![entry("abc", 500, now)];
        let plan = detect_changes(&conn, &scanned).unwrap();
        assert_eq!(plan.deleted_session_ids, vec!["def".to_string()]);
    }
}
