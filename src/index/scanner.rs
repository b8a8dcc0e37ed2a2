//! Transcript scanner (spec §4.3, component C).
//!
//! Narrowed from the teacher's `indexer/scanner.rs`, which classifies many
//! kinds of files under the upstream data directory — this spec's data
//! model only has one file kind: a session JSONL under `projects/*/`.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;

/// A session JSONL file discovered on disk, paired with its stat.
#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub session_id: String,
    pub encoded_dir: String,
    pub absolute_path: PathBuf,
    pub size: u64,
    pub mtime: SystemTime,
}

/// Walk `<root>/projects/`. Each immediate child is an encoded project
/// directory; each `*.jsonl` inside is a session file named
/// `<session_id>.jsonl`. Unreadable directories or files are logged and
/// skipped, not fatal.
pub fn scan(root: &std::path::Path) -> Result<Vec<ScannedFile>> {
    let projects_dir = root.join("projects");
    let mut out = Vec::new();

    let project_dirs = match fs::read_dir(&projects_dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("projects directory not found: {}", projects_dir.display());
            return Ok(out);
        }
        Err(e) => {
            return Err(e)
                .with_context(|| format!("failed to read {}", projects_dir.display()))
        }
    };

    for project_entry in project_dirs {
        let project_entry = match project_entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("failed to read project entry: {e}");
                continue;
            }
        };

        let project_path = project_entry.path();
        let is_dir = project_entry
            .file_type()
            .map(|t| t.is_dir())
            .unwrap_or(false);
        if !is_dir {
            continue;
        }

        let encoded_dir = project_entry.file_name().to_string_lossy().to_string();

        let session_files = match fs::read_dir(&project_path) {
            Ok(rd) => rd,
            Err(e) => {
                tracing::warn!("skipping unreadable project directory {}: {e}", project_path.display());
                continue;
            }
        };

        for file_entry in session_files {
            let file_entry = match file_entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("failed to read session file entry: {e}");
                    continue;
                }
            };
            let path = file_entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            let session_id = match path.file_stem().and_then(|s| s.to_str()) {
                Some(s) => s.to_string(),
                None => continue,
            };

            let metadata = match file_entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!("skipping unreadable file {}: {e}", path.display());
                    continue;
                }
            };

            out.push(ScannedFile {
                session_id,
                encoded_dir: encoded_dir.clone(),
                absolute_path: path,
                size: metadata.len(),
                mtime: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }
    }

    tracing::info!("scan: {} session files under {}", out.len(), projects_dir.display());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(root: &std::path::Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
    }

    #[test]
    fn test_scan_finds_session_files() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "projects/-Users-dev-webapp/abc.jsonl", "{}");
        write_file(tmp.path(), "projects/-Users-dev-api/def.jsonl", "{}");

        let found = scan(tmp.path()).unwrap();
        assert_eq!(found.len(), 2);
        let ids: Vec<_> = found.iter().map(|f| f.session_id.as_str()).collect();
        assert!(ids.contains(&"abc"));
        assert!(ids.contains(&"def"));
    }

    #[test]
    fn test_scan_ignores_non_jsonl() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "projects/-Users-dev-webapp/abc.jsonl", "{}");
        write_file(tmp.path(), "projects/-Users-dev-webapp/notes.txt", "hi");

        let found = scan(tmp.path()).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_scan_missing_projects_dir_is_empty_not_error() {
        let tmp = TempDir::new().unwrap();
        let found = scan(tmp.path()).unwrap();
        assert_eq!(found.len(), 0);
    }
}
