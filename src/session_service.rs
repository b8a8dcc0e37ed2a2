//! Session service (spec §4.5, component E): a thin facade composing the
//! path codec (A), scanner (C), and index store (D). Grounded on the shape
//! of the teacher's `server/queries/*` modules, which compose `db.rs` +
//! `models.rs` the same way to answer a narrower set of read/write verbs.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::CoreError;
use crate::index::{IndexStore, ListOptions, Session};
use crate::path_codec;

#[derive(Clone)]
pub struct SessionService {
    store: Arc<IndexStore>,
    root: PathBuf,
}

impl SessionService {
    pub fn new(store: Arc<IndexStore>, root: PathBuf) -> Self {
        Self { store, root }
    }

    /// `discover_sessions({use_index=true})` (spec §4.5). The cold path
    /// (walk + parse, no index) is exercised directly via `index::scanner`
    /// and `index::jsonl` by callers that pass `use_index=false`; the
    /// common path below is the warm, index-backed one.
    pub fn discover_sessions(&self, opts: &ListOptions) -> Result<Vec<Session>> {
        self.store.list(opts)
    }

    /// Cold path: walk the filesystem directly without touching the index.
    /// Used when the index is empty or explicitly disabled.
    pub fn discover_sessions_cold(&self) -> Result<Vec<Session>> {
        use crate::index::{jsonl, scanner};

        let scanned = scanner::scan(&self.root)?;
        let mut out = Vec::with_capacity(scanned.len());
        for file in scanned {
            let parsed = match jsonl::parse_file(&file.absolute_path) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!("cold discovery: failed to parse {}: {e:#}", file.absolute_path.display());
                    continue;
                }
            };
            let working_directory = path_codec::decode_in(Path::new("/"), &file.encoded_dir);
            out.push(cold_session_stub(&file.session_id, &working_directory, &file, &parsed.messages));
        }
        Ok(out)
    }

    /// Lookup by exact `session_id`; failing that, by algorithmic title,
    /// `slug`, or `session_id` prefix. Ambiguous matches return the most
    /// recent (spec §4.5 `find_session`).
    pub fn find_session(&self, id_or_name: &str) -> Result<Session> {
        if let Some(session) = self.store.get(id_or_name)? {
            return Ok(session);
        }

        let all = self.store.list(&ListOptions {
            include_deleted: true,
            ..Default::default()
        })?;

        let mut candidates: Vec<&Session> = all
            .iter()
            .filter(|s| {
                s.session_id.starts_with(id_or_name)
                    || s.slug.as_deref() == Some(id_or_name)
                    || s.title.as_deref() == Some(id_or_name)
                    || s.first_user_message.as_deref() == Some(id_or_name)
            })
            .collect();

        if candidates.is_empty() {
            return Err(CoreError::NotFound(id_or_name.to_string()).into());
        }

        // Most recent first; `list()` is already ordered by last_accessed_at DESC,
        // but re-sort defensively since candidates were filtered out of order.
        candidates.sort_by(|a, b| b.last_accessed_at.cmp(&a.last_accessed_at));
        Ok(candidates[0].clone())
    }

    pub fn search_sessions(
        &self,
        query: &str,
        max_results: u32,
        max_matches_per_session: u32,
    ) -> Result<Vec<crate::index::SearchHit>> {
        self.store
            .search(query, max_results, max_matches_per_session)
            .map_err(|e| CoreError::BadQuery(e.to_string()).into())
    }

    /// `D.rename`. Length cap is caller policy (spec §9 Open Question);
    /// empty title clears the override.
    pub fn rename_session(&self, id: &str, title: &str) -> Result<()> {
        self.store.rename(id, title)
    }

    /// Relocate a session's JSONL between project directories and re-key
    /// the index (spec §4.5 `move_session`).
    pub fn move_session(&self, session_id: &str, new_working_directory: &str) -> Result<Session> {
        let session = self
            .store
            .get(session_id)?
            .ok_or_else(|| CoreError::NotFound(session_id.to_string()))?;

        let new_encoded = path_codec::encode(new_working_directory);
        let target_dir = self.root.join("projects").join(&new_encoded);
        fs::create_dir_all(&target_dir)
            .with_context(|| format!("failed to create {}", target_dir.display()))?;

        let old_path = PathBuf::from(&session.file_path);
        let new_path = target_dir.join(format!("{session_id}.jsonl"));

        move_file(&old_path, &new_path)?;
        rewrite_cwd(&new_path, new_working_directory)
            .context("failed to rewrite cwd field after move")?;

        self.store
            .move_session(session_id, new_working_directory, &new_encoded, &new_path.to_string_lossy())?;

        self.store
            .get(session_id)?
            .ok_or_else(|| CoreError::FsConsistency(format!("session {session_id} vanished after move")).into())
    }

    /// Locate the most recent backup snapshot containing this session's
    /// JSONL and copy it back to `file_path` (spec §4.5
    /// `restore_deleted`). A subsequent `sync()` clears `is_deleted`.
    pub fn restore_deleted(&self, session_id: &str, backups: &crate::backup::BackupManager) -> Result<()> {
        let session = self
            .store
            .get(session_id)?
            .ok_or_else(|| CoreError::NotFound(session_id.to_string()))?;
        if !session.is_deleted {
            return Ok(());
        }

        let snapshot_path = backups
            .find_latest_containing(session_id)?
            .ok_or_else(|| CoreError::NotFound(format!("no backup contains {session_id}")))?;

        let dest = PathBuf::from(&session.file_path);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::copy(&snapshot_path, &dest)
            .with_context(|| format!("failed to restore {} from backup", dest.display()))?;
        Ok(())
    }
}

fn cold_session_stub(
    session_id: &str,
    working_directory: &Path,
    file: &crate::index::scanner::ScannedFile,
    messages: &[crate::models::SessionMessage],
) -> Session {
    let mut user = 0i64;
    let mut assistant = 0i64;
    for m in messages {
        match m {
            crate::models::SessionMessage::User(_) => user += 1,
            crate::models::SessionMessage::Assistant(_) => assistant += 1,
            _ => {}
        }
    }
    Session {
        session_id: session_id.to_string(),
        working_directory: working_directory.to_string_lossy().to_string(),
        encoded_path: file.encoded_dir.clone(),
        file_path: file.absolute_path.to_string_lossy().to_string(),
        created_at: String::new(),
        last_accessed_at: String::new(),
        message_count: user + assistant,
        user_message_count: user,
        assistant_message_count: assistant,
        total_input_tokens: 0,
        total_output_tokens: 0,
        total_cost_usd: 0.0,
        model: None,
        git_branch: None,
        slug: None,
        title: None,
        first_user_message: None,
        is_deleted: false,
        deleted_at: None,
    }
}

/// Same filesystem: rename. Cross-filesystem: copy+fsync+unlink (spec §4.5).
fn move_file(from: &Path, to: &Path) -> Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(libc_exdev()) => {
            let mut src = fs::File::open(from)
                .with_context(|| format!("failed to open {}", from.display()))?;
            let mut dst = fs::File::create(to)
                .with_context(|| format!("failed to create {}", to.display()))?;
            std::io::copy(&mut src, &mut dst).context("failed to copy across filesystems")?;
            dst.sync_all().context("failed to fsync moved file")?;
            drop(dst);
            fs::remove_file(from).context("failed to remove source after cross-fs move")?;
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("failed to move {} to {}", from.display(), to.display())),
    }
}

#[cfg(target_os = "linux")]
fn libc_exdev() -> i32 {
    18
}
#[cfg(not(target_os = "linux"))]
fn libc_exdev() -> i32 {
    // macOS and BSDs also use errno 18 for EXDEV; kept distinct so a
    // platform-specific value is one line away if that ever changes.
    18
}

/// Append-only format requires a rewrite to a sibling temp file, fsync,
/// then rename (spec §4.5 step 4).
fn rewrite_cwd(path: &Path, new_cwd: &str) -> Result<()> {
    let contents = fs::read_to_string(path)?;
    let tmp_path = path.with_extension("jsonl.tmp");
    let mut tmp = fs::File::create(&tmp_path)?;

    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let mut value: serde_json::Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(_) => {
                writeln!(tmp, "{line}")?;
                continue;
            }
        };
        if let Some(obj) = value.as_object_mut() {
            if obj.contains_key("cwd") {
                obj.insert("cwd".to_string(), serde_json::Value::String(new_cwd.to_string()));
            }
        }
        writeln!(tmp, "{value}")?;
    }

    tmp.sync_all()?;
    drop(tmp);
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SqliteConfig;
    use tempfile::TempDir;

    fn write_session(root: &Path, project: &str, session_id: &str, lines: &[&str]) {
        let dir = root.join("projects").join(project);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{session_id}.jsonl")), lines.join("\n") + "\n").unwrap();
    }

    #[test]
    fn test_move_session_rewrites_cwd_and_rekeys() {
        let tmp = TempDir::new().unwrap();
        write_session(
            tmp.path(),
            "-scratch-abc",
            "s1",
            &[r#"{"type":"user","uuid":"u1","timestamp":"2026-01-01T00:00:00Z","cwd":"/scratch/abc","message":{"role":"user","content":"hi"}}"#],
        );
        let store = Arc::new(IndexStore::open(&tmp.path().join("index.db"), &SqliteConfig::default()).unwrap());
        store.sync(tmp.path()).unwrap();

        let service = SessionService::new(store.clone(), tmp.path().to_path_buf());
        let moved = service.move_session("s1", "/Users/dev/newproj").unwrap();
        assert_eq!(moved.working_directory, "/Users/dev/newproj");
        assert!(moved.file_path.contains("newproj") || moved.file_path.contains(&path_codec::encode("/Users/dev/newproj")));

        let contents = fs::read_to_string(&moved.file_path).unwrap();
        assert!(contents.contains("/Users/dev/newproj"));
        assert!(!contents.contains("/scratch/abc"));
    }

    #[test]
    fn test_find_session_by_prefix() {
        let tmp = TempDir::new().unwrap();
        write_session(tmp.path(), "-a", "abcdef123", &[r#"{"type":"summary","summary":"s"}"#]);
        let store = Arc::new(IndexStore::open(&tmp.path().join("index.db"), &SqliteConfig::default()).unwrap());
        store.sync(tmp.path()).unwrap();

        let service = SessionService::new(store.clone(), tmp.path().to_path_buf());
        let found = service.find_session("abcdef").unwrap();
        assert_eq!(found.session_id, "abcdef123");
    }

    #[test]
    fn test_find_session_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(IndexStore::open(&tmp.path().join("index.db"), &SqliteConfig::default()).unwrap());
        let service = SessionService::new(store.clone(), tmp.path().to_path_buf());
        assert!(service.find_session("nope").is_err());
    }
}
