//! Index store (spec §4.4, component D): durable local store mapping
//! sessions to metadata and full-text-searchable message bodies.
//!
//! Grounded on the teacher's `indexer/mod.rs` (`run_index` pipeline shape,
//! phase-by-phase progress/logging) and `db.rs` (migrations/PRAGMAs), with
//! the FTS5 query/snippet/bm25 shape lifted from the teacher's
//! `content.rs::search`. One writer mutex per store, matching spec §4.4.2.

pub mod change;
pub mod jsonl;
pub mod scanner;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use crate::config::SqliteConfig;
use crate::content;
use crate::models::{ContentValue, SessionMessage};
use crate::path_codec;

use change::ChangeStatus;
use scanner::ScannedFile;

/// A Session as read back from the index (spec §3).
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub session_id: String,
    pub working_directory: String,
    pub encoded_path: String,
    pub file_path: String,
    pub created_at: String,
    pub last_accessed_at: String,
    pub message_count: i64,
    pub user_message_count: i64,
    pub assistant_message_count: i64,
    pub total_input_tokens: i64,
    pub total_output_tokens: i64,
    pub total_cost_usd: f64,
    pub model: Option<String>,
    pub git_branch: Option<String>,
    pub slug: Option<String>,
    pub title: Option<String>,
    pub first_user_message: Option<String>,
    pub is_deleted: bool,
    pub deleted_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncCounts {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    pub restored: usize,
    pub unchanged: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub include_deleted: bool,
    pub project_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchMatch {
    pub ordinal: i64,
    pub snippet: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub session: Session,
    pub matches: Vec<SearchMatch>,
    pub total_matches: i64,
    pub rank: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub file_count: i64,
    pub message_count: i64,
    pub fts_bytes: i64,
    pub last_sync_duration_ms: Option<u64>,
}

/// Metadata derived from a parsed message sequence (spec §4.2).
struct ParsedMetadata {
    message_count: i64,
    user_message_count: i64,
    assistant_message_count: i64,
    total_input_tokens: i64,
    total_output_tokens: i64,
    total_cost_usd: f64,
    model: Option<String>,
    cwd: Option<String>,
    git_branch: Option<String>,
    slug: Option<String>,
    first_user_message: Option<String>,
    created_at: Option<String>,
    last_accessed_at: Option<String>,
}

struct Row {
    ordinal: i64,
    uuid: Option<String>,
    parent_uuid: Option<String>,
    kind: &'static str,
    timestamp: Option<String>,
    text_body: String,
}

fn derive(messages: &[SessionMessage]) -> (ParsedMetadata, Vec<Row>) {
    let mut meta = ParsedMetadata {
        message_count: 0,
        user_message_count: 0,
        assistant_message_count: 0,
        total_input_tokens: 0,
        total_output_tokens: 0,
        total_cost_usd: 0.0,
        model: None,
        cwd: None,
        git_branch: None,
        slug: None,
        first_user_message: None,
        created_at: None,
        last_accessed_at: None,
    };
    let mut rows = Vec::with_capacity(messages.len());

    for (ordinal, msg) in messages.iter().enumerate() {
        let ordinal = ordinal as i64;
        match msg {
            SessionMessage::User(env) => {
                meta.user_message_count += 1;
                meta.message_count += 1;
                let text = content::extract_text(&env.message.content);
                if meta.first_user_message.is_none() {
                    meta.first_user_message =
                        Some(content::truncate_chars(&text, content::FIRST_MESSAGE_TRUNCATE_CHARS));
                }
                bump_window(&mut meta, &env.timestamp);
                if meta.cwd.is_none() {
                    meta.cwd = env.cwd.clone();
                }
                if meta.git_branch.is_none() {
                    meta.git_branch = env.git_branch.clone();
                }
                if meta.slug.is_none() {
                    meta.slug = env.slug.clone();
                }
                rows.push(Row {
                    ordinal,
                    uuid: Some(env.uuid.clone()),
                    parent_uuid: env.parent_uuid.clone(),
                    kind: "user",
                    timestamp: Some(env.timestamp.clone()),
                    text_body: text,
                });
            }
            SessionMessage::Assistant(env) => {
                meta.assistant_message_count += 1;
                meta.message_count += 1;
                let text = content::extract_text(&env.message.content);
                bump_window(&mut meta, &env.timestamp);
                if env.message.model.is_some() {
                    meta.model = env.message.model.clone();
                }
                if let Some(usage) = &env.message.usage {
                    meta.total_input_tokens += usage.input_tokens.unwrap_or(0) as i64
                        + usage.cache_creation_input_tokens.unwrap_or(0) as i64;
                    meta.total_output_tokens += usage.output_tokens.unwrap_or(0) as i64;
                }
                if let Some(cost) = env.message.cost_usd {
                    meta.total_cost_usd += cost;
                }
                rows.push(Row {
                    ordinal,
                    uuid: Some(env.uuid.clone()),
                    parent_uuid: env.parent_uuid.clone(),
                    kind: "assistant",
                    timestamp: Some(env.timestamp.clone()),
                    text_body: text,
                });
            }
            SessionMessage::Summary(env) => {
                // Counted toward the created_at/last_accessed_at window
                // (§4.2), but not toward message_count — see DESIGN.md
                // Open Question decisions for why invariant 3 wins here.
                rows.push(Row {
                    ordinal,
                    uuid: env.leaf_uuid.clone(),
                    parent_uuid: None,
                    kind: "summary",
                    timestamp: None,
                    text_body: env.summary.clone(),
                });
            }
            SessionMessage::System(env) => {
                bump_window(&mut meta, &env.timestamp);
                rows.push(Row {
                    ordinal,
                    uuid: Some(env.uuid.clone()),
                    parent_uuid: None,
                    kind: "system",
                    timestamp: Some(env.timestamp.clone()),
                    text_body: env.content.clone().unwrap_or_default(),
                });
            }
            SessionMessage::FileHistorySnapshot(_) => rows.push(Row {
                ordinal,
                uuid: None,
                parent_uuid: None,
                kind: "file-history-snapshot",
                timestamp: None,
                text_body: String::new(),
            }),
            SessionMessage::Progress(_) => rows.push(Row {
                ordinal,
                uuid: None,
                parent_uuid: None,
                kind: "progress",
                timestamp: None,
                text_body: String::new(),
            }),
            SessionMessage::QueueOperation(_) => rows.push(Row {
                ordinal,
                uuid: None,
                parent_uuid: None,
                kind: "queue-operation",
                timestamp: None,
                text_body: String::new(),
            }),
        }
    }

    (meta, rows)
}

fn bump_window(meta: &mut ParsedMetadata, ts: &str) {
    if meta.created_at.as_deref().is_none_or(|c| ts < c) {
        meta.created_at = Some(ts.to_string());
    }
    if meta.last_accessed_at.as_deref().is_none_or(|c| ts > c) {
        meta.last_accessed_at = Some(ts.to_string());
    }
}

/// Durable local store: SQLite + FTS5 behind a single-writer mutex.
pub struct IndexStore {
    conn: Mutex<Connection>,
}

impl IndexStore {
    pub fn open(db_path: &Path, sqlite_config: &SqliteConfig) -> Result<Self> {
        let conn = crate::db::open_with_config(db_path, sqlite_config)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Reconcile the index to on-disk truth under `root` (spec §4.4.1).
    pub fn sync(&self, root: &Path) -> Result<SyncCounts> {
        let start = Instant::now();
        let scanned = scanner::scan(root)?;
        let conn = self.conn.lock().expect("index mutex poisoned");

        let plan = change::detect_changes(&conn, &scanned)?;
        let mut counts = SyncCounts {
            unchanged: plan.unchanged_count,
            ..Default::default()
        };

        for (file, status) in &plan.to_process {
            match self.ingest_one(&conn, file) {
                Ok(()) => match status {
                    ChangeStatus::New => counts.added += 1,
                    ChangeStatus::Modified => counts.updated += 1,
                    ChangeStatus::Restored => counts.restored += 1,
                    ChangeStatus::Unchanged => unreachable!(),
                },
                Err(e) => {
                    tracing::warn!("failed to ingest {}: {e:#}", file.absolute_path.display());
                }
            }
        }

        for session_id in &plan.deleted_session_ids {
            conn.execute(
                "UPDATE files SET is_deleted = 1, deleted_at = ?2 WHERE session_id = ?1",
                params![session_id, now_iso()],
            )
            .context("failed to mark session deleted")?;
            counts.deleted += 1;
        }

        counts.duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "sync: added={} updated={} restored={} deleted={} unchanged={} in {}ms",
            counts.added,
            counts.updated,
            counts.restored,
            counts.deleted,
            counts.unchanged,
            counts.duration_ms
        );
        Ok(counts)
    }

    /// Parse one file and replace its `files`/`messages`/fts rows in a
    /// single transaction (spec §4.4.1: "wrap writes in a single
    /// transaction per session").
    fn ingest_one(&self, conn: &Connection, file: &ScannedFile) -> Result<()> {
        let parsed = jsonl::parse_file(&file.absolute_path)
            .with_context(|| format!("failed to parse {}", file.absolute_path.display()))?;
        if parsed.parse_errors > 0 {
            tracing::warn!(
                "{}: {} line(s) failed to parse and were skipped",
                file.absolute_path.display(),
                parsed.parse_errors
            );
        }

        let (meta, rows) = derive(&parsed.messages);
        let working_directory = meta
            .cwd
            .clone()
            .unwrap_or_else(|| path_codec::decode_in(Path::new("/"), &file.encoded_dir).to_string_lossy().to_string());
        let created_at = meta.created_at.clone().unwrap_or_else(now_iso);
        let last_accessed_at = meta.last_accessed_at.clone().unwrap_or_else(|| created_at.clone());
        let content_hash = content::hash_bytes(&std::fs::read(&file.absolute_path)?);
        let mtime_ms = file
            .mtime
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO files (
                session_id, working_directory, encoded_path, file_path,
                created_at, last_accessed_at, message_count, user_message_count,
                assistant_message_count, total_input_tokens, total_output_tokens,
                total_cost_usd, model, git_branch, slug, first_user_message,
                is_deleted, deleted_at, fp_size, fp_mtime, fp_content_hash
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                0, NULL, ?17, ?18, ?19
            )
            ON CONFLICT(session_id) DO UPDATE SET
                working_directory = excluded.working_directory,
                encoded_path = excluded.encoded_path,
                file_path = excluded.file_path,
                last_accessed_at = excluded.last_accessed_at,
                message_count = excluded.message_count,
                user_message_count = excluded.user_message_count,
                assistant_message_count = excluded.assistant_message_count,
                total_input_tokens = excluded.total_input_tokens,
                total_output_tokens = excluded.total_output_tokens,
                total_cost_usd = excluded.total_cost_usd,
                model = excluded.model,
                git_branch = excluded.git_branch,
                slug = excluded.slug,
                first_user_message = excluded.first_user_message,
                is_deleted = 0,
                deleted_at = NULL,
                fp_size = excluded.fp_size,
                fp_mtime = excluded.fp_mtime,
                fp_content_hash = excluded.fp_content_hash",
            params![
                file.session_id,
                working_directory,
                file.encoded_dir,
                file.absolute_path.to_string_lossy(),
                created_at,
                last_accessed_at,
                meta.message_count,
                meta.user_message_count,
                meta.assistant_message_count,
                meta.total_input_tokens,
                meta.total_output_tokens,
                meta.total_cost_usd,
                meta.model,
                meta.git_branch,
                meta.slug,
                meta.first_user_message,
                file.size as i64,
                mtime_ms,
                content_hash,
            ],
        )
        .context("failed to upsert files row")?;

        tx.execute(
            "DELETE FROM messages WHERE session_id = ?1",
            params![file.session_id],
        )
        .context("failed to clear previous messages")?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO messages (session_id, ordinal, uuid, parent_uuid, type, timestamp, text_body)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for row in &rows {
                stmt.execute(params![
                    file.session_id,
                    row.ordinal,
                    row.uuid,
                    row.parent_uuid,
                    row.kind,
                    row.timestamp,
                    row.text_body,
                ])?;
            }
        }

        tx.commit().context("failed to commit session ingest")?;
        Ok(())
    }

    /// Drop and re-create `files`/`messages`/fts, preserve `titles` and
    /// `settings`, then `sync()` from empty (spec §4.4.1 `rebuild()`).
    pub fn rebuild(&self, root: &Path) -> Result<SyncCounts> {
        {
            let conn = self.conn.lock().expect("index mutex poisoned");
            crate::db::rebuild_schema(&conn)?;
        }
        self.sync(root)
    }

    pub fn list(&self, opts: &ListOptions) -> Result<Vec<Session>> {
        let conn = self.conn.lock().expect("index mutex poisoned");
        let mut sql = String::from(
            "SELECT f.session_id, f.working_directory, f.encoded_path, f.file_path,
                    f.created_at, f.last_accessed_at, f.message_count, f.user_message_count,
                    f.assistant_message_count, f.total_input_tokens, f.total_output_tokens,
                    f.total_cost_usd, f.model, f.git_branch, f.slug, f.first_user_message,
                    f.is_deleted, f.deleted_at, t.title
             FROM files f
             LEFT JOIN titles t ON t.session_id = f.session_id
             WHERE 1 = 1",
        );
        if !opts.include_deleted {
            sql.push_str(" AND f.is_deleted = 0");
        }
        if opts.project_path.is_some() {
            sql.push_str(" AND f.working_directory = ?1");
        }
        sql.push_str(" ORDER BY f.last_accessed_at DESC, f.is_deleted ASC");

        let mut stmt = conn.prepare(&sql)?;
        let rows = if let Some(project) = &opts.project_path {
            stmt.query_map(params![project], row_to_session)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        } else {
            stmt.query_map([], row_to_session)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        };
        Ok(rows)
    }

    /// Issue the FTS query directly, then join to `files` in a second pass
    /// (spec §9 "ranking-function restriction").
    pub fn search(
        &self,
        query: &str,
        max_results: u32,
        max_matches_per_session: u32,
    ) -> Result<Vec<SearchHit>> {
        let conn = self.conn.lock().expect("index mutex poisoned");

        let mut stmt = conn
            .prepare(
                "SELECT m.session_id, m.ordinal,
                        snippet(fts_messages, 0, '\u{2023}', '\u{2023}', '...', 32) as snippet,
                        bm25(fts_messages) as rank
                 FROM fts_messages
                 JOIN messages m ON m.id = fts_messages.rowid
                 WHERE fts_messages MATCH ?1
                 ORDER BY rank",
            )
            .map_err(|e| anyhow::anyhow!("malformed search query: {e}"))?;

        struct Hit {
            session_id: String,
            ordinal: i64,
            snippet: String,
            rank: f64,
        }
        let hits = stmt
            .query_map(params![query], |row| {
                Ok(Hit {
                    session_id: row.get(0)?,
                    ordinal: row.get(1)?,
                    snippet: row.get(2)?,
                    rank: row.get(3)?,
                })
            })
            .map_err(|e| anyhow::anyhow!("malformed search query: {e}"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("malformed search query: {e}"))?;

        // Group by session, preserving best (first-seen, lowest bm25) rank order.
        let mut by_session: Vec<(String, f64, Vec<SearchMatch>, i64)> = Vec::new();
        for hit in hits {
            if let Some(entry) = by_session.iter_mut().find(|(id, ..)| *id == hit.session_id) {
                entry.3 += 1;
                if (entry.2.len() as u32) < max_matches_per_session {
                    entry.2.push(SearchMatch {
                        ordinal: hit.ordinal,
                        snippet: hit.snippet,
                    });
                }
            } else {
                by_session.push((
                    hit.session_id.clone(),
                    hit.rank,
                    vec![SearchMatch {
                        ordinal: hit.ordinal,
                        snippet: hit.snippet,
                    }],
                    1,
                ));
            }
        }
        by_session.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        by_session.truncate(max_results as usize);

        let mut out = Vec::with_capacity(by_session.len());
        for (session_id, rank, matches, total_matches) in by_session {
            if let Some(session) = self.find_by_id(&conn, &session_id)? {
                out.push(SearchHit {
                    session,
                    matches,
                    total_matches,
                    rank,
                });
            }
        }
        Ok(out)
    }

    fn find_by_id(&self, conn: &Connection, session_id: &str) -> Result<Option<Session>> {
        conn.query_row(
            "SELECT f.session_id, f.working_directory, f.encoded_path, f.file_path,
                    f.created_at, f.last_accessed_at, f.message_count, f.user_message_count,
                    f.assistant_message_count, f.total_input_tokens, f.total_output_tokens,
                    f.total_cost_usd, f.model, f.git_branch, f.slug, f.first_user_message,
                    f.is_deleted, f.deleted_at, t.title
             FROM files f
             LEFT JOIN titles t ON t.session_id = f.session_id
             WHERE f.session_id = ?1",
            params![session_id],
            row_to_session,
        )
        .optional()
        .context("failed to look up session")
    }

    pub fn get(&self, session_id: &str) -> Result<Option<Session>> {
        let conn = self.conn.lock().expect("index mutex poisoned");
        self.find_by_id(&conn, session_id)
    }

    /// Upsert `titles`; empty title clears the override (spec §4.5
    /// `rename_session`: "empty title clears the override").
    pub fn rename(&self, session_id: &str, title: &str) -> Result<()> {
        let conn = self.conn.lock().expect("index mutex poisoned");
        if title.is_empty() {
            conn.execute(
                "DELETE FROM titles WHERE session_id = ?1",
                params![session_id],
            )?;
        } else {
            conn.execute(
                "INSERT INTO titles (session_id, title, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(session_id) DO UPDATE SET title = excluded.title, updated_at = excluded.updated_at",
                params![session_id, title, now_iso()],
            )?;
        }
        Ok(())
    }

    /// Update the `files` row after the session service has physically
    /// moved the JSONL file (spec §4.4.1 `move()`).
    pub fn move_session(
        &self,
        session_id: &str,
        new_working_directory: &str,
        new_encoded_path: &str,
        new_file_path: &str,
    ) -> Result<()> {
        let conn = self.conn.lock().expect("index mutex poisoned");
        let changed = conn
            .execute(
                "UPDATE files SET working_directory = ?2, encoded_path = ?3, file_path = ?4
                 WHERE session_id = ?1",
                params![session_id, new_working_directory, new_encoded_path, new_file_path],
            )
            .context("failed to update files row for move")?;
        if changed == 0 {
            anyhow::bail!("no session found for `{session_id}`");
        }
        Ok(())
    }

    pub fn set_deleted(&self, session_id: &str, flag: bool) -> Result<()> {
        let conn = self.conn.lock().expect("index mutex poisoned");
        let deleted_at = if flag { Some(now_iso()) } else { None };
        conn.execute(
            "UPDATE files SET is_deleted = ?2, deleted_at = ?3 WHERE session_id = ?1",
            params![session_id, flag as i64, deleted_at],
        )
        .context("failed to set is_deleted")?;
        Ok(())
    }

    pub fn stats(&self) -> Result<IndexStats> {
        let conn = self.conn.lock().expect("index mutex poisoned");
        let file_count: i64 = conn.query_row("SELECT COUNT(*) FROM files", [], |r| r.get(0))?;
        let message_count: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |r| r.get(0))?;
        let fts_bytes: i64 = conn
            .query_row(
                "SELECT COALESCE(SUM(LENGTH(text_body)), 0) FROM messages",
                [],
                |r| r.get(0),
            )
            .unwrap_or(0);
        Ok(IndexStats {
            file_count,
            message_count,
            fts_bytes,
            last_sync_duration_ms: None,
        })
    }
}

fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<Session> {
    Ok(Session {
        session_id: row.get(0)?,
        working_directory: row.get(1)?,
        encoded_path: row.get(2)?,
        file_path: row.get(3)?,
        created_at: row.get(4)?,
        last_accessed_at: row.get(5)?,
        message_count: row.get(6)?,
        user_message_count: row.get(7)?,
        assistant_message_count: row.get(8)?,
        total_input_tokens: row.get(9)?,
        total_output_tokens: row.get(10)?,
        total_cost_usd: row.get(11)?,
        model: row.get(12)?,
        git_branch: row.get(13)?,
        slug: row.get(14)?,
        first_user_message: row.get(15)?,
        is_deleted: row.get::<_, i64>(16)? != 0,
        deleted_at: row.get(17)?,
        title: row.get(18)?,
    })
}

fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_session(root: &Path, project: &str, session_id: &str, lines: &[&str]) {
        let dir = root.join("projects").join(project);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{session_id}.jsonl")), lines.join("\n") + "\n").unwrap();
    }

    fn open_store(tmp: &TempDir) -> IndexStore {
        IndexStore::open(&tmp.path().join("index.db"), &SqliteConfig::default()).unwrap()
    }

    #[test]
    fn test_sync_cold_index_two_projects() {
        let tmp = TempDir::new().unwrap();
        write_session(
            tmp.path(),
            "-Users-dev-webapp",
            "abc",
            &[
                r#"{"type":"user","uuid":"u1","sessionId":"abc","timestamp":"2026-01-01T00:00:00Z","message":{"role":"user","content":"hi"}}"#,
                r#"{"type":"assistant","uuid":"a1","sessionId":"abc","timestamp":"2026-01-01T00:00:01Z","message":{"role":"assistant","content":"hello","usage":{"output_tokens":5}}}"#,
                r#"{"type":"user","uuid":"u2","sessionId":"abc","timestamp":"2026-01-01T00:00:02Z","message":{"role":"user","content":"more"}}"#,
                r#"{"type":"assistant","uuid":"a2","sessionId":"abc","timestamp":"2026-01-01T00:00:03Z","message":{"role":"assistant","content":"ok","usage":{"output_tokens":3}}}"#,
                r#"{"type":"user","uuid":"u3","sessionId":"abc","timestamp":"2026-01-01T00:00:04Z","message":{"role":"user","content":"done"}}"#,
            ],
        );
        write_session(
            tmp.path(),
            "-Users-dev-api",
            "def",
            &[r#"{"type":"summary","summary":"a short chat","leafUuid":"x"}"#],
        );

        let store = open_store(&tmp);
        let counts = store.sync(tmp.path()).unwrap();
        assert_eq!(counts.added, 2);
        assert_eq!(counts.updated, 0);
        assert_eq!(counts.deleted, 0);

        let sessions = store.list(&ListOptions::default()).unwrap();
        assert_eq!(sessions.len(), 2);
        let abc = sessions.iter().find(|s| s.session_id == "abc").unwrap();
        assert!(abc.total_output_tokens > 0);
    }

    #[test]
    fn test_sync_idempotent_on_no_change() {
        let tmp = TempDir::new().unwrap();
        write_session(
            tmp.path(),
            "-a",
            "abc",
            &[r#"{"type":"summary","summary":"s"}"#],
        );
        let store = open_store(&tmp);
        store.sync(tmp.path()).unwrap();
        let second = store.sync(tmp.path()).unwrap();
        assert_eq!(second.added, 0);
        assert_eq!(second.updated, 0);
        assert_eq!(second.unchanged, 1);
    }

    #[test]
    fn test_rename_survives_rebuild() {
        let tmp = TempDir::new().unwrap();
        write_session(
            tmp.path(),
            "-a",
            "abc",
            &[r#"{"type":"summary","summary":"s"}"#],
        );
        let store = open_store(&tmp);
        store.sync(tmp.path()).unwrap();
        store.rename("abc", "My Thing").unwrap();

        store.rebuild(tmp.path()).unwrap();
        store.sync(tmp.path()).unwrap();

        let sessions = store.list(&ListOptions::default()).unwrap();
        let abc = sessions.iter().find(|s| s.session_id == "abc").unwrap();
        assert_eq!(abc.title.as_deref(), Some("My Thing"));
    }

    #[test]
    fn test_deleted_then_restored() {
        let tmp = TempDir::new().unwrap();
        write_session(
            tmp.path(),
            "-a",
            "abc",
            &[r#"{"type":"summary","summary":"s"}"#],
        );
        let store = open_store(&tmp);
        store.sync(tmp.path()).unwrap();

        fs::remove_file(tmp.path().join("projects/-a/abc.jsonl")).unwrap();
        let counts = store.sync(tmp.path()).unwrap();
        assert_eq!(counts.deleted, 1);

        let sessions = store
            .list(&ListOptions {
                include_deleted: true,
                ..Default::default()
            })
            .unwrap();
        assert!(sessions.iter().find(|s| s.session_id == "abc").unwrap().is_deleted);

        write_session(
            tmp.path(),
            "-a",
            "abc",
            &[r#"{"type":"summary","summary":"s"}"#],
        );
        let counts = store.sync(tmp.path()).unwrap();
        assert_eq!(counts.restored, 1);
        let sessions = store.list(&ListOptions::default()).unwrap();
        assert!(!sessions.iter().find(|s| s.session_id == "abc").unwrap().is_deleted);
    }

    #[test]
    fn test_search_ranks_denser_session_first() {
        let tmp = TempDir::new().unwrap();
        write_session(
            tmp.path(),
            "-x",
            "x",
            &[
                r#"{"type":"user","uuid":"u1","timestamp":"2026-01-01T00:00:00Z","message":{"role":"user","content":"authentication authentication authentication"}}"#,
                r#"{"type":"user","uuid":"u2","timestamp":"2026-01-01T00:00:01Z","message":{"role":"user","content":"authentication flow details authentication"}}"#,
            ],
        );
        write_session(
            tmp.path(),
            "-y",
            "y",
            &[r#"{"type":"user","uuid":"u1","timestamp":"2026-01-01T00:00:00Z","message":{"role":"user","content":"authentication once"}}"#],
        );
        let store = open_store(&tmp);
        store.sync(tmp.path()).unwrap();

        let hits = store.search("authentication", 10, 5).unwrap();
        assert_eq!(hits[0].session.session_id, "x");
    }
}
