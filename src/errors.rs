//! Crate-level error taxonomy (spec §7), realized as a `thiserror`-derived
//! enum at the public boundary. Internal call chains use `anyhow::Result`;
//! callers (CLI, server, tests) match on `CoreError` instead of strings.
//! Mirrors the layering of the teacher's `server/errors.rs::AppError`
//! (an HTTP-facing error) one level down, at the core's own boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("no session found for `{0}`")]
    NotFound(String),

    #[error("`{0}` matched multiple sessions")]
    Ambiguous(String),

    #[error("malformed search query: {0}")]
    BadQuery(String),

    #[error("could not decode JSONL line: {0}")]
    ParseError(String),

    #[error("filesystem inconsistency: {0}")]
    FsConsistency(String),

    #[error("index store is corrupt or its schema version is unrecognized: {0}")]
    IndexCorrupt(String),

    #[error("conflicting operation on session `{0}`")]
    Conflict(String),

    #[error("failed to spawn child process: {0}")]
    ChildSpawnFailed(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl CoreError {
    /// A short machine-readable tag, used by the HTTP boundary (I) to pick
    /// a status code without matching on the full variant.
    pub fn tag(&self) -> &'static str {
        match self {
            CoreError::NotFound(_) => "not_found",
            CoreError::Ambiguous(_) => "ambiguous",
            CoreError::BadQuery(_) => "bad_query",
            CoreError::ParseError(_) => "parse_error",
            CoreError::FsConsistency(_) => "fs_consistency",
            CoreError::IndexCorrupt(_) => "index_corrupt",
            CoreError::Conflict(_) => "conflict",
            CoreError::ChildSpawnFailed(_) => "child_spawn_failed",
            CoreError::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_stable() {
        assert_eq!(CoreError::NotFound("x".into()).tag(), "not_found");
        assert_eq!(CoreError::Cancelled.tag(), "cancelled");
    }

    #[test]
    fn test_display() {
        let e = CoreError::Ambiguous("abc".into());
        assert_eq!(e.to_string(), "`abc` matched multiple sessions");
    }
}
