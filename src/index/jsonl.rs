//! Lenient line-delimited JSONL reader (spec §4.2, component B).
//!
//! Simplified from the teacher's `indexer/jsonl.rs`: this spec's `sync()`
//! re-parses a changed file from scratch rather than resuming from a byte
//! offset, so there's no seek/offset bookkeeping here, just a full decode.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::models::SessionMessage;

/// Result of decoding one session's JSONL file.
pub struct ParsedFile {
    pub messages: Vec<SessionMessage>,
    /// Lines that failed to parse as JSON and were skipped (spec: "always
    /// recoverable by skipping the line").
    pub parse_errors: usize,
}

/// Parse a session JSONL file leniently: each line decodes independently,
/// malformed lines are skipped and counted rather than aborting the parse.
///
/// A final line with no trailing newline is treated as a write-in-progress
/// truncation, not a parse error, and is dropped silently — the producer
/// is expected to complete it before the next `sync()` (spec §5 "accept
/// truncation only at a line boundary, never mid-line").
pub fn parse_file(path: &Path) -> Result<ParsedFile> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let ends_with_newline = bytes.last() == Some(&b'\n');
    let text = String::from_utf8_lossy(&bytes);

    let mut lines: Vec<&str> = text.split('\n').collect();
    // split('\n') on a newline-terminated string yields a trailing empty
    // element; on a non-terminated string the last element is the
    // in-progress line, which we drop below.
    if ends_with_newline {
        lines.pop();
    } else if let Some(last) = lines.pop() {
        if !last.trim().is_empty() {
            tracing::debug!(
                "{}: dropping unterminated final line ({} bytes) as in-progress write",
                path.display(),
                last.len()
            );
        }
    }

    let mut messages = Vec::with_capacity(lines.len());
    let mut parse_errors = 0usize;

    for (lineno, raw) in lines.iter().enumerate() {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<SessionMessage>(trimmed) {
            Ok(msg) => messages.push(msg),
            Err(e) => {
                parse_errors += 1;
                tracing::warn!(
                    "{}:{} could not decode JSONL line: {e}",
                    path.display(),
                    lineno + 1
                );
            }
        }
    }

    Ok(ParsedFile {
        messages,
        parse_errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_empty_file_is_valid() {
        let f = NamedTempFile::new().unwrap();
        let parsed = parse_file(f.path()).unwrap();
        assert_eq!(parsed.messages.len(), 0);
        assert_eq!(parsed.parse_errors, 0);
    }

    #[test]
    fn test_parse_skips_malformed_line() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, r#"{{"type":"summary","summary":"s1"}}"#).unwrap();
        writeln!(f, "not json at all").unwrap();
        writeln!(f, r#"{{"type":"summary","summary":"s2"}}"#).unwrap();
        f.flush().unwrap();

        let parsed = parse_file(f.path()).unwrap();
        assert_eq!(parsed.messages.len(), 2);
        assert_eq!(parsed.parse_errors, 1);
    }

    #[test]
    fn test_parse_drops_unterminated_final_line() {
        let mut f = NamedTempFile::new().unwrap();
        write!(f, r#"{{"type":"summary","summary":"s1"}}"#).unwrap();
        write!(f, "\n").unwrap();
        write!(f, r#"{{"type":"summary","summary":"partial"#).unwrap(); // no trailing newline
        f.flush().unwrap();

        let parsed = parse_file(f.path()).unwrap();
        assert_eq!(parsed.messages.len(), 1);
        assert_eq!(parsed.parse_errors, 0);
    }

    #[test]
    fn test_parse_skips_blank_lines() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, r#"{{"type":"summary","summary":"s1"}}"#).unwrap();
        writeln!(f).unwrap();
        writeln!(f, r#"{{"type":"summary","summary":"s2"}}"#).unwrap();
        f.flush().unwrap();

        let parsed = parse_file(f.path()).unwrap();
        assert_eq!(parsed.messages.len(), 2);
        assert_eq!(parsed.parse_errors, 0);
    }
}
