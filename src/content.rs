//! Text extraction and content hashing.
//!
//! Grounded on the teacher's `content.rs` (hashing helpers) and
//! `indexer/handlers.rs` (block-walking shape), narrowed to what spec §4.2
//! needs: a single `text_body` per message, no content-addressable blob
//! store (this spec's `messages` relation carries `text_body` directly, with
//! an FTS5 auxiliary over it — see `schema.sql` / `db.rs`).

use crate::models::{ContentBlock, ContentValue};

/// Maximum length (in Unicode scalar values) of `first_user_message`.
/// Open Question in spec §9 resolved here: codepoint-safe truncation.
pub const FIRST_MESSAGE_TRUNCATE_CHARS: usize = 500;

/// Extract the indexable/display text from a message's `content` field.
///
/// If `content` is a string, use it verbatim. If it's an array of blocks,
/// concatenate the `text` of each `{type: "text"}` block with newlines;
/// blocks of other types are ignored (spec §4.2).
pub fn extract_text(content: &ContentValue) -> String {
    match content {
        ContentValue::Text(s) => s.clone(),
        ContentValue::Blocks(blocks) => blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Truncate a string to at most `max_chars` Unicode scalar values, appending
/// an ellipsis if truncated. Never splits a multi-byte codepoint.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut truncated: String = s.chars().take(max_chars).collect();
    truncated.push('\u{2026}');
    truncated
}

/// BLAKE3 hash of file bytes, used as the optional `content_hash` in a file
/// fingerprint (spec §3 "File fingerprint").
pub fn hash_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// BLAKE3 hash of a text string, used when hashing already-decoded content.
pub fn hash_content(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text_plain_string() {
        let content = ContentValue::Text("hello world".into());
        assert_eq!(extract_text(&content), "hello world");
    }

    #[test]
    fn test_extract_text_blocks_concatenates() {
        let content = ContentValue::Blocks(vec![
            ContentBlock::Text {
                text: "line one".into(),
            },
            ContentBlock::ToolUse {
                id: "t1".into(),
                name: "Read".into(),
                input: serde_json::json!({}),
            },
            ContentBlock::Text {
                text: "line two".into(),
            },
        ]);
        assert_eq!(extract_text(&content), "line one\nline two");
    }

    #[test]
    fn test_extract_text_no_text_blocks() {
        let content = ContentValue::Blocks(vec![ContentBlock::Thinking {
            thinking: "internal".into(),
        }]);
        assert_eq!(extract_text(&content), "");
    }

    #[test]
    fn test_extract_text_skips_unknown_block_types() {
        let content = ContentValue::Blocks(vec![ContentBlock::Other, ContentBlock::Text {
            text: "kept".into(),
        }]);
        assert_eq!(extract_text(&content), "kept");
    }

    #[test]
    fn test_unknown_block_type_deserializes_as_other() {
        let json = r#"{"type": "image", "source": {"type": "base64", "data": "..."}}"#;
        let block: ContentBlock = serde_json::from_str(json).unwrap();
        assert!(matches!(block, ContentBlock::Other));
    }

    #[test]
    fn test_truncate_chars_under_limit() {
        assert_eq!(truncate_chars("short", 500), "short");
    }

    #[test]
    fn test_truncate_chars_over_limit_is_codepoint_safe() {
        let s = "é".repeat(10);
        let truncated = truncate_chars(&s, 3);
        assert_eq!(truncated.chars().count(), 4);
        assert!(truncated.ends_with('\u{2026}'));
    }

    #[test]
    fn test_hash_bytes_stable() {
        let a = hash_bytes(b"hello");
        let b = hash_bytes(b"hello");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }
}
