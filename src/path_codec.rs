//! Bijective-ish mapping between absolute working directories and the single
//! filesystem segment the upstream producer encodes them as under `projects/`.
//!
//! See spec §4.1. Encoding is deterministic; decoding is ambiguous by
//! construction (component names may themselves contain `-`) and is resolved
//! by probing the filesystem for the longest existing prefix at each step.

use std::path::{Path, PathBuf};

/// Encode an absolute working directory into a single path segment.
///
/// Each `/` is replaced with `-`; a component beginning with `.` gets an
/// extra leading `-` so decoding can tell "hidden folder" apart from a
/// plain separator (`/a/.b/c` -> `-a--b-c`). Backslashes are normalized to
/// `/` first so Windows-style input encodes the same way.
pub fn encode(path: &str) -> String {
    let normalized = path.replace('\\', "/");

    // Drive-letter paths (C:\...) encode as `C--...`.
    if let Some(rest) = normalized.strip_prefix_drive_letter() {
        return format!("{}--{}", &normalized[..1], encode(rest));
    }

    let mut out = String::with_capacity(normalized.len() + 4);
    for component in normalized.split('/') {
        if component.is_empty() {
            // Leading slash of an absolute path; the separator itself is the
            // only `-` it contributes, not a second one from the next component.
            continue;
        }
        out.push('-');
        if let Some(rest) = component.strip_prefix('.') {
            out.push('-');
            out.push_str(rest);
        } else {
            out.push_str(component);
        }
    }
    out
}

trait StripDriveLetter {
    fn strip_prefix_drive_letter(&self) -> Option<&str>;
}

impl StripDriveLetter for str {
    fn strip_prefix_drive_letter(&self) -> Option<&str> {
        let bytes = self.as_bytes();
        if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
            Some(&self[2..])
        } else {
            None
        }
    }
}

/// Decode an encoded segment back into an absolute path, probing the
/// filesystem to resolve the ambiguity introduced by component names that
/// themselves contain `-`.
///
/// Contract (spec §4.1): `decode(encode(p)) == p` whenever the directory
/// tree exists on the host; otherwise this returns a best-effort,
/// non-canonical path built by greedy component splitting.
pub fn decode(encoded: &str) -> PathBuf {
    decode_in(Path::new("/"), encoded)
}

/// A raw component extracted from the encoded name, tagged with whether it
/// was introduced by the hidden-folder marker (`--`).
struct Token {
    text: String,
    hidden: bool,
}

fn split_tokens(encoded: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = encoded.chars().peekable();
    // Leading `-` denotes the root separator; skip it.
    if chars.peek() == Some(&'-') {
        chars.next();
    }

    let mut current = String::new();
    let mut pending_hidden = false;
    while let Some(c) = chars.next() {
        if c == '-' {
            if chars.peek() == Some(&'-') {
                // `--` hidden-folder marker: flush whatever came before it,
                // then mark the next component as hidden.
                chars.next();
                if !current.is_empty() {
                    tokens.push(Token {
                        text: std::mem::take(&mut current),
                        hidden: pending_hidden,
                    });
                    pending_hidden = false;
                }
                pending_hidden = true;
                continue;
            }
            if !current.is_empty() {
                tokens.push(Token {
                    text: std::mem::take(&mut current),
                    hidden: pending_hidden,
                });
                pending_hidden = false;
            }
            continue;
        }
        current.push(c);
    }
    if !current.is_empty() {
        tokens.push(Token {
            text: current,
            hidden: pending_hidden,
        });
    }
    tokens
}

/// Decode, but never touch the filesystem — useful for tests and for
/// decoding paths whose tree does not (yet) exist. Joins every token with
/// `/`, which is documented in spec §4.1 as the non-canonical fallback.
pub fn decode_best_effort(encoded: &str) -> PathBuf {
    let tokens = split_tokens(encoded);
    let mut result = PathBuf::from("/");
    for tok in tokens {
        let prefix = if tok.hidden { "." } else { "" };
        result = result.join(format!("{prefix}{}", tok.text));
    }
    result
}

pub fn decode_in(root: &Path, encoded: &str) -> PathBuf {
    let tokens = split_tokens(encoded);
    let mut result = root.to_path_buf();
    let mut i = 0;
    while i < tokens.len() {
        let prefix = if tokens[i].hidden { "." } else { "" };
        let mut best: Option<(PathBuf, usize)> = None;
        for end in (i..tokens.len()).rev() {
            let mut candidate_name = format!("{prefix}{}", tokens[i].text);
            for tok in &tokens[i + 1..=end] {
                candidate_name.push('-');
                candidate_name.push_str(&tok.text);
            }
            let candidate = result.join(&candidate_name);
            if candidate.exists() {
                best = Some((candidate, end));
                break;
            }
        }
        match best {
            Some((path, end)) => {
                result = path;
                i = end + 1;
            }
            None => {
                result = result.join(format!("{prefix}{}", tokens[i].text));
                i += 1;
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_encode_simple() {
        assert_eq!(encode("/Users/dev/webapp"), "-Users-dev-webapp");
    }

    #[test]
    fn test_encode_hidden_component() {
        assert_eq!(encode("/a/.b/c"), "-a--b-c");
    }

    #[test]
    fn test_encode_drive_letter() {
        let encoded = encode("C:\\Users\\dev");
        assert!(encoded.starts_with("C--"));
    }

    #[test]
    fn test_roundtrip_when_tree_exists() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("dev").join("webapp");
        fs::create_dir_all(&nested).unwrap();

        let root_str = tmp.path().to_string_lossy().to_string();
        let full = format!("{root_str}/dev/webapp");
        let encoded = encode(&full);

        let decoded = decode_in(Path::new("/"), &encoded);
        assert_eq!(decoded, PathBuf::from(&full));
    }

    #[test]
    fn test_roundtrip_hyphenated_folder_name() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("my-cool-project");
        fs::create_dir_all(&nested).unwrap();

        let full = format!("{}/my-cool-project", tmp.path().to_string_lossy());
        let encoded = encode(&full);
        let decoded = decode_in(Path::new("/"), &encoded);
        assert_eq!(decoded, PathBuf::from(&full));
    }

    #[test]
    fn test_decode_best_effort_when_tree_missing() {
        let encoded = "-Users-dev-webapp";
        let decoded = decode_best_effort(encoded);
        assert_eq!(decoded, PathBuf::from("/Users/dev/webapp"));
    }

    #[test]
    fn test_decode_hidden_component_best_effort() {
        let decoded = decode_best_effort("-a--b-c");
        assert_eq!(decoded, PathBuf::from("/a/.b/c"));
    }
}
