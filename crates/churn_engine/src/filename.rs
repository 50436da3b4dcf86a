use sha2::{Digest, Sha256};

/// Filesystem-safe, deterministic name for a storage key:
/// `{sanitized_key}--{short_hash(key)}`.
///
/// The hash keeps keys apart that sanitize to the same text (`a/b` and `a_b`).
pub fn storage_name(key: &str) -> String {
    let sanitized = sanitize(key);
    let hash = short_hash(key);
    format!("{sanitized}--{hash}")
}

fn sanitize(input: &str) -> String {
    let mut compacted = String::with_capacity(input.len());
    let mut prev_underscore = false;
    for c in input.chars() {
        let c = if is_forbidden(c) { '_' } else { c };
        if c == '_' {
            if !prev_underscore {
                compacted.push(c);
            }
            prev_underscore = true;
        } else {
            compacted.push(c);
            prev_underscore = false;
        }
    }
    let mut cleaned = compacted.trim_matches(&['_', ' ', '.'][..]).to_string();
    if cleaned.is_empty() {
        cleaned = "key".to_string();
    }
    if cleaned.len() > 64 {
        let mut end = 64;
        while !cleaned.is_char_boundary(end) {
            end -= 1;
        }
        cleaned.truncate(end);
    }
    cleaned
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ' ' | '\0'..='\u{1F}'
    )
}

fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
