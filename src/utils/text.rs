//! Text normalization and content hashing.

use sha2::{Digest, Sha256};

/// Normalize text for content addressing: lowercase, trim, and collapse
/// whitespace runs into single spaces.
///
/// Two chunks that differ only in casing or whitespace layout hash to the
/// same value, so re-extraction of an unchanged document reuses cached
/// embeddings.
pub fn normalize_text(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    let mut last_was_space = true;

    for c in text.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                normalized.push(' ');
                last_was_space = true;
            }
        } else {
            for lower in c.to_lowercase() {
                normalized.push(lower);
            }
            last_was_space = false;
        }
    }

    if normalized.ends_with(' ') {
        normalized.pop();
    }
    normalized
}

/// SHA-256 hex digest of normalized text.
pub fn content_hash(text: &str) -> String {
    let hash = Sha256::digest(normalize_text(text).as_bytes());
    hex::encode(hash)
}

/// Check if content has at least one non-whitespace character.
pub fn has_meaningful_content(content: &str) -> bool {
    content.chars().any(|c| !c.is_whitespace())
}
