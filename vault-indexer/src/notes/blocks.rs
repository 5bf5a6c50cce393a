//! Content blocks: reusable `{{...}}` spans identified by the SHA-256 of their
//! exact literal content. No trimming or normalization is applied, so two
//! blocks differing by one trailing space are distinct.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::LazyLock;

static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{\{(.+?)\}\}").unwrap());

/// A block found in a note, with its content-addressed identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentBlock {
    pub hash: String,
    pub content: String,
}

impl ContentBlock {
    pub fn new(content: &str) -> Self {
        Self {
            hash: block_hash(content),
            content: content.to_string(),
        }
    }
}

/// Hex SHA-256 of a block's literal content
pub fn block_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// The literal form of a block as it appears in a note
pub fn block_literal(content: &str) -> String {
    format!("{{{{{}}}}}", content)
}

/// Extract the distinct blocks of a note, in order of first appearance
pub fn extract_blocks(content: &str) -> Vec<ContentBlock> {
    let mut seen = HashSet::new();
    BLOCK_RE
        .captures_iter(content)
        .map(|cap| cap.get(1).map(|m| m.as_str()).unwrap_or_default())
        .filter(|inner| seen.insert(*inner))
        .map(ContentBlock::new)
        .collect()
}

/// Replace every literal `{{old}}` with `{{new}}`.
/// Returns the new text and the number of replacements.
pub fn replace_block(text: &str, old_content: &str, new_content: &str) -> (String, usize) {
    let old_literal = block_literal(old_content);
    let count = text.matches(old_literal.as_str()).count();
    if count == 0 {
        return (text.to_string(), 0);
    }
    (text.replace(&old_literal, &block_literal(new_content)), count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_exact_content() {
        assert_eq!(block_hash("Shared Block"), block_hash("Shared Block"));
        assert_ne!(block_hash("Shared Block"), block_hash("Shared Block "));
        assert_eq!(block_hash("Shared Block").len(), 64);
    }

    #[test]
    fn test_extract_blocks_without_trimming() {
        let blocks = extract_blocks("intro {{ padded }} and {{Shared Block}} end");
        let contents: Vec<_> = blocks.iter().map(|b| b.content.as_str()).collect();
        assert_eq!(contents, vec![" padded ", "Shared Block"]);
    }

    #[test]
    fn test_extract_multiline_block() {
        let blocks = extract_blocks("{{line one\nline two}}");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].content, "line one\nline two");
    }

    #[test]
    fn test_extract_deduplicates_within_file() {
        let blocks = extract_blocks("{{x}} {{y}} {{x}}");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0], ContentBlock::new("x"));
        assert_eq!(blocks[1], ContentBlock::new("y"));
    }

    #[test]
    fn test_extract_ignores_unterminated_and_empty() {
        assert!(extract_blocks("{{never closed").is_empty());
        assert!(extract_blocks("{{}}").is_empty());
    }

    #[test]
    fn test_replace_block_literal() {
        let text = "a {{Shared Block}} b {{Shared Block}} c {{Shared Block Two}}";
        let (out, n) = replace_block(text, "Shared Block", "Shared Block Updated");
        assert_eq!(n, 2);
        assert_eq!(
            out,
            "a {{Shared Block Updated}} b {{Shared Block Updated}} c {{Shared Block Two}}"
        );

        let (same, n) = replace_block("no blocks here", "Shared Block", "x");
        assert_eq!(n, 0);
        assert_eq!(same, "no blocks here");
    }

    #[test]
    fn test_block_literal() {
        assert_eq!(block_literal("abc"), "{{abc}}");
    }
}
