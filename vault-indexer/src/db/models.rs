//! Row types returned by the index store

use serde::{Deserialize, Serialize};

/// A file known to the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Vault-relative path, `/`-separated (unique key)
    pub path: String,
    /// Hex SHA-256 of the file's bytes at last index
    pub content_hash: String,
    /// RFC3339 modification time at last index
    pub modified_at: String,
}

/// A reference from one file to a note name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub file_path: String,
    /// Target as written, before resolution
    pub target_name: String,
    pub anchor: Option<String>,
    pub alias: Option<String>,
}

/// A content-addressed block. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub hash: String,
    pub content: String,
    pub created_at: String,
}

/// The fact that a file currently contains a block
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockInstance {
    pub block_hash: String,
    pub file_path: String,
}

/// Full-text search hit over file contents
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub path: String,
    pub snippet: String,
    pub score: f64,
}

/// Row counts per table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexCounts {
    pub files: usize,
    pub links: usize,
    pub blocks: usize,
    pub block_instances: usize,
}

/// What a single file reindex wrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub links: usize,
    pub blocks: usize,
    /// Blocks that did not exist anywhere in the vault before this reindex
    pub new_blocks: usize,
}
