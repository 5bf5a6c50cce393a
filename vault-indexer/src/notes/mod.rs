//! Note-level parsing and file handling: [[wikilinks]] and {{content blocks}}
//!
//! Everything here is pure or touches a single file; the index itself lives in `db`.

pub mod blocks;
pub mod file_ops;
pub mod links;

pub use blocks::{ContentBlock, block_hash, extract_blocks};
pub use links::{ExtractedLink, ReferenceRewriter, extract_links};
