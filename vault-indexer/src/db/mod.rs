pub mod models;
pub mod reader;
pub mod sqlite;
pub mod tables;

pub use models::{Block, BlockInstance, FileRecord, IndexCounts, IndexStats, LinkRecord, SearchResult};
pub use reader::IndexReader;
pub use sqlite::{Database, FileUpdate};
