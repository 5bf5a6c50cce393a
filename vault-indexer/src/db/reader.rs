//! IndexReader: read-only queries over pooled connections
//!
//! Safe to clone and use from any thread while the worker writes; every
//! connection is opened with `SQLITE_OPEN_READ_ONLY`.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use super::models::{Block, FileRecord, IndexCounts, LinkRecord, SearchResult};
use super::sqlite::count_rows;
use super::tables::{block_instances, blocks, files, fulltext, links};
use crate::error::EngineResult;
use crate::notes::file_ops;

#[derive(Clone)]
pub struct IndexReader {
    pool: Pool<SqliteConnectionManager>,
}

impl IndexReader {
    pub(crate) fn new(pool: Pool<SqliteConnectionManager>) -> Self {
        Self { pool }
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> EngineResult<T> {
        let conn = self.pool.get()?;
        Ok(f(&*conn)?)
    }

    /// Distinct files linking to a note name
    pub fn backlinks(&self, note_name: &str) -> EngineResult<Vec<String>> {
        self.with_conn(|c| links::backlinks(c, note_name))
    }

    /// Every link row pointing at a note name, with anchors and aliases
    pub fn links_to(&self, note_name: &str) -> EngineResult<Vec<LinkRecord>> {
        self.with_conn(|c| links::links_to(c, note_name))
    }

    pub fn outgoing_links(&self, path: &str) -> EngineResult<Vec<LinkRecord>> {
        self.with_conn(|c| links::outgoing(c, path))
    }

    /// Note names (file stems) starting with `prefix`, deduplicated in path order
    pub fn complete_note_names(&self, prefix: &str, limit: usize) -> EngineResult<Vec<String>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let paths = self.with_conn(|c| files::complete_note_paths(c, prefix, usize::MAX))?;
        let mut names: Vec<String> = Vec::new();
        for path in paths {
            let name = file_ops::note_name(&path);
            if !names.contains(&name) {
                names.push(name);
                if names.len() >= limit {
                    break;
                }
            }
        }
        Ok(names)
    }

    /// Paths of notes named `name`, shallowest first
    pub fn resolve_note(&self, name: &str) -> EngineResult<Vec<String>> {
        self.with_conn(|c| files::find_by_note_name(c, name))
    }

    pub fn complete_blocks(&self, prefix: &str, limit: usize) -> EngineResult<Vec<String>> {
        self.with_conn(|c| blocks::complete(c, prefix, limit))
    }

    pub fn search(&self, query: &str, limit: usize) -> EngineResult<Vec<SearchResult>> {
        self.with_conn(|c| fulltext::search(c, query, limit))
    }

    pub fn block(&self, hash: &str) -> EngineResult<Option<Block>> {
        self.with_conn(|c| blocks::get(c, hash))
    }

    pub fn block_exists(&self, hash: &str) -> EngineResult<bool> {
        self.with_conn(|c| blocks::exists(c, hash))
    }

    /// Files currently holding an instance of `hash`
    pub fn block_instances(&self, hash: &str) -> EngineResult<Vec<String>> {
        self.with_conn(|c| block_instances::files_with_block(c, hash))
    }

    pub fn blocks_in_file(&self, path: &str) -> EngineResult<Vec<Block>> {
        self.with_conn(|c| block_instances::blocks_in_file(c, path))
    }

    pub fn file(&self, path: &str) -> EngineResult<Option<FileRecord>> {
        self.with_conn(|c| files::get_file(c, path))
    }

    pub fn list_files(&self) -> EngineResult<Vec<FileRecord>> {
        self.with_conn(files::list_files)
    }

    pub fn counts(&self) -> EngineResult<IndexCounts> {
        self.with_conn(count_rows)
    }
}
