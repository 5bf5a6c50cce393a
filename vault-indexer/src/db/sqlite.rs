//! Database: the single writer connection to the vault index
//!
//! Owned by the index worker; nothing else holds a writable handle. Readers
//! get pooled read-only connections through [`Database::reader`].

use chrono::Utc;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags, Result as SqliteResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::models::{FileRecord, IndexCounts, IndexStats};
use super::reader::IndexReader;
use super::tables::{self, block_instances, blocks, files, fulltext, links};
use crate::notes::{self, ContentBlock};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Content extracted from one file, ready to be written in a single transaction
#[derive(Debug, Clone)]
pub struct FileUpdate<'a> {
    pub record: &'a FileRecord,
    /// Decoded text, or None when the file could not be decoded.
    /// A None clears the file's derived rows without extracting new ones.
    pub text: Option<&'a str>,
}

pub struct Database {
    db_path: PathBuf,
    conn: Connection,
}

impl Database {
    /// Open (or create) the index database and bring the schema up to date
    pub fn open(db_path: &Path) -> SqliteResult<Self> {
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        if !mode.eq_ignore_ascii_case("wal") {
            log::warn!("[INDEX] SQLite refused WAL mode (got {}), readers may block", mode);
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;

        tables::init_tables(&conn)?;
        log::info!("[INDEX] Database schema initialized in {:?}", db_path);

        Ok(Self {
            db_path: db_path.to_path_buf(),
            conn,
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Build a pool of read-only connections over the same database file
    pub fn reader(&self, pool_size: u32) -> Result<IndexReader, r2d2::Error> {
        let manager = SqliteConnectionManager::file(&self.db_path)
            .with_flags(
                OpenFlags::SQLITE_OPEN_READ_ONLY
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .with_init(|c| c.busy_timeout(BUSY_TIMEOUT));
        let pool = r2d2::Pool::builder().max_size(pool_size.max(1)).build(manager)?;
        Ok(IndexReader::new(pool))
    }

    /// Reindex one file: upsert its record, then clear-then-insert its links,
    /// block instances (creating unseen blocks) and full-text row.
    pub fn index_file(&mut self, update: &FileUpdate<'_>) -> SqliteResult<IndexStats> {
        let path = update.record.path.as_str();
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;

        files::upsert_file(&tx, update.record)?;

        let stats = match update.text {
            Some(text) => {
                let found_links = notes::extract_links(text);
                let found_blocks = notes::extract_blocks(text);

                links::replace_for_file(&tx, path, &found_links)?;
                let new_blocks = block_instances::replace_for_file(&tx, path, &found_blocks, &now)?;
                fulltext::replace_document(&tx, path, text)?;

                IndexStats {
                    links: found_links.len(),
                    blocks: found_blocks.len(),
                    new_blocks,
                }
            }
            None => {
                links::delete_for_file(&tx, path)?;
                block_instances::delete_for_file(&tx, path)?;
                fulltext::delete_document(&tx, path)?;
                IndexStats::default()
            }
        };

        tx.commit()?;
        Ok(stats)
    }

    /// Remove a file and everything derived from it. Returns false if it was not indexed.
    pub fn remove_file(&mut self, path: &str) -> SqliteResult<bool> {
        let tx = self.conn.transaction()?;
        links::delete_for_file(&tx, path)?;
        block_instances::delete_for_file(&tx, path)?;
        fulltext::delete_document(&tx, path)?;
        let existed = files::delete_file(&tx, path)?;
        tx.commit()?;
        Ok(existed)
    }

    /// Re-key a file's rows from `src` to `dest` in place, and point links
    /// written against the old note name at the new one.
    /// Any rows already stored under `dest` are replaced. Returns false, changing
    /// nothing, when `src` is not indexed.
    pub fn move_file(&mut self, src: &str, dest: &str) -> SqliteResult<bool> {
        let old_name = notes::file_ops::note_name(src);
        let new_name = notes::file_ops::note_name(dest);

        let tx = self.conn.transaction()?;
        if files::get_file(&tx, src)?.is_none() {
            return Ok(false);
        }
        links::delete_for_file(&tx, dest)?;
        block_instances::delete_for_file(&tx, dest)?;
        files::delete_file(&tx, dest)?;

        files::move_file(&tx, src, dest)?;
        links::move_source(&tx, src, dest)?;
        block_instances::move_file(&tx, src, dest)?;
        fulltext::move_document(&tx, src, dest)?;
        if old_name != new_name {
            let n = links::retarget(&tx, &old_name, &new_name)?;
            log::debug!("[INDEX] Retargeted {} link rows: {} -> {}", n, old_name, new_name);
        }
        tx.commit()?;
        Ok(true)
    }

    /// Store a block unless it already exists. Returns its hash and whether it was created.
    pub fn ensure_block(&mut self, content: &str) -> SqliteResult<(String, bool)> {
        let block = ContentBlock::new(content);
        let created = blocks::insert_if_absent(&self.conn, &block, &Utc::now().to_rfc3339())?;
        Ok((block.hash, created))
    }

    pub fn block_content(&self, hash: &str) -> SqliteResult<Option<String>> {
        Ok(blocks::get(&self.conn, hash)?.map(|b| b.content))
    }

    pub fn files_with_block(&self, hash: &str) -> SqliteResult<Vec<String>> {
        block_instances::files_with_block(&self.conn, hash)
    }

    pub fn indexed_paths(&self) -> SqliteResult<Vec<String>> {
        files::list_paths(&self.conn)
    }

    pub fn file(&self, path: &str) -> SqliteResult<Option<FileRecord>> {
        files::get_file(&self.conn, path)
    }

    /// Delete every block without instances (and, via triggers, its FTS entry)
    pub fn collect_orphan_blocks(&mut self) -> SqliteResult<usize> {
        blocks::delete_orphans(&self.conn)
    }

    pub fn counts(&self) -> SqliteResult<IndexCounts> {
        count_rows(&self.conn)
    }

    #[cfg(test)]
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

pub(crate) fn count_rows(conn: &Connection) -> SqliteResult<IndexCounts> {
    let count = |table: &str| -> SqliteResult<usize> {
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get::<_, i64>(0)
        })
        .map(|n| n as usize)
    };
    Ok(IndexCounts {
        files: count("files")?,
        links: count("links")?,
        blocks: count("blocks")?,
        block_instances: count("block_instances")?,
    })
}
