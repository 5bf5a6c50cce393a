//! `block_instances` table: which files currently contain which blocks

use rusqlite::{Connection, Result as SqliteResult, params};

use crate::db::models::{Block, BlockInstance};
use crate::notes::ContentBlock;

use super::blocks;

pub fn init_tables(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS block_instances (
            block_hash TEXT NOT NULL,
            file_path TEXT NOT NULL,
            UNIQUE(block_hash, file_path)
        );
        CREATE INDEX IF NOT EXISTS idx_block_instances_hash ON block_instances(block_hash);
        CREATE INDEX IF NOT EXISTS idx_block_instances_path ON block_instances(file_path);",
    )
}

pub fn delete_for_file(conn: &Connection, file_path: &str) -> SqliteResult<usize> {
    conn.execute(
        "DELETE FROM block_instances WHERE file_path = ?1",
        params![file_path],
    )
}

/// Clear-then-insert the instances of one file, storing any block not seen
/// before. Returns how many blocks were newly created.
pub fn replace_for_file(
    conn: &Connection,
    file_path: &str,
    found: &[ContentBlock],
    created_at: &str,
) -> SqliteResult<usize> {
    delete_for_file(conn, file_path)?;

    let mut created = 0;
    for block in found {
        if blocks::insert_if_absent(conn, block, created_at)? {
            created += 1;
        }
        conn.prepare_cached(
            "INSERT OR IGNORE INTO block_instances (block_hash, file_path) VALUES (?1, ?2)",
        )?
        .execute(params![block.hash, file_path])?;
    }
    Ok(created)
}

pub fn move_file(conn: &Connection, src: &str, dest: &str) -> SqliteResult<usize> {
    conn.execute(
        "UPDATE OR IGNORE block_instances SET file_path = ?2 WHERE file_path = ?1",
        params![src, dest],
    )
}

/// Files holding an instance of `hash`
pub fn files_with_block(conn: &Connection, hash: &str) -> SqliteResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT file_path FROM block_instances WHERE block_hash = ?1 ORDER BY file_path",
    )?;
    let rows = stmt.query_map(params![hash], |row| row.get::<_, String>(0))?;
    rows.collect()
}

/// Blocks contained in one file
pub fn blocks_in_file(conn: &Connection, file_path: &str) -> SqliteResult<Vec<Block>> {
    let mut stmt = conn.prepare(
        "SELECT b.hash, b.content, b.created_at
         FROM block_instances bi
         JOIN blocks b ON b.hash = bi.block_hash
         WHERE bi.file_path = ?1
         ORDER BY bi.rowid",
    )?;
    let rows = stmt.query_map(params![file_path], |row| {
        Ok(Block {
            hash: row.get(0)?,
            content: row.get(1)?,
            created_at: row.get(2)?,
        })
    })?;
    rows.collect()
}

pub fn list_all(conn: &Connection) -> SqliteResult<Vec<BlockInstance>> {
    let mut stmt = conn.prepare(
        "SELECT block_hash, file_path FROM block_instances ORDER BY file_path, block_hash",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(BlockInstance {
            block_hash: row.get(0)?,
            file_path: row.get(1)?,
        })
    })?;
    rows.collect()
}
