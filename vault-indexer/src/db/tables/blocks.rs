//! `blocks` table and its FTS5 shadow `blocks_fts`
//!
//! The shadow is an external-content FTS5 table kept in step by triggers, so
//! inserting a new block indexes it and deleting one (GC) drops its entry.

use rusqlite::{Connection, OptionalExtension, Result as SqliteResult, params};

use crate::db::models::Block;
use crate::notes::ContentBlock;

pub fn init_tables(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS blocks (
            hash TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE VIRTUAL TABLE IF NOT EXISTS blocks_fts USING fts5(
            content,
            content='blocks',
            content_rowid='rowid'
        );
        CREATE TRIGGER IF NOT EXISTS blocks_ai AFTER INSERT ON blocks BEGIN
            INSERT INTO blocks_fts(rowid, content) VALUES (new.rowid, new.content);
        END;
        CREATE TRIGGER IF NOT EXISTS blocks_ad AFTER DELETE ON blocks BEGIN
            INSERT INTO blocks_fts(blocks_fts, rowid, content) VALUES ('delete', old.rowid, old.content);
        END;
        CREATE TRIGGER IF NOT EXISTS blocks_au AFTER UPDATE ON blocks BEGIN
            INSERT INTO blocks_fts(blocks_fts, rowid, content) VALUES ('delete', old.rowid, old.content);
            INSERT INTO blocks_fts(rowid, content) VALUES (new.rowid, new.content);
        END;",
    )
}

/// Insert a block unless its hash is already stored. Returns true if inserted.
pub fn insert_if_absent(conn: &Connection, block: &ContentBlock, created_at: &str) -> SqliteResult<bool> {
    let n = conn
        .prepare_cached("INSERT OR IGNORE INTO blocks (hash, content, created_at) VALUES (?1, ?2, ?3)")?
        .execute(params![block.hash, block.content, created_at])?;
    Ok(n > 0)
}

pub fn exists(conn: &Connection, hash: &str) -> SqliteResult<bool> {
    conn.query_row("SELECT 1 FROM blocks WHERE hash = ?1", params![hash], |_| Ok(()))
        .optional()
        .map(|r| r.is_some())
}

pub fn get(conn: &Connection, hash: &str) -> SqliteResult<Option<Block>> {
    conn.query_row(
        "SELECT hash, content, created_at FROM blocks WHERE hash = ?1",
        params![hash],
        |row| {
            Ok(Block {
                hash: row.get(0)?,
                content: row.get(1)?,
                created_at: row.get(2)?,
            })
        },
    )
    .optional()
}

/// Delete every block with no remaining instance. Returns the number removed.
pub fn delete_orphans(conn: &Connection) -> SqliteResult<usize> {
    conn.execute(
        "DELETE FROM blocks WHERE hash IN (
            SELECT hash FROM blocks
            EXCEPT
            SELECT DISTINCT block_hash FROM block_instances
        )",
        [],
    )
}

/// Block contents starting with `prefix`: FTS5 prefix query first, `LIKE` when
/// FTS yields nothing or rejects the query.
pub fn complete(conn: &Connection, prefix: &str, limit: usize) -> SqliteResult<Vec<String>> {
    let prefix = prefix.trim();
    if prefix.is_empty() {
        return Ok(vec![]);
    }

    let fts_query = format!("\"{}\"*", prefix.replace('"', "\"\""));
    let fts = conn
        .prepare(
            "SELECT content FROM blocks_fts WHERE blocks_fts MATCH ?1
             ORDER BY bm25(blocks_fts) LIMIT ?2",
        )
        .and_then(|mut stmt| {
            let rows = stmt
                .query_map(params![fts_query, limit as i64], |row| row.get::<_, String>(0))?
                .collect::<SqliteResult<Vec<_>>>();
            rows
        });

    match fts {
        Ok(rows) if !rows.is_empty() => return Ok(rows),
        Ok(_) => {}
        Err(e) => log::debug!("[INDEX] Block FTS query failed, falling back to LIKE: {}", e),
    }

    let like = format!("{}%", escape_like(prefix));
    let mut stmt = conn.prepare(
        "SELECT content FROM blocks WHERE content LIKE ?1 ESCAPE '\\' ORDER BY content LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![like, limit as i64], |row| row.get::<_, String>(0))?;
    rows.collect()
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}
