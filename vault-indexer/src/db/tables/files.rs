//! `files` table: one row per indexed note

use rusqlite::{Connection, OptionalExtension, Result as SqliteResult, params};

use crate::db::models::FileRecord;

pub fn init_tables(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS files (
            path TEXT NOT NULL UNIQUE,
            content_hash TEXT NOT NULL,
            modified_at TEXT NOT NULL
        );",
    )
}

/// Insert or update the record for `record.path`; never duplicates a path
pub fn upsert_file(conn: &Connection, record: &FileRecord) -> SqliteResult<()> {
    conn.execute(
        "INSERT INTO files (path, content_hash, modified_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(path) DO UPDATE SET
            content_hash = excluded.content_hash,
            modified_at = excluded.modified_at",
        params![record.path, record.content_hash, record.modified_at],
    )?;
    Ok(())
}

pub fn delete_file(conn: &Connection, path: &str) -> SqliteResult<bool> {
    let n = conn.execute("DELETE FROM files WHERE path = ?1", params![path])?;
    Ok(n > 0)
}

/// Re-key a file record. Returns false if `src` was not indexed.
pub fn move_file(conn: &Connection, src: &str, dest: &str) -> SqliteResult<bool> {
    let n = conn.execute(
        "UPDATE files SET path = ?2 WHERE path = ?1",
        params![src, dest],
    )?;
    Ok(n > 0)
}

pub fn get_file(conn: &Connection, path: &str) -> SqliteResult<Option<FileRecord>> {
    conn.query_row(
        "SELECT path, content_hash, modified_at FROM files WHERE path = ?1",
        params![path],
        |row| {
            Ok(FileRecord {
                path: row.get(0)?,
                content_hash: row.get(1)?,
                modified_at: row.get(2)?,
            })
        },
    )
    .optional()
}

pub fn list_paths(conn: &Connection) -> SqliteResult<Vec<String>> {
    let mut stmt = conn.prepare("SELECT path FROM files ORDER BY path")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    rows.collect()
}

pub fn list_files(conn: &Connection) -> SqliteResult<Vec<FileRecord>> {
    let mut stmt = conn.prepare("SELECT path, content_hash, modified_at FROM files ORDER BY path")?;
    let rows = stmt.query_map([], |row| {
        Ok(FileRecord {
            path: row.get(0)?,
            content_hash: row.get(1)?,
            modified_at: row.get(2)?,
        })
    })?;
    rows.collect()
}

/// Paths of notes whose file name is `<name>.md`, at any depth
pub fn find_by_note_name(conn: &Connection, name: &str) -> SqliteResult<Vec<String>> {
    let file_name = format!("{}.md", name);
    let mut stmt = conn.prepare(
        "SELECT path FROM files
         WHERE path = ?1 OR substr(path, -length(?1) - 1) = '/' || ?1
         ORDER BY length(path), path",
    )?;
    let rows = stmt.query_map(params![file_name], |row| row.get::<_, String>(0))?;
    rows.collect()
}

/// Paths whose note name starts with `prefix` (case-insensitive, ASCII)
pub fn complete_note_paths(conn: &Connection, prefix: &str, limit: usize) -> SqliteResult<Vec<String>> {
    let mut stmt = conn.prepare("SELECT path FROM files ORDER BY path")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let prefix = prefix.to_lowercase();

    let mut out = Vec::new();
    for path in rows {
        let path = path?;
        let name = crate::notes::file_ops::note_name(&path);
        if name.to_lowercase().starts_with(&prefix) {
            out.push(path);
            if out.len() >= limit {
                break;
            }
        }
    }
    Ok(out)
}
