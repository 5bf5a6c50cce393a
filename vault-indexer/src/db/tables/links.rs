//! `links` table: rebuilt wholesale for a file on every reindex

use rusqlite::{Connection, Result as SqliteResult, params};

use crate::db::models::LinkRecord;
use crate::notes::ExtractedLink;

pub fn init_tables(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS links (
            file_path TEXT NOT NULL,
            target_name TEXT NOT NULL,
            anchor TEXT,
            alias TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_links_file_path ON links(file_path);
        CREATE INDEX IF NOT EXISTS idx_links_target_name ON links(target_name);",
    )
}

pub fn delete_for_file(conn: &Connection, file_path: &str) -> SqliteResult<usize> {
    conn.execute("DELETE FROM links WHERE file_path = ?1", params![file_path])
}

/// Clear-then-insert the links of one file
pub fn replace_for_file(
    conn: &Connection,
    file_path: &str,
    links: &[ExtractedLink],
) -> SqliteResult<usize> {
    delete_for_file(conn, file_path)?;

    let mut stmt = conn.prepare_cached(
        "INSERT INTO links (file_path, target_name, anchor, alias) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for link in links {
        stmt.execute(params![file_path, link.target_name, link.anchor, link.alias])?;
    }
    Ok(links.len())
}

pub fn move_source(conn: &Connection, src: &str, dest: &str) -> SqliteResult<usize> {
    conn.execute(
        "UPDATE links SET file_path = ?2 WHERE file_path = ?1",
        params![src, dest],
    )
}

/// Point links written as `old_name` or `pages/old_name` at `new_name`
pub fn retarget(conn: &Connection, old_name: &str, new_name: &str) -> SqliteResult<usize> {
    conn.execute(
        "UPDATE links SET target_name = ?2 WHERE target_name = ?1 OR target_name = 'pages/' || ?1",
        params![old_name, new_name],
    )
}

fn map_link(row: &rusqlite::Row<'_>) -> rusqlite::Result<LinkRecord> {
    Ok(LinkRecord {
        file_path: row.get(0)?,
        target_name: row.get(1)?,
        anchor: row.get(2)?,
        alias: row.get(3)?,
    })
}

/// Every link row pointing at a note name, written either bare or with a folder prefix
pub fn links_to(conn: &Connection, note_name: &str) -> SqliteResult<Vec<LinkRecord>> {
    let mut stmt = conn.prepare(
        "SELECT file_path, target_name, anchor, alias FROM links
         WHERE target_name = ?1 OR substr(target_name, -length(?1) - 1) = '/' || ?1
         ORDER BY file_path, rowid",
    )?;
    let rows = stmt.query_map(params![note_name], map_link)?;
    rows.collect()
}

/// Distinct source files linking to a note name
pub fn backlinks(conn: &Connection, note_name: &str) -> SqliteResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT file_path FROM links
         WHERE target_name = ?1 OR substr(target_name, -length(?1) - 1) = '/' || ?1
         ORDER BY file_path",
    )?;
    let rows = stmt.query_map(params![note_name], |row| row.get::<_, String>(0))?;
    rows.collect()
}

pub fn outgoing(conn: &Connection, file_path: &str) -> SqliteResult<Vec<LinkRecord>> {
    let mut stmt = conn.prepare(
        "SELECT file_path, target_name, anchor, alias FROM links
         WHERE file_path = ?1 ORDER BY rowid",
    )?;
    let rows = stmt.query_map(params![file_path], map_link)?;
    rows.collect()
}
