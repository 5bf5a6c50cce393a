//! `files_fts`: FTS5 index over whole file contents, keyed by vault-relative path

use rusqlite::{Connection, Result as SqliteResult, params};

use crate::db::models::SearchResult;

pub fn init_tables(conn: &Connection) -> SqliteResult<()> {
    conn.execute(
        "CREATE VIRTUAL TABLE IF NOT EXISTS files_fts USING fts5(
            path UNINDEXED,
            content,
            tokenize='porter'
        )",
        [],
    )?;
    Ok(())
}

pub fn delete_document(conn: &Connection, path: &str) -> SqliteResult<usize> {
    conn.execute("DELETE FROM files_fts WHERE path = ?1", params![path])
}

pub fn replace_document(conn: &Connection, path: &str, content: &str) -> SqliteResult<()> {
    delete_document(conn, path)?;
    conn.execute(
        "INSERT INTO files_fts (path, content) VALUES (?1, ?2)",
        params![path, content],
    )?;
    Ok(())
}

pub fn move_document(conn: &Connection, src: &str, dest: &str) -> SqliteResult<usize> {
    delete_document(conn, dest)?;
    conn.execute(
        "UPDATE files_fts SET path = ?2 WHERE path = ?1",
        params![src, dest],
    )
}

/// Full-text search across notes
pub fn search(conn: &Connection, query: &str, limit: usize) -> SqliteResult<Vec<SearchResult>> {
    let escaped_query = escape_fts5_query(query);
    if escaped_query.is_empty() {
        return Ok(vec![]);
    }

    let mut stmt = conn.prepare(
        "SELECT path,
                snippet(files_fts, 1, '>>>', '<<<', '...', 32) as snippet,
                bm25(files_fts) as score
         FROM files_fts
         WHERE files_fts MATCH ?1
         ORDER BY score
         LIMIT ?2",
    )?;

    let results = stmt
        .query_map(params![escaped_query, limit as i64], |row| {
            Ok(SearchResult {
                path: row.get(0)?,
                snippet: row.get(1)?,
                score: row.get(2)?,
            })
        })?
        .collect::<SqliteResult<Vec<_>>>()?;

    Ok(results)
}

/// Escape special characters for FTS5 query
fn escape_fts5_query(query: &str) -> String {
    let words: Vec<&str> = query.split_whitespace().collect();
    if words.is_empty() {
        return String::new();
    }

    let escaped: Vec<String> = words
        .iter()
        .map(|word| {
            if word
                .chars()
                .any(|c| matches!(c, '"' | '*' | ':' | '^' | '(' | ')' | '+' | '-' | '{' | '}' | '[' | ']' | '#' | '|' | '.'))
            {
                format!("\"{}\"", word.replace('"', "\"\""))
            } else {
                word.to_string()
            }
        })
        .collect();

    escaped.join(" OR ")
}
