pub mod block_instances;
pub mod blocks;
pub mod files;
pub mod fulltext;
pub mod links;

use rusqlite::{Connection, Result as SqliteResult};

/// Create every table, index, virtual table and trigger if missing.
/// Safe to run on every startup against fresh or existing databases.
pub fn init_tables(conn: &Connection) -> SqliteResult<()> {
    files::init_tables(conn)?;
    links::init_tables(conn)?;
    blocks::init_tables(conn)?;
    block_instances::init_tables(conn)?;
    fulltext::init_tables(conn)?;
    Ok(())
}
