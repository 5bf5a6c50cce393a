//! Background indexing engine for a vault of markdown notes.
//!
//! Keeps a SQLite index of `[[wikilinks]]`, `{{content blocks}}` and full text
//! consistent with the files on disk, and propagates block edits and note
//! renames across the vault through a single serialized worker.

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod indexer;
pub mod notes;

pub use config::IndexerConfig;
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use indexer::{IndexState, Task};
