//! File operations for the vault
//!
//! Handles scanning for markdown notes, vault-relative paths, note names, and
//! atomic replace-on-write.

use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

pub const NOTE_EXTENSION: &str = "md";

/// Whether a path names a markdown note (by extension only)
pub fn is_note_path(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case(NOTE_EXTENSION))
        .unwrap_or(false)
}

/// Whether any component of a path is hidden (dot-prefixed).
/// Covers the index directory, temp files from atomic writes, and editor swap dirs.
pub fn has_hidden_component(path: &Path) -> bool {
    path.components().any(|c| match c {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

/// List all markdown files in the vault (recursively), skipping hidden files/dirs
pub fn list_notes(vault_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    if !vault_dir.exists() {
        return Ok(files);
    }

    let walker = WalkDir::new(vault_dir).follow_links(false).into_iter().filter_entry(|e| {
        e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.')
    });

    for entry in walker {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() && is_note_path(entry.path()) {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

/// Get the vault-relative path for a file, always `/`-separated
pub fn relative_path(vault_dir: &Path, file_path: &Path) -> Option<String> {
    let rel = file_path.strip_prefix(vault_dir).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Resolve a vault-relative path back to an absolute one.
/// Rejects absolute paths and any `..` or root components.
pub fn absolute_path(vault_dir: &Path, rel_path: &str) -> Option<PathBuf> {
    let rel = Path::new(rel_path);
    if rel_path.is_empty() || rel.is_absolute() {
        return None;
    }
    if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
        return None;
    }
    Some(vault_dir.join(rel))
}

/// Note name for a vault-relative path: the file stem
/// (e.g. "pages/Note A.md" -> "Note A")
pub fn note_name(rel_path: &str) -> String {
    Path::new(rel_path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// File name for a note name (e.g. "Note A" -> "Note A.md")
pub fn note_file_name(name: &str) -> String {
    format!("{}.{}", name, NOTE_EXTENSION)
}

/// Check that a note name can be used as a file name on its own
pub fn validate_note_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Note name is empty".to_string());
    }
    if trimmed != name {
        return Err(format!("Note name has surrounding whitespace: {:?}", name));
    }
    if name.starts_with('.') {
        return Err(format!("Note name cannot start with '.': {}", name));
    }
    if name
        .chars()
        .any(|c| matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '[' | ']' | '#'))
    {
        return Err(format!("Note name contains a reserved character: {}", name));
    }
    Ok(())
}

/// Read a note file's raw bytes, returning None if it does not exist
pub fn read_note_bytes(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Write a note by writing a hidden temp file in the same directory and then
/// persisting it over the target. Readers never observe a truncated file.
/// Creates parent directories as needed.
pub fn write_note_atomic(path: &Path, content: &str) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".vault-")
        .suffix(".tmp")
        .tempfile_in(parent)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Hex SHA-256 of a file's raw bytes
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Modification time of a file as RFC3339 (falls back to now if unavailable)
pub fn modified_at(path: &Path) -> String {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map(chrono::DateTime::<chrono::Utc>::from)
        .unwrap_or_else(|_| chrono::Utc::now())
        .to_rfc3339()
}
