//! Edits that fan out across the vault: block global update and note rename.
//!
//! Each rewritten file is replaced atomically and then reindexed through its
//! own upsert task. A failure on one file is logged and the rest continue;
//! there is no rollback of files already rewritten.

use std::fs;

use super::task::Task;
use super::worker::Worker;
use crate::error::{EngineError, EngineResult};
use crate::notes::{self, ReferenceRewriter, file_ops};

impl Worker {
    /// Replace block `old_hash` with `new_content` in every other file holding it
    pub(super) fn global_update(
        &mut self,
        origin_path: &str,
        old_hash: &str,
        new_content: &str,
    ) -> EngineResult<()> {
        let old_content = match self.db.block_content(old_hash)? {
            Some(content) => content,
            None => {
                log::warn!(
                    "[PROPAGATE] Unknown block {}, abandoning global update from {}",
                    short(old_hash),
                    origin_path
                );
                return Ok(());
            }
        };

        let (new_hash, created) = self.db.ensure_block(new_content)?;
        if created {
            log::info!("[PROPAGATE] Created block {}", short(&new_hash));
        } else {
            log::info!("[PROPAGATE] Smart merge onto existing block {}", short(&new_hash));
        }

        let peers: Vec<String> = self
            .db
            .files_with_block(old_hash)?
            .into_iter()
            .filter(|p| p != origin_path)
            .collect();
        let mut rewritten = 0;
        for path in &peers {
            match self.rewrite_block_in(path, &old_content, new_content) {
                Ok(true) => {
                    rewritten += 1;
                    self.follow_up(Task::upsert(path.as_str()));
                }
                Ok(false) => {
                    log::info!("[PROPAGATE] No occurrence of block in {}, skipping", path);
                }
                Err(e) => log::error!("[PROPAGATE] Skipping {}: {}", path, e),
            }
        }

        self.follow_up(Task::upsert(origin_path));
        log::info!(
            "[PROPAGATE] Block {} -> {}: rewrote {} of {} other files",
            short(old_hash),
            short(&new_hash),
            rewritten,
            peers.len()
        );
        Ok(())
    }

    fn rewrite_block_in(&self, path: &str, old_content: &str, new_content: &str) -> EngineResult<bool> {
        let abs = self.absolute(path)?;
        let text = fs::read_to_string(&abs).map_err(|e| EngineError::io(&abs, e))?;
        let (updated, count) = notes::blocks::replace_block(&text, old_content, new_content);
        if count == 0 || updated == text {
            return Ok(false);
        }
        file_ops::write_note_atomic(&abs, &updated).map_err(|e| EngineError::io(&abs, e))?;
        Ok(true)
    }

    /// Rename a note on disk and rewrite every reference to it
    pub(super) fn rename_file(&mut self, src_path: &str, dest_path: &str) -> EngineResult<()> {
        let src = self.absolute(src_path)?;
        let dest = self.absolute(dest_path)?;
        if !file_ops::is_note_path(&src) || !file_ops::is_note_path(&dest) {
            return Err(EngineError::InvalidPath(format!(
                "only .md notes can be renamed: {} -> {}",
                src_path, dest_path
            )));
        }
        if !src.is_file() {
            return Err(EngineError::InvalidPath(format!("rename source not found: {}", src_path)));
        }
        if dest.exists() {
            return Err(EngineError::NoteExists(dest_path.to_string()));
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
        }
        fs::rename(&src, &dest).map_err(|e| EngineError::io(&src, e))?;
        log::info!("[RENAME] {} -> {}", src_path, dest_path);

        self.db.move_file(src_path, dest_path)?;

        let old_name = file_ops::note_name(src_path);
        let new_name = file_ops::note_name(dest_path);
        let mut rewritten = 0;
        let rewriter = if old_name == new_name {
            None
        } else {
            ReferenceRewriter::new(&old_name, &new_name)
                .map_err(|e| log::error!("[RENAME] Could not build reference pattern for {:?}: {}", old_name, e))
                .ok()
        };
        if let Some(rewriter) = rewriter {
            for path in self.db.indexed_paths()? {
                match self.rewrite_references_in(&path, &rewriter) {
                    Ok(0) => {}
                    Ok(n) => {
                        log::debug!("[RENAME] Rewrote {} references in {}", n, path);
                        rewritten += 1;
                        self.follow_up(Task::upsert(path.as_str()));
                    }
                    Err(e) => log::error!("[RENAME] Skipping {}: {}", path, e),
                }
            }
        }

        log::info!(
            "[RENAME] Reference rewrite complete: {} -> {}, {} files updated",
            old_name,
            new_name,
            rewritten
        );
        self.follow_up(Task::upsert(dest_path));
        Ok(())
    }

    fn rewrite_references_in(&self, path: &str, rewriter: &ReferenceRewriter) -> EngineResult<usize> {
        let abs = self.absolute(path)?;
        let text = match fs::read(&abs) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => return Ok(0),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(EngineError::io(&abs, e)),
        };

        let (updated, count) = rewriter.rewrite(&text);
        if count == 0 || updated == text {
            return Ok(0);
        }
        file_ops::write_note_atomic(&abs, &updated).map_err(|e| EngineError::io(&abs, e))?;
        Ok(count)
    }
}

/// First eight characters, for log lines. Hashes from requests are not trusted to be hex.
fn short(hash: &str) -> &str {
    hash.char_indices().nth(8).map_or(hash, |(i, _)| &hash[..i])
}
