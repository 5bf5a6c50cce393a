//! The index worker: the only code that writes to the index database.
//!
//! Runs on a blocking thread and processes one task end-to-end before taking
//! the next. Store errors stop the loop; anything else drops the task,
//! including a panic inside a handler.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::queue::{Message, TaskQueue, TaskReceiver};
use super::task::Task;
use crate::db::{Database, FileRecord, FileUpdate};
use crate::error::{EngineError, EngineResult};
use crate::notes::file_ops;

pub struct Worker {
    pub(super) db: Database,
    pub(super) vault_dir: PathBuf,
    pub(super) queue: TaskQueue,
}

impl Worker {
    pub fn new(db: Database, vault_dir: PathBuf, queue: TaskQueue) -> Self {
        Self {
            db,
            vault_dir,
            queue,
        }
    }

    /// Drain the queue until shutdown. Returns the fatal error that stopped it, if any.
    pub(crate) fn run(mut self, mut rx: TaskReceiver, stop: Arc<AtomicBool>) -> EngineResult<()> {
        log::info!("[INDEX] Worker started for {:?}", self.vault_dir);

        while let Some(message) = rx.blocking_recv() {
            if stop.load(Ordering::SeqCst) {
                break;
            }
            let task = match message {
                Message::Run(task) => task,
                Message::Shutdown => break,
            };

            let kind = task.kind();
            let result = catch_panic(|| self.handle(task));
            if let Err(e) = result {
                if e.is_fatal() {
                    log::error!("[INDEX] Fatal error in {} task, stopping worker: {}", kind, e);
                    rx.mark_stopped();
                    return Err(e);
                }
                log::warn!("[INDEX] {} task dropped: {}", kind, e);
            }
            rx.task_done();
        }

        rx.mark_stopped();
        log::info!("[INDEX] Worker stopped");
        Ok(())
    }

    pub fn handle(&mut self, task: Task) -> EngineResult<()> {
        log::debug!("[INDEX] Processing {:?}", task);
        match task {
            Task::UpsertFile { path } => self.upsert_file(&path),
            Task::DeleteFile { path } => self.delete_file(&path),
            Task::MoveFile {
                src_path,
                dest_path,
            } => self.move_file(&src_path, &dest_path),
            Task::RenameFile {
                src_path,
                dest_path,
            } => self.rename_file(&src_path, &dest_path),
            Task::GlobalUpdateBlock {
                origin_path,
                old_hash,
                new_content,
            } => self.global_update(&origin_path, &old_hash, &new_content),
            Task::CollectGarbage => self.collect_garbage(),
        }
    }

    pub(super) fn absolute(&self, rel_path: &str) -> EngineResult<PathBuf> {
        file_ops::absolute_path(&self.vault_dir, rel_path)
            .ok_or_else(|| EngineError::InvalidPath(rel_path.to_string()))
    }

    /// Push a follow-up task; logged rather than failed when the queue is closing
    pub(super) fn follow_up(&self, task: Task) {
        if let Err(e) = self.queue.enqueue(task) {
            log::warn!("[INDEX] Could not enqueue follow-up task: {}", e);
        }
    }

    fn upsert_file(&mut self, path: &str) -> EngineResult<()> {
        let abs = self.absolute(path)?;
        let bytes = match file_ops::read_note_bytes(&abs).map_err(|e| EngineError::io(&abs, e))? {
            Some(bytes) => bytes,
            None => {
                log::debug!("[INDEX] {} no longer exists, skipping upsert", path);
                return Ok(());
            }
        };

        let record = FileRecord {
            path: path.to_string(),
            content_hash: file_ops::content_hash(&bytes),
            modified_at: file_ops::modified_at(&abs),
        };
        let text = std::str::from_utf8(&bytes).ok();
        if text.is_none() {
            log::warn!("[INDEX] {} is not valid UTF-8, clearing its derived rows", path);
        }

        let stats = self.db.index_file(&FileUpdate {
            record: &record,
            text,
        })?;
        log::debug!(
            "[INDEX] Indexed {}: {} links, {} blocks ({} new)",
            path,
            stats.links,
            stats.blocks,
            stats.new_blocks
        );
        Ok(())
    }

    fn delete_file(&mut self, path: &str) -> EngineResult<()> {
        if self.db.remove_file(path)? {
            log::debug!("[INDEX] Removed {}", path);
        }
        Ok(())
    }

    /// A move observed on disk: re-key rows, then refresh the destination
    fn move_file(&mut self, src: &str, dest: &str) -> EngineResult<()> {
        if !self.db.move_file(src, dest)? {
            log::debug!("[INDEX] Move source {} was not indexed", src);
        }
        self.follow_up(Task::upsert(dest));
        Ok(())
    }

    pub(super) fn vault_dir(&self) -> &Path {
        &self.vault_dir
    }
}

/// Run a task handler, turning a panic into a non-fatal [`EngineError::TaskPanicked`].
/// An open transaction is rolled back when its guard unwinds.
fn catch_panic<T>(f: impl FnOnce() -> EngineResult<T>) -> EngineResult<T> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(EngineError::TaskPanicked(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
