//! File-system watch producer
//!
//! Translates notify events under the vault into index tasks. Only `.md`
//! files outside hidden directories are considered; the index directory and
//! the temp files of atomic writes are hidden, so they never produce tasks.

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};

use super::queue::TaskQueue;
use super::task::Task;
use crate::error::{EngineError, EngineResult};
use crate::notes::file_ops;

/// Keeps the underlying watcher alive; dropping it stops event delivery
pub struct VaultWatcher {
    _watcher: RecommendedWatcher,
    vault_dir: PathBuf,
}

impl VaultWatcher {
    pub fn start(vault_dir: &Path, queue: TaskQueue) -> EngineResult<Self> {
        let roots = VaultRoots::new(vault_dir);

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    for task in roots.tasks_for_event(&event) {
                        log::debug!("[WATCH] {:?}", task);
                        if let Err(e) = queue.enqueue(task) {
                            log::debug!("[WATCH] Dropping event, {}", e);
                            return;
                        }
                    }
                }
                Err(e) => log::warn!("[WATCH] Watch error: {}", e),
            },
            Config::default(),
        )?;
        watcher
            .watch(vault_dir, RecursiveMode::Recursive)
            .map_err(EngineError::Watch)?;

        log::info!("[WATCH] Watching {:?}", vault_dir);
        Ok(Self {
            _watcher: watcher,
            vault_dir: vault_dir.to_path_buf(),
        })
    }
}

impl Drop for VaultWatcher {
    fn drop(&mut self) {
        log::info!("[WATCH] Stopped watching {:?}", self.vault_dir);
    }
}

/// The vault root as configured and as the OS reports it (symlinks resolved)
struct VaultRoots {
    configured: PathBuf,
    canonical: Option<PathBuf>,
}

impl VaultRoots {
    fn new(vault_dir: &Path) -> Self {
        Self {
            configured: vault_dir.to_path_buf(),
            canonical: vault_dir.canonicalize().ok(),
        }
    }

    /// Vault-relative path of a watched note, or None if it should be ignored
    fn note_path(&self, path: &Path) -> Option<String> {
        let rel = file_ops::relative_path(&self.configured, path).or_else(|| {
            self.canonical
                .as_deref()
                .and_then(|root| file_ops::relative_path(root, path))
        })?;
        if !file_ops::is_note_path(Path::new(&rel)) || file_ops::has_hidden_component(Path::new(&rel)) {
            return None;
        }
        Some(rel)
    }

    fn tasks_for_event(&self, event: &Event) -> Vec<Task> {
        match event.kind {
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
                let from = self.note_path(&event.paths[0]);
                let to = self.note_path(&event.paths[1]);
                match (from, to) {
                    (Some(src_path), Some(dest_path)) => vec![Task::MoveFile {
                        src_path,
                        dest_path,
                    }],
                    // atomic write: hidden temp file persisted over a note
                    (None, Some(dest)) => vec![Task::upsert(dest)],
                    (Some(src), None) => vec![Task::delete(src)],
                    (None, None) => vec![],
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) | EventKind::Remove(_) => self
                .notes_in(event)
                .map(Task::delete)
                .collect(),
            EventKind::Modify(ModifyKind::Name(_)) => event
                .paths
                .iter()
                .filter_map(|p| {
                    let rel = self.note_path(p)?;
                    Some(if p.exists() {
                        Task::upsert(rel)
                    } else {
                        Task::delete(rel)
                    })
                })
                .collect(),
            EventKind::Modify(ModifyKind::Metadata(_)) | EventKind::Access(_) => vec![],
            EventKind::Create(_) | EventKind::Modify(_) => {
                self.notes_in(event).map(Task::upsert).collect()
            }
            EventKind::Any | EventKind::Other => vec![],
        }
    }

    fn notes_in<'a>(&'a self, event: &'a Event) -> impl Iterator<Item = String> + 'a {
        event.paths.iter().filter_map(|p| self.note_path(p))
    }
}
