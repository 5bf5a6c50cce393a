//! Engine: lifecycle of the index worker, GC timer and watcher for one vault
//!
//! Requests that change the vault are turned into tasks; the calls return as
//! soon as the task is queued. Use [`Engine::wait_for_idle`] or
//! [`Engine::subscribe`] to observe when indexing has caught up.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::{IndexerConfig, defaults, initialize_vault};
use crate::db::{Database, IndexReader};
use crate::error::{EngineError, EngineResult};
use crate::indexer::{IndexState, Task, TaskQueue, VaultWatcher, Worker, spawn_gc_timer};
use crate::notes::file_ops;

pub struct Engine {
    config: IndexerConfig,
    queue: TaskQueue,
    reader: IndexReader,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<EngineResult<()>>>,
    gc_timer: Option<JoinHandle<()>>,
    watcher: Option<VaultWatcher>,
}

impl Engine {
    /// Open the index for `config.vault_dir` and start processing.
    /// Must be called from within a tokio runtime.
    pub fn start(config: IndexerConfig) -> EngineResult<Self> {
        initialize_vault(&config).map_err(|e| EngineError::io(&config.vault_dir, e))?;

        let db = Database::open(&config.db_path())?;
        let reader = db.reader(config.read_pool_size)?;
        let (queue, rx) = TaskQueue::new();
        let stop = Arc::new(AtomicBool::new(false));

        let worker = Worker::new(db, config.vault_dir.clone(), queue.clone());
        let worker_stop = stop.clone();
        let worker = tokio::task::spawn_blocking(move || worker.run(rx, worker_stop));

        let mut engine = Self {
            queue: queue.clone(),
            reader,
            stop,
            worker: Some(worker),
            gc_timer: Some(spawn_gc_timer(queue.clone(), config.gc_interval)),
            watcher: None,
            config,
        };

        // watcher first, so changes during the scan are not missed
        if engine.config.watch {
            engine.watcher = Some(VaultWatcher::start(&engine.config.vault_dir, queue)?);
        }
        engine.initial_scan()?;

        log::info!("[INDEX] Engine started for {:?}", engine.config.vault_dir);
        Ok(engine)
    }

    /// Queue an upsert for every note on disk and a delete for every indexed
    /// path that no longer exists
    fn initial_scan(&self) -> EngineResult<()> {
        let vault = &self.config.vault_dir;
        let on_disk: HashSet<String> = file_ops::list_notes(vault)
            .map_err(|e| EngineError::io(vault, e))?
            .iter()
            .filter_map(|p| file_ops::relative_path(vault, p))
            .collect();

        let mut stale = 0;
        for record in self.reader.list_files()? {
            if !on_disk.contains(&record.path) {
                self.queue.enqueue(Task::delete(record.path))?;
                stale += 1;
            }
        }
        let mut paths: Vec<&String> = on_disk.iter().collect();
        paths.sort();
        for path in paths {
            self.queue.enqueue(Task::upsert(path.as_str()))?;
        }

        log::info!(
            "[INDEX] Initial scan queued {} notes ({} stale entries)",
            on_disk.len(),
            stale
        );
        Ok(())
    }

    /// Stop the watcher, timer and worker. Queued tasks that have not started are
    /// discarded. Returns the fatal error that stopped the worker, if there was one.
    pub async fn shutdown(mut self) -> EngineResult<()> {
        self.stop_all().await
    }

    async fn stop_all(&mut self) -> EngineResult<()> {
        self.watcher.take();
        if let Some(timer) = self.gc_timer.take() {
            timer.abort();
        }
        self.stop.store(true, Ordering::SeqCst);
        self.queue.wake_for_shutdown();

        match self.worker.take() {
            Some(worker) => worker.await?,
            None => Ok(()),
        }
    }

    /// Stop everything, delete the storage directory and start again on an empty index
    pub async fn rebuild(mut self) -> EngineResult<Self> {
        log::info!("[INDEX] Rebuilding index for {:?}", self.config.vault_dir);
        if let Err(e) = self.stop_all().await {
            log::warn!("[INDEX] Worker had stopped with an error before rebuild: {}", e);
        }
        let config = self.config.clone();
        drop(self);

        let index_dir = config.index_dir();
        match std::fs::remove_dir_all(&index_dir) {
            Ok(()) => log::info!("[INDEX] Removed storage directory {:?}", index_dir),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(EngineError::io(index_dir, e)),
        }
        Self::start(config)
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Read-only query handle, safe to clone into other tasks
    pub fn reader(&self) -> &IndexReader {
        &self.reader
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub fn state(&self) -> IndexState {
        self.queue.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<IndexState> {
        self.queue.subscribe()
    }

    pub async fn wait_for_idle(&self) -> EngineResult<()> {
        self.queue.wait_for_idle().await
    }

    fn note_path(&self, rel_path: &str) -> EngineResult<std::path::PathBuf> {
        let abs = file_ops::absolute_path(&self.config.vault_dir, rel_path)
            .ok_or_else(|| EngineError::InvalidPath(rel_path.to_string()))?;
        if !file_ops::is_note_path(&abs) || file_ops::has_hidden_component(Path::new(rel_path)) {
            return Err(EngineError::InvalidPath(rel_path.to_string()));
        }
        Ok(abs)
    }

    /// Atomically write a note and queue its reindex
    pub fn save_note(&self, rel_path: &str, content: &str) -> EngineResult<()> {
        let abs = self.note_path(rel_path)?;
        file_ops::write_note_atomic(&abs, content).map_err(|e| EngineError::io(&abs, e))?;
        self.queue.enqueue(Task::upsert(rel_path))
    }

    /// Path of the note named `name`, creating `pages/<name>.md` if none exists
    pub fn resolve_or_create_note(&self, name: &str) -> EngineResult<String> {
        file_ops::validate_note_name(name).map_err(EngineError::InvalidPath)?;

        if let Some(existing) = self.reader.resolve_note(name)?.into_iter().next() {
            return Ok(existing);
        }

        let rel_path = format!("{}/{}", defaults::PAGES_DIR, file_ops::note_file_name(name));
        let abs = self.note_path(&rel_path)?;
        if abs.exists() {
            log::debug!("[INDEX] {} exists but is not indexed yet", rel_path);
        } else {
            file_ops::write_note_atomic(&abs, "").map_err(|e| EngineError::io(&abs, e))?;
            log::info!("[INDEX] Created note {}", rel_path);
        }
        self.queue.enqueue(Task::upsert(rel_path.as_str()))?;
        Ok(rel_path)
    }

    /// Queue a rename of one note path to another, rewriting references vault-wide
    pub fn rename_note(&self, src_path: &str, dest_path: &str) -> EngineResult<()> {
        self.note_path(src_path)?;
        self.note_path(dest_path)?;
        self.queue.enqueue(Task::RenameFile {
            src_path: src_path.to_string(),
            dest_path: dest_path.to_string(),
        })
    }

    /// Rename by note name, keeping the note in its current folder.
    /// Returns the destination path.
    pub fn rename_note_by_name(&self, old_name: &str, new_name: &str) -> EngineResult<String> {
        file_ops::validate_note_name(new_name).map_err(EngineError::InvalidPath)?;
        let src_path = self
            .reader
            .resolve_note(old_name)?
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::InvalidPath(format!("no note named {}", old_name)))?;

        let file_name = file_ops::note_file_name(new_name);
        let dest_path = match src_path.rsplit_once('/') {
            Some((folder, _)) => format!("{}/{}", folder, file_name),
            None => file_name,
        };
        self.rename_note(&src_path, &dest_path)?;
        Ok(dest_path)
    }

    /// Queue a global update of block `old_hash` to `new_content`, edited in `origin_path`
    pub fn global_update(&self, origin_path: &str, old_hash: &str, new_content: &str) -> EngineResult<()> {
        self.queue.enqueue(Task::GlobalUpdateBlock {
            origin_path: origin_path.to_string(),
            old_hash: old_hash.to_string(),
            new_content: new_content.to_string(),
        })
    }

    /// Queue an immediate garbage collection pass
    pub fn collect_garbage(&self) -> EngineResult<()> {
        self.queue.enqueue(Task::CollectGarbage)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.stop.store(true, Ordering::SeqCst);
            self.queue.wake_for_shutdown();
            if let Some(timer) = self.gc_timer.take() {
                timer.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::block_hash;
    use std::fs;
    use std::time::Duration;
    use tempfile::{TempDir, tempdir};

    fn config(dir: &TempDir) -> IndexerConfig {
        IndexerConfig::new(dir.path().join("vault"))
            .with_watch(false)
            .with_gc_interval(Duration::from_secs(3600))
    }

    fn read(engine: &Engine, rel: &str) -> String {
        fs::read_to_string(engine.config().vault_dir.join(rel)).unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_start_scans_existing_notes() {
        let dir = tempdir().unwrap();
        let cfg = config(&dir);
        fs::create_dir_all(cfg.vault_dir.join("pages")).unwrap();
        fs::write(cfg.vault_dir.join("pages/A.md"), "[[B]] {{Shared Block}}").unwrap();
        fs::write(cfg.vault_dir.join("B.md"), "{{Shared Block}}").unwrap();

        let engine = Engine::start(cfg).unwrap();
        engine.wait_for_idle().await.unwrap();

        let counts = engine.reader().counts().unwrap();
        assert_eq!(counts.files, 2);
        assert_eq!(counts.blocks, 1);
        assert_eq!(counts.block_instances, 2);
        assert_eq!(engine.reader().backlinks("B").unwrap(), vec!["pages/A.md".to_string()]);
        assert!(engine.config().vault_dir.join("assets").is_dir());

        engine.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_global_update_flow() {
        let dir = tempdir().unwrap();
        let engine = Engine::start(config(&dir)).unwrap();
        engine.save_note("A.md", "alpha {{Shared Block}}").unwrap();
        engine.save_note("B.md", "beta {{Shared Block}}").unwrap();
        engine.wait_for_idle().await.unwrap();

        let old = block_hash("Shared Block");
        let new = block_hash("Shared Block Updated");
        assert_eq!(engine.reader().counts().unwrap().blocks, 1);

        engine.save_note("A.md", "alpha {{Shared Block Updated}}").unwrap();
        engine.global_update("A.md", &old, "Shared Block Updated").unwrap();
        engine.wait_for_idle().await.unwrap();

        assert_eq!(read(&engine, "B.md"), "beta {{Shared Block Updated}}");
        assert_eq!(
            engine.reader().block_instances(&new).unwrap(),
            vec!["A.md".to_string(), "B.md".to_string()]
        );
        assert!(engine.reader().block_instances(&old).unwrap().is_empty());
        assert!(engine.reader().block(&old).unwrap().is_some());

        engine.collect_garbage().unwrap();
        engine.wait_for_idle().await.unwrap();
        assert!(engine.reader().block(&old).unwrap().is_none());
        assert!(engine.reader().block(&new).unwrap().is_some());

        engine.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_malformed_hash_leaves_engine_usable() {
        let dir = tempdir().unwrap();
        let engine = Engine::start(config(&dir)).unwrap();
        engine.save_note("A.md", "{{x}}").unwrap();
        engine.global_update("A.md", "a\u{e9}\u{e9}\u{e9}\u{e9}", "y").unwrap();

        tokio::time::timeout(Duration::from_secs(5), engine.wait_for_idle())
            .await
            .expect("worker did not go idle")
            .unwrap();
        assert_eq!(engine.state(), IndexState::Idle);
        assert!(engine.reader().block(&block_hash("y")).unwrap().is_none());

        engine.save_note("B.md", "{{x}}").unwrap();
        engine.wait_for_idle().await.unwrap();
        assert_eq!(engine.reader().counts().unwrap().files, 2);

        engine.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_rename_flow() {
        let dir = tempdir().unwrap();
        let engine = Engine::start(config(&dir)).unwrap();
        let path = engine.resolve_or_create_note("Note A").unwrap();
        assert_eq!(path, "pages/Note A.md");
        engine.save_note("one.md", "[[Note A]]").unwrap();
        engine.save_note("two.md", "[[Note A#section]]").unwrap();
        engine.save_note("three.md", "[[Note A|display text]]").unwrap();
        engine.wait_for_idle().await.unwrap();
        assert_eq!(engine.resolve_or_create_note("Note A").unwrap(), path);

        let dest = engine.rename_note_by_name("Note A", "Note A Renamed").unwrap();
        assert_eq!(dest, "pages/Note A Renamed.md");
        engine.wait_for_idle().await.unwrap();

        assert_eq!(read(&engine, "one.md"), "[[Note A Renamed]]");
        assert_eq!(read(&engine, "two.md"), "[[Note A Renamed#section]]");
        assert_eq!(read(&engine, "three.md"), "[[Note A Renamed|display text]]");
        assert_eq!(
            engine.reader().backlinks("Note A Renamed").unwrap(),
            vec!["one.md".to_string(), "three.md".to_string(), "two.md".to_string()]
        );
        assert!(engine.reader().backlinks("Note A").unwrap().is_empty());
        assert!(engine.reader().file("pages/Note A.md").unwrap().is_none());

        engine.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_rejects_paths_outside_vault() {
        let dir = tempdir().unwrap();
        let engine = Engine::start(config(&dir)).unwrap();
        assert!(matches!(
            engine.save_note("../escape.md", "x"),
            Err(EngineError::InvalidPath(_))
        ));
        assert!(matches!(
            engine.save_note(".vault-index/x.md", "x"),
            Err(EngineError::InvalidPath(_))
        ));
        assert!(matches!(
            engine.resolve_or_create_note("a/b"),
            Err(EngineError::InvalidPath(_))
        ));
        engine.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_rebuild_and_restart_reconcile() {
        let dir = tempdir().unwrap();
        let cfg = config(&dir);
        let engine = Engine::start(cfg.clone()).unwrap();
        engine.save_note("keep.md", "{{k}}").unwrap();
        engine.save_note("gone.md", "{{g}}").unwrap();
        engine.wait_for_idle().await.unwrap();
        engine.shutdown().await.unwrap();

        fs::remove_file(cfg.vault_dir.join("gone.md")).unwrap();
        let engine = Engine::start(cfg).unwrap();
        engine.wait_for_idle().await.unwrap();
        assert!(engine.reader().file("gone.md").unwrap().is_none());
        assert_eq!(engine.reader().counts().unwrap().files, 1);

        let engine = engine.rebuild().await.unwrap();
        engine.wait_for_idle().await.unwrap();
        let counts = engine.reader().counts().unwrap();
        assert_eq!(counts.files, 1);
        // orphan from gone.md did not survive the rebuild
        assert_eq!(counts.blocks, 1);
        assert_eq!(engine.state(), IndexState::Idle);

        engine.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_stops_queue() {
        let dir = tempdir().unwrap();
        let engine = Engine::start(config(&dir)).unwrap();
        let queue = engine.queue().clone();
        let mut states = engine.subscribe();
        engine.shutdown().await.unwrap();

        assert_eq!(*states.borrow_and_update(), IndexState::Stopped);
        assert!(matches!(
            queue.enqueue(Task::CollectGarbage),
            Err(EngineError::WorkerStopped)
        ));
    }
}
