//! Orphan block garbage collection
//!
//! The sweep itself runs on the worker like any other task. A timer task only
//! enqueues it, so GC never races an in-flight rewrite.

use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use super::queue::TaskQueue;
use super::task::Task;
use super::worker::Worker;
use crate::error::{EngineError, EngineResult};

impl Worker {
    pub(super) fn collect_garbage(&mut self) -> EngineResult<()> {
        let started = Instant::now();
        let removed = self.db.collect_orphan_blocks()?;
        if removed > 0 {
            log::info!(
                "[GC] Removed {} orphaned blocks in {:?}",
                removed,
                started.elapsed()
            );
        } else {
            log::debug!("[GC] No orphaned blocks");
        }
        Ok(())
    }
}

/// Enqueue a GC pass every `interval`, starting one interval after launch.
/// Exits when the queue stops accepting tasks.
pub fn spawn_gc_timer(queue: TaskQueue, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match queue.enqueue(Task::CollectGarbage) {
                Ok(()) => log::debug!("[GC] Scheduled garbage collection"),
                Err(EngineError::WorkerStopped) => {
                    log::debug!("[GC] Worker stopped, timer exiting");
                    break;
                }
                Err(e) => log::warn!("[GC] Failed to schedule garbage collection: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::queue::{IndexState, Message};
    use crate::indexer::worker::tests::worker_in;
    use crate::notes::block_hash;
    use tempfile::tempdir;

    #[test]
    fn test_gc_task_keeps_referenced_blocks() {
        let dir = tempdir().unwrap();
        let (mut worker, _rx) = worker_in(&dir);
        std::fs::write(worker.vault_dir().join("A.md"), "{{live}} {{dying}}").unwrap();
        worker.handle(Task::upsert("A.md")).unwrap();
        std::fs::write(worker.vault_dir().join("A.md"), "{{live}}").unwrap();
        worker.handle(Task::upsert("A.md")).unwrap();

        assert_eq!(worker.db.counts().unwrap().blocks, 2);
        for _ in 0..3 {
            worker.handle(Task::CollectGarbage).unwrap();
        }
        assert!(worker.db.block_content(&block_hash("dying")).unwrap().is_none());
        assert!(worker.db.block_content(&block_hash("live")).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_timer_enqueues_after_interval() {
        let (queue, mut rx) = TaskQueue::new();
        let handle = spawn_gc_timer(queue.clone(), Duration::from_millis(200));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(queue.state(), IndexState::Idle);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(queue.state(), IndexState::Busy);
        assert!(matches!(rx.try_recv(), Some(Message::Run(Task::CollectGarbage))));

        handle.abort();
    }
}
