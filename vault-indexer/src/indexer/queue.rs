//! FIFO task queue shared by every producer, plus the observable idle state
//!
//! Producers hold a cloneable [`TaskQueue`]; the worker owns the single
//! [`TaskReceiver`]. A pending counter tracks enqueued-but-unfinished tasks and
//! flips the `watch` state between `Busy` and `Idle`. Tasks a running task
//! enqueues are counted before it finishes, so a cascade never reports idle early.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use super::task::Task;
use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
    /// Queue drained, nothing in flight
    Idle,
    /// At least one task enqueued or running
    Busy,
    /// Worker has exited; nothing more will be processed
    Stopped,
}

pub(crate) enum Message {
    Run(Task),
    /// Wakes the worker so it notices the stop flag
    Shutdown,
}

struct QueueState {
    pending: Mutex<usize>,
    state_tx: watch::Sender<IndexState>,
}

#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::UnboundedSender<Message>,
    shared: Arc<QueueState>,
}

pub(crate) struct TaskReceiver {
    rx: mpsc::UnboundedReceiver<Message>,
    shared: Arc<QueueState>,
}

impl TaskQueue {
    pub(crate) fn new() -> (Self, TaskReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(IndexState::Idle);
        let shared = Arc::new(QueueState {
            pending: Mutex::new(0),
            state_tx,
        });
        (
            Self {
                tx,
                shared: shared.clone(),
            },
            TaskReceiver { rx, shared },
        )
    }

    /// Append a task. Never blocks; fails only once the worker has stopped.
    pub fn enqueue(&self, task: Task) -> EngineResult<()> {
        let mut pending = self.shared.pending.lock();
        if *self.shared.state_tx.borrow() == IndexState::Stopped {
            return Err(EngineError::WorkerStopped);
        }
        self.tx
            .send(Message::Run(task))
            .map_err(|_| EngineError::WorkerStopped)?;
        *pending += 1;
        if *pending == 1 {
            self.shared.state_tx.send_replace(IndexState::Busy);
        }
        Ok(())
    }

    pub fn state(&self) -> IndexState {
        *self.shared.state_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<IndexState> {
        self.shared.state_tx.subscribe()
    }

    /// Resolve once everything enqueued so far (and anything it enqueued) has run
    pub async fn wait_for_idle(&self) -> EngineResult<()> {
        let mut rx = self.subscribe();
        loop {
            let state = *rx.borrow_and_update();
            match state {
                IndexState::Idle => return Ok(()),
                IndexState::Stopped => return Err(EngineError::WorkerStopped),
                IndexState::Busy => {}
            }
            rx.changed().await.map_err(|_| EngineError::WorkerStopped)?;
        }
    }

    pub(crate) fn wake_for_shutdown(&self) {
        let _ = self.tx.send(Message::Shutdown);
    }
}

impl TaskReceiver {
    pub(crate) fn blocking_recv(&mut self) -> Option<Message> {
        self.rx.blocking_recv()
    }

    #[cfg(test)]
    pub(crate) fn try_recv(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }

    pub(crate) fn task_done(&self) {
        let mut pending = self.shared.pending.lock();
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.shared.state_tx.send_if_modified(|state| {
                if *state == IndexState::Busy {
                    *state = IndexState::Idle;
                    true
                } else {
                    false
                }
            });
        }
    }

    pub(crate) fn mark_stopped(&mut self) {
        let _guard = self.shared.pending.lock();
        self.shared.state_tx.send_replace(IndexState::Stopped);
        self.rx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_flips_busy_then_idle() {
        let (queue, mut rx) = TaskQueue::new();
        assert_eq!(queue.state(), IndexState::Idle);

        queue.enqueue(Task::upsert("a.md")).unwrap();
        queue.enqueue(Task::upsert("b.md")).unwrap();
        assert_eq!(queue.state(), IndexState::Busy);

        for expected in ["a.md", "b.md"] {
            match rx.blocking_recv() {
                Some(Message::Run(Task::UpsertFile { path })) => assert_eq!(path, expected),
                _ => panic!("expected upsert for {}", expected),
            }
            rx.task_done();
        }
        assert_eq!(queue.state(), IndexState::Idle);
    }

    #[test]
    fn test_stopped_queue_rejects_tasks() {
        let (queue, mut rx) = TaskQueue::new();
        rx.mark_stopped();
        assert_eq!(queue.state(), IndexState::Stopped);
        assert!(matches!(
            queue.enqueue(Task::CollectGarbage),
            Err(EngineError::WorkerStopped)
        ));
    }

    #[tokio::test]
    async fn test_wait_for_idle_resolves_after_drain() {
        let (queue, mut rx) = TaskQueue::new();
        queue.enqueue(Task::CollectGarbage).unwrap();

        let worker = std::thread::spawn(move || {
            while let Some(Message::Run(_)) = rx.blocking_recv() {
                rx.task_done();
            }
        });

        queue.wait_for_idle().await.unwrap();
        assert_eq!(queue.state(), IndexState::Idle);
        queue.wake_for_shutdown();
        worker.join().unwrap();
    }
}
