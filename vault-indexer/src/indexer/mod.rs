//! Task queue, the single index worker, and the producers that feed it.

pub mod gc;
pub mod propagation;
pub mod queue;
pub mod task;
pub mod watcher;
pub mod worker;

pub use gc::spawn_gc_timer;
pub use queue::{IndexState, TaskQueue};
pub use task::Task;
pub use watcher::VaultWatcher;
pub use worker::Worker;
