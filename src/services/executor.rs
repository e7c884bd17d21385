//! Where blocking fetch work runs.
//!
//! Production hands tasks to the tokio blocking pool; tests use
//! `ManualExecutor` to decide exactly when (and in what order) responses
//! arrive.

use std::collections::VecDeque;
use std::sync::Mutex;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

pub trait TaskExecutor: Send + Sync {
    fn execute(&self, task: Task);
}

impl TaskExecutor for tokio::runtime::Handle {
    fn execute(&self, task: Task) {
        // Fire and forget: results come back over the async bridge
        drop(self.spawn_blocking(task));
    }
}

/// Runs each task immediately on the calling thread
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl TaskExecutor for InlineExecutor {
    fn execute(&self, task: Task) {
        task();
    }
}

/// Queues tasks until the owner runs them
#[derive(Default)]
pub struct ManualExecutor {
    queue: Mutex<VecDeque<Task>>,
}

impl ManualExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Task>> {
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Run the oldest queued task. Returns false if the queue was empty.
    pub fn run_next(&self) -> bool {
        let task = self.lock().pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Run the newest queued task first (out-of-order arrival)
    pub fn run_last(&self) -> bool {
        let task = self.lock().pop_back();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Run everything queued, including tasks queued while running. Returns the count.
    pub fn run_all(&self) -> usize {
        let mut count = 0;
        while self.run_next() {
            count += 1;
        }
        count
    }
}

impl TaskExecutor for ManualExecutor {
    fn execute(&self, task: Task) {
        self.lock().push_back(task);
    }
}
