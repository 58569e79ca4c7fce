//! Task executor abstraction.
//!
//! The reactor hands CPU work (parsing, file resolution, building the
//! response) to an `Executor` so that the thread running `epoll_wait` never
//! does user-level computation.
//!
//! # Implementors
//!
//! - `FixedPool` (ohttpd-runtime): N OS threads over a bounded lock-free
//!   queue. Simple, predictable.
//! - [`InlineExecutor`] (testing): runs the task in the caller.

/// A unit of work. Workers call back into the connection's parse/build
/// logic and then rearm the descriptor.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// **Contract:**
/// - `submit()` must never block. When the pool cannot take the task
///   it is handed back in `Err` so the caller can decide what to do.
/// - A task runs exactly once.
pub trait Executor: Send + Sync {
    fn submit(&self, task: Task) -> Result<(), Task>;

    /// Workers currently running a task.
    fn active_workers(&self) -> usize;

    fn total_workers(&self) -> usize;

    /// Stop accepting work. Queued tasks may be dropped.
    fn shutdown(&self);
}

/// Runs every task synchronously on the submitting thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn submit(&self, task: Task) -> Result<(), Task> {
        task();
        Ok(())
    }

    fn active_workers(&self) -> usize {
        0
    }

    fn total_workers(&self) -> usize {
        1
    }

    fn shutdown(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_inline_runs_immediately() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        assert!(InlineExecutor
            .submit(Box::new(move || {
                h.fetch_add(1, Ordering::SeqCst);
            }))
            .is_ok());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
