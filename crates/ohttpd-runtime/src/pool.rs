//! `FixedPool`: the default [`Executor`].
//!
//! Spawns N OS threads at creation. Workers pop boxed tasks from a
//! lock-free bounded queue and run them. A full queue hands the task back
//! to the submitter.
//!
//! No dynamic scaling.

use ohttpd_core::executor::{Executor, Task};
use ohttpd_core::error::Result;
use ohttpd_core::{hdebug, herror};

use crossbeam_queue::ArrayQueue;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, Thread};
use std::time::Duration;

/// Shared state between submitters and workers.
struct PoolInner {
    queue: ArrayQueue<Task>,
    /// Workers currently running a task.
    active: AtomicUsize,
    shutdown: AtomicBool,
    total: usize,
}

pub struct FixedPool {
    inner: Arc<PoolInner>,
    threads: Vec<Thread>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    /// Round-robin cursor for wakeups.
    next: AtomicUsize,
}

impl FixedPool {
    /// Create a pool with `n` workers (clamped to 1..=64).
    ///
    /// `queue_depth`: max pending tasks before `submit` hands them back.
    pub fn new(n: usize, queue_depth: usize) -> Result<Self> {
        let n = n.clamp(1, 64);
        let inner = Arc::new(PoolInner {
            queue: ArrayQueue::new(queue_depth.max(1)),
            active: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
            total: n,
        });

        let mut handles = Vec::with_capacity(n);
        for worker_id in 0..n {
            let shared = Arc::clone(&inner);
            let spawned = thread::Builder::new()
                .name(format!("ohttpd-worker-{}", worker_id))
                .spawn(move || worker_loop(shared));
            match spawned {
                Ok(h) => handles.push(h),
                Err(e) => {
                    herror!("failed to spawn worker {}: {}", worker_id, e);
                    inner.shutdown.store(true, Ordering::SeqCst);
                    return Err(e.into());
                }
            }
        }
        let threads = handles.iter().map(|h| h.thread().clone()).collect();

        Ok(FixedPool {
            inner,
            threads,
            handles: Mutex::new(handles),
            next: AtomicUsize::new(0),
        })
    }

    fn wake_one(&self) {
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.threads.len();
        self.threads[i].unpark();
    }
}

/// Default pool sizing: min(8, nproc/2), at least 2.
pub fn default_workers() -> usize {
    let cpus = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    (cpus / 2).clamp(2, 8)
}

impl Executor for FixedPool {
    fn submit(&self, task: Task) -> std::result::Result<(), Task> {
        if self.inner.shutdown.load(Ordering::Relaxed) {
            return Err(task);
        }
        self.inner.queue.push(task)?;
        self.wake_one();
        Ok(())
    }

    fn active_workers(&self) -> usize {
        self.inner.active.load(Ordering::Relaxed)
    }

    fn total_workers(&self) -> usize {
        self.inner.total
    }

    /// Stop workers, drop queued tasks and join the threads.
    fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        let dropped = std::iter::from_fn(|| self.inner.queue.pop()).count();
        if dropped > 0 {
            hdebug!("dropped {} queued tasks", dropped);
        }
        for t in &self.threads {
            t.unpark();
        }
        let handles = match self.handles.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        let me = thread::current().id();
        for h in handles {
            // Never join ourselves when the last owner is a worker.
            if h.thread().id() != me {
                let _ = h.join();
            }
        }
    }
}

impl Drop for FixedPool {
    fn drop(&mut self) {
        // Workers exit on their next poll. Not joined here: the last
        // reference may be dropped from a worker.
        self.inner.shutdown.store(true, Ordering::SeqCst);
    }
}

fn worker_loop(inner: Arc<PoolInner>) {
    loop {
        if inner.shutdown.load(Ordering::Relaxed) {
            break;
        }

        match inner.queue.pop() {
            Some(task) => {
                inner.active.fetch_add(1, Ordering::Relaxed);
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
                    herror!("task panicked: {}", panic_message(&*payload));
                }
                inner.active.fetch_sub(1, Ordering::Relaxed);
            }
            None => {
                // Submit unparks one worker; the timeout covers a lost wakeup.
                thread::park_timeout(Duration::from_millis(1));
            }
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "<non-string panic>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ohttpd_core::log::{set_log_level, LogLevel};
    use std::sync::mpsc;

    #[test]
    fn test_runs_tasks() {
        set_log_level(LogLevel::Off);
        let pool = FixedPool::new(2, 64).unwrap();
        let (tx, rx) = mpsc::channel();
        for i in 0..10 {
            let tx = tx.clone();
            assert!(pool.submit(Box::new(move || tx.send(i).unwrap())).is_ok());
        }
        let mut got: Vec<i32> = (0..10)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        got.sort();
        assert_eq!(got, (0..10).collect::<Vec<_>>());
        assert_eq!(pool.total_workers(), 2);
        pool.shutdown();
    }

    #[test]
    fn test_full_queue_hands_task_back() {
        set_log_level(LogLevel::Off);
        let pool = FixedPool::new(1, 1).unwrap();
        let (block_tx, block_rx) = mpsc::channel::<()>();
        let (started_tx, started_rx) = mpsc::channel();
        // Occupy the only worker.
        pool.submit(Box::new(move || {
            started_tx.send(()).unwrap();
            let _ = block_rx.recv();
        }))
        .ok()
        .unwrap();
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        assert!(pool.submit(Box::new(|| {})).is_ok());
        let refused = pool.submit(Box::new(|| {}));
        assert!(refused.is_err());

        drop(block_tx);
        pool.shutdown();
    }

    #[test]
    fn test_worker_survives_panicking_task() {
        set_log_level(LogLevel::Off);
        let pool = FixedPool::new(1, 8).unwrap();
        assert!(pool.submit(Box::new(|| panic!("boom"))).is_ok());

        let (tx, rx) = mpsc::channel();
        assert!(pool.submit(Box::new(move || tx.send(42).unwrap())).is_ok());
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
        let mut waited = 0;
        while pool.active_workers() != 0 && waited < 500 {
            thread::sleep(Duration::from_millis(1));
            waited += 1;
        }
        assert_eq!(pool.active_workers(), 0);
        pool.shutdown();
    }

    #[test]
    fn test_panic_message() {
        let p = panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(&*p), "static");
        let p = panic::catch_unwind(|| panic!("fd {}", 3)).unwrap_err();
        assert_eq!(panic_message(&*p), "fd 3");
    }

    #[test]
    fn test_refuses_after_shutdown() {
        set_log_level(LogLevel::Off);
        let pool = FixedPool::new(1, 4).unwrap();
        pool.shutdown();
        assert!(pool.submit(Box::new(|| {})).is_err());
    }

    #[test]
    fn test_default_workers_bounds() {
        let n = default_workers();
        assert!((2..=8).contains(&n));
    }
}
