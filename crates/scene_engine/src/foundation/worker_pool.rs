//! Worker pool for phase-local parallel work
//!
//! A phase enqueues independent jobs with [`WorkerPool::watch`], keeps the
//! returned [`Watch`] handles and blocks on [`await_all`] before it reads
//! their results. A pool built with zero threads runs every job inline.

use std::panic::{self, AssertUnwindSafe};
use std::thread;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size thread pool fed by a crossbeam channel
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    /// Create a pool with `size` worker threads
    pub fn new(size: usize) -> Self {
        if size == 0 {
            return Self {
                sender: None,
                workers: Vec::new(),
            };
        }

        let (sender, receiver) = unbounded::<Job>();
        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            let receiver = receiver.clone();
            let spawned = thread::Builder::new()
                .name(format!("scene-worker-{id}"))
                .spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        job();
                    }
                });
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => log::error!("Failed to spawn worker {id}: {e}"),
            }
        }

        log::debug!("Worker pool started with {} threads", workers.len());
        if workers.is_empty() {
            return Self {
                sender: None,
                workers,
            };
        }

        Self {
            sender: Some(sender),
            workers,
        }
    }

    /// Number of worker threads (0 means inline execution)
    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }

    /// Enqueue a job and return a handle to its result
    pub fn watch<T, F>(&self, job: F) -> Watch<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let Some(sender) = &self.sender else {
            return Watch::ready(panic::catch_unwind(AssertUnwindSafe(job)).ok());
        };

        let (tx, rx) = bounded(1);
        let wrapped: Job = Box::new(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(job));
            if result.is_err() {
                log::error!("Worker job panicked");
            }
            // The watcher may have been dropped; nothing to report then.
            let _ = tx.send(result.ok());
        });

        match sender.send(wrapped) {
            Ok(()) => Watch {
                inner: WatchInner::Pending(rx),
            },
            Err(e) => {
                log::warn!("Worker pool closed, running job inline");
                (e.into_inner())();
                Watch::from_receiver(rx)
            }
        }
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        let threads = thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        Self::new(threads.saturating_sub(1))
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel ends every worker loop
        self.sender.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::warn!("Worker thread exited with a panic");
            }
        }
    }
}

enum WatchInner<T> {
    Ready(Option<T>),
    Pending(Receiver<Option<T>>),
}

/// Handle to a job submitted with [`WorkerPool::watch`]
pub struct Watch<T> {
    inner: WatchInner<T>,
}

impl<T> Watch<T> {
    fn ready(value: Option<T>) -> Self {
        Self {
            inner: WatchInner::Ready(value),
        }
    }

    fn from_receiver(rx: Receiver<Option<T>>) -> Self {
        Self::ready(rx.try_recv().ok().flatten())
    }

    /// Block until the job finished; `None` when it panicked
    pub fn wait(self) -> Option<T> {
        match self.inner {
            WatchInner::Ready(value) => value,
            WatchInner::Pending(rx) => rx.recv().ok().flatten(),
        }
    }
}

/// Block until every watched job finished, returning the successful results
/// in submission order
pub fn await_all<T>(watches: Vec<Watch<T>>) -> Vec<T> {
    watches.into_iter().filter_map(Watch::wait).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_await_all_keeps_submission_order() {
        let pool = WorkerPool::new(3);
        let watches: Vec<_> = (0..16).map(|i| pool.watch(move || i * 2)).collect();
        let results = await_all(watches);
        assert_eq!(results, (0..16).map(|i| i * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_inline_pool_runs_immediately() {
        let pool = WorkerPool::new(0);
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let watch = pool.watch(move || c.fetch_add(1, Ordering::SeqCst));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(watch.wait(), Some(0));
        assert_eq!(pool.thread_count(), 0);
    }

    #[test]
    fn test_panicking_job_is_dropped_from_results() {
        let pool = WorkerPool::new(2);
        let watches = vec![
            pool.watch(|| 1),
            pool.watch(|| -> i32 { panic!("job failure") }),
            pool.watch(|| 3),
        ];
        assert_eq!(await_all(watches), vec![1, 3]);
    }
}
