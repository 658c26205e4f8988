//! Fork-join job system for CPU-side engine work
//!
//! A fixed-size worker pool drains a lock-protected queue. `dispatch`
//! splits an N-element range into fixed-size groups; the submitting thread
//! helps drain the queue while waiting instead of blocking on a primitive,
//! which keeps latency low when the pool is contended.
//!
//! Used by the distance-field baker (per-slice voxel sampling, per-mesh
//! bakes) and other short-lived frame work.

#![forbid(unsafe_code)]

use std::collections::VecDeque;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Shared {
    queue: Mutex<VecDeque<Job>>,
    /// Jobs queued or currently running.
    pending: AtomicUsize,
    shutdown: AtomicBool,
}

/// Fixed-size worker pool with fork-join dispatch.
pub struct JobSystem {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl JobSystem {
    /// Pool with an explicit worker count (minimum 1).
    pub fn new(worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            pending: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
        });

        let workers = (0..worker_count)
            .map(|id| {
                let shared = Arc::clone(&shared);
                thread::Builder::new()
                    .name(format!("job-worker-{id}"))
                    .spawn(move || worker_loop(&shared))
                    .expect("spawn job worker")
            })
            .collect();

        log::debug!("job system started with {} workers", worker_count);
        Self { shared, workers }
    }

    /// Pool sized to the machine: `hardware_concurrency - 2`, minimum 1.
    pub fn with_default_threads() -> Self {
        let hw = thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
        Self::new(hw.saturating_sub(2))
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Enqueue a single job.
    pub fn execute(&self, job: impl FnOnce() + Send + 'static) {
        self.shared.pending.fetch_add(1, Ordering::AcqRel);
        self.shared.queue.lock().unwrap().push_back(Box::new(job));
    }

    /// Split `job_count` elements into groups of `group_size` and enqueue
    /// one job per group. `f` receives the index range of its group.
    pub fn dispatch(
        &self,
        job_count: usize,
        group_size: usize,
        f: impl Fn(Range<usize>) + Send + Sync + 'static,
    ) {
        if job_count == 0 {
            return;
        }
        let group_size = group_size.max(1);
        let group_count = job_count.div_ceil(group_size);
        let f = Arc::new(f);

        self.shared.pending.fetch_add(group_count, Ordering::AcqRel);
        let mut queue = self.shared.queue.lock().unwrap();
        for group in 0..group_count {
            let start = group * group_size;
            let end = (start + group_size).min(job_count);
            let f = Arc::clone(&f);
            queue.push_back(Box::new(move || f(start..end)));
        }
    }

    /// Run one queued job on the calling thread. Returns false when the
    /// queue was empty.
    pub fn work(&self) -> bool {
        run_one(&self.shared)
    }

    /// True while any job is queued or running.
    pub fn is_busy(&self) -> bool {
        self.shared.pending.load(Ordering::Acquire) > 0
    }

    /// Drain until idle. The calling thread participates instead of
    /// blocking, so short dispatches finish without a wakeup round-trip.
    pub fn wait(&self) {
        while self.is_busy() {
            if !self.work() {
                // Queue empty but jobs still running on workers.
                thread::yield_now();
            }
        }
    }
}

impl Drop for JobSystem {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn run_one(shared: &Shared) -> bool {
    let job = shared.queue.lock().unwrap().pop_front();
    match job {
        Some(job) => {
            // A panicking job must not wedge `wait`: the pending count is
            // decremented either way.
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(job));
            shared.pending.fetch_sub(1, Ordering::AcqRel);
            if let Err(payload) = result {
                log::error!("job panicked: {:?}", payload);
            }
            true
        }
        None => false,
    }
}

fn worker_loop(shared: &Shared) {
    while !shared.shutdown.load(Ordering::Acquire) {
        if !run_one(shared) {
            thread::park_timeout(Duration::from_micros(100));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_covers_all_indices() {
        let jobs = JobSystem::new(4);
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        jobs.dispatch(1000, 64, move |range| {
            c.fetch_add(range.len(), Ordering::Relaxed);
        });
        jobs.wait();
        assert_eq!(counter.load(Ordering::Relaxed), 1000);
        assert!(!jobs.is_busy());
    }

    #[test]
    fn test_dispatch_group_bounds() {
        let jobs = JobSystem::new(2);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        jobs.dispatch(10, 4, move |range| {
            s.lock().unwrap().push((range.start, range.end));
        });
        jobs.wait();
        let mut groups = seen.lock().unwrap().clone();
        groups.sort();
        assert_eq!(groups, vec![(0, 4), (4, 8), (8, 10)]);
    }

    #[test]
    fn test_execute_single_job() {
        let jobs = JobSystem::new(1);
        let flag = Arc::new(AtomicBool::new(false));
        let f = Arc::clone(&flag);
        jobs.execute(move || f.store(true, Ordering::Release));
        jobs.wait();
        assert!(flag.load(Ordering::Acquire));
    }

    #[test]
    fn test_empty_dispatch_is_noop() {
        let jobs = JobSystem::new(1);
        jobs.dispatch(0, 8, |_| panic!("must not run"));
        jobs.wait();
    }

    #[test]
    fn test_default_sizing_minimum_one() {
        let jobs = JobSystem::with_default_threads();
        assert!(jobs.worker_count() >= 1);
    }
}
