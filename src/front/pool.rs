//! A bounded worker pool servicing accepted connections.
//!
//! The volume manager's own concurrency comes from the gate (§4.6); this
//! pool only bounds how many OS threads the front-end spends on connection
//! handling, the way the teacher's own build pipeline hands work to
//! threads over a `crossbeam::channel` rather than spawning one thread per
//! unit of work (`build/src/components/build.rs`).

use std::thread::JoinHandle;

use crossbeam::channel::{bounded, Sender};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed set of worker threads pulling closures off a shared channel.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `workers` threads, each blocking on the shared job channel.
    /// `queue_depth` bounds how many accepted-but-not-yet-running jobs may
    /// queue up before `submit` blocks the accept loop.
    pub fn new(workers: usize, queue_depth: usize) -> Self {
        let (sender, receiver) = bounded::<Job>(queue_depth);
        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let receiver = receiver.clone();
            handles.push(
                std::thread::Builder::new()
                    .name(format!("fsv2-worker-{id}"))
                    .spawn(move || {
                        while let Ok(job) = receiver.recv() {
                            job();
                        }
                    })
                    .expect("failed to spawn worker thread"),
            );
        }
        Self {
            sender: Some(sender),
            handles,
        }
    }

    /// Queues `job`, blocking if the pool is saturated.
    pub fn submit<F: FnOnce() + Send + 'static>(&self, job: F) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(Box::new(job));
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Dropping the sender unblocks every worker's `recv`, letting them
        // drain the queue and exit once it's empty.
        self.sender.take();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn runs_submitted_jobs() {
        let pool = WorkerPool::new(4, 16);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..50 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        drop(pool);
        assert_eq!(counter.load(Ordering::SeqCst), 50);
    }
}
