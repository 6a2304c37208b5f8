//! Worker thread pools.
//!
//! The core treats pools as an injected capability: the host builds
//! reader, writer, and bulk-loader pools and passes handles along with
//! each request context; no process-wide statics. A worker thread's pool
//! membership and index are recorded in thread-local storage so
//! assertions and the MVCC layer can ask "what kind of thread am I?".

use crossbeam_channel::{unbounded, Sender};
use parking_lot::{Condvar, Mutex};
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::debug;

/// Which pool a thread belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    Reader,
    Writer,
    Bulk,
}

thread_local! {
    static POOL_KIND: Cell<Option<PoolKind>> = const { Cell::new(None) };
    static POOL_INDEX: Cell<usize> = const { Cell::new(usize::MAX) };
}

/// The calling thread's pool membership, if it is a pool worker.
pub fn current_pool() -> Option<PoolKind> {
    POOL_KIND.with(Cell::get)
}

/// The calling thread's index within its pool.
pub fn current_thread_index() -> Option<usize> {
    let idx = POOL_INDEX.with(Cell::get);
    (idx != usize::MAX).then_some(idx)
}

type Job = Box<dyn FnOnce() + Send + 'static>;

struct PauseGate {
    paused: AtomicBool,
    lock: Mutex<()>,
    resumed: Condvar,
}

/// Fixed-size worker pool fed through a channel.
pub struct WorkerPool {
    kind: PoolKind,
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    gate: Arc<PauseGate>,
}

impl WorkerPool {
    /// Spawn `size` workers (0 means one per CPU core).
    pub fn new(kind: PoolKind, size: usize) -> Self {
        let size = if size == 0 { num_cpus::get() } else { size };
        let (sender, receiver) = unbounded::<Job>();
        let gate = Arc::new(PauseGate {
            paused: AtomicBool::new(false),
            lock: Mutex::new(()),
            resumed: Condvar::new(),
        });

        let workers = (0..size)
            .map(|idx| {
                let receiver = receiver.clone();
                let gate = Arc::clone(&gate);
                std::thread::spawn(move || {
                    POOL_KIND.with(|k| k.set(Some(kind)));
                    POOL_INDEX.with(|i| i.set(idx));
                    while let Ok(job) = receiver.recv() {
                        // hold between jobs while the pool is paused
                        if gate.paused.load(Ordering::Acquire) {
                            let mut guard = gate.lock.lock();
                            while gate.paused.load(Ordering::Acquire) {
                                gate.resumed.wait(&mut guard);
                            }
                        }
                        job();
                    }
                })
            })
            .collect();

        debug!(?kind, size, "worker pool started");
        WorkerPool {
            kind,
            sender: Some(sender),
            workers,
            gate,
        }
    }

    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }

    /// Queue a unit of work.
    pub fn submit<F: FnOnce() + Send + 'static>(&self, job: F) {
        if let Some(sender) = &self.sender {
            // receivers only disappear at shutdown
            let _ = sender.send(Box::new(job));
        }
    }

    /// Stop dispatching after the in-flight jobs finish.
    pub fn pause(&self) {
        self.gate.paused.store(true, Ordering::Release);
    }

    /// Resume dispatching.
    pub fn resume(&self) {
        let _guard = self.gate.lock.lock();
        self.gate.paused.store(false, Ordering::Release);
        self.gate.resumed.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        self.gate.paused.load(Ordering::Acquire)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.resume();
        // closing the channel lets workers drain and exit
        self.sender.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;

    #[test]
    fn test_jobs_run_on_pool_threads() {
        let pool = WorkerPool::new(PoolKind::Reader, 2);
        let (tx, rx) = mpsc::channel();
        pool.submit(move || {
            tx.send((current_pool(), current_thread_index())).ok();
        });
        let (kind, idx) = rx.recv().expect("job ran");
        assert_eq!(kind, Some(PoolKind::Reader));
        assert!(idx.is_some_and(|i| i < 2));
    }

    #[test]
    fn test_all_jobs_complete() {
        let pool = WorkerPool::new(PoolKind::Bulk, 4);
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel();
        for _ in 0..64 {
            let counter = Arc::clone(&counter);
            let tx = tx.clone();
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                tx.send(()).ok();
            });
        }
        for _ in 0..64 {
            rx.recv().expect("job completed");
        }
        assert_eq!(counter.load(Ordering::SeqCst), 64);
    }

    #[test]
    fn test_non_pool_thread_has_no_membership() {
        assert_eq!(current_pool(), None);
        assert_eq!(current_thread_index(), None);
    }
}
