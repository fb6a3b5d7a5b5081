//! Single-consumer FIFO queue bound to the thread that owns all mutable UI
//! state. Everything that crosses a thread boundary in this crate funnels
//! through here.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;
use std::time::{Duration, Instant};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Cheap clonable posting side of the executor. Handed to workers, the
/// hotkey listener, and anything else that needs to reach the UI thread.
#[derive(Clone)]
pub struct ExecutorHandle {
    tx: Sender<Job>,
}

impl ExecutorHandle {
    /// Enqueue a callable for the owning thread. Never blocks; returns
    /// immediately even from the owning thread itself (no inline execution).
    pub fn post(&self, job: impl FnOnce() + Send + 'static) {
        if self.tx.send(Box::new(job)).is_err() {
            log::debug!("executor dropped, discarding posted callable");
        }
    }

    /// Enqueue a callable after `delay`. The delay elapses on a throwaway
    /// thread so the caller never blocks; delivery goes through the same
    /// FIFO as `post`.
    pub fn post_delayed(&self, delay: Duration, job: impl FnOnce() + Send + 'static) {
        let handle = self.clone();
        thread::spawn(move || {
            thread::sleep(delay);
            handle.post(job);
        });
    }
}

/// The consuming side. Owned and drained by exactly one thread.
pub struct MainThreadExecutor {
    tx: Sender<Job>,
    rx: Receiver<Job>,
}

impl MainThreadExecutor {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn handle(&self) -> ExecutorHandle {
        ExecutorHandle {
            tx: self.tx.clone(),
        }
    }

    /// Convenience for posting from the owning thread.
    pub fn post(&self, job: impl FnOnce() + Send + 'static) {
        self.handle().post(job);
    }

    /// Drain everything queued right now, including jobs enqueued by the
    /// jobs being drained. Returns the number executed.
    pub fn run_pending(&self) -> usize {
        let mut executed = 0;
        while let Ok(job) = self.rx.try_recv() {
            run_job(job);
            executed += 1;
        }
        executed
    }

    /// Block up to `timeout` for work, then drain the backlog. This is the
    /// wait slice of an application drain loop.
    pub fn run_for(&self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut executed = 0;
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            match self.rx.recv_timeout(deadline - now) {
                Ok(job) => {
                    run_job(job);
                    executed += 1;
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        executed
    }
}

impl Default for MainThreadExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// The one place in the crate allowed to catch and swallow an arbitrary
/// failure: a panicking callable must not stop the queue from draining.
fn run_job(job: Job) {
    if catch_unwind(AssertUnwindSafe(job)).is_err() {
        log::error!("posted callable panicked; queue continues draining");
    }
}
