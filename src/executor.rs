//! The main execution context.
//!
//! Work that may need a deep stack, such as tearing down a request context
//! (which can release the last reference to a stale routing configuration),
//! is posted here instead of running on the stack of whatever completion
//! triggered it. A dedicated thread with a fixed stack drains the queue.
//! Once that thread has stopped the context is closed and tasks run inline
//! on the posting thread.

use crate::metrics::MAIN_CONTEXT_TASKS;
use crossbeam_channel::{Receiver, Sender};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, trace};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Handle to the main-context queue. Clones share the same queue.
#[derive(Clone)]
pub struct MainContext {
    tx: Sender<Task>,
    rx: Receiver<Task>,
    closed: Arc<AtomicBool>,
}

impl Default for MainContext {
    fn default() -> Self {
        Self::new()
    }
}

impl MainContext {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            tx,
            rx,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Queue `task` to run on the main context, or run it now if the
    /// context has been closed.
    pub fn post<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_closed() {
            task();
            MAIN_CONTEXT_TASKS.increment();
            return;
        }
        // The handle keeps a receiver alive, so the channel cannot be
        // disconnected while `self` exists.
        if let Err(err) = self.tx.send(Box::new(task)) {
            (err.into_inner())();
        }
        // closed between the check and the send: nobody else will drain it
        if self.is_closed() {
            self.run_pending();
        }
    }

    /// Whether the draining thread has stopped.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop queueing. Whatever is still queued runs on the calling thread.
    pub fn close(&self) -> usize {
        self.closed.store(true, Ordering::SeqCst);
        self.run_pending()
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Run every queued task on the calling thread. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task();
            ran += 1;
        }
        if ran > 0 {
            MAIN_CONTEXT_TASKS.add(ran as u64);
        }
        ran
    }

    /// Drain the queue on a dedicated thread until `shutdown` is set, then
    /// close the context.
    pub fn spawn(&self, stack_size: usize, shutdown: Arc<AtomicBool>) -> io::Result<JoinHandle<()>> {
        let context = self.clone();
        std::thread::Builder::new()
            .name("main-context".to_string())
            .stack_size(stack_size)
            .spawn(move || {
                debug!(stack_size, "Main context started");
                while !shutdown.load(Ordering::Relaxed) {
                    match context.rx.recv_timeout(Duration::from_millis(100)) {
                        Ok(task) => {
                            task();
                            MAIN_CONTEXT_TASKS.increment();
                        }
                        Err(_) => continue,
                    }
                }
                let drained = context.close();
                trace!(drained, "Main context stopped");
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_post_defers_until_run() {
        let main = MainContext::new();
        let ran = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let ran = ran.clone();
            main.post(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(main.pending(), 3);
        assert_eq!(main.run_pending(), 3);
        assert_eq!(ran.load(Ordering::SeqCst), 3);
        assert_eq!(main.pending(), 0);
    }

    #[test]
    fn test_spawned_thread_drains() {
        let main = MainContext::new();
        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = main.spawn(64 * 1024, shutdown.clone()).unwrap();

        let (tx, rx) = crossbeam_channel::bounded(1);
        main.post(move || {
            let name = std::thread::current().name().map(str::to_string);
            tx.send(name).unwrap();
        });
        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("main-context"));

        shutdown.store(true, Ordering::SeqCst);
        handle.join().unwrap();
        assert!(main.is_closed());
    }

    #[test]
    fn test_post_after_stop_runs_inline() {
        let main = MainContext::new();
        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = main.spawn(64 * 1024, shutdown.clone()).unwrap();
        shutdown.store(true, Ordering::SeqCst);
        handle.join().unwrap();

        let ran = Arc::new(AtomicUsize::new(0));
        {
            let ran = ran.clone();
            main.post(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(main.pending(), 0);
    }

    #[test]
    fn test_close_drains_queue() {
        let main = MainContext::new();
        let ran = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let ran = ran.clone();
            main.post(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(main.close(), 2);
        assert_eq!(ran.load(Ordering::SeqCst), 2);
        assert!(main.is_closed());
    }
}
