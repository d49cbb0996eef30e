//! Bounded worker pool shared by validation and calibration tasks.
//!
//! Tasks are closures submitted through a channel to a fixed set of worker
//! threads. Each submission returns a [`TaskHandle`] that can be joined, so a
//! caller can barrier-wait on a batch of tasks without owning the workers.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size pool of worker threads.
pub struct WorkerPool {
    jobs: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    submitted: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Spawn `size` workers (at least one).
    pub fn new(size: usize) -> Result<Self> {
        let size = size.max(1);
        let (tx, rx) = unbounded::<Job>();
        let mut workers = Vec::with_capacity(size);
        for idx in 0..size {
            let rx = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("scancal-worker-{idx}"))
                .spawn(move || Self::worker_loop(rx))
                .context("failed to spawn worker thread")?;
            workers.push(handle);
        }
        log::debug!("worker pool started with {size} threads");

        Ok(Self {
            jobs: Some(tx),
            workers,
            submitted: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn worker_loop(jobs: Receiver<Job>) {
        while let Ok(job) = jobs.recv() {
            // A panicking task must not take the worker down with it; the
            // task's handle observes the panic instead.
            let _ = panic::catch_unwind(AssertUnwindSafe(job));
        }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Total number of tasks accepted since the pool was created.
    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }

    /// Submit a task and get a handle to its result.
    pub fn submit<T, F>(&self, task: F) -> Result<TaskHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = bounded(1);
        self.execute(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(task))
                .map_err(|payload| panic_message(payload.as_ref()));
            let _ = tx.send(result);
        })?;
        Ok(TaskHandle { result: rx })
    }

    /// Submit a task whose result is delivered by other means.
    pub fn execute<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let jobs = self
            .jobs
            .as_ref()
            .ok_or_else(|| anyhow!("worker pool is shut down"))?;
        jobs.send(Box::new(task))
            .map_err(|_| anyhow!("worker pool is shut down"))?;
        self.submitted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel lets workers drain queued jobs and exit.
        self.jobs.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

/// Completion handle of a submitted task.
pub struct TaskHandle<T> {
    result: Receiver<std::result::Result<T, String>>,
}

impl<T> TaskHandle<T> {
    /// Block until the task finishes.
    ///
    /// Fails if the task panicked.
    pub fn join(self) -> Result<T> {
        match self.result.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(msg)) => Err(anyhow!("task panicked: {msg}")),
            Err(_) => Err(anyhow!("task was dropped before completing")),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Join every handle, preserving submission order.
pub fn join_all<K, T>(handles: Vec<(K, TaskHandle<T>)>) -> Vec<(K, Result<T>)> {
    handles
        .into_iter()
        .map(|(key, handle)| (key, handle.join()))
        .collect()
}
