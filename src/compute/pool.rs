//! Fixed-size worker pool for bulk-synchronous batches.

use std::any::Any;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

/// Worker pool errors.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Failed to build worker pool: {0}")]
    Build(#[from] rayon::ThreadPoolBuildError),
    #[error("Worker task {index} failed: {message}")]
    Failed { index: usize, message: String },
    #[error("Worker task {index} panicked: {message}")]
    Panicked { index: usize, message: String },
}

/// A pool of worker threads scoped to one phase.
///
/// Every dispatch blocks until the whole batch has finished; results line up
/// with their inputs by index regardless of completion order.
pub struct WorkerPool {
    pool: ThreadPool,
    workers: usize,
    exits: mpsc::Receiver<usize>,
}

impl WorkerPool {
    /// Build a pool with `workers` threads (0 = one per logical CPU).
    pub fn new(workers: usize) -> Result<Self, WorkerError> {
        let (exit_tx, exits) = mpsc::channel();
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("novelty-worker-{i}"))
            .exit_handler(move |i| {
                let _ = exit_tx.send(i);
            })
            .build()?;
        let workers = pool.current_num_threads();
        log::debug!("Started worker pool with {} threads", workers);

        Ok(Self {
            pool,
            workers,
            exits,
        })
    }

    /// Number of worker threads.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `task` once per input and collect the results in input order.
    ///
    /// The first failing or panicking task aborts the batch with an error.
    pub fn dispatch_all<T, R, E, F>(&self, inputs: &[T], task: F) -> Result<Vec<R>, WorkerError>
    where
        T: Sync,
        R: Send,
        E: Display,
        F: Fn(&T) -> Result<R, E> + Sync,
    {
        self.pool.install(|| {
            inputs
                .par_iter()
                .enumerate()
                .map(|(index, input)| {
                    match panic::catch_unwind(AssertUnwindSafe(|| task(input))) {
                        Ok(Ok(result)) => Ok(result),
                        Ok(Err(e)) => Err(WorkerError::Failed {
                            index,
                            message: e.to_string(),
                        }),
                        Err(payload) => Err(WorkerError::Panicked {
                            index,
                            message: panic_message(payload.as_ref()),
                        }),
                    }
                })
                .collect()
        })
    }

    /// Like [`dispatch_all`](Self::dispatch_all) over `(key, input)` pairs,
    /// returning each result next to its key.
    pub fn dispatch_keyed<K, T, R, E, F>(
        &self,
        inputs: &[(K, T)],
        task: F,
    ) -> Result<Vec<(K, R)>, WorkerError>
    where
        K: Copy + Sync,
        T: Sync,
        R: Send,
        E: Display,
        F: Fn(&T) -> Result<R, E> + Sync,
    {
        let results = self.dispatch_all(inputs, |(_, input)| task(input))?;
        Ok(inputs.iter().map(|(k, _)| *k).zip(results).collect())
    }

    /// Tear down the pool and wait for every worker thread to exit.
    pub fn shutdown(self) {
        let Self {
            pool,
            workers,
            exits,
        } = self;
        drop(pool);

        let mut joined = 0;
        while joined < workers && exits.recv().is_ok() {
            joined += 1;
        }
        log::debug!("Joined {}/{} pool workers", joined, workers);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
