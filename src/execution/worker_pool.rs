//! # Submission Worker Pool
//!
//! Bounded pool that runs run set submissions off the request path.
//!
//! `core_pool_size` workers are started up front and share one bounded queue.
//! When the queue is full, extra workers are started up to `max_pool_size`; each
//! runs the job that overflowed and then drains whatever is queued before
//! exiting. When the pool is at its maximum and the queue is still full, the
//! caller runs the job itself, which throttles whoever is submitting.

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::SubmissionConfig;

type Job = BoxFuture<'static, ()>;
type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkerPoolError {
    #[error("Worker pool is shut down")]
    Closed,
}

pub struct SubmissionWorkerPool {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    receiver: SharedReceiver,
    active_workers: Arc<AtomicUsize>,
    max_pool_size: usize,
    core_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl SubmissionWorkerPool {
    /// Start the core workers. Must be called from within a Tokio runtime.
    pub fn new(config: &SubmissionConfig) -> Self {
        let core_pool_size = config.core_pool_size.max(1);
        let max_pool_size = config.max_pool_size.max(core_pool_size);
        let (sender, receiver) = mpsc::channel::<Job>(config.queue_capacity.max(1));
        let receiver: SharedReceiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let active_workers = Arc::new(AtomicUsize::new(core_pool_size));

        let core_handles = (0..core_pool_size)
            .map(|worker_index| {
                tokio::spawn(core_worker(
                    worker_index,
                    Arc::clone(&receiver),
                    Arc::clone(&active_workers),
                ))
            })
            .collect();

        info!(
            core_pool_size,
            max_pool_size,
            queue_capacity = config.queue_capacity,
            "Submission worker pool started"
        );

        Self {
            sender: Mutex::new(Some(sender)),
            receiver,
            active_workers,
            max_pool_size,
            core_handles: Mutex::new(core_handles),
        }
    }

    /// Hand `job` to the pool. Returns once the job is queued or, when the pool
    /// is saturated, once the caller has run it.
    pub async fn execute<F>(&self, job: F) -> Result<(), WorkerPoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let sender = self.sender.lock().clone().ok_or(WorkerPoolError::Closed)?;

        match sender.try_send(job.boxed()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) => {
                if self.reserve_worker() {
                    debug!("Queue full, starting overflow worker");
                    tokio::spawn(overflow_worker(
                        job,
                        Arc::clone(&self.receiver),
                        Arc::clone(&self.active_workers),
                    ));
                } else {
                    debug!("Worker pool saturated, running job on caller");
                    run_job(job).await;
                }
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(WorkerPoolError::Closed),
        }
    }

    pub fn active_workers(&self) -> usize {
        self.active_workers.load(Ordering::SeqCst)
    }

    /// Stop accepting jobs and wait for the core workers to finish what is queued.
    pub async fn shutdown(&self) {
        self.sender.lock().take();
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.core_handles.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Submission worker terminated abnormally");
            }
        }
        info!("Submission worker pool stopped");
    }

    fn reserve_worker(&self) -> bool {
        self.active_workers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |active| {
                (active < self.max_pool_size).then_some(active + 1)
            })
            .is_ok()
    }
}

async fn core_worker(
    worker_index: usize,
    receiver: SharedReceiver,
    active_workers: Arc<AtomicUsize>,
) {
    loop {
        let job = { receiver.lock().await.recv().await };
        match job {
            Some(job) => run_job(job).await,
            None => break,
        }
    }
    active_workers.fetch_sub(1, Ordering::SeqCst);
    debug!(worker_index, "Submission worker exiting");
}

async fn overflow_worker(first: Job, receiver: SharedReceiver, active_workers: Arc<AtomicUsize>) {
    run_job(first).await;
    loop {
        let next = match receiver.try_lock() {
            Ok(mut receiver) => receiver.try_recv().ok(),
            Err(_) => None,
        };
        match next {
            Some(job) => run_job(job).await,
            None => break,
        }
    }
    active_workers.fetch_sub(1, Ordering::SeqCst);
}

async fn run_job(job: Job) {
    if AssertUnwindSafe(job).catch_unwind().await.is_err() {
        error!("Submission job panicked");
    }
}
