use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info};

use crate::model::BatchJob;
use crate::pipeline::ProgressReporter;

use super::coordinator::BatchCoordinator;
use super::error::BatchError;

/// Outcome of one background batch run.
#[derive(Debug)]
pub struct BatchRunResult {
    pub batch_id: String,
    pub result: Result<BatchJob, String>,
}

/// Ids of batches that are queued or running.
type RunningSet = Arc<Mutex<HashSet<String>>>;

fn lock(running: &RunningSet) -> MutexGuard<'_, HashSet<String>> {
    running.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Runs batches in background threads.
///
/// Each batch is handled by exactly one worker and processed sequentially.
/// A batch id that is already queued or running is refused, so two
/// coordinators never work on the same batch.
pub struct BatchWorkerPool {
    batch_sender: Sender<String>,
    result_receiver: Receiver<BatchRunResult>,
    workers: Vec<JoinHandle<()>>,
    running: RunningSet,
    shutdown: Arc<AtomicBool>,
}

impl BatchWorkerPool {
    /// Starts `worker_count` workers (at least one).
    pub fn new(
        coordinator: Arc<BatchCoordinator>,
        progress: Arc<dyn ProgressReporter>,
        worker_count: usize,
    ) -> Self {
        let worker_count = worker_count.max(1);
        let (batch_sender, batch_receiver) = bounded::<String>(worker_count * 2);
        // Unbounded so a worker never blocks handing back a result while the
        // submitter is blocked on a full queue.
        let (result_sender, result_receiver) = unbounded::<BatchRunResult>();
        let running: RunningSet = Arc::new(Mutex::new(HashSet::new()));
        let shutdown = Arc::new(AtomicBool::new(false));

        let workers = (0..worker_count)
            .map(|worker_id| {
                let worker = Worker {
                    id: worker_id,
                    batch_receiver: batch_receiver.clone(),
                    result_sender: result_sender.clone(),
                    running: Arc::clone(&running),
                    shutdown: Arc::clone(&shutdown),
                    coordinator: Arc::clone(&coordinator),
                    progress: Arc::clone(&progress),
                };
                thread::spawn(move || worker.run())
            })
            .collect();

        info!("Started {} batch workers", worker_count);

        Self {
            batch_sender,
            result_receiver,
            workers,
            running,
            shutdown,
        }
    }

    /// Queues a batch for background processing.
    pub fn submit(&self, batch_id: &str) -> Result<(), BatchError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(BatchError::PoolClosed);
        }

        if !lock(&self.running).insert(batch_id.to_string()) {
            return Err(BatchError::AlreadyRunning(batch_id.to_string()));
        }

        self.batch_sender.send(batch_id.to_string()).map_err(|_| {
            lock(&self.running).remove(batch_id);
            BatchError::PoolClosed
        })
    }

    pub fn is_running(&self, batch_id: &str) -> bool {
        lock(&self.running).contains(batch_id)
    }

    pub fn try_recv_result(&self) -> Option<BatchRunResult> {
        self.result_receiver.try_recv().ok()
    }

    pub fn recv_result(&self) -> Option<BatchRunResult> {
        self.result_receiver.recv().ok()
    }

    /// Stops accepting work. Workers exit after their current batch and
    /// answer every still-queued batch with a `PoolClosed` result.
    pub fn shutdown(&self) {
        info!("Shutting down batch worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Closes the queue and joins every worker once queued batches drain.
    pub fn wait(self) {
        drop(self.batch_sender);
        // Unblock workers waiting to hand over a result nobody will read.
        drop(self.result_receiver);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Batch worker {} panicked: {:?}", i, e);
            } else {
                debug!("Batch worker {} finished", i);
            }
        }

        info!("All batch workers have stopped");
    }
}

struct Worker {
    id: usize,
    batch_receiver: Receiver<String>,
    result_sender: Sender<BatchRunResult>,
    running: RunningSet,
    shutdown: Arc<AtomicBool>,
    coordinator: Arc<BatchCoordinator>,
    progress: Arc<dyn ProgressReporter>,
}

impl Worker {
    fn run(self) {
        debug!("Batch worker {} started", self.id);

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                debug!("Batch worker {} received shutdown signal", self.id);
                self.drain_queue();
                break;
            }

            match self.batch_receiver.recv_timeout(Duration::from_millis(100)) {
                Ok(batch_id) => {
                    debug!("Batch worker {} running batch {}", self.id, batch_id);

                    let result = self
                        .coordinator
                        .run(&batch_id, self.progress.as_ref())
                        .map_err(|e| e.to_string());
                    self.finish(batch_id, result);
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("Batch worker {} queue disconnected", self.id);
                    break;
                }
            }
        }

        debug!("Batch worker {} stopped", self.id);
    }

    /// Answers batches still queued at shutdown so none stays marked running.
    fn drain_queue(&self) {
        while let Ok(batch_id) = self.batch_receiver.try_recv() {
            debug!("Batch worker {} dropping queued batch {}", self.id, batch_id);
            self.finish(batch_id, Err(BatchError::PoolClosed.to_string()));
        }
    }

    fn finish(&self, batch_id: String, result: Result<BatchJob, String>) {
        lock(&self.running).remove(&batch_id);

        if let Err(e) = self.result_sender.send(BatchRunResult { batch_id, result }) {
            debug!("Batch worker {} dropped a result: {}", self.id, e);
        }
    }
}
