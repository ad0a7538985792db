use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{Builder, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, trace};

use crate::error::WorkerError;
use crate::worker::job::QueuedJob;
use crate::worker::runner::JobRunner;

pub const DEFAULT_WORKER_COUNT: usize = 10;

/// How long an idle worker blocks before re-checking the stop flag.
const IDLE_POLL: Duration = Duration::from_millis(100);

struct Worker {
    index: usize,
    thread: JoinHandle<()>,
}

/// Fixed-size pool of worker threads.
///
/// Jobs are handed out in submission order. When every worker is busy,
/// submissions wait in the queue; the pool never rejects for capacity.
pub struct WorkerPool {
    queue: Sender<QueuedJob>,
    workers: Vec<Worker>,
    stopping: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Starts `worker_count` worker threads.
    ///
    /// # Panics
    /// Panics if `worker_count` is 0.
    pub fn new(runner: Arc<JobRunner>, worker_count: usize) -> Result<Self, WorkerError> {
        assert!(worker_count > 0, "worker pool needs at least one worker");
        let (queue, intake) = unbounded::<QueuedJob>();
        let stopping = Arc::new(AtomicBool::new(false));

        let workers = (0..worker_count)
            .map(|index| {
                spawn_worker(
                    index,
                    intake.clone(),
                    Arc::clone(&stopping),
                    Arc::clone(&runner),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!("Worker pool running with {} threads", worker_count);
        Ok(Self {
            queue,
            workers,
            stopping,
        })
    }

    /// Enqueues a job. Fails once [`shutdown`](Self::shutdown) was called.
    pub fn submit(&self, job: QueuedJob) -> Result<(), WorkerError> {
        if self.is_shutdown() {
            return Err(WorkerError::ChannelClosed);
        }
        self.queue.send(job).map_err(|_| WorkerError::ChannelClosed)
    }

    /// Number of jobs waiting for a free worker.
    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stops intake. Workers finish their current job and exit.
    pub fn shutdown(&self) {
        if !self.stopping.swap(true, Ordering::AcqRel) {
            info!("Worker pool stopping");
        }
    }

    /// Joins every worker thread. Call [`shutdown`](Self::shutdown) first,
    /// or close the queue by dropping the pool.
    pub fn wait(self) {
        let Self { queue, workers, .. } = self;
        drop(queue);

        for worker in workers {
            match worker.thread.join() {
                Ok(()) => trace!("Worker {} joined", worker.index),
                Err(e) => error!("Worker {} panicked: {:?}", worker.index, e),
            }
        }
        info!("Worker pool stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }
}

fn spawn_worker(
    index: usize,
    intake: Receiver<QueuedJob>,
    stopping: Arc<AtomicBool>,
    runner: Arc<JobRunner>,
) -> Result<Worker, WorkerError> {
    let thread = Builder::new()
        .name(format!("scriptq-worker-{}", index))
        .spawn(move || dispatch_loop(index, &intake, &stopping, &runner))
        .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;
    Ok(Worker { index, thread })
}

/// Takes jobs off the queue one at a time until the pool stops or the
/// queue is closed.
fn dispatch_loop(
    index: usize,
    intake: &Receiver<QueuedJob>,
    stopping: &AtomicBool,
    runner: &JobRunner,
) {
    trace!("Worker {} ready", index);

    while !stopping.load(Ordering::Acquire) {
        match intake.recv_timeout(IDLE_POLL) {
            Ok(job) => {
                debug!("Worker {} took job {}", index, job.id);
                runner.run_queued(job);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                trace!("Worker {}: queue closed", index);
                return;
            }
        }
    }

    trace!("Worker {} leaving on shutdown", index);
}
