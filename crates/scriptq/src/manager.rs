//! The job façade: submission, listing, inspection, cancellation, deletion.

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::broadcast;

use crate::config::Config;
use crate::error::{JobError, Result};
use crate::eval::{Evaluator, ProcessEvaluator};
use crate::events::{JobEvent, JobEventBroadcaster};
use crate::job::{JobDetails, JobRecord, JobStatus, JobSummary, SubmitResponse};
use crate::store::{JobQuery, Registry, SortOrder, StatusCounts, StatusFilter};
use crate::worker::runner::SHUT_DOWN_BEFORE_START;
use crate::worker::{JobRunner, QueuedJob, WorkerPool, DEFAULT_WORKER_COUNT};

const NOT_RUNNING: &str = "not running";
const NO_CANCEL_HANDLE: &str = "not running (no cancellation handle attached)";
const RUNNING_CANNOT_DELETE: &str = "running, cannot be deleted";

/// Sizing of a [`JobManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerConfig {
    pub worker_count: usize,
    pub event_capacity: usize,
}

impl ManagerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            worker_count: config.worker_count,
            event_capacity: config.events.capacity,
        }
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            event_capacity: 256,
        }
    }
}

pub struct JobManager {
    registry: Arc<Registry>,
    runner: Arc<JobRunner>,
    pool: WorkerPool,
    events: JobEventBroadcaster,
}

impl JobManager {
    /// Creates a manager with the default pool size.
    pub fn new(evaluator: Arc<dyn Evaluator>) -> Result<Self> {
        Self::with_config(evaluator, ManagerConfig::default())
    }

    /// # Panics
    /// Panics if `config.worker_count` or `config.event_capacity` is 0.
    pub fn with_config(evaluator: Arc<dyn Evaluator>, config: ManagerConfig) -> Result<Self> {
        let registry = Arc::new(Registry::new());
        let events = JobEventBroadcaster::new(config.event_capacity);
        let runner = Arc::new(JobRunner::new(
            Arc::clone(&registry),
            evaluator,
            events.clone(),
        ));
        let pool = WorkerPool::new(Arc::clone(&runner), config.worker_count)?;

        Ok(Self {
            registry,
            runner,
            pool,
            events,
        })
    }

    /// Builds a manager that evaluates through the configured interpreter.
    pub fn from_config(config: &Config) -> Result<Self> {
        crate::config::loader::validate_config(config)?;
        let evaluator = ProcessEvaluator::from_config(&config.evaluator);
        info!(
            "Using interpreter '{}' with {} workers",
            evaluator.program(),
            config.worker_count
        );
        Self::with_config(Arc::new(evaluator), ManagerConfig::from_config(config))
    }

    /// Submits source text for execution.
    ///
    /// Blocking submissions run on the calling thread and return the terminal
    /// result. Non-blocking submissions return at once with status QUEUED.
    /// Failures are reported through the returned status, never as `Err`.
    pub fn submit(&self, source: impl Into<String>, blocking: bool) -> SubmitResponse {
        let mut record = JobRecord::new(source);
        let id = record.id().to_string();

        // Inline jobs enter the registry already PROCESSING, so no other
        // caller ever observes them as QUEUED.
        let initial = if blocking {
            if let Err(e) = record.start(None) {
                return failed_submit(id, e);
            }
            JobStatus::Processing
        } else {
            JobStatus::Queued
        };
        let source = record.shared_source();

        if let Err(e) = self.registry.insert(record) {
            return failed_submit(id, e);
        }
        self.events.status_changed(&id, initial);

        if blocking {
            debug!("Running job {} inline", id);
            return self.runner.run_inline(&id, &source);
        }

        match self.pool.submit(QueuedJob::new(&id)) {
            Ok(()) => {
                debug!("Job {} queued for the worker pool", id);
                SubmitResponse::queued(&id)
            }
            Err(e) => {
                warn!("Worker pool refused job {}: {}", id, e);
                self.runner.fail_queued(&id, &e.to_string())
            }
        }
    }

    pub fn list(&self, sort: SortOrder, filter: StatusFilter) -> Vec<JobSummary> {
        JobQuery::new(sort, filter).apply(self.registry.snapshot())
    }

    pub fn get(&self, id: &str) -> std::result::Result<JobDetails, JobError> {
        self.registry.get(id).map(|job| job.to_details())
    }

    /// Requests cancellation of a running asynchronous job.
    ///
    /// Succeeding only means the request was delivered: the job may still
    /// finish normally before the evaluator observes it.
    pub fn cancel(&self, id: &str) -> std::result::Result<(), JobError> {
        self.registry.update(id, |job| {
            if job.status() != JobStatus::Processing {
                return Err(JobError::conflict(id, NOT_RUNNING));
            }
            match job.cancel_handle() {
                Some(handle) if handle.cancel() => Ok(()),
                _ => Err(JobError::invalid_state(id, NO_CANCEL_HANDLE)),
            }
        })?;

        info!("Cancellation requested for job {}", id);
        Ok(())
    }

    /// Removes a job that is not running, together with its output.
    pub fn delete(&self, id: &str) -> std::result::Result<(), JobError> {
        let removed = self.registry.remove_if(id, |job| {
            if job.is_running() {
                Err(JobError::conflict(id, RUNNING_CANNOT_DELETE))
            } else {
                Ok(())
            }
        })?;

        info!("Deleted job {} ({})", id, removed.status());
        self.events.send(JobEvent::removed(id, removed.status()));
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    pub fn counts(&self) -> StatusCounts {
        self.registry.counts()
    }

    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }

    /// Stops the pool: running jobs are asked to cancel, workers are joined
    /// and jobs that never started are finished as ERROR.
    pub fn shutdown(self) {
        // Close the runner before sampling running jobs so that a job already
        // taken off the queue is either visible below or never started.
        self.runner.close();
        self.pool.shutdown();

        for id in self.registry.running_ids() {
            if let Err(e) = self.cancel(&id) {
                debug!("Job {} not cancelled during shutdown: {}", id, e);
            }
        }

        self.pool.wait();

        for job in self.registry.snapshot() {
            if job.status() == JobStatus::Queued {
                self.runner.fail_queued(job.id(), SHUT_DOWN_BEFORE_START);
            }
        }

        info!("Job manager stopped");
    }
}

fn failed_submit(id: String, e: JobError) -> SubmitResponse {
    warn!("Failed to register job {}: {}", id, e);
    SubmitResponse {
        id,
        status: JobStatus::Error,
        output: None,
        error: Some(e.to_string()),
    }
}
