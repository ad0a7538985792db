use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use log::{debug, error, info, warn};
use tracing::info_span;

use crate::error::JobError;
use crate::eval::{Evaluator, Outcome};
use crate::events::JobEventBroadcaster;
use crate::job::{JobStatus, SubmitResponse};
use crate::store::Registry;
use crate::worker::cancel::CancelToken;
use crate::worker::job::{Execution, QueuedJob};

/// Error text for jobs still queued when the pool stops.
pub const SHUT_DOWN_BEFORE_START: &str = "Worker pool shut down before the job started";

/// Drives a single job from PROCESSING to its terminal status.
///
/// Shared by the worker threads and by blocking submissions, which run on
/// the caller's thread.
pub struct JobRunner {
    registry: Arc<Registry>,
    evaluator: Arc<dyn Evaluator>,
    events: JobEventBroadcaster,
    closed: AtomicBool,
}

impl JobRunner {
    pub fn new(
        registry: Arc<Registry>,
        evaluator: Arc<dyn Evaluator>,
        events: JobEventBroadcaster,
    ) -> Self {
        Self {
            registry,
            evaluator,
            events,
            closed: AtomicBool::new(false),
        }
    }

    /// Stops dispatching queued jobs. A job taken off the queue after this
    /// call is finished as ERROR instead of started.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Runs an already started job on the current thread. No cancellation
    /// handle is attached, so the job cannot be stopped.
    pub fn run_inline(&self, id: &str, source: &str) -> SubmitResponse {
        let token = CancelToken::new();
        let execution = self.execute(id, source, &token, "inline");
        self.complete(id, execution)
    }

    /// Runs a job taken off the pool queue.
    pub fn run_queued(&self, job: QueuedJob) {
        let token = CancelToken::new();
        // The closed flag is read under the registry lock: a shutdown that
        // samples running jobs afterwards either sees this job PROCESSING or
        // this dispatch sees the flag.
        let dispatched = self.registry.update(&job.id, |record| {
            if self.is_closed() {
                return Ok(None);
            }
            record.start(Some(token.handle()))?;
            Ok(Some(record.shared_source()))
        });
        let source = match dispatched {
            Ok(Some(source)) => source,
            Ok(None) => {
                debug!("Job {} dequeued after shutdown, not starting it", job.id);
                self.fail_queued(&job.id, SHUT_DOWN_BEFORE_START);
                return;
            }
            Err(JobError::NotFound { .. }) => {
                debug!("Job {} was deleted before dispatch, skipping", job.id);
                return;
            }
            Err(e) => {
                warn!("Job {} could not be dispatched: {}", job.id, e);
                return;
            }
        };
        debug!(
            "Job {} dispatched after waiting {:?}",
            job.id,
            job.enqueued_at.elapsed()
        );
        self.events.status_changed(&job.id, JobStatus::Processing);

        let execution = self.execute(&job.id, &source, &token, "worker");
        self.complete(&job.id, execution);
        // `token` drops here, which turns any leftover handle inert.
    }

    /// Finishes a job that never started (QUEUED → ERROR).
    pub fn fail_queued(&self, id: &str, message: &str) -> SubmitResponse {
        let execution = Execution {
            status: JobStatus::Error,
            output: String::new(),
            error: Some(message.to_string()),
        };
        self.complete(id, execution)
    }

    fn execute(&self, id: &str, source: &str, token: &CancelToken, mode: &str) -> Execution {
        let _span = info_span!("job", job_id = %id, mode = mode).entered();

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.evaluator
                .evaluate(source, &mut stdout, &mut stderr, token)
        }));

        let stderr = String::from_utf8_lossy(&stderr).into_owned();
        let (status, error) = match result {
            Ok(Ok(Outcome::Success)) => (JobStatus::Completed, non_empty(stderr)),
            Ok(Ok(Outcome::Failure(message))) => {
                (JobStatus::Error, Some(with_stderr(&stderr, message)))
            }
            Ok(Ok(Outcome::Interrupted(message))) => (JobStatus::Stopped, Some(message)),
            Ok(Err(e)) => {
                warn!("Evaluator fault in job {}: {}", id, e);
                (JobStatus::Error, Some(e.to_string()))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("Evaluator panicked in job {}: {}", id, message);
                (JobStatus::Error, Some(format!("Evaluator panicked: {}", message)))
            }
        };

        Execution {
            status,
            output: String::from_utf8_lossy(&stdout).into_owned(),
            error,
        }
    }

    fn complete(&self, id: &str, execution: Execution) -> SubmitResponse {
        let Execution {
            status,
            output,
            error,
        } = execution;
        let finished_at = Utc::now();

        match self
            .registry
            .update(id, move |job| job.finish(status, output, error, finished_at))
        {
            Ok(completion) => {
                info!(
                    "Job {} finished with status {} in {}ms",
                    id, status, completion.duration_ms
                );
                self.events.status_changed(id, status);
                SubmitResponse {
                    id: id.to_string(),
                    status,
                    output: Some(completion.output.clone()),
                    error: completion.error.clone(),
                }
            }
            Err(e) => {
                error!("Failed to record result of job {}: {}", id, e);
                failed_response(id, e.to_string())
            }
        }
    }
}

fn failed_response(id: &str, message: String) -> SubmitResponse {
    SubmitResponse {
        id: id.to_string(),
        status: JobStatus::Error,
        output: None,
        error: Some(message),
    }
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Prefixes the failure message with whatever the script wrote to stderr.
fn with_stderr(stderr: &str, message: String) -> String {
    let stderr = stderr.trim_end();
    if stderr.is_empty() {
        message
    } else {
        format!("{}\n{}", stderr, message)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::testing::ScriptedEvaluator;
    use crate::job::JobRecord;

    fn setup() -> (Arc<Registry>, JobRunner) {
        let registry = Arc::new(Registry::new());
        let runner = JobRunner::new(
            Arc::clone(&registry),
            Arc::new(ScriptedEvaluator),
            JobEventBroadcaster::new(16),
        );
        (registry, runner)
    }

    fn insert(registry: &Registry, source: &str) -> String {
        let record = JobRecord::new(source);
        let id = record.id().to_string();
        registry.insert(record).unwrap();
        id
    }

    /// Registers a started job the way a blocking submission does and runs it.
    fn inline(
        registry: &Registry,
        runner: &JobRunner,
        source: &str,
    ) -> (String, SubmitResponse) {
        let mut record = JobRecord::new(source);
        record.start(None).unwrap();
        let id = record.id().to_string();
        registry.insert(record).unwrap();
        let response = runner.run_inline(&id, source);
        (id, response)
    }

    #[test]
    fn test_run_inline_success() {
        let (registry, runner) = setup();
        let (id, response) = inline(&registry, &runner, "print hello\nprint world");

        assert_eq!(response.status, JobStatus::Completed);
        assert_eq!(response.output.as_deref(), Some("hello\nworld\n"));
        assert!(response.error.is_none());
        assert_eq!(registry.get(&id).unwrap().status(), JobStatus::Completed);
    }

    #[test]
    fn test_run_inline_keeps_stderr_on_success() {
        let (registry, runner) = setup();
        let (_, response) = inline(&registry, &runner, "warn careful\nprint ok");

        assert_eq!(response.status, JobStatus::Completed);
        assert_eq!(response.error.as_deref(), Some("careful\n"));
    }

    #[test]
    fn test_run_inline_failure() {
        let (registry, runner) = setup();
        let (_, response) = inline(
            &registry,
            &runner,
            "print partial\nthrow ReferenceError: x is not defined",
        );

        assert_eq!(response.status, JobStatus::Error);
        assert_eq!(response.output.as_deref(), Some("partial\n"));
        assert_eq!(
            response.error.as_deref(),
            Some("ReferenceError: x is not defined")
        );
    }

    #[test]
    fn test_failure_message_includes_stderr() {
        let (registry, runner) = setup();
        let (_, response) = inline(&registry, &runner, "warn trace line\nthrow boom");
        assert_eq!(response.error.as_deref(), Some("trace line\nboom"));
    }

    #[test]
    fn test_evaluator_fault_becomes_error() {
        let (registry, runner) = setup();
        let (_, response) = inline(&registry, &runner, "fault engine crashed");

        assert_eq!(response.status, JobStatus::Error);
        assert!(response.error.unwrap().contains("engine crashed"));
    }

    #[test]
    fn test_evaluator_panic_becomes_error() {
        let (registry, runner) = setup();
        let (id, response) = inline(&registry, &runner, "panic kaboom");

        assert_eq!(response.status, JobStatus::Error);
        assert_eq!(
            response.error.as_deref(),
            Some("Evaluator panicked: kaboom")
        );
        assert_eq!(registry.get(&id).unwrap().status(), JobStatus::Error);
    }

    #[test]
    fn test_run_queued_skips_deleted_job() {
        let (registry, runner) = setup();
        runner.run_queued(QueuedJob::new("gone"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_run_queued_clears_handle() {
        let (registry, runner) = setup();
        let id = insert(&registry, "print async");

        runner.run_queued(QueuedJob::new(&id));

        let record = registry.get(&id).unwrap();
        assert_eq!(record.status(), JobStatus::Completed);
        assert!(record.cancel_handle().is_none());
        assert_eq!(record.completion().unwrap().output, "async\n");
    }

    #[test]
    fn test_fail_queued() {
        let (registry, runner) = setup();
        let id = insert(&registry, "print never");

        let response = runner.fail_queued(&id, "Worker pool is shut down");

        assert_eq!(response.status, JobStatus::Error);
        assert_eq!(response.error.as_deref(), Some("Worker pool is shut down"));
        assert_eq!(registry.get(&id).unwrap().status(), JobStatus::Error);
    }

    #[test]
    fn test_closed_runner_fails_dequeued_job() {
        let (registry, runner) = setup();
        let id = insert(&registry, "loop");

        runner.close();
        runner.run_queued(QueuedJob::new(&id));

        let record = registry.get(&id).unwrap();
        assert_eq!(record.status(), JobStatus::Error);
        assert!(record.cancel_handle().is_none());
        assert_eq!(
            record.completion().unwrap().error.as_deref(),
            Some(SHUT_DOWN_BEFORE_START)
        );
    }

    #[test]
    fn test_run_inline_on_missing_job() {
        let (_registry, runner) = setup();
        let response = runner.run_inline("missing", "print x");
        assert_eq!(response.status, JobStatus::Error);
        assert!(response.error.unwrap().contains("not found"));
    }

    #[test]
    fn test_events_emitted() {
        let (registry, runner) = setup();
        let mut rx = runner.events.subscribe();
        let id = insert(&registry, "print hi");

        runner.run_queued(QueuedJob::new(&id));

        assert_eq!(rx.try_recv().unwrap().status, JobStatus::Processing);
        assert_eq!(rx.try_recv().unwrap().status, JobStatus::Completed);
    }
}
