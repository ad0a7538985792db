use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::JobError;
use crate::job::status::JobStatus;
use crate::job::view::{JobDetails, JobSummary};
use crate::worker::cancel::CancelHandle;

/// Result data written once, at the terminal transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Text the job wrote to standard output.
    pub output: String,
    /// Error message or captured standard error, if any.
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
    /// Milliseconds between submission and the terminal transition.
    pub duration_ms: u64,
}

/// One submission and its evolving state.
///
/// Records are owned by the [`Registry`](crate::store::Registry); everything
/// outside it works on clones. Cloning is cheap: the source and the
/// completion are shared.
#[derive(Debug, Clone)]
pub struct JobRecord {
    id: String,
    source: Arc<str>,
    status: JobStatus,
    submitted_at: DateTime<Utc>,
    completion: Option<Arc<Completion>>,
    cancel_handle: Option<CancelHandle>,
}

impl JobRecord {
    /// Creates a QUEUED record with a fresh id.
    pub fn new(source: impl Into<String>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), source)
    }

    pub(crate) fn with_id(id: String, source: impl Into<String>) -> Self {
        let source: String = source.into();
        Self {
            id,
            source: Arc::from(source),
            status: JobStatus::Queued,
            submitted_at: Utc::now(),
            completion: None,
            cancel_handle: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub(crate) fn shared_source(&self) -> Arc<str> {
        Arc::clone(&self.source)
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    pub fn completion(&self) -> Option<&Completion> {
        self.completion.as_deref()
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.completion.as_ref().map(|c| c.duration_ms)
    }

    pub fn cancel_handle(&self) -> Option<&CancelHandle> {
        self.cancel_handle.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.status == JobStatus::Processing
    }

    /// QUEUED → PROCESSING. Async executions attach their cancellation
    /// handle here; inline executions pass `None`.
    pub(crate) fn start(&mut self, cancel_handle: Option<CancelHandle>) -> Result<(), JobError> {
        self.transition(JobStatus::Processing)?;
        self.cancel_handle = cancel_handle;
        Ok(())
    }

    /// Applies the terminal transition and installs the completion.
    pub(crate) fn finish(
        &mut self,
        status: JobStatus,
        output: String,
        error: Option<String>,
        finished_at: DateTime<Utc>,
    ) -> Result<Arc<Completion>, JobError> {
        if !status.is_terminal() {
            return Err(JobError::InvalidTransition {
                id: self.id.clone(),
                from: self.status,
                to: status,
            });
        }
        self.transition(status)?;

        let duration_ms = (finished_at - self.submitted_at).num_milliseconds().max(0) as u64;
        let completion = Arc::new(Completion {
            output,
            error,
            finished_at,
            duration_ms,
        });
        self.completion = Some(Arc::clone(&completion));
        self.cancel_handle = None;
        Ok(completion)
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), JobError> {
        if !self.status.can_transition_to(next) {
            return Err(JobError::InvalidTransition {
                id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn to_summary(&self) -> JobSummary {
        JobSummary {
            id: self.id.clone(),
            source: self.source.to_string(),
            status: self.status,
            duration_ms: self.duration_ms(),
        }
    }

    pub fn to_details(&self) -> JobDetails {
        let (output, error) = match self.completion() {
            Some(c) => (Some(c.output.clone()), c.error.clone()),
            None => (None, None),
        };
        JobDetails {
            id: self.id.clone(),
            source: self.source.to_string(),
            status: self.status,
            output,
            error,
            submitted_at: self.submitted_at,
            duration_ms: self.duration_ms(),
        }
    }
}
