//! Job lifecycle broadcaster for real-time status streaming.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::job::JobStatus;

/// A single state change of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub job_id: String,
    /// Status after the change (for removals, the status at removal time).
    pub status: JobStatus,
    /// Human-readable description of the change.
    pub message: String,
    /// True when the job was deleted from the registry.
    #[serde(default)]
    pub removed: bool,
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    pub fn status_changed(job_id: &str, status: JobStatus) -> Self {
        let message = match status {
            JobStatus::Queued => "Job queued for execution",
            JobStatus::Processing => "Job started",
            JobStatus::Completed => "Job completed successfully",
            JobStatus::Error => "Job failed",
            JobStatus::Stopped => "Job stopped",
        };
        Self {
            job_id: job_id.to_string(),
            status,
            message: message.to_string(),
            removed: false,
            timestamp: Utc::now(),
        }
    }

    pub fn removed(job_id: &str, status: JobStatus) -> Self {
        Self {
            job_id: job_id.to_string(),
            status,
            message: "Job deleted".to_string(),
            removed: true,
            timestamp: Utc::now(),
        }
    }
}

/// Broadcasts job events to any number of subscribers.
#[derive(Clone)]
pub struct JobEventBroadcaster {
    sender: Arc<broadcast::Sender<JobEvent>>,
}

impl JobEventBroadcaster {
    /// Creates a new broadcaster with the specified channel capacity.
    ///
    /// # Panics
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, event: JobEvent) {
        // Ignore errors - no active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }

    pub fn status_changed(&self, job_id: &str, status: JobStatus) {
        self.send(JobEvent::status_changed(job_id, status));
    }
}

impl Default for JobEventBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}
