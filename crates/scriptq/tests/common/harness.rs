//! Test harness for isolated job manager tests.

#![allow(dead_code)]

use std::ops::Deref;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use scriptq::{JobDetails, JobManager, JobStatus, ManagerConfig};

use super::evaluator::ScriptedEvaluator;

const WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Owns a `JobManager` backed by the scripted evaluator.
pub struct TestHarness {
    manager: Arc<JobManager>,
}

impl TestHarness {
    /// Create a harness with the default pool size.
    pub fn new() -> Self {
        Self::with_workers(10)
    }

    pub fn with_workers(worker_count: usize) -> Self {
        let manager = JobManager::with_config(
            Arc::new(ScriptedEvaluator),
            ManagerConfig {
                worker_count,
                event_capacity: 1024,
            },
        )
        .expect("Failed to start job manager");
        Self {
            manager: Arc::new(manager),
        }
    }

    /// Shared handle for use from other threads.
    pub fn shared(&self) -> Arc<JobManager> {
        Arc::clone(&self.manager)
    }

    /// Poll until the job's status satisfies `pred`, panicking on timeout.
    pub fn wait_until(&self, id: &str, pred: impl Fn(JobStatus) -> bool) -> JobDetails {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        loop {
            let details = self.manager.get(id).expect("job disappeared while waiting");
            if pred(details.status) {
                return details;
            }
            assert!(
                Instant::now() < deadline,
                "timed out waiting for job {} (last status {})",
                id,
                details.status
            );
            thread::sleep(Duration::from_millis(5));
        }
    }

    pub fn wait_running(&self, id: &str) -> JobDetails {
        self.wait_until(id, |s| s == JobStatus::Processing)
    }

    pub fn wait_terminal(&self, id: &str) -> JobDetails {
        self.wait_until(id, JobStatus::is_terminal)
    }
}

impl Deref for TestHarness {
    type Target = JobManager;

    fn deref(&self) -> &Self::Target {
        &self.manager
    }
}
