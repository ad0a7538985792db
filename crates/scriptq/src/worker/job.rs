use std::time::Instant;

/// A job waiting in the pool queue.
///
/// Carries only the id: the source and all state live in the registry, so a
/// job deleted while queued is simply skipped at dispatch.
#[derive(Debug, Clone)]
pub struct QueuedJob {
    pub id: String,
    pub enqueued_at: Instant,
}

impl QueuedJob {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            enqueued_at: Instant::now(),
        }
    }
}

/// What an evaluation produced, before it is written to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub status: crate::job::JobStatus,
    pub output: String,
    pub error: Option<String>,
}
