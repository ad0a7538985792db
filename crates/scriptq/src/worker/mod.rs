pub mod cancel;
pub mod job;
pub mod pool;
pub mod runner;

pub use cancel::{CancelHandle, CancelToken};
pub use job::{Execution, QueuedJob};
pub use pool::{WorkerPool, DEFAULT_WORKER_COUNT};
pub use runner::JobRunner;
