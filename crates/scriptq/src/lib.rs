pub mod config;
pub mod error;
pub mod eval;
pub mod events;
pub mod job;
pub mod logging;
pub mod manager;
pub mod store;
pub mod worker;

pub use config::{load_config, Config};
pub use error::{ConfigError, EvaluatorError, JobError, Result, ScriptqError, WorkerError};
pub use eval::{Evaluator, Outcome, ProcessEvaluator};
pub use events::{JobEvent, JobEventBroadcaster};
pub use job::{JobDetails, JobStatus, JobSummary, SubmitResponse};
pub use manager::{JobManager, ManagerConfig};
pub use store::{SortOrder, StatusCounts, StatusFilter};
pub use worker::{CancelHandle, CancelToken};
