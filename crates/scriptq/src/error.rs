use std::path::PathBuf;
use thiserror::Error;

use crate::job::JobStatus;

#[derive(Error, Debug)]
pub enum ScriptqError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

/// Caller-visible failures of the job façade.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("Job with id {id} not found")]
    NotFound { id: String },

    #[error("Job {id}: {reason}")]
    Conflict { id: String, reason: String },

    #[error("Job {id}: {reason}")]
    InvalidState { id: String, reason: String },

    #[error("Job {id}: illegal transition from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: JobStatus,
        to: JobStatus,
    },
}

impl JobError {
    pub fn not_found(id: &str) -> Self {
        Self::NotFound { id: id.to_string() }
    }

    pub fn conflict(id: &str, reason: &str) -> Self {
        Self::Conflict {
            id: id.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_state(id: &str, reason: &str) -> Self {
        Self::InvalidState {
            id: id.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid value '{value}' for environment variable {name}")]
    InvalidEnv { name: String, value: String },
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Worker pool is shut down")]
    ChannelClosed,
}

/// Unexpected evaluator faults, as opposed to a script failing normally.
#[derive(Error, Debug)]
pub enum EvaluatorError {
    #[error("Failed to start interpreter '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Evaluator I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Evaluator fault: {0}")]
    Fault(String),
}

pub type Result<T> = std::result::Result<T, ScriptqError>;
