//! The evaluator seam.
//!
//! The job core never interprets source text itself. It hands the source,
//! two output sinks and a [`CancelToken`] to an [`Evaluator`] and records the
//! [`Outcome`].

pub mod process;
#[cfg(test)]
pub(crate) mod testing;

use std::io::Write;

use crate::error::EvaluatorError;
use crate::worker::cancel::CancelToken;

pub use process::ProcessEvaluator;

/// Message used by evaluators when a run ends because of a cancel request.
pub const INTERRUPTED_MESSAGE: &str = "Execution was interrupted";

/// How an evaluation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// The script itself failed (runtime fault, non-zero exit, ...).
    Failure(String),
    /// The run stopped because cancellation was requested.
    Interrupted(String),
}

/// Executes source text.
///
/// Implementations must poll `cancel` at safe points and return
/// [`Outcome::Interrupted`] once it is set. An `Err` means the evaluator
/// itself broke, not that the script failed.
pub trait Evaluator: Send + Sync {
    fn evaluate(
        &self,
        source: &str,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        cancel: &CancelToken,
    ) -> Result<Outcome, EvaluatorError>;
}
