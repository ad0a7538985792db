//! The crate's line-directive test evaluator, built against the public API.
//!
//! Directives, one per line: `print`, `warn`, `sleep <ms>`, `loop`,
//! `throw`, `fault` and `panic`.

#![allow(dead_code)]

use scriptq::eval::INTERRUPTED_MESSAGE;
use scriptq::{CancelToken, Evaluator, EvaluatorError, Outcome};

#[path = "../../src/eval/testing.rs"]
mod scripted;

pub use scripted::ScriptedEvaluator;
