//! Shared test utilities for scriptq integration tests.
//!
//! This module provides:
//! - `TestHarness` wrapping a `JobManager` with polling helpers
//! - `ScriptedEvaluator`, a tiny line-oriented evaluator
//! - `ConfigBuilder` for writing config files programmatically

pub mod builders;
pub mod evaluator;
pub mod harness;

pub use builders::*;
pub use evaluator::ScriptedEvaluator;
pub use harness::TestHarness;
