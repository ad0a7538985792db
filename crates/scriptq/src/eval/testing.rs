//! Line-oriented evaluator shared by the unit and integration tests.
//!
//! Only `super` paths are used here, so the integration tests can compile
//! this file against the public API.
//!
//! Each line of the source is one directive:
//! `print <text>`, `warn <text>`, `sleep <ms>`, `loop`, `throw <msg>`,
//! `fault <msg>` and `panic <msg>`.

use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};

use super::{CancelToken, Evaluator, EvaluatorError, Outcome, INTERRUPTED_MESSAGE};

const TICK: Duration = Duration::from_millis(2);

pub struct ScriptedEvaluator;

impl ScriptedEvaluator {
    fn wait(cancel: &CancelToken, limit: Option<Duration>) -> bool {
        let started = Instant::now();
        loop {
            if cancel.is_cancelled() {
                return false;
            }
            if let Some(limit) = limit {
                if started.elapsed() >= limit {
                    return true;
                }
            }
            thread::sleep(TICK);
        }
    }
}

impl Evaluator for ScriptedEvaluator {
    fn evaluate(
        &self,
        source: &str,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        cancel: &CancelToken,
    ) -> Result<Outcome, EvaluatorError> {
        for line in source.lines() {
            let (op, arg) = line.trim().split_once(' ').unwrap_or((line.trim(), ""));
            match op {
                "" => {}
                "print" => writeln!(stdout, "{}", arg)?,
                "warn" => writeln!(stderr, "{}", arg)?,
                "sleep" => {
                    let ms = arg.parse().unwrap_or(0);
                    if !Self::wait(cancel, Some(Duration::from_millis(ms))) {
                        return Ok(Outcome::Interrupted(INTERRUPTED_MESSAGE.into()));
                    }
                }
                "loop" => {
                    Self::wait(cancel, None);
                    return Ok(Outcome::Interrupted(INTERRUPTED_MESSAGE.into()));
                }
                "throw" => return Ok(Outcome::Failure(arg.to_string())),
                "fault" => return Err(EvaluatorError::Fault(arg.to_string())),
                "panic" => panic!("{}", arg),
                other => return Ok(Outcome::Failure(format!("unknown directive '{}'", other))),
            }
        }
        Ok(Outcome::Success)
    }
}
