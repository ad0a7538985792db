//! Evaluator backed by an external interpreter process.

use std::io::{ErrorKind, Read, Write};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use log::{debug, warn};

use crate::config::EvaluatorConfig;
use crate::error::EvaluatorError;
use crate::eval::{Evaluator, Outcome, INTERRUPTED_MESSAGE};
use crate::worker::cancel::CancelToken;

const READ_CHUNK: usize = 8 * 1024;

enum Chunk {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
}

/// Runs source text through `program args...`, feeding the source on stdin.
///
/// Output is streamed into the sinks while the child runs. Cancellation
/// kills the child; whatever output already arrived is kept.
#[derive(Debug, Clone)]
pub struct ProcessEvaluator {
    program: String,
    args: Vec<String>,
    poll_interval: Duration,
}

impl ProcessEvaluator {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            poll_interval: Duration::from_millis(10),
        }
    }

    pub fn from_config(config: &EvaluatorConfig) -> Self {
        Self::new(config.program.clone())
            .with_args(config.args.clone())
            .with_poll_interval(Duration::from_millis(config.poll_interval_ms))
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_millis(1));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn spawn(&self) -> Result<Child, EvaluatorError> {
        Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| EvaluatorError::Spawn {
                program: self.program.clone(),
                source,
            })
    }
}

impl Evaluator for ProcessEvaluator {
    fn evaluate(
        &self,
        source: &str,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        cancel: &CancelToken,
    ) -> Result<Outcome, EvaluatorError> {
        let mut child = self.spawn()?;
        debug!("Spawned '{}' (pid {})", self.program, child.id());

        let (tx, rx) = unbounded::<Chunk>();
        if let Some(pipe) = child.stdout.take() {
            spawn_reader(pipe, tx.clone(), Chunk::Stdout);
        }
        if let Some(pipe) = child.stderr.take() {
            spawn_reader(pipe, tx.clone(), Chunk::Stderr);
        }
        drop(tx);

        if let Some(mut stdin) = child.stdin.take() {
            let script = source.as_bytes().to_vec();
            thread::spawn(move || {
                // The child may exit without reading all of its input.
                if let Err(e) = stdin.write_all(&script) {
                    if e.kind() != ErrorKind::BrokenPipe {
                        warn!("Failed to write script to interpreter stdin: {}", e);
                    }
                }
            });
        }

        let mut exit_status = None;
        let mut streams_open = true;

        loop {
            if cancel.is_cancelled() {
                kill(&mut child);
                for chunk in rx.try_iter() {
                    write_chunk(chunk, stdout, stderr)?;
                }
                return Ok(Outcome::Interrupted(INTERRUPTED_MESSAGE.to_string()));
            }

            if exit_status.is_none() {
                exit_status = child.try_wait()?;
            }

            if streams_open {
                match rx.recv_timeout(self.poll_interval) {
                    Ok(chunk) => write_chunk(chunk, stdout, stderr)?,
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => streams_open = false,
                }
            } else if exit_status.is_none() {
                thread::sleep(self.poll_interval);
            }

            if let (Some(status), false) = (exit_status, streams_open) {
                stdout.flush()?;
                stderr.flush()?;
                return Ok(if status.success() {
                    Outcome::Success
                } else {
                    Outcome::Failure(format!("Process exited with {}", status))
                });
            }
        }
    }
}

fn spawn_reader<R>(mut pipe: R, tx: Sender<Chunk>, wrap: fn(Vec<u8>) -> Chunk)
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = [0u8; READ_CHUNK];
        loop {
            match pipe.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(wrap(buf[..n].to_vec())).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("Interpreter pipe read failed: {}", e);
                    break;
                }
            }
        }
    });
}

fn write_chunk(
    chunk: Chunk,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<(), EvaluatorError> {
    match chunk {
        Chunk::Stdout(bytes) => stdout.write_all(&bytes)?,
        Chunk::Stderr(bytes) => stderr.write_all(&bytes)?,
    }
    Ok(())
}

fn kill(child: &mut Child) {
    if let Err(e) = child.kill() {
        // Already exited between the last poll and the kill.
        debug!("Failed to kill interpreter (pid {}): {}", child.id(), e);
    }
    if let Err(e) = child.wait() {
        warn!("Failed to reap interpreter (pid {}): {}", child.id(), e);
    }
}
