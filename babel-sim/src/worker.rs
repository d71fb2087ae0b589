//! Solver process supervision.
//!
//! A run is one child process. A waiter thread blocks on its exit while one
//! reader thread per output stream forwards every line, classified, through
//! an unbounded channel. The caller drains the channel with
//! [`RunHandle::poll`] and finishes with [`RunHandle::join`], which returns
//! whatever was still queued once the process and readers are done.

use std::io::{BufRead, BufReader, Read};
use std::process::{ExitStatus, Stdio};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::{self, JoinHandle};

use babel_core::{ProgressEvent, SimulationConfig};

use crate::solver::SolverCommand;
use crate::{Error, Result};

/// Verdict of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    Success,
    /// At least one output line carried the error sentinel.
    Failed,
}

/// Everything known once a run has finished.
#[derive(Debug)]
pub struct JoinReport {
    pub outcome: WorkerOutcome,
    pub exit_status: ExitStatus,
    /// Lines that were not returned by an earlier `poll`.
    pub trailing: Vec<ProgressEvent>,
}

/// Launches solver runs.
#[derive(Debug, Clone)]
pub struct SimulationWorker {
    command: SolverCommand,
}

impl SimulationWorker {
    #[must_use]
    pub fn new(command: SolverCommand) -> Self {
        Self { command }
    }

    #[must_use]
    pub fn command(&self) -> &SolverCommand {
        &self.command
    }

    /// Start the solver for `config` and return immediately.
    ///
    /// # Errors
    /// Returns `Spawn` if the process cannot be started.
    pub fn start(&self, config: &SimulationConfig) -> Result<RunHandle> {
        let mut command = self.command.build(config);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        log::debug!("starting solver: {command:?}");
        let mut child = command.spawn().map_err(|source| Error::Spawn {
            program: self.command.program().clone(),
            source,
        })?;

        let (tx, rx) = channel();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader("stdout", stdout, tx.clone())?);
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader("stderr", stderr, tx.clone())?);
        }
        drop(tx);

        let waiter = thread::Builder::new()
            .name("solver-wait".to_string())
            .spawn(move || child.wait())?;

        Ok(RunHandle {
            rx,
            readers,
            waiter,
            failed: false,
        })
    }
}

fn spawn_reader<R: Read + Send + 'static>(
    name: &str,
    stream: R,
    tx: Sender<ProgressEvent>,
) -> Result<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name(format!("solver-{name}"))
        .spawn(move || forward_lines(stream, &tx))?;
    Ok(handle)
}

// Lines are split on '\n'; invalid UTF-8 is replaced rather than dropped.
fn forward_lines<R: Read>(stream: R, tx: &Sender<ProgressEvent>) {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                while matches!(buf.last(), Some(b'\n' | b'\r')) {
                    buf.pop();
                }
                let line = String::from_utf8_lossy(&buf).into_owned();
                if tx.send(ProgressEvent::from_line(line)).is_err() {
                    break;
                }
            }
            Err(e) => {
                log::warn!("solver output stream closed: {e}");
                break;
            }
        }
    }
}

/// A running solver process.
#[derive(Debug)]
pub struct RunHandle {
    rx: Receiver<ProgressEvent>,
    readers: Vec<JoinHandle<()>>,
    waiter: JoinHandle<std::io::Result<ExitStatus>>,
    failed: bool,
}

impl RunHandle {
    /// Drain the lines received so far without blocking.
    pub fn poll(&mut self) -> Vec<ProgressEvent> {
        let events: Vec<ProgressEvent> = self.rx.try_iter().collect();
        self.failed |= events.iter().any(ProgressEvent::is_error);
        events
    }

    /// Returns true while the solver process has not exited.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.waiter.is_finished()
    }

    /// Block until the process exits and all of its output has been read.
    ///
    /// # Errors
    /// Returns an error if waiting on the process fails or a supervising
    /// thread panicked.
    pub fn join(mut self) -> Result<JoinReport> {
        let exit_status = self
            .waiter
            .join()
            .map_err(|_| Error::ThreadPanicked("solver-wait"))??;
        for reader in self.readers {
            reader
                .join()
                .map_err(|_| Error::ThreadPanicked("solver output reader"))?;
        }

        let trailing: Vec<ProgressEvent> = self.rx.try_iter().collect();
        self.failed |= trailing.iter().any(ProgressEvent::is_error);

        let outcome = if self.failed {
            WorkerOutcome::Failed
        } else {
            if !exit_status.success() {
                log::warn!("solver exited with {exit_status} without reporting an error");
            }
            WorkerOutcome::Success
        };

        Ok(JoinReport {
            outcome,
            exit_status,
            trailing,
        })
    }
}
