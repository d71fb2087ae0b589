//! Cache-aware run orchestration.
//!
//! A run either reuses the bundles already on disk for a configuration or
//! launches the solver, streams its progress to a [`RunObserver`] and loads
//! the bundles it wrote.

use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use babel_core::{CachedRunSummary, ProgressEvent, ResultBundle, SimulationConfig};
use babel_io::ResultStore;

use crate::message::RunMessage;
use crate::solver::SolverCommand;
use crate::worker::{SimulationWorker, WorkerOutcome};
use crate::{Error, Result};

/// Default interval between progress polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Presenter callbacks for a run.
pub trait RunObserver {
    /// Asked when bundles for the configuration already exist. Return true
    /// to reuse them, false to recompute.
    fn confirm_reuse(&mut self, summary: &CachedRunSummary) -> bool;

    /// Called with `true` before the solver starts and `false` once it has
    /// finished, whatever the outcome.
    fn set_busy(&mut self, _busy: bool) {}

    /// One solver output line, in arrival order.
    fn on_progress(&mut self, event: &ProgressEvent);

    /// The solver reported an error. Called at most once per run.
    fn on_solver_failure(&mut self) {}
}

/// The `(full, water)` bundles of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct BundlePair {
    pub full: ResultBundle,
    pub water: ResultBundle,
}

/// Result of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Existing bundles were reused.
    CacheHit(Box<BundlePair>),
    /// The solver ran and its bundles were loaded.
    Computed(Box<BundlePair>),
    /// The solver reported an error; nothing was loaded.
    Error,
}

impl RunOutcome {
    /// Bundles of a successful run.
    #[must_use]
    pub fn bundles(&self) -> Option<&BundlePair> {
        match self {
            Self::CacheHit(pair) | Self::Computed(pair) => Some(pair),
            Self::Error => None,
        }
    }

    #[must_use]
    pub fn into_bundles(self) -> Option<BundlePair> {
        match self {
            Self::CacheHit(pair) | Self::Computed(pair) => Some(*pair),
            Self::Error => None,
        }
    }
}

/// Drives one run at a time: cache check, solver supervision, loading.
#[derive(Debug, Clone)]
pub struct SimulationOrchestrator {
    store: ResultStore,
    worker: SimulationWorker,
    poll_interval: Duration,
}

impl SimulationOrchestrator {
    #[must_use]
    pub fn new(command: SolverCommand) -> Self {
        Self {
            store: ResultStore::new(),
            worker: SimulationWorker::new(command),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Sets the interval between progress polls.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Run a simulation, reusing cached bundles if the observer agrees.
    ///
    /// With `force_recompute` the cache is not consulted.
    ///
    /// # Errors
    /// Returns `Config` if the configuration is invalid (no process is
    /// started), `Spawn` if the solver cannot be launched, and `Store` if
    /// the cached full bundle, reused bundles or freshly written bundles
    /// cannot be loaded.
    pub fn run(
        &self,
        config: &SimulationConfig,
        force_recompute: bool,
        observer: &mut dyn RunObserver,
    ) -> Result<RunOutcome> {
        config.validate()?;

        if !force_recompute && self.store.has_cached_result(config) {
            // Only the full bundle is read to ask; a damaged water file is
            // replaced by the recompute when reuse is declined.
            let summary = self.store.cached_summary(config)?;
            if observer.confirm_reuse(&summary) {
                let (full, water) = self.store.load(config)?;
                log::info!("reusing cached results for {}", config.target_name());
                return Ok(RunOutcome::CacheHit(Box::new(BundlePair { full, water })));
            }
        }

        self.execute(config, observer)
    }

    /// Run the solver unconditionally, reporting progress to `on_progress`.
    ///
    /// # Errors
    /// See [`Self::run`].
    pub fn compute<F>(&self, config: &SimulationConfig, on_progress: F) -> Result<RunOutcome>
    where
        F: FnMut(&ProgressEvent),
    {
        config.validate()?;
        self.execute(config, &mut ProgressOnly(on_progress))
    }

    /// Run [`Self::compute`] on a dedicated thread.
    ///
    /// Progress and the final result arrive as [`RunMessage`]s on the
    /// returned task.
    ///
    /// # Errors
    /// Returns `Io` if the thread cannot be spawned.
    pub fn spawn_compute(&self, config: SimulationConfig) -> Result<RunTask> {
        let (tx, rx) = channel();
        let orchestrator = self.clone();
        let handle = thread::Builder::new()
            .name("babel-run".to_string())
            .spawn(move || {
                // Sends fail only once the receiver is dropped, when nobody
                // is listening any more.
                let progress_tx = tx.clone();
                let result = orchestrator.compute(&config, |event| {
                    let _ = progress_tx.send(RunMessage::Progress(event.clone()));
                });
                let _ = match result {
                    Ok(outcome) => tx.send(RunMessage::Complete(Box::new(outcome))),
                    Err(e) => tx.send(RunMessage::Error(e.to_string())),
                };
            })?;
        Ok(RunTask { rx, handle })
    }

    fn execute(
        &self,
        config: &SimulationConfig,
        observer: &mut dyn RunObserver,
    ) -> Result<RunOutcome> {
        log::info!("starting solver for {}", config.target_name());
        observer.set_busy(true);
        let outcome = self.supervise(config, observer);
        observer.set_busy(false);

        match outcome? {
            WorkerOutcome::Failed => {
                log::error!("solver reported an error for {}", config.target_name());
                observer.on_solver_failure();
                Ok(RunOutcome::Error)
            }
            WorkerOutcome::Success => {
                let (full, water) = self.store.load(config)?;
                log::info!("loaded results for {}", config.target_name());
                Ok(RunOutcome::Computed(Box::new(BundlePair { full, water })))
            }
        }
    }

    fn supervise(
        &self,
        config: &SimulationConfig,
        observer: &mut dyn RunObserver,
    ) -> Result<WorkerOutcome> {
        let mut handle = self.worker.start(config)?;
        loop {
            for event in handle.poll() {
                observer.on_progress(&event);
            }
            if !handle.is_running() {
                break;
            }
            thread::sleep(self.poll_interval);
        }

        let report = handle.join()?;
        for event in &report.trailing {
            observer.on_progress(event);
        }
        log::debug!("solver exited with {}", report.exit_status);
        Ok(report.outcome)
    }
}

struct ProgressOnly<F>(F);

impl<F: FnMut(&ProgressEvent)> RunObserver for ProgressOnly<F> {
    fn confirm_reuse(&mut self, _summary: &CachedRunSummary) -> bool {
        false
    }

    fn on_progress(&mut self, event: &ProgressEvent) {
        (self.0)(event);
    }
}

/// A run executing on a background thread.
#[derive(Debug)]
pub struct RunTask {
    rx: Receiver<RunMessage>,
    handle: JoinHandle<()>,
}

impl RunTask {
    /// Next message, if one is ready.
    ///
    /// `None` means either that nothing is queued yet or that the run thread
    /// has finished and every message was taken. Check [`Self::is_finished`]
    /// to tell the two apart; the last message of a run is always
    /// `Complete` or `Error`.
    pub fn try_recv(&self) -> Option<RunMessage> {
        match self.rx.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Block until the next message; `None` once the run thread is gone.
    pub fn recv(&self) -> Option<RunMessage> {
        self.rx.recv().ok()
    }

    /// Returns true once the run thread has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the run thread and collect the messages not yet received.
    ///
    /// # Errors
    /// Returns `ThreadPanicked` if the run thread panicked.
    pub fn wait(self) -> Result<Vec<RunMessage>> {
        self.handle
            .join()
            .map_err(|_| Error::ThreadPanicked("babel-run"))?;
        Ok(self.rx.try_iter().collect())
    }
}
