mod state;
mod worker;

/// Errors raised by the scheduler's public operations.
///
/// `SubmitError` covers synchronous usage errors; `BatchError` covers
/// execution failures deferred to the next blocking wait; `RunError` is
/// the union raised by `run`.
pub use self::state::{BatchError, RunError, SubmitError};

use self::state::SchedState;
use crate::{
    job::Job,
    sync::{Condvar, Mutex, MutexGuard, spawn_named, thread},
    types::BatchId,
};
use core::num::NonZeroUsize;
use derive_more::Debug;
use log::{debug, error};
use std::sync::Arc;

/// State shared between the facade and the worker threads.
pub(crate) struct Shared {
    pub(crate) state: Mutex<SchedState>,
    /// Signalled on submission, on watermark advance and on shutdown:
    /// anything that could make a unit claimable or a batch admissible.
    pub(crate) work_ready: Condvar,
    /// Signalled whenever the completed prefix advances.
    pub(crate) all_done: Condvar,
}

/// A dependency-aware bulk-parallel batch executor.
///
/// Owns a fixed pool of worker threads, created up front and kept alive
/// for the scheduler's lifetime; batches never spawn threads of their
/// own. Dropping the scheduler stops the pool: each worker finishes the
/// unit it is executing, claims nothing further, and is joined. Batches
/// still queued at that point are dropped unrun.
#[must_use]
#[derive(Debug)]
pub struct Scheduler {
    #[debug(skip)]
    shared: Arc<Shared>,
    #[debug(skip)]
    workers: Vec<thread::JoinHandle<()>>,
}

impl Scheduler {
    /// Start a scheduler with a fixed pool of `workers` threads.
    ///
    /// A single worker is legal and degrades to sequential, but still
    /// asynchronous, execution.
    pub fn new(workers: NonZeroUsize) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(SchedState::new()),
            work_ready: Condvar::new(),
            all_done: Condvar::new(),
        });
        debug!("starting scheduler with {workers} worker(s)");
        let workers = (0..workers.get())
            .map(|index| {
                let shared = Arc::clone(&shared);
                spawn_named(format!("batchpool-worker-{index}"), move || {
                    worker::run(&shared);
                })
            })
            .collect();
        Self { shared, workers }
    }

    /// Number of worker threads in the pool.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Submit a batch of `units` sub-tasks, gated on the batches in
    /// `after`.
    ///
    /// Returns the new batch's id immediately, without blocking. The
    /// batch is dispatched only once every batch listed in `after` has
    /// fully completed; ids of batches that already finished are legal
    /// and count as satisfied. Safe to call concurrently with itself and
    /// with [`Scheduler::barrier`]; ids reflect submission order even
    /// under concurrent submission.
    ///
    /// # Errors
    /// [`SubmitError::ZeroUnits`] if `units` is zero,
    /// [`SubmitError::UnknownDependency`] if `after` names an id this
    /// scheduler never issued. Execution failures are not reported here;
    /// they surface from the next blocking wait.
    pub fn submit<J>(&self, job: J, units: u32, after: &[BatchId]) -> Result<BatchId, SubmitError>
    where
        J: Job + 'static,
    {
        let id = self.lock_state().submit(Arc::new(job), units, after)?;
        // The new batch may be immediately admissible.
        self.shared.work_ready.notify_all();
        Ok(id)
    }

    /// Execute a batch of `units` sub-tasks and wait for completion.
    ///
    /// Equivalent to [`Scheduler::submit`] with no dependencies followed
    /// by [`Scheduler::barrier`]: returns only after that batch, and
    /// transitively everything submitted before it, has completed.
    ///
    /// # Errors
    /// Usage errors as for `submit`, otherwise the first failure recorded
    /// by the time the wait finishes.
    pub fn run<J>(&self, job: J, units: u32) -> Result<(), RunError>
    where
        J: Job + 'static,
    {
        self.submit(job, units, &[])?;
        self.barrier()?;
        Ok(())
    }

    /// Block until every batch submitted so far has completed.
    ///
    /// The condition is re-checked against the live submission counter,
    /// so batches submitted by other threads while this call waits extend
    /// the wait. The calling thread parks on a condition variable
    /// signalled on every watermark advance; nothing spins.
    ///
    /// # Errors
    /// The first failure recorded since the previous wait; additional
    /// failures from the same interval are logged and discarded.
    pub fn barrier(&self) -> Result<(), BatchError> {
        let mut state = self.lock_state();
        while !state.all_done() {
            state = self
                .shared
                .all_done
                .wait(state)
                .expect("Scheduler::barrier: state lock poisoned");
        }
        match state.take_first_error() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SchedState> {
        self.shared
            .state
            .lock()
            .expect("Scheduler: state lock poisoned")
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        debug!("stopping scheduler");
        self.lock_state().stopping = true;
        self.shared.work_ready.notify_all();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("worker thread panicked");
            }
        }
    }
}
