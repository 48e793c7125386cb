use crate::{
    job::{Job, JobError},
    types::{BatchId, HashMap, HashSet, IndexMap},
};
use core::cmp::Ordering;
use derive_more::Debug;
use log::{trace, warn};
use std::collections::{BinaryHeap, VecDeque};
use std::sync::Arc;
use thiserror::Error;

/// Usage errors, reported synchronously by `submit` and `run`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SubmitError {
    /// A batch must contain at least one sub-task unit.
    #[error("batch must contain at least one sub-task unit")]
    ZeroUnits,
    /// A dependency named a batch id this scheduler never issued.
    #[error("dependency on batch {0}, which was never submitted")]
    UnknownDependency(BatchId),
}

/// Execution failures, recorded by workers and surfaced from the next
/// blocking wait.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BatchError {
    /// The job returned an error for one unit of the batch.
    #[error("unit {index} of batch {batch} failed: {source}")]
    UnitFailed {
        /// The failed batch.
        batch: BatchId,
        /// Index of the unit whose job invocation failed.
        index: u32,
        /// The error the job returned.
        #[source]
        source: JobError,
    },
    /// The job panicked while running one unit of the batch.
    #[error("unit {index} of batch {batch} panicked")]
    UnitPanicked {
        /// The failed batch.
        batch: BatchId,
        /// Index of the unit whose job invocation panicked.
        index: u32,
    },
    /// The batch was refused without running because a dependency failed.
    #[error("batch {batch} refused: dependency {dependency} failed")]
    DependencyFailed {
        /// The refused batch.
        batch: BatchId,
        /// The failed batch it depended on.
        dependency: BatchId,
    },
}

/// Errors surfaced by the blocking `run` entry point.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunError {
    /// The submission was rejected before any unit ran.
    #[error(transparent)]
    Submit(#[from] SubmitError),
    /// A batch failed during execution.
    #[error(transparent)]
    Batch(#[from] BatchError),
}

/// One claimed sub-task unit, executed by a worker with the lock released.
#[must_use]
#[derive(Debug)]
pub(crate) struct Claim {
    pub(crate) batch: BatchId,
    #[debug(skip)]
    pub(crate) job: Arc<dyn Job>,
    pub(crate) index: u32,
    pub(crate) units: u32,
}

/// How a claimed unit ended.
#[must_use]
#[derive(Debug)]
pub(crate) enum UnitOutcome {
    Ok,
    Failed(JobError),
    Panicked,
}

/// Result of a promotion pass.
#[must_use]
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Promoted {
    /// At least one batch entered the ready queue.
    pub(crate) admitted: bool,
    /// The completed prefix advanced (refused batches complete without
    /// dispatching a unit).
    pub(crate) advanced: bool,
}

/// A submitted batch whose dependency gate is not yet known satisfied.
#[must_use]
#[derive(Debug)]
struct WaitingBatch {
    id: BatchId,
    #[debug(skip)]
    job: Arc<dyn Job>,
    units: u32,
    /// Highest dependency id; the batch may not run until every id up to
    /// and including this one has completed. `None` when independent.
    after: Option<BatchId>,
    /// Full dependency list, retained to refuse dependents of failed
    /// batches: the gate alone cannot tell a failed dependency from an
    /// unrelated earlier failure.
    deps: Box<[BatchId]>,
}

impl PartialEq for WaitingBatch {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for WaitingBatch {}

impl PartialOrd for WaitingBatch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WaitingBatch {
    fn cmp(&self, other: &Self) -> Ordering {
        // `BinaryHeap` surfaces the greatest element; the comparison is
        // reversed so the least-gated, then oldest, batch is at the top.
        (other.after, other.id).cmp(&(self.after, self.id))
    }
}

/// A batch eligible for dispatch. The queue head is the dispatch target.
#[must_use]
#[derive(Debug)]
struct ReadyBatch {
    id: BatchId,
    #[debug(skip)]
    job: Arc<dyn Job>,
    /// Dispatch cursor: count of units already claimed by some worker.
    next_unit: u32,
    units: u32,
}

/// Per-promoted-batch completion counters. Created at promotion, removed
/// once the last claimed unit finishes.
#[derive(Debug, Clone, Copy)]
struct Progress {
    done: u32,
    units: u32,
}

/// Every scheduling decision lives here, behind one mutex: admission,
/// promotion, dispatch bookkeeping, completion tracking and failure
/// records. Jobs themselves always run with the lock released.
#[must_use]
#[derive(Debug)]
pub(crate) struct SchedState {
    /// Id for the next submission; equals the count of batches ever
    /// submitted.
    next_id: u64,
    waiting: BinaryHeap<WaitingBatch>,
    ready: VecDeque<ReadyBatch>,
    in_flight: HashMap<BatchId, Progress>,
    /// Every batch with id below this bound has fully completed.
    finished_below: u64,
    /// Finished ids above the contiguous bound, absorbed as it advances.
    finished_ahead: HashSet<u64>,
    /// Ids of failed batches, kept for the scheduler's lifetime so late
    /// dependents are still refused.
    failed: HashSet<BatchId>,
    /// First failure per batch, in recording order.
    errors: IndexMap<BatchId, BatchError>,
    pub(crate) stopping: bool,
}

impl SchedState {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 0,
            waiting: BinaryHeap::new(),
            ready: VecDeque::new(),
            in_flight: HashMap::default(),
            finished_below: 0,
            finished_ahead: HashSet::default(),
            failed: HashSet::default(),
            errors: IndexMap::default(),
            stopping: false,
        }
    }

    /// Assign the next id and park the batch in the admission queue.
    pub(crate) fn submit(
        &mut self,
        job: Arc<dyn Job>,
        units: u32,
        deps: &[BatchId],
    ) -> Result<BatchId, SubmitError> {
        if units == 0 {
            return Err(SubmitError::ZeroUnits);
        }
        if let Some(&dep) = deps.iter().find(|dep| dep.0 >= self.next_id) {
            // A gate on a never-issued id could only close by accident;
            // admitting it would wedge the barrier.
            return Err(SubmitError::UnknownDependency(dep));
        }
        let id = BatchId(self.next_id);
        self.next_id += 1;
        let after = deps.iter().copied().max();
        trace!("submitted batch {id}: {units} unit(s), gated on {after:?}");
        self.waiting.push(WaitingBatch {
            id,
            job,
            units,
            after,
            deps: deps.into(),
        });
        Ok(id)
    }

    fn gate_open(&self, after: Option<BatchId>) -> bool {
        after.is_none_or(|id| id.0 < self.finished_below)
    }

    /// Move every admissible batch from the admission queue to the ready
    /// queue, refusing those with a failed dependency.
    ///
    /// The admission queue is ordered by ascending gate, so this is a
    /// prefix scan: it stops at the first batch whose gate is still
    /// closed. Arrival order does not correlate with gate order, which is
    /// why the scan keys on the gate:
    ///
    ///   submit #0 (no deps)      gate: none
    ///   submit #1 (after #0)     gate: 0
    ///   submit #2 (no deps)      gate: none
    ///
    /// #2 arrives last but must surface before #1; the heap yields
    /// none, none, 0, and the scan never stops short of an admissible
    /// batch that was inserted late.
    pub(crate) fn promote(&mut self) -> Promoted {
        let mut outcome = Promoted::default();
        while let Some(head) = self.waiting.peek() {
            if !self.gate_open(head.after) {
                break;
            }
            let batch = self.waiting.pop().expect("promote: [1]");
            let poisoned = batch
                .deps
                .iter()
                .copied()
                .find(|dep| self.failed.contains(dep));
            if let Some(dependency) = poisoned {
                // Dependents of a failed batch never run; they fail in
                // turn and still count as complete so the barrier
                // terminates.
                warn!("refusing batch {}: dependency {dependency} failed", batch.id);
                self.errors
                    .entry(batch.id)
                    .or_insert(BatchError::DependencyFailed {
                        batch: batch.id,
                        dependency,
                    });
                self.failed.insert(batch.id);
                outcome.advanced |= self.mark_finished(batch.id);
            } else {
                trace!("batch {} ready: {} unit(s)", batch.id, batch.units);
                let prev = self.in_flight.insert(
                    batch.id,
                    Progress {
                        done: 0,
                        units: batch.units,
                    },
                );
                assert!(prev.is_none(), "promote: [2]");
                self.ready.push_back(ReadyBatch {
                    id: batch.id,
                    job: batch.job,
                    next_unit: 0,
                    units: batch.units,
                });
                outcome.admitted = true;
            }
        }
        outcome
    }

    /// Claim the next unclaimed unit of the dispatch target, if any.
    pub(crate) fn claim_unit(&mut self) -> Option<Claim> {
        let head = self.ready.front_mut()?;
        let claim = Claim {
            batch: head.id,
            job: Arc::clone(&head.job),
            index: head.next_unit,
            units: head.units,
        };
        head.next_unit += 1;
        if head.next_unit == head.units {
            // Fully claimed. The completion counters stay behind until
            // the last claimed unit actually finishes.
            self.ready.pop_front();
        }
        Some(claim)
    }

    /// Account one finished unit. Returns `true` when the completed
    /// prefix advanced.
    pub(crate) fn complete_unit(
        &mut self,
        batch: BatchId,
        index: u32,
        outcome: UnitOutcome,
    ) -> bool {
        match outcome {
            UnitOutcome::Ok => {}
            UnitOutcome::Failed(source) => {
                warn!("unit {index} of batch {batch} failed");
                self.errors
                    .entry(batch)
                    .or_insert(BatchError::UnitFailed {
                        batch,
                        index,
                        source,
                    });
                self.failed.insert(batch);
            }
            UnitOutcome::Panicked => {
                warn!("unit {index} of batch {batch} panicked");
                self.errors
                    .entry(batch)
                    .or_insert(BatchError::UnitPanicked { batch, index });
                self.failed.insert(batch);
            }
        }
        let progress = self.in_flight.get_mut(&batch).expect("complete_unit: [1]");
        progress.done += 1;
        assert!(progress.done <= progress.units, "complete_unit: [2]");
        if progress.done == progress.units {
            self.in_flight.remove(&batch);
            trace!("batch {batch} complete");
            self.mark_finished(batch)
        } else {
            false
        }
    }

    /// Record `id` as fully finished and fold it into the contiguous
    /// completed prefix. Returns `true` when the prefix advanced.
    ///
    /// Batches can finish out of id order while several are in flight;
    /// ids ahead of the prefix park in `finished_ahead` until the gap
    /// closes. A dependency gate only counts as open once every id up to
    /// the gate is inside the prefix, so an early finisher can never
    /// release a dependent past a slower, lower-numbered dependency.
    fn mark_finished(&mut self, id: BatchId) -> bool {
        if id.0 == self.finished_below {
            self.finished_below += 1;
            while self.finished_ahead.remove(&self.finished_below) {
                self.finished_below += 1;
            }
            true
        } else {
            let inserted = self.finished_ahead.insert(id.0);
            assert!(inserted, "mark_finished: [1]");
            false
        }
    }

    /// Whether every batch submitted so far has completed.
    pub(crate) fn all_done(&self) -> bool {
        self.finished_below == self.next_id
    }

    /// Pop the first recorded failure; log and drop the rest.
    pub(crate) fn take_first_error(&mut self) -> Option<BatchError> {
        let mut drained = core::mem::take(&mut self.errors);
        let first = drained.shift_remove_index(0).map(|(_, error)| error);
        for (batch, error) in drained {
            warn!("dropping additional failure of batch {batch}: {error}");
        }
        first
    }
}
