/// Error type a job may return for a failed unit.
///
/// Failures are captured by the worker that observed them and re-raised
/// from the next blocking wait (`run` or `barrier`) as a
/// [`crate::scheduler::BatchError::UnitFailed`].
pub type JobError = Box<dyn core::error::Error + Send + Sync + 'static>;

/// A unit of caller-supplied work, invoked once per sub-task of a batch.
///
/// A batch of `units` sub-tasks results in exactly one
/// `run_unit(index, units)` call for every `index` in `0..units`. Distinct
/// workers invoke the same job concurrently with distinct indices, hence
/// the `Send + Sync` bounds; any further side effects are the caller's
/// responsibility.
///
/// Returning an error marks the whole batch as failed: sibling units
/// already dispatched keep running, but batches depending on this one are
/// refused instead of executed, and the failure is reported from the next
/// blocking wait.
pub trait Job: Send + Sync {
    /// Execute one sub-task.
    ///
    /// `index` is this unit's position in `0..units`; `units` is the
    /// batch's total sub-task count, identical for every invocation within
    /// one batch.
    fn run_unit(&self, index: u32, units: u32) -> Result<(), JobError>;
}

impl<F> Job for F
where
    F: Fn(u32, u32) -> Result<(), JobError> + Send + Sync,
{
    fn run_unit(&self, index: u32, units: u32) -> Result<(), JobError> {
        self(index, units)
    }
}
