//! Bulk-parallel batch execution on a fixed, dependency-aware worker pool.
//!
//! This crate executes *batches*: logical units of work subdivided into N
//! independent sub-task units (indices `0..N`) that a fixed pool of worker
//! threads runs concurrently by invoking a caller-supplied [`job::Job`] once
//! per unit. It:
//! - Assigns every batch a monotonically increasing [`types::BatchId`] in
//!   submission order, even under concurrent submission.
//! - Accepts asynchronous submissions gated on earlier batches: a batch is
//!   dispatched only after every batch it depends on has fully completed.
//! - Tracks completion as a contiguous prefix of batch ids, so dependency
//!   satisfaction and the barrier stay correct regardless of the order in
//!   which concurrently running batches finish.
//! - Parks idle workers and barrier waiters on condition variables; nothing
//!   spins.
//!
//! Key modules:
//! - `job`: the work-callback capability invoked once per sub-task unit.
//! - `scheduler`: the engine — admission, promotion, dispatch, completion
//!   bookkeeping, and the public `submit`/`run`/`barrier` surface.
//! - `types`: the batch id type and internal aliases.
//!
//! Quick start:
//! 1. Build a pool with `scheduler::Scheduler::new`.
//! 2. Submit work: `scheduler.submit(job, units, &deps)` returns a
//!    `BatchId` immediately; pass earlier ids as `deps` to defer dispatch
//!    until they complete. `scheduler.run(job, units)` is the blocking
//!    no-dependency convenience.
//! 3. Call `scheduler.barrier()` to wait for everything submitted so far;
//!    failures recorded during execution are surfaced there.
//!
//! Units of one batch may run in any order and concurrently, but each index
//! is delivered to the job exactly once. Across batches, no unit of a
//! dependent is ever claimed before the last unit of every dependency has
//! finished.

/// The work-callback capability.
///
/// Defines the [`job::Job`] trait invoked once per `(index, units)` pair,
/// the [`job::JobError`] alias jobs use to signal failure, and a blanket
/// impl so plain closures can serve as jobs.
pub mod job;
/// The batch execution engine.
///
/// Contains the worker pool, the dependency-gated admission queue, the
/// ready queue with its per-batch dispatch cursor, completion/watermark
/// bookkeeping, and the public facade (`submit`, `run`, `barrier`).
pub mod scheduler;
mod sync;
/// Core types used across the crate (batch ids, hashing aliases).
pub mod types;
