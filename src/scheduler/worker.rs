use super::{
    Shared,
    state::{Claim, UnitOutcome},
};
use log::trace;
use std::panic::{self, AssertUnwindSafe};

/// Body of one worker thread.
///
/// Idle: claim a unit from the dispatch target; when the ready queue is
/// empty, promote admissible batches and retry; when nothing is
/// admissible, park on the work condvar. Executing: run the claimed unit
/// with the lock released. A stopping worker finishes its in-flight unit
/// but claims nothing new. A claimed unit is always accounted, whatever
/// its outcome.
pub(super) fn run(shared: &Shared) {
    loop {
        let Some(claim) = next_claim(shared) else {
            return;
        };
        trace!("claimed unit {} of batch {}", claim.index, claim.batch);
        let outcome = execute(&claim);
        let mut state = shared
            .state
            .lock()
            .expect("worker::run: state lock poisoned");
        if state.complete_unit(claim.batch, claim.index, outcome) {
            // The completed prefix moved: gated batches may now be
            // admissible and barrier waiters releasable.
            drop(state);
            shared.work_ready.notify_all();
            shared.all_done.notify_all();
        }
    }
}

/// Block until a unit is claimable or the pool is stopping.
fn next_claim(shared: &Shared) -> Option<Claim> {
    let mut state = shared
        .state
        .lock()
        .expect("worker::next_claim: state lock poisoned");
    loop {
        if state.stopping {
            return None;
        }
        if let Some(claim) = state.claim_unit() {
            return Some(claim);
        }
        let promoted = state.promote();
        if promoted.advanced {
            // Refused batches completed without a single dispatch; the
            // prefix moved even though no unit ran.
            shared.all_done.notify_all();
        }
        if promoted.admitted {
            continue;
        }
        state = shared
            .work_ready
            .wait(state)
            .expect("worker::next_claim: state lock poisoned");
    }
}

fn execute(claim: &Claim) -> UnitOutcome {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        claim.job.run_unit(claim.index, claim.units)
    }));
    match result {
        Ok(Ok(())) => UnitOutcome::Ok,
        Ok(Err(source)) => UnitOutcome::Failed(source),
        // The payload is dropped: a panicking job must not take the
        // worker down with it, or every later barrier would wedge.
        Err(_payload) => UnitOutcome::Panicked,
    }
}
