#![allow(missing_docs)]
#![cfg(feature = "loom")]

use batchpool::{
    job::JobError,
    scheduler::{BatchError, Scheduler},
};
use loom::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::{num::NonZeroUsize, sync::Arc};

fn workers(count: usize) -> NonZeroUsize {
    NonZeroUsize::new(count).unwrap()
}

#[test]
fn loom_units_delivered_exactly_once() {
    loom::model(|| {
        // One batch of two units on two workers: every interleaving of
        // claim/complete must deliver each index exactly once.
        let scheduler = Scheduler::new(workers(2));
        let counts = Arc::new([AtomicU32::new(0), AtomicU32::new(0)]);
        let seen = Arc::clone(&counts);
        scheduler
            .run(
                move |index: u32, units: u32| -> Result<(), JobError> {
                    assert_eq!(units, 2);
                    seen[index as usize].fetch_add(1, Ordering::Relaxed);
                    Ok(())
                },
                2,
            )
            .unwrap();
        assert_eq!(counts[0].load(Ordering::Relaxed), 1);
        assert_eq!(counts[1].load(Ordering::Relaxed), 1);
    });
}

#[test]
fn loom_dependent_runs_after_dependency() {
    loom::model(|| {
        // a(2) <- b(1) on a single worker; b must observe both of a's
        // units complete no matter how the scheduler interleaves with
        // the submitting thread.
        let scheduler = Scheduler::new(workers(1));
        let a_done = Arc::new(AtomicU32::new(0));

        let done = Arc::clone(&a_done);
        let a = scheduler
            .submit(
                move |_: u32, _: u32| -> Result<(), JobError> {
                    done.fetch_add(1, Ordering::Relaxed);
                    Ok(())
                },
                2,
                &[],
            )
            .unwrap();

        let done = Arc::clone(&a_done);
        scheduler
            .submit(
                move |_: u32, _: u32| -> Result<(), JobError> {
                    assert_eq!(done.load(Ordering::Relaxed), 2);
                    Ok(())
                },
                1,
                &[a],
            )
            .unwrap();

        scheduler.barrier().unwrap();
        assert_eq!(a_done.load(Ordering::Relaxed), 2);
    });
}

#[test]
fn loom_failed_dependency_refuses_dependent() {
    loom::model(|| {
        let scheduler = Scheduler::new(workers(1));
        let a = scheduler
            .submit(
                |_: u32, _: u32| -> Result<(), JobError> { Err("boom".into()) },
                1,
                &[],
            )
            .unwrap();

        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        scheduler
            .submit(
                move |_: u32, _: u32| -> Result<(), JobError> {
                    flag.store(true, Ordering::Relaxed);
                    Ok(())
                },
                1,
                &[a],
            )
            .unwrap();

        match scheduler.barrier() {
            Err(BatchError::UnitFailed { batch, .. }) => assert_eq!(batch, a),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(!ran.load(Ordering::Relaxed));
    });
}
