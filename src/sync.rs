#[cfg(feature = "loom")]
mod imp {
    pub(crate) use loom::{
        sync::{Condvar, Mutex, MutexGuard},
        thread,
    };

    // Loom's `thread` has no `Builder`; worker names only exist in std
    // builds.
    pub(crate) fn spawn_named(
        _name: String,
        f: impl FnOnce() + Send + 'static,
    ) -> thread::JoinHandle<()> {
        thread::spawn(f)
    }
}

#[cfg(not(feature = "loom"))]
mod imp {
    pub(crate) use std::{
        sync::{Condvar, Mutex, MutexGuard},
        thread,
    };

    pub(crate) fn spawn_named(
        name: String,
        f: impl FnOnce() + Send + 'static,
    ) -> thread::JoinHandle<()> {
        thread::Builder::new()
            .name(name)
            .spawn(f)
            .expect("spawn_named: worker thread")
    }
}

pub(crate) use imp::*;
