use derive_more::Display;
use indexmap::IndexMap as _IndexMap;
use rustc_hash::FxBuildHasher;
use std::collections::{HashMap as _HashMap, HashSet as _HashSet};

/// Unique identifier of a submitted batch.
///
/// Ids are dense, monotonically increasing integers assigned in submission
/// order and never reused; a smaller id always denotes an earlier
/// submission. Dependency declarations and completion bookkeeping both key
/// on this ordering.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[display("{_0}")]
#[repr(transparent)]
pub struct BatchId(pub(crate) u64);

impl BatchId {
    /// The raw ordinal of this batch (0 for the first submission).
    #[must_use]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

pub(crate) type HashMap<K, V> = _HashMap<K, V, FxBuildHasher>;
pub(crate) type HashSet<T> = _HashSet<T, FxBuildHasher>;
pub(crate) type IndexMap<K, V> = _IndexMap<K, V, FxBuildHasher>;
