//! Version counters for detecting in-place modification of saved tensors.

use std::cell::Cell;
use std::rc::Rc;

/// Shared counter bumped by every in-place write to a tracked tensor.
///
/// Saved tensors hold a clone and remember the value at save time; a
/// mismatch at unpack time means the forward value they captured is stale.
#[derive(Debug, Clone, Default)]
pub struct VersionCounter(Rc<Cell<u32>>);

impl VersionCounter {
    /// Start a fresh counter at version 0.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn current(&self) -> u32 {
        self.0.get()
    }

    /// Record one in-place write.
    pub fn bump(&self) {
        self.0.set(self.0.get().wrapping_add(1));
    }

    /// Whether both handles observe the same counter.
    pub fn shares_with(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
