//! Callback List Module
//!
//! Ordered callback queues with replace/append/clear registration semantics.

use std::sync::Arc;

// == Callback List ==
/// An ordered queue of shared callbacks.
///
/// The owner guards the list with its own lock; `snapshot` clones the queue
/// so callbacks can be invoked after that lock is released, which lets a
/// callback safely re-enter the table.
pub(crate) struct CallbackList<F: ?Sized> {
    callbacks: Vec<Arc<F>>,
}

impl<F: ?Sized> CallbackList<F> {
    /// Creates an empty callback list.
    pub(crate) fn new() -> Self {
        Self {
            callbacks: Vec::new(),
        }
    }

    /// Replaces the whole queue with a single callback.
    pub(crate) fn set(&mut self, f: Arc<F>) {
        self.callbacks.clear();
        self.callbacks.push(f);
    }

    /// Appends a callback, keeping earlier registrations.
    pub(crate) fn push(&mut self, f: Arc<F>) {
        self.callbacks.push(f);
    }

    /// Empties the queue.
    pub(crate) fn clear(&mut self) {
        self.callbacks.clear();
    }

    /// Clones the queue for invocation outside the owner's lock.
    pub(crate) fn snapshot(&self) -> Vec<Arc<F>> {
        self.callbacks.clone()
    }
}

impl<F: ?Sized> Default for CallbackList<F> {
    fn default() -> Self {
        Self::new()
    }
}
