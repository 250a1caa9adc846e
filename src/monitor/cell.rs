//! Snapshot storage shared between a monitor and its readers.

use std::sync::Arc;

use arc_swap::ArcSwap;

/// Holds the latest snapshot of a monitor's state.
///
/// Writers publish a whole new value; readers get an `Arc` to a complete
/// value. A reader never observes a half-written snapshot and never waits
/// on a writer.
#[derive(Debug)]
pub struct StateCell<T> {
    inner: ArcSwap<T>,
}

impl<T> StateCell<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: ArcSwap::from_pointee(initial),
        }
    }

    /// Current snapshot.
    pub fn load(&self) -> Arc<T> {
        self.inner.load_full()
    }

    /// Publish a new snapshot.
    pub fn store(&self, value: T) {
        self.inner.store(Arc::new(value));
    }

    /// Publish a snapshot derived from the current one.
    ///
    /// `f` may run more than once under contention.
    pub fn update<F>(&self, f: F)
    where
        F: Fn(&T) -> T,
    {
        self.inner.rcu(|current| Arc::new(f(current)));
    }
}

impl<T: Default> Default for StateCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
