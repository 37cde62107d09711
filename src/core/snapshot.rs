//! Copy-on-publish shared state

use parking_lot::RwLock;
use std::sync::Arc;

/// Single-writer cell whose readers always get a complete value.
///
/// The writer builds a new value and swaps it in; readers clone the `Arc`
/// and never block the writer for longer than the swap.
pub struct SnapshotCell<T> {
    inner: RwLock<Arc<T>>,
}

impl<T> SnapshotCell<T> {
    /// Create a cell holding `value`
    pub fn new(value: T) -> Self {
        Self {
            inner: RwLock::new(Arc::new(value)),
        }
    }

    /// Current value
    pub fn load(&self) -> Arc<T> {
        self.inner.read().clone()
    }

    /// Publish a new value
    pub fn store(&self, value: T) {
        self.store_arc(Arc::new(value));
    }

    /// Publish an already shared value
    pub fn store_arc(&self, value: Arc<T>) {
        *self.inner.write() = value;
    }
}

impl<T: Clone> SnapshotCell<T> {
    /// Publish a modified copy of the current value
    pub fn update<F: FnOnce(&mut T)>(&self, f: F) {
        let mut guard = self.inner.write();
        let mut value = T::clone(&guard);
        f(&mut value);
        *guard = Arc::new(value);
    }
}

impl<T: Default> Default for SnapshotCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
