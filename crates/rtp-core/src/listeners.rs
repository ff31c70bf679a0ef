//! Shared listener registry
//!
//! Every fan-out point in the pipeline (frame bridges, simulcast
//! combiners, incoming streams) keeps a set of reference-counted
//! listeners that can be registered and unregistered while delivery is in
//! flight. The lock is held only long enough to snapshot the set; the
//! actual callbacks run outside it on the delivering thread.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

/// An insertion-ordered set of shared listeners.
pub struct ListenerSet<T: ?Sized> {
    listeners: Mutex<Vec<Arc<T>>>,
}

impl<T: ?Sized> ListenerSet<T> {
    /// Create an empty set.
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Add a listener; re-adding the same listener is a no-op.
    pub fn add(&self, listener: Arc<T>) {
        let mut listeners = self.listeners.lock();
        if listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            return;
        }
        trace!("listener added ({} registered)", listeners.len() + 1);
        listeners.push(listener);
    }

    /// Remove a listener by identity.
    pub fn remove(&self, listener: &Arc<T>) {
        let mut listeners = self.listeners.lock();
        if let Some(index) = listeners.iter().position(|l| Arc::ptr_eq(l, listener)) {
            listeners.remove(index);
            trace!("listener removed ({} registered)", listeners.len());
        }
    }

    /// Snapshot the current listeners in insertion order.
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.listeners.lock().clone()
    }

    /// Drop all listeners.
    pub fn clear(&self) {
        self.listeners.lock().clear();
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl<T: ?Sized> Default for ListenerSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Probe: Send + Sync {}
    struct A;
    impl Probe for A {}

    #[test]
    fn test_add_remove_identity() {
        let set: ListenerSet<dyn Probe> = ListenerSet::new();
        let first: Arc<dyn Probe> = Arc::new(A);
        let second: Arc<dyn Probe> = Arc::new(A);

        set.add(first.clone());
        set.add(first.clone());
        set.add(second.clone());
        assert_eq!(set.len(), 2);

        set.remove(&first);
        assert_eq!(set.len(), 1);
        assert!(Arc::ptr_eq(&set.snapshot()[0], &second));
    }
}
