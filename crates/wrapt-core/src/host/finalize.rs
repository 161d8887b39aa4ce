use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Callback run once when the owning object is dropped
pub type FinalizeCallback = Box<dyn FnOnce() + Send>;

/// Handle for withdrawing a registered callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FinalizerToken(u64);

/// Finalization callbacks attached to a weak-referenceable object.
///
/// Callbacks run when the owning object is dropped, or earlier through
/// [`Finalizers::run`]. Each registered callback runs at most once.
#[derive(Default)]
pub struct Finalizers {
    callbacks: Mutex<Vec<(FinalizerToken, FinalizeCallback)>>,
    next: AtomicU64,
}

impl Finalizers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, callback: impl FnOnce() + Send + 'static) -> FinalizerToken {
        let token = FinalizerToken(self.next.fetch_add(1, Ordering::Relaxed));
        self.callbacks.lock().push((token, Box::new(callback)));
        token
    }

    /// Drop a pending callback without running it; false when it already ran
    pub fn unregister(&self, token: FinalizerToken) -> bool {
        let mut callbacks = self.callbacks.lock();
        let before = callbacks.len();
        callbacks.retain(|(registered, _)| *registered != token);
        callbacks.len() != before
    }

    /// Number of callbacks still pending
    pub fn pending(&self) -> usize {
        self.callbacks.lock().len()
    }

    /// Run and clear every pending callback
    pub fn run(&self) {
        let callbacks = std::mem::take(&mut *self.callbacks.lock());
        for (_, callback) in callbacks {
            callback();
        }
    }
}

impl Drop for Finalizers {
    fn drop(&mut self) {
        self.run();
    }
}

impl std::fmt::Debug for Finalizers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Finalizers")
            .field("pending", &self.pending())
            .finish()
    }
}
