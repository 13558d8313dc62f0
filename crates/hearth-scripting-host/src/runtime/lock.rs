use std::cell::Cell;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

use crate::error::LockTimeout;

/// The runtime's process-wide execution lock.
///
/// At most one thread executes script code at a time. The owning thread may
/// acquire the lock again while holding it; it is released when the outermost
/// guard drops. Clones share the same lock.
#[derive(Clone)]
pub struct ExecutionLock {
    // Nesting depth of the owning thread
    inner: Arc<ReentrantMutex<Cell<usize>>>,
}

impl ExecutionLock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ReentrantMutex::new(Cell::new(0))),
        }
    }

    /// Block until the lock is held by the current thread
    pub fn acquire(&self) -> ExecutionGuard<'_> {
        ExecutionGuard::enter(self.inner.lock())
    }

    /// Acquire the lock, giving up after `timeout` if one is set
    pub fn acquire_timeout(
        &self,
        timeout: Option<Duration>,
    ) -> Result<ExecutionGuard<'_>, LockTimeout> {
        match timeout {
            None => Ok(self.acquire()),
            Some(timeout) => self
                .inner
                .try_lock_for(timeout)
                .map(ExecutionGuard::enter)
                .ok_or(LockTimeout(timeout)),
        }
    }

    /// Whether the calling thread currently holds the lock
    pub fn is_held_by_current_thread(&self) -> bool {
        self.depth() > 0
    }

    /// Nesting depth of the calling thread (0 when it does not hold the lock)
    pub fn depth(&self) -> usize {
        self.inner.try_lock().map_or(0, |depth| depth.get())
    }
}

impl Default for ExecutionLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExecutionLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionLock")
            .field("held_here", &self.is_held_by_current_thread())
            .finish()
    }
}

/// Scoped hold on an [`ExecutionLock`]. Dropping it releases one level of nesting.
pub struct ExecutionGuard<'a> {
    depth: ReentrantMutexGuard<'a, Cell<usize>>,
}

impl<'a> ExecutionGuard<'a> {
    fn enter(depth: ReentrantMutexGuard<'a, Cell<usize>>) -> Self {
        depth.set(depth.get() + 1);
        Self { depth }
    }
}

impl Drop for ExecutionGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get() - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn test_acquisitions_nest() {
        let lock = ExecutionLock::new();
        assert!(!lock.is_held_by_current_thread());

        let outer = lock.acquire();
        assert_eq!(lock.depth(), 1);
        {
            let _inner = lock.acquire();
            assert_eq!(lock.depth(), 2);
        }
        assert_eq!(lock.depth(), 1);
        drop(outer);

        assert!(!lock.is_held_by_current_thread());
    }

    #[test]
    fn test_clones_share_the_lock() {
        let lock = ExecutionLock::new();
        let other = lock.clone();

        let _guard = lock.acquire();
        assert!(other.is_held_by_current_thread());
    }

    #[test]
    fn test_timeout_when_held_elsewhere() {
        let lock = ExecutionLock::new();
        let remote = lock.clone();
        let (held_tx, held_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let holder = thread::spawn(move || {
            let _guard = remote.acquire();
            held_tx.send(()).unwrap();
            release_rx.recv().unwrap();
        });

        held_rx.recv().unwrap();
        assert!(!lock.is_held_by_current_thread());
        let err = lock
            .acquire_timeout(Some(Duration::from_millis(20)))
            .err()
            .expect("lock held by another thread");
        assert_eq!(err, LockTimeout(Duration::from_millis(20)));

        release_tx.send(()).unwrap();
        holder.join().unwrap();

        let guard = lock.acquire_timeout(Some(Duration::from_millis(20)));
        assert!(guard.is_ok());
    }
}
