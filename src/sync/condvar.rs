//! Condition variable: Mesa-style, one private semaphore per waiter.

extern crate alloc;

use alloc::boxed::Box;
use alloc::vec::Vec;
use spin::Mutex;

use crate::sync::semaphore::Semaphore;
use crate::thread::ThreadId;

/// A single waiter's record: a private binary semaphore it alone is woken
/// through. Boxed so its address is stable across `Vec` reallocation —
/// the waiting thread keeps a raw pointer to it after releasing the
/// waiter-list lock.
pub struct CondWaiter {
    pub tid: ThreadId,
    pub semaphore: Box<Semaphore>,
}

pub struct Condvar {
    waiters: Mutex<Vec<CondWaiter>>,
}

impl Condvar {
    pub const fn new() -> Self {
        Self {
            waiters: Mutex::new(Vec::new()),
        }
    }

    pub fn init(&self) {
        self.waiters.lock().clear();
    }

    /// Registers a new private-semaphore waiter for `tid` and returns a
    /// pointer to its semaphore. The caller (`Kernel::cond_wait`) releases
    /// the associated lock, blocks on the returned semaphore, then
    /// re-acquires the lock.
    pub fn register(&self, tid: ThreadId) -> *const Semaphore {
        let semaphore = Box::new(Semaphore::new(0));
        let ptr: *const Semaphore = &*semaphore;
        self.waiters.lock().push(CondWaiter { tid, semaphore });
        ptr
    }

    /// Re-sorts waiters by descending current priority, bumps the front
    /// one's private semaphore, and returns its thread id so the caller can
    /// move its control block out of `Blocked` — this semaphore has no
    /// kernel-level waiter-to-ready wiring of its own, unlike `Lock`'s.
    pub fn signal_one(&self, priority_of: impl Fn(ThreadId) -> u8) -> Option<ThreadId> {
        let mut waiters = self.waiters.lock();
        if waiters.is_empty() {
            return None;
        }
        waiters.sort_by(|a, b| priority_of(b.tid).cmp(&priority_of(a.tid)));
        let front = waiters.remove(0);
        front.semaphore.up(|_| 0);
        Some(front.tid)
    }

    pub fn has_waiters(&self) -> bool {
        !self.waiters.lock().is_empty()
    }
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}
