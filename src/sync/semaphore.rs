//! Counting semaphore with a priority-ordered waiter list.

extern crate alloc;

use alloc::vec::Vec;
use spin::Mutex;

use crate::thread::ThreadId;

/// Counter plus FIFO-at-equal-priority waiter list.
///
/// The waiter list is re-sorted at wake time rather than kept sorted on
/// insert, because a waiter's effective priority can rise or fall due to
/// donation while it sits blocked — `down` inserts in arrival order and
/// `up` re-sorts before popping the highest-priority entry.
pub struct Semaphore {
    inner: Mutex<SemaphoreInner>,
}

struct SemaphoreInner {
    count: u32,
    waiters: Vec<ThreadId>,
}

impl Semaphore {
    pub const fn new(value: u32) -> Self {
        Self {
            inner: Mutex::new(SemaphoreInner {
                count: value,
                waiters: Vec::new(),
            }),
        }
    }

    /// Resets the counter and empties the waiter list.
    pub fn init(&self, value: u32) {
        let mut inner = self.inner.lock();
        inner.count = value;
        inner.waiters.clear();
    }

    /// Registers the caller as a waiter if the counter is zero. Returns
    /// `true` if the caller must block (the scheduler core is responsible
    /// for calling `block()` afterward), `false` if the counter was
    /// decremented immediately.
    pub fn begin_down(&self, waiter: ThreadId) -> bool {
        let mut inner = self.inner.lock();
        if inner.count > 0 {
            inner.count -= 1;
            false
        } else {
            inner.waiters.push(waiter);
            true
        }
    }

    /// Non-blocking attempt: decrements and returns `true` iff the counter
    /// was strictly positive. Safe from interrupt context.
    pub fn try_down(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.count > 0 {
            inner.count -= 1;
            true
        } else {
            false
        }
    }

    /// Re-sorts the waiter list by descending priority (supplied by the
    /// caller, which has access to the thread table) and pops the winner,
    /// or increments the counter if nobody is waiting.
    ///
    /// Returns the thread to `unblock`, if any.
    pub fn up(&self, priority_of: impl Fn(ThreadId) -> u8) -> Option<ThreadId> {
        let mut inner = self.inner.lock();
        if inner.waiters.is_empty() {
            inner.count += 1;
            return None;
        }
        // Stable sort preserves insertion order among equal priorities
        // (FIFO tie-break), matching the ready-queue discipline.
        inner
            .waiters
            .sort_by(|&a, &b| priority_of(b).cmp(&priority_of(a)));
        Some(inner.waiters.remove(0))
    }

    /// True iff no thread is currently waiting on this semaphore.
    pub fn has_waiters(&self) -> bool {
        !self.inner.lock().waiters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_down_succeeds_only_while_positive() {
        let sem = Semaphore::new(1);
        assert!(sem.try_down());
        assert!(!sem.try_down());
    }

    #[test]
    fn begin_down_blocks_when_count_is_zero() {
        let sem = Semaphore::new(0);
        let must_block = sem.begin_down(ThreadId::from_index(1));
        assert!(must_block);
        assert!(sem.has_waiters());
    }

    #[test]
    fn up_wakes_highest_priority_waiter_regardless_of_arrival_order() {
        let sem = Semaphore::new(0);
        sem.begin_down(ThreadId::from_index(1));
        sem.begin_down(ThreadId::from_index(2));
        sem.begin_down(ThreadId::from_index(3));
        let priority = |tid: ThreadId| match tid.index() {
            1 => 10,
            2 => 40,
            3 => 20,
            _ => 0,
        };
        let woken = sem.up(priority).unwrap();
        assert_eq!(woken.index(), 2);
    }

    #[test]
    fn up_with_no_waiters_increments_counter() {
        let sem = Semaphore::new(0);
        assert!(sem.up(|_| 0).is_none());
        assert!(sem.try_down());
    }
}
