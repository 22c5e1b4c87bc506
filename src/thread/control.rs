//! The thread control block (TCB): identity, scheduling state, and the
//! saved CPU frame, co-located at offset 0 of its own kernel-stack page.

extern crate alloc;

use alloc::vec::Vec;

use crate::arch::Arch;
use crate::sync::lock::Lock;
use crate::thread::id::ThreadId;
use crate::time::Tick;

// `wait_on_lock` is a raw pointer rather than a reference because locks
// outlive the borrow checker's view of any single call (they are typically
// `static` or owned by a long-lived collaborator), matching the "back
// reference without ownership" design note for `donors`.

/// Minimum legal priority (the idle thread's priority).
pub const PRI_MIN: u8 = 0;
/// Priority assigned to threads created without an explicit value.
pub const PRI_DEFAULT: u8 = 31;
/// Maximum legal priority.
pub const PRI_MAX: u8 = 63;

/// Capacity of the `name` field, excluding the nul terminator implied by C
/// heritage; here stored as a plain fixed-size byte array.
pub const NAME_CAPACITY: usize = 15;

/// Canary value written at construction and checked on every
/// `thread_current()`, per the stack-overflow detection design.
pub const STACK_CANARY: u32 = 0xC0FF_EE42;

/// One of the four states a thread record can occupy.
///
/// Named to match the data model exactly (`RUNNING`, `READY`, `BLOCKED`,
/// `DYING`) rather than the teacher's four-state `Finished` naming, since
/// `DYING` carries the specific "awaiting deferred page reclaim" meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    Running,
    Ready,
    Blocked,
    Dying,
}

/// Function signature thread entry points must satisfy.
pub type ThreadEntry = fn(arg: *mut u8);

/// Thread control block.
///
/// Lives at offset 0 of a [`crate::mem::ThreadPage`]; the remaining bytes of
/// that page are the thread's kernel stack, growing down from the top. The
/// `ThreadTable` is the sole owner of the backing page; this struct borrows
/// no memory of its own beyond the `donors` vector and (while live) the lock
/// it is blocked on.
pub struct ThreadControl<A: Arch> {
    pub tid: ThreadId,
    pub status: ThreadStatus,
    pub name: [u8; NAME_CAPACITY],
    pub name_len: u8,
    /// Current effective priority (base, raised by any active donation).
    pub priority: u8,
    /// Priority absent donation; the value last set by creation or
    /// `set_priority`.
    pub base_priority: u8,
    /// Absolute tick at which a sleeping thread wakes; meaningful only
    /// while queued on the sleep queue.
    pub wakeup_tick: Tick,
    /// The lock this thread is blocked trying to acquire, if any.
    pub wait_on_lock: Option<*const Lock>,
    /// Threads that have donated priority directly to this one.
    pub donors: Vec<ThreadId>,
    /// Saved register state, restored by `Arch::context_switch`.
    pub saved_frame: A::SavedContext,
    /// Entry point and argument, consumed once by the bootstrap trampoline.
    pub entry: Option<ThreadEntry>,
    pub entry_arg: *mut u8,
    /// Remaining ticks in the current time slice before a forced yield.
    pub ticks_remaining: u32,
    pub magic: u32,
}

// SAFETY: a `ThreadControl` is only ever accessed with interrupts disabled
// (the intr-gate) or while owned exclusively by the thread table; there is
// no concurrent access across real CPUs since the design assumes a single
// core.
unsafe impl<A: Arch> Send for ThreadControl<A> {}

impl<A: Arch> ThreadControl<A> {
    /// Construct a TCB in place. `status` starts `Blocked`; callers
    /// transition to `Ready` via `unblock` once creation completes, per the
    /// creation protocol.
    pub fn new(tid: ThreadId, name: &[u8], priority: u8, entry: ThreadEntry, arg: *mut u8) -> Self {
        let mut name_buf = [0u8; NAME_CAPACITY];
        let len = core::cmp::min(name.len(), NAME_CAPACITY);
        name_buf[..len].copy_from_slice(&name[..len]);

        let priority = priority.clamp(PRI_MIN, PRI_MAX);

        Self {
            tid,
            status: ThreadStatus::Blocked,
            name: name_buf,
            name_len: len as u8,
            priority,
            base_priority: priority,
            wakeup_tick: 0,
            wait_on_lock: None,
            donors: Vec::new(),
            saved_frame: A::SavedContext::default(),
            entry: Some(entry),
            entry_arg: arg,
            ticks_remaining: crate::time::TICKS_PER_TIME_SLICE,
            magic: STACK_CANARY,
        }
    }

    pub fn name(&self) -> &str {
        core::str::from_utf8(&self.name[..self.name_len as usize]).unwrap_or("<invalid>")
    }

    /// Checks the stack canary, panicking (fatal, per the error design) on
    /// mismatch.
    pub fn check_canary(&self) {
        if self.magic != STACK_CANARY {
            crate::errors::stack_overflow(self.tid.index());
        }
    }

    /// Recompute `priority` from `base_priority` and the remaining donors,
    /// per the "recompute, don't patch" design rationale.
    pub fn recompute_effective_priority(&mut self, donor_priority: impl Fn(ThreadId) -> u8) {
        let max_donor = self
            .donors
            .iter()
            .map(|&d| donor_priority(d))
            .max()
            .unwrap_or(PRI_MIN);
        self.priority = core::cmp::max(self.base_priority, max_donor);
    }
}
