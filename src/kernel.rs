//! The scheduler core: thread creation, blocking, the context-switch
//! trampoline, the timebase, and the synchronization primitives that sit
//! on top of it.
//!
//! Every public entry point here either disables interrupts for its own
//! critical section (the intr-gate discipline) or documents why it is safe
//! to call from interrupt context, per the concurrency model: a single CPU
//! means disabling interrupts is the only mutual-exclusion primitive the
//! core needs.

extern crate alloc;

use portable_atomic::{AtomicBool, Ordering};
use spin::Mutex;

use crate::arch::{Arch, InterruptContextGuard};
use crate::errors::{assertion_violation, KernelResult};
use crate::sched::{ReadyQueue, SleepQueue};
use crate::sync::donation;
use crate::sync::{Condvar, Lock, Semaphore};
use crate::thread::control::{ThreadEntry, PRI_DEFAULT, PRI_MIN};
use crate::thread::{ThreadControl, ThreadId, ThreadStatus, ThreadTable};
use crate::time::Tick;

fn idle_entry<A: Arch>(_arg: *mut u8) {
    loop {
        A::enable_interrupts();
        A::wait_for_interrupt();
    }
}

/// Never actually entered: the "main" control block represents code that
/// is already running when [`Kernel::init`] is called, so its `entry`
/// field is a placeholder rather than a real bootstrap target.
fn bootstrap_placeholder<A: Arch>(_arg: *mut u8) {}

/// The scheduler core, generic over the architecture's context-switch and
/// interrupt-gate implementation.
pub struct Kernel<A: Arch> {
    threads: ThreadTable<A>,
    ready: Mutex<ReadyQueue>,
    sleeping: Mutex<SleepQueue>,
    current: Mutex<ThreadId>,
    idle: Mutex<ThreadId>,
    initialized: AtomicBool,
}

impl<A: Arch> Kernel<A> {
    pub fn new() -> Self {
        Self {
            threads: ThreadTable::new(),
            ready: Mutex::new(ReadyQueue::new()),
            sleeping: Mutex::new(SleepQueue::new()),
            current: Mutex::new(ThreadId::ERROR),
            idle: Mutex::new(ThreadId::ERROR),
            initialized: AtomicBool::new(false),
        }
    }

    /// Boots the scheduler: creates the idle thread and a control block
    /// representing the caller's already-running stack, then marks it
    /// current. Must be called exactly once, before any other entry point.
    pub fn init(&self, main_name: &[u8]) -> ThreadId {
        let idle_id = self
            .threads
            .create(b"idle", PRI_MIN, idle_entry::<A>, core::ptr::null_mut())
            .expect("idle thread page allocation must succeed during boot");
        *self.idle.lock() = idle_id;

        let main_id = self
            .threads
            .create(
                main_name,
                PRI_DEFAULT,
                bootstrap_placeholder::<A>,
                core::ptr::null_mut(),
            )
            .expect("main thread page allocation must succeed during boot");
        if let Some(t) = self.threads.get_mut(main_id) {
            t.status = ThreadStatus::Running;
        }
        *self.current.lock() = main_id;
        self.initialized.store(true, Ordering::Release);
        main_id
    }

    fn assert_not_interrupt_context(&self, what: &str) {
        if crate::arch::intr_context() {
            assertion_violation(what);
        }
    }

    // ---- identity -----------------------------------------------------

    pub fn thread_tid(&self) -> ThreadId {
        *self.current.lock()
    }

    pub fn thread_current(&self) -> Option<&ThreadControl<A>> {
        let tid = self.thread_tid();
        let control = self.threads.get(tid)?;
        control.check_canary();
        Some(control)
    }

    pub fn thread_name(&self) -> alloc::string::String {
        self.thread_current()
            .map(|t| alloc::string::String::from(t.name()))
            .unwrap_or_default()
    }

    // ---- creation -------------------------------------------------------

    /// `create(name, priority, entry, arg) -> tid`.
    pub fn create(
        &self,
        name: &[u8],
        priority: u8,
        entry: ThreadEntry,
        arg: *mut u8,
    ) -> KernelResult<ThreadId> {
        let prior = A::disable();
        let created = self.threads.create(name, priority, entry, arg);
        A::set_level(prior);

        let tid = created.map_err(Into::<crate::errors::KernelError>::into)?;
        #[cfg(feature = "trace")]
        crate::pl011_println!("create: {} priority {}", tid.index(), priority);
        self.unblock(tid);
        self.preemption_check();
        Ok(tid)
    }

    // ---- block / unblock / yield / exit --------------------------------

    /// Must be called with interrupts disabled and not from interrupt
    /// context. Marks current `Blocked` and schedules away from it;
    /// returns only once some other thread calls `unblock` on it.
    pub fn block(&self) {
        self.assert_not_interrupt_context("block() called from interrupt context");
        let tid = self.thread_tid();
        if let Some(t) = self.threads.get_mut(tid) {
            t.status = ThreadStatus::Blocked;
        }
        self.schedule();
    }

    /// `t.status` must be `Blocked`. Moves it to `Ready` and inserts it
    /// into the ready queue; does not itself yield.
    pub fn unblock(&self, tid: ThreadId) {
        let prior = A::disable();
        let priority = self.threads.get_mut(tid).map(|t| {
            t.status = ThreadStatus::Ready;
            t.priority
        });
        if let Some(priority) = priority {
            self.ready.lock().insert(tid, priority);
        }
        A::set_level(prior);
    }

    /// If current is not the idle thread, reinserts it into the ready
    /// queue at its priority, then schedules the next thread.
    pub fn thread_yield(&self) {
        self.assert_not_interrupt_context("yield() called from interrupt context");
        let prior = A::disable();
        let tid = self.thread_tid();
        if tid != *self.idle.lock() {
            if let Some(t) = self.threads.get_mut(tid) {
                self.ready.lock().insert(tid, t.priority);
            }
        }
        self.schedule();
        A::set_level(prior);
    }

    /// Terminates the current thread. Never returns.
    pub fn thread_exit(&self) -> ! {
        let prior = A::disable();
        let tid = self.thread_tid();
        if let Some(t) = self.threads.get_mut(tid) {
            t.status = ThreadStatus::Dying;
        }
        self.schedule();
        A::set_level(prior);
        unreachable!("a DYING thread must never be rescheduled");
    }

    /// If the ready queue's front outranks the running thread, yield.
    pub fn preemption_check(&self) {
        if crate::arch::intr_context() {
            // The interrupt-return path performs the yield; see `tick`.
            return;
        }
        let prior = A::disable();
        let should_yield = {
            let ready = self.ready.lock();
            let running_priority = self.thread_current().map(|t| t.priority).unwrap_or(0);
            ready.front_priority().map(|p| p > running_priority).unwrap_or(false)
        };
        A::set_level(prior);
        if should_yield {
            self.thread_yield();
        }
    }

    /// Invoked with interrupts already disabled. Pops the next thread to
    /// run, switches the saved context, and reaps any page whose previous
    /// owner just exited.
    fn schedule(&self) {
        let outgoing = self.thread_tid();
        let incoming = {
            let mut ready = self.ready.lock();
            ready.pop_front().unwrap_or_else(|| *self.idle.lock())
        };

        if incoming == outgoing {
            return;
        }

        #[cfg(feature = "trace")]
        crate::pl011_println!(
            "sched: {} -> {}",
            outgoing.index(),
            incoming.index()
        );

        let outgoing_dying = self
            .threads
            .get(outgoing)
            .map(|t| t.status == ThreadStatus::Dying)
            .unwrap_or(false);

        if let Some(t) = self.threads.get_mut(incoming) {
            t.status = ThreadStatus::Running;
        }

        let mut scratch = A::SavedContext::default();
        let prev_frame: *mut A::SavedContext = if outgoing_dying {
            &mut scratch as *mut A::SavedContext
        } else {
            self.threads
                .get_mut(outgoing)
                .map(|t| &mut t.saved_frame as *mut A::SavedContext)
                .unwrap_or(&mut scratch as *mut A::SavedContext)
        };
        let next_frame: *const A::SavedContext = self
            .threads
            .get(incoming)
            .map(|t| &t.saved_frame as *const A::SavedContext)
            .expect("incoming thread must have a control block");

        if outgoing_dying {
            self.threads.retire(outgoing);
        }

        *self.current.lock() = incoming;

        unsafe {
            A::context_switch(prev_frame, next_frame);
        }

        // Resumes here only once this exact call's thread is switched back
        // in; harmless no-op otherwise since the deferred queue is empty.
        self.threads.reap_deferred();
    }

    // ---- timebase -------------------------------------------------------

    /// `sleep(ticks)`: no-op for `ticks <= 0`. Otherwise records the wake
    /// tick, queues onto the sleep queue in ascending order, and blocks.
    pub fn thread_sleep(&self, ticks: i64) {
        if ticks <= 0 {
            return;
        }
        self.assert_not_interrupt_context("sleep() called from interrupt context");
        let prior = A::disable();
        let tid = self.thread_tid();
        let now = crate::time::GLOBAL_TICKS.now();
        let wakeup_tick = now + ticks as Tick;
        if let Some(t) = self.threads.get_mut(tid) {
            t.wakeup_tick = wakeup_tick;
            t.status = ThreadStatus::Blocked;
        }
        self.sleeping.lock().insert(tid, wakeup_tick);
        self.schedule();
        A::set_level(prior);
    }

    /// Wakes every sleeping thread whose wake tick has elapsed as of `now`.
    /// Callable from interrupt context; exposed separately from `tick` so
    /// collaborators driving their own tick bookkeeping can invoke wakeup
    /// alone.
    pub fn awake(&self, now: Tick) {
        let prior = A::disable();
        let woken = self.sleeping.lock().drain_elapsed(now);
        for tid in woken {
            self.unblock_locked(tid);
        }
        A::set_level(prior);
    }

    /// Called once per timer interrupt with the newly advanced tick value.
    /// Wakes every thread whose wake tick has elapsed, then runs the
    /// preemption check (deferred to the interrupt-return path) and forces
    /// a time-sliced yield once the running thread's quantum is spent.
    pub fn tick(&self, now: Tick) {
        let _guard = InterruptContextGuard::enter();
        self.awake(now);

        let prior = A::disable();
        let time_slice_expired = self
            .threads
            .get_mut(self.thread_tid())
            .map(|t| {
                if t.ticks_remaining > 0 {
                    t.ticks_remaining -= 1;
                }
                t.ticks_remaining == 0
            })
            .unwrap_or(false);

        A::set_level(prior);

        if time_slice_expired {
            if let Some(t) = self.threads.get_mut(self.thread_tid()) {
                t.ticks_remaining = crate::time::TICKS_PER_TIME_SLICE;
            }
        }
        // The interrupt-return path (external collaborator) is responsible
        // for calling `preemption_check` once it leaves interrupt context;
        // `intr_context()` being true during this call is exactly what
        // makes `preemption_check` defer rather than yield directly.
        self.preemption_check();
    }

    /// Internal variant of `unblock` used while already holding the
    /// intr-gate (from `tick`), to avoid re-disabling interrupts.
    fn unblock_locked(&self, tid: ThreadId) {
        let priority = self.threads.get_mut(tid).map(|t| {
            t.status = ThreadStatus::Ready;
            t.priority
        });
        if let Some(priority) = priority {
            self.ready.lock().insert(tid, priority);
        }
    }

    // ---- priority API ---------------------------------------------------

    pub fn get_priority(&self) -> u8 {
        self.thread_current().map(|t| t.priority).unwrap_or(0)
    }

    /// Updates `base_priority`. Raises the effective priority immediately
    /// if there are no active donors or the new value exceeds the current
    /// donation-raised one; otherwise the change is deferred until
    /// donations withdraw (`release` recomputes from `base_priority`).
    pub fn set_priority(&self, new_base: u8) {
        let new_base = new_base.clamp(PRI_MIN, crate::thread::control::PRI_MAX);
        let prior = A::disable();
        let tid = self.thread_tid();
        if let Some(t) = self.threads.get_mut(tid) {
            t.base_priority = new_base;
            if t.donors.is_empty() || new_base > t.priority {
                t.priority = new_base;
            }
        }
        A::set_level(prior);
        self.preemption_check();
    }

    // ---- semaphore ------------------------------------------------------

    pub fn sema_init(&self, sem: &Semaphore, value: u32) {
        sem.init(value);
    }

    /// Not callable from interrupt context.
    pub fn sema_down(&self, sem: &Semaphore) {
        self.assert_not_interrupt_context("sema_down() called from interrupt context");
        let prior = A::disable();
        let tid = self.thread_tid();
        let must_block = sem.begin_down(tid);
        if must_block {
            if let Some(t) = self.threads.get_mut(tid) {
                t.status = ThreadStatus::Blocked;
            }
            self.schedule();
        }
        A::set_level(prior);
    }

    pub fn sema_try_down(&self, sem: &Semaphore) -> bool {
        sem.try_down()
    }

    /// Callable from any context. Re-sorts the waiter list by current
    /// priority (donation may have changed it since `down`), wakes the
    /// winner, and runs the preemption check unless already inside an
    /// interrupt handler.
    pub fn sema_up(&self, sem: &Semaphore) {
        let prior = A::disable();
        let woken = sem.up(|tid| self.threads.get(tid).map(|t| t.priority).unwrap_or(0));
        if let Some(tid) = woken {
            self.unblock_locked(tid);
        }
        A::set_level(prior);
        self.preemption_check();
    }

    // ---- lock / donation --------------------------------------------------

    /// Must not already be held by current; not callable from interrupt
    /// context.
    pub fn lock_acquire(&self, lock: &Lock) {
        self.assert_not_interrupt_context("lock_acquire() called from interrupt context");
        let current = self.thread_tid();
        if lock.held_by(current) {
            assertion_violation("lock_acquire() on a lock already held by current");
        }

        let prior = A::disable();
        if let Some(holder) = lock.holder() {
            if let Some(t) = self.threads.get_mut(current) {
                t.wait_on_lock = Some(lock as *const Lock);
            }
            if let Some(h) = self.threads.get_mut(holder) {
                h.donors.push(current);
            }
            #[cfg(not(feature = "mlfqs"))]
            donation::propagate(&self.threads, &self.ready, current);
        }
        A::set_level(prior);

        self.sema_down(&lock.semaphore);

        let prior = A::disable();
        if let Some(t) = self.threads.get_mut(current) {
            t.wait_on_lock = None;
        }
        lock.set_holder(Some(current));
        A::set_level(prior);
    }

    /// Non-blocking; never donates.
    pub fn lock_try_acquire(&self, lock: &Lock) -> bool {
        let current = self.thread_tid();
        if lock.held_by(current) {
            assertion_violation("lock_try_acquire() on a lock already held by current");
        }
        if self.sema_try_down(&lock.semaphore) {
            lock.set_holder(Some(current));
            true
        } else {
            false
        }
    }

    /// Must be held by current.
    pub fn lock_release(&self, lock: &Lock) {
        let current = self.thread_tid();
        if !lock.held_by(current) {
            assertion_violation("lock_release() on a lock not held by current");
        }

        let prior = A::disable();
        #[cfg(not(feature = "mlfqs"))]
        donation::withdraw(&self.threads, current, lock as *const Lock);
        lock.set_holder(None);
        A::set_level(prior);

        self.sema_up(&lock.semaphore);
    }

    pub fn lock_held_by_current(&self, lock: &Lock) -> bool {
        lock.held_by(self.thread_tid())
    }

    // ---- condition variable ----------------------------------------------

    pub fn cond_init(&self, cond: &Condvar) {
        cond.init();
    }

    /// Current must hold `lock`; not callable from interrupt context.
    /// Mesa-style: callers must re-check their predicate after this
    /// returns.
    pub fn cond_wait(&self, cond: &Condvar, lock: &Lock) {
        self.assert_not_interrupt_context("cond_wait() called from interrupt context");
        let tid = self.thread_tid();
        let waiter_sem = cond.register(tid);
        self.lock_release(lock);
        // SAFETY: `waiter_sem` was just boxed by `register` and stays
        // alive until popped and woken by `signal_one`/dropped with the
        // waiter list, which only happens after this `down` returns.
        let sem = unsafe { &*waiter_sem };
        self.sema_down(sem);
        self.lock_acquire(lock);
    }

    /// Current must hold `lock`.
    pub fn cond_signal(&self, cond: &Condvar, lock: &Lock) {
        if !lock.held_by(self.thread_tid()) {
            assertion_violation("cond_signal() without holding the associated lock");
        }
        let woken = cond.signal_one(|tid| self.threads.get(tid).map(|t| t.priority).unwrap_or(0));
        if let Some(tid) = woken {
            self.unblock(tid);
        }
    }

    pub fn cond_broadcast(&self, cond: &Condvar, lock: &Lock) {
        while cond.has_waiters() {
            self.cond_signal(cond, lock);
        }
    }
}

impl<A: Arch> Default for Kernel<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// Test-only scaffolding. `NoOpArch::context_switch` never actually
/// suspends a call stack, so a host test cannot get two threads' bodies
/// genuinely interleaved the way real hardware would; these let a test
/// set up or inspect table/queue state directly instead of routing
/// everything through the blocking API.
#[cfg(test)]
impl<A: Arch> Kernel<A> {
    pub(crate) fn status_of(&self, tid: ThreadId) -> Option<ThreadStatus> {
        self.threads.get(tid).map(|t| t.status)
    }

    /// Marks `tid` `Blocked` directly, without touching the ready or sleep
    /// queues — for scripting a condvar wait's "parked" half without also
    /// exercising `cond_wait`'s lock release/reacquire, which a host test
    /// can't interleave against other scripted waiters the way real
    /// concurrent execution would.
    pub(crate) fn mark_blocked_for_test(&self, tid: ThreadId) {
        if let Some(t) = self.threads.get_mut(tid) {
            t.status = ThreadStatus::Blocked;
        }
    }

    /// Queues `tid` on the sleep list for `wakeup_tick` directly, bypassing
    /// the global tick counter `thread_sleep` reads (a process-wide static
    /// that parallel test execution would otherwise race against).
    pub(crate) fn sleep_until_for_test(&self, tid: ThreadId, wakeup_tick: Tick) {
        if let Some(t) = self.threads.get_mut(tid) {
            t.wakeup_tick = wakeup_tick;
            t.status = ThreadStatus::Blocked;
        }
        self.sleeping.lock().insert(tid, wakeup_tick);
    }

    /// Drains and reinserts the ready queue to observe its current pop
    /// order without disturbing it.
    pub(crate) fn ready_order(&self) -> alloc::vec::Vec<ThreadId> {
        let mut ready = self.ready.lock();
        let mut out = alloc::vec::Vec::new();
        while let Some(tid) = ready.pop_front() {
            out.push(tid);
        }
        for &tid in &out {
            let priority = self.threads.get(tid).map(|t| t.priority).unwrap_or(0);
            ready.insert(tid, priority);
        }
        out
    }
}
