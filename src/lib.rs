#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![forbid(unreachable_pub)]

//! Preemptive priority-donation thread scheduler for Raspberry Pi Zero 2 W.
//!
//! A single-CPU kernel scheduler: strict-priority ready queue with FIFO
//! tie-break, a tick-driven sleep queue, and a full transitive
//! priority-donation protocol across locks and condition variables. The
//! boot loader, page-table setup, drivers, and the timer's own frequency
//! programming are treated as external collaborators — this crate's
//! contract with them is the interrupt gate, a page allocator for thread
//! pages, a context-switch routine, and a periodic call into
//! [`thread_tick`].
//!
//! # Target Platform
//!
//! - **Hardware**: Raspberry Pi Zero 2 W
//! - **SoC**: Broadcom BCM2837 (ARM Cortex-A53)
//! - **Architecture**: AArch64
//! - **Environment**: Bare-metal (no operating system)
//!
//! # Features
//!
//! - `full-fpu`: save/restore NEON/FPU state across context switches (default)
//! - `std-shim`: host-testable build using [`arch::NoOpArch`]
//! - `qemu-virt`: QEMU `virt` machine timer/GIC addresses instead of real hardware
//! - `mlfqs`: alternate multi-level feedback queue scheduling policy, mutually
//!   exclusive with priority donation
//! - `trace`: emit scheduler trace lines over the PL011 UART
//!
//! # Quick start
//!
//! ```ignore
//! use preemptive_threads::{self as sched, DefaultArch};
//!
//! fn kernel_main() -> ! {
//!     sched::init(b"main");
//!     sched::thread_create(b"worker", 31, worker_entry, core::ptr::null_mut())
//!         .expect("failed to spawn worker");
//!     loop {
//!         sched::thread_yield();
//!     }
//! }
//!
//! fn worker_entry(_arg: *mut u8) {
//!     loop {}
//! }
//! ```

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod arch;
pub mod errors;
pub mod kernel;
pub mod mem;
pub mod sched;
pub mod sync;
pub mod thread;
pub mod time;

#[cfg(test)]
pub mod tests;

use spin::Lazy;

pub use arch::{Arch, DefaultArch};
pub use errors::{KernelError, KernelResult, ScheduleError, SpawnError};
pub use kernel::Kernel;
pub use sync::{Condvar, Lock, Semaphore};
pub use thread::{ThreadEntry, ThreadId, ThreadStatus};
pub use time::{Duration, Tick};

#[cfg(all(not(test), not(feature = "std-shim")))]
use core::panic::PanicInfo;

#[cfg(all(not(test), not(feature = "std-shim")))]
#[panic_handler]
fn panic(_info: &PanicInfo) -> ! {
    #[cfg(target_arch = "aarch64")]
    unsafe {
        core::arch::asm!("msr daifset, #0xf", options(nomem, nostack));
    }
    loop {
        #[cfg(target_arch = "aarch64")]
        unsafe {
            core::arch::asm!("wfe", options(nomem, nostack));
        }
    }
}

/// The single system-wide scheduler instance.
///
/// A `static` rather than something threaded through every call, matching
/// the collaborator contract in section 6: entry points like `thread_tick`
/// are called directly from an ISR with no opportunity to plumb a
/// reference through.
static KERNEL: Lazy<Kernel<DefaultArch>> = Lazy::new(Kernel::new);

/// Boots the scheduler. Must be called exactly once, from the thread that
/// will become the initial "main" thread, before any other function in
/// this module.
pub fn init(main_name: &[u8]) -> ThreadId {
    KERNEL.init(main_name)
}

// ---- thread lifecycle ----------------------------------------------------

pub fn thread_create(
    name: &[u8],
    priority: u8,
    entry: ThreadEntry,
    arg: *mut u8,
) -> KernelResult<ThreadId> {
    KERNEL.create(name, priority, entry, arg)
}

pub fn thread_tid() -> ThreadId {
    KERNEL.thread_tid()
}

pub fn thread_name() -> alloc::string::String {
    KERNEL.thread_name()
}

pub fn thread_block() {
    KERNEL.block()
}

pub fn thread_unblock(t: ThreadId) {
    KERNEL.unblock(t)
}

pub fn thread_yield() {
    KERNEL.thread_yield()
}

pub fn thread_exit() -> ! {
    KERNEL.thread_exit()
}

// ---- timebase -------------------------------------------------------------

pub fn thread_sleep(ticks: i64) {
    KERNEL.thread_sleep(ticks)
}

/// Wakes sleepers due as of `now` without the rest of `thread_tick`'s
/// bookkeeping; `thread_tick` calls this internally.
pub fn thread_awake(now: Tick) {
    KERNEL.awake(now)
}

/// Drives the timebase forward by one tick and performs wakeup and
/// time-sliced preemption bookkeeping. Call this, and nothing else that
/// suspends, from the timer ISR.
pub fn thread_tick() -> Tick {
    let now = time::GLOBAL_TICKS.advance();
    KERNEL.tick(now);
    now
}

/// Performs the deferred preemption check the interrupt-return path owes
/// after `thread_tick`: called once control is back outside interrupt
/// context, it actually yields if a higher-priority thread became ready.
pub fn thread_check_preemption() {
    KERNEL.preemption_check()
}

// ---- priority ---------------------------------------------------------------

pub fn thread_get_priority() -> u8 {
    KERNEL.get_priority()
}

pub fn thread_set_priority(priority: u8) {
    KERNEL.set_priority(priority)
}

// ---- semaphore --------------------------------------------------------------

pub fn sema_init(sem: &Semaphore, value: u32) {
    KERNEL.sema_init(sem, value)
}

pub fn sema_down(sem: &Semaphore) {
    KERNEL.sema_down(sem)
}

pub fn sema_try_down(sem: &Semaphore) -> bool {
    KERNEL.sema_try_down(sem)
}

pub fn sema_up(sem: &Semaphore) {
    KERNEL.sema_up(sem)
}

// ---- lock ---------------------------------------------------------------------

pub fn lock_init() -> Lock {
    Lock::new()
}

pub fn lock_acquire(lock: &Lock) {
    KERNEL.lock_acquire(lock)
}

pub fn lock_try_acquire(lock: &Lock) -> bool {
    KERNEL.lock_try_acquire(lock)
}

pub fn lock_release(lock: &Lock) {
    KERNEL.lock_release(lock)
}

pub fn lock_held_by_current(lock: &Lock) -> bool {
    KERNEL.lock_held_by_current(lock)
}

// ---- condition variable ---------------------------------------------------------

pub fn cond_init(cond: &Condvar) {
    KERNEL.cond_init(cond)
}

pub fn cond_wait(cond: &Condvar, lock: &Lock) {
    KERNEL.cond_wait(cond, lock)
}

pub fn cond_signal(cond: &Condvar, lock: &Lock) {
    KERNEL.cond_signal(cond, lock)
}

pub fn cond_broadcast(cond: &Condvar, lock: &Lock) {
    KERNEL.cond_broadcast(cond, lock)
}
