//! Architecture abstraction layer: the interrupt gate and context switch.
//!
//! This module provides the two primitives the scheduler core treats as
//! external collaborators: disabling/restoring interrupts (the "intr-gate"
//! of the design) and switching a CPU register frame between two threads.

use portable_atomic::{AtomicBool, Ordering};

/// Tracks whether the current control flow began from a hardware interrupt.
///
/// Single CPU is assumed throughout this crate (see design non-goals), so one
/// global flag is sufficient; a multi-core port would need one per CPU.
static IN_INTERRUPT_CONTEXT: AtomicBool = AtomicBool::new(false);

/// RAII guard marking the dynamic extent of an interrupt handler.
///
/// The timer ISR collaborator wraps its call into [`crate::kernel::Kernel::tick`]
/// with this guard so that `intr_context()` reports `true` for the duration,
/// which lets suspension points (`block`, `sleep`, `acquire`, `wait`, `yield`)
/// assert they are never called from interrupt context.
pub struct InterruptContextGuard {
    _private: (),
}

impl InterruptContextGuard {
    /// Enter interrupt context. Must be paired with drop before returning to
    /// the interrupted thread.
    pub fn enter() -> Self {
        IN_INTERRUPT_CONTEXT.store(true, Ordering::Release);
        Self { _private: () }
    }
}

impl Drop for InterruptContextGuard {
    fn drop(&mut self) {
        IN_INTERRUPT_CONTEXT.store(false, Ordering::Release);
    }
}

/// True iff the current control flow began from a hardware interrupt.
pub fn intr_context() -> bool {
    IN_INTERRUPT_CONTEXT.load(Ordering::Acquire)
}

/// Architecture abstraction trait.
///
/// Implementations provide the interrupt gate and the context switch; both
/// are the only pieces of the scheduler core that touch real hardware state.
///
/// # Safety
///
/// Implementations of this trait involve direct hardware manipulation and
/// inline assembly. All methods marked as unsafe have specific preconditions
/// that must be upheld by the caller.
pub trait Arch {
    /// Architecture-specific saved context type.
    ///
    /// Must contain all CPU registers and state needed to fully restore a
    /// thread's execution context.
    type SavedContext: Send + Sync + Default;

    /// Switch from one thread context to another.
    ///
    /// # Safety
    ///
    /// - `prev` and `next` must point to valid, properly aligned `SavedContext`s
    /// - both must remain valid for the duration of this call
    /// - must be called with interrupts disabled
    unsafe fn context_switch(prev: *mut Self::SavedContext, next: *const Self::SavedContext);

    /// Save floating point unit state to the given context.
    ///
    /// # Safety
    ///
    /// Must be called when the current thread owns the FPU and `ctx` is valid.
    #[cfg(feature = "full-fpu")]
    unsafe fn save_fpu(ctx: &mut Self::SavedContext);

    /// Restore floating point unit state from the given context.
    ///
    /// # Safety
    ///
    /// `ctx` must contain valid FPU state saved by `save_fpu`.
    #[cfg(feature = "full-fpu")]
    unsafe fn restore_fpu(ctx: &Self::SavedContext);

    /// Enable interrupts on the current CPU.
    fn enable_interrupts();

    /// Disable interrupts on the current CPU.
    fn disable_interrupts();

    /// Check if interrupts are currently enabled.
    fn interrupts_enabled() -> bool;

    /// Disable interrupts and return the prior enable state.
    ///
    /// Pairs with [`Arch::set_level`]. This is the intr-gate `disable()`
    /// primitive: all scheduler-visible list mutations sit behind it.
    #[inline]
    fn disable() -> bool {
        let prior = Self::interrupts_enabled();
        Self::disable_interrupts();
        prior
    }

    /// Restore a previously saved interrupt-enable state.
    ///
    /// Either re-enables interrupts or keeps them disabled, depending on
    /// `prior_enabled`.
    #[inline]
    fn set_level(prior_enabled: bool) {
        if prior_enabled {
            Self::enable_interrupts();
        } else {
            Self::disable_interrupts();
        }
    }

    /// Halt the CPU until the next interrupt (used by the idle thread).
    fn wait_for_interrupt();
}

/// A no-op architecture implementation for host testing.
///
/// Tracks an interrupt-enabled flag so `std-shim` tests can exercise the
/// intr-gate discipline without real hardware.
pub struct NoOpArch;

static NOOP_INTERRUPTS_ENABLED: AtomicBool = AtomicBool::new(true);

impl Arch for NoOpArch {
    type SavedContext = ();

    unsafe fn context_switch(_prev: *mut Self::SavedContext, _next: *const Self::SavedContext) {
        // No-op for host testing: there is no real register frame to swap.
    }

    #[cfg(feature = "full-fpu")]
    unsafe fn save_fpu(_ctx: &mut Self::SavedContext) {}

    #[cfg(feature = "full-fpu")]
    unsafe fn restore_fpu(_ctx: &Self::SavedContext) {}

    fn enable_interrupts() {
        NOOP_INTERRUPTS_ENABLED.store(true, Ordering::Release);
    }

    fn disable_interrupts() {
        NOOP_INTERRUPTS_ENABLED.store(false, Ordering::Release);
    }

    fn interrupts_enabled() -> bool {
        NOOP_INTERRUPTS_ENABLED.load(Ordering::Acquire)
    }

    fn wait_for_interrupt() {
        core::hint::spin_loop();
    }
}

// Raspberry Pi Zero 2 W - ARM64 only
#[cfg(target_arch = "aarch64")]
pub mod aarch64;
#[cfg(not(target_arch = "aarch64"))]
#[path = "aarch64_stub.rs"]
pub mod aarch64;

pub mod barriers;
pub mod detection;

// RPi Zero 2 W specific hardware support
#[cfg(target_arch = "aarch64")]
pub mod aarch64_gic;
#[cfg(target_arch = "aarch64")]
pub mod aarch64_vectors;
#[cfg(target_arch = "aarch64")]
pub mod aarch64_boot;

pub mod uart;
pub mod uart_pl011;

// Always use AArch64 on real hardware - single target (Raspberry Pi Zero 2 W)
#[cfg(target_arch = "aarch64")]
pub use aarch64::Aarch64Arch as DefaultArch;

// For testing/std-shim on non-aarch64 hosts
#[cfg(all(not(target_arch = "aarch64"), feature = "std-shim"))]
pub use NoOpArch as DefaultArch;

// Compile error for unsupported configurations
#[cfg(all(not(target_arch = "aarch64"), not(feature = "std-shim")))]
compile_error!("This library only supports Raspberry Pi Zero 2 W (aarch64). Use --target aarch64-unknown-none or enable std-shim feature for testing.");
