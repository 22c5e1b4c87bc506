//! Error handling for the scheduler core.
//!
//! The spec distinguishes three kinds of failure: allocation failure (a
//! recoverable `Err` return), assertion violations and stack overflow (both
//! fatal kernel panics, never recovered). This module gives each a concrete
//! type and groups the recoverable ones the way the teacher splits
//! `SpawnError`/`JoinError`/... under one `ThreadError` umbrella.

use core::fmt;

/// Result type for fallible scheduler operations.
pub type KernelResult<T> = Result<T, KernelError>;

/// Top-level error type for all fallible (non-fatal) scheduler operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// Thread creation failed.
    Spawn(SpawnError),
    /// A scheduling operation was attempted in an invalid context.
    Schedule(ScheduleError),
}

/// Errors that can occur during [`crate::kernel::Kernel::create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnError {
    /// No free page was available in the thread page pool.
    OutOfMemory,
    /// The thread table has no free slot (`mem::page_pool::MAX_THREADS` reached).
    TooManyThreads,
}

/// Errors surfaced by scheduling entry points called in the wrong context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleError {
    /// A suspension point (`block`, `sleep`, `acquire`, `wait`, `yield`) was
    /// called from interrupt context, where the spec forbids it.
    CalledFromInterruptContext,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::Spawn(e) => write!(f, "thread spawn error: {}", e),
            KernelError::Schedule(e) => write!(f, "scheduling error: {}", e),
        }
    }
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnError::OutOfMemory => write!(f, "out of memory for thread page"),
            SpawnError::TooManyThreads => write!(f, "maximum number of threads reached"),
        }
    }
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleError::CalledFromInterruptContext => {
                write!(f, "operation is forbidden from interrupt context")
            }
        }
    }
}

impl From<SpawnError> for KernelError {
    fn from(e: SpawnError) -> Self {
        KernelError::Spawn(e)
    }
}

impl From<ScheduleError> for KernelError {
    fn from(e: ScheduleError) -> Self {
        KernelError::Schedule(e)
    }
}

/// Panics with a message naming the violated invariant.
///
/// Assertion violations (acquiring a lock already held, releasing a lock you
/// don't own, sleeping in interrupt context, a corrupted stack canary) are
/// programmer errors per the spec and are never recovered from.
#[inline(never)]
#[cold]
pub fn assertion_violation(what: &str) -> ! {
    panic!("assertion violation: {}", what);
}

/// Panics reporting a stack-overflow canary mismatch.
#[inline(never)]
#[cold]
pub fn stack_overflow(tid: usize) -> ! {
    panic!("stack overflow detected on thread {} (canary mismatch)", tid);
}
