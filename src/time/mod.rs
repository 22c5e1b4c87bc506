//! The kernel timebase: an abstract monotonic tick counter.
//!
//! Ticks are the spec's native unit of time — there is no notion of
//! wall-clock duration at this layer, only "how many timer interrupts have
//! elapsed". The real timer frequency is an external collaborator's concern
//! (see `arch::aarch64::setup_preemption_timer`); this module only counts.

pub mod tick;

pub use tick::{GlobalTickCounter, GLOBAL_TICKS};

/// One unit of the kernel timebase, incremented by the periodic timer
/// interrupt. Absolute ticks (`now`, `wakeup_tick`) and relative ticks
/// (`sleep(ticks)`) share this type; the spec does not distinguish them.
pub type Tick = u64;

/// Number of ticks a thread may run before a time-sliced preemption is
/// forced (spec section 4.6, "Preemption also occurs time-sliced"). Mirrors
/// Pintos' `TIME_SLICE` constant of 4 ticks.
pub const TICKS_PER_TIME_SLICE: u32 = 4;

/// A small duration type retained for interfaces that want to talk about
/// elapsed ticks as a count rather than an absolute instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Duration(Tick);

impl Duration {
    pub const fn from_ticks(ticks: Tick) -> Self {
        Self(ticks)
    }

    pub const fn as_ticks(self) -> Tick {
        self.0
    }
}
