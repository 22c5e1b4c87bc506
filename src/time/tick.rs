//! Global tick counter: the timebase driven by the periodic timer interrupt.

use super::Tick;
use portable_atomic::{AtomicU64, Ordering};

/// Monotonic tick counter incremented once per timer interrupt.
///
/// This is the sole timebase the scheduler core consumes; `Kernel::tick`
/// is called once per hardware interrupt with the value read from here.
pub struct GlobalTickCounter {
    ticks: AtomicU64,
}

impl GlobalTickCounter {
    pub const fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
        }
    }

    /// Advance the timebase by one tick and return the new value.
    ///
    /// Called once per timer interrupt, before `Kernel::tick`.
    pub fn advance(&self) -> Tick {
        self.ticks.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Current tick value.
    pub fn now(&self) -> Tick {
        self.ticks.load(Ordering::Acquire)
    }
}

impl Default for GlobalTickCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// The system-wide tick counter.
pub static GLOBAL_TICKS: GlobalTickCounter = GlobalTickCounter::new();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_monotonically() {
        let counter = GlobalTickCounter::new();
        assert_eq!(counter.now(), 0);
        assert_eq!(counter.advance(), 1);
        assert_eq!(counter.advance(), 2);
        assert_eq!(counter.now(), 2);
    }
}
