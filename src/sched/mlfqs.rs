//! Multi-level feedback queue scheduling: an alternate policy to priority
//! donation, selected by the `-mlfqs` flag and mutually exclusive with it.
//!
//! Donation is skipped entirely under this policy; `priority` is instead
//! recomputed from `recent_cpu` and `nice` on a fixed tick cadence. The
//! run-queue discipline itself (highest priority first, FIFO tie-break) is
//! unchanged and shared with the donation policy — this module only
//! supplies the numbers that feed it.
//!
//! Full specification of the formulas is deferred; what follows is the
//! standard Pintos fixed-point recipe, the closest concrete reference
//! available, kept as a self-contained policy module per the design notes.

extern crate alloc;

use alloc::vec::Vec;

use crate::thread::control::{PRI_MAX, PRI_MIN};
use crate::thread::ThreadId;

/// 17.14 fixed-point representation, `f = 1 << 14`.
const FIXED_POINT_SHIFT: i64 = 14;
const FIXED_POINT_ONE: i64 = 1 << FIXED_POINT_SHIFT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fixed(i64);

impl Fixed {
    pub const fn from_int(n: i64) -> Self {
        Fixed(n << FIXED_POINT_SHIFT)
    }

    pub fn to_int_round(self) -> i64 {
        if self.0 >= 0 {
            (self.0 + FIXED_POINT_ONE / 2) >> FIXED_POINT_SHIFT
        } else {
            (self.0 - FIXED_POINT_ONE / 2) >> FIXED_POINT_SHIFT
        }
    }

    fn mul(self, other: Fixed) -> Fixed {
        Fixed(((self.0 as i128 * other.0 as i128) >> FIXED_POINT_SHIFT) as i64)
    }

    fn div(self, other: Fixed) -> Fixed {
        Fixed((((self.0 as i128) << FIXED_POINT_SHIFT) / other.0 as i128) as i64)
    }

    fn add(self, other: Fixed) -> Fixed {
        Fixed(self.0 + other.0)
    }

    fn sub(self, other: Fixed) -> Fixed {
        Fixed(self.0 - other.0)
    }
}

/// Per-thread MLFQS bookkeeping, stored independently of the donation
/// fields since the two policies never run simultaneously.
#[derive(Debug, Clone, Copy)]
pub struct MlfqsStats {
    pub nice: i32,
    pub recent_cpu: Fixed,
}

impl Default for MlfqsStats {
    fn default() -> Self {
        Self {
            nice: 0,
            recent_cpu: Fixed::from_int(0),
        }
    }
}

/// System-wide load average, updated once per second of ticks.
pub struct LoadAverage(Fixed);

impl LoadAverage {
    pub const fn new() -> Self {
        Self(Fixed::from_int(0))
    }

    /// `load_avg = (59/60) * load_avg + (1/60) * ready_threads`.
    pub fn update(&mut self, ready_threads: usize) {
        let fifty_nine_sixtieths = Fixed::from_int(59).div(Fixed::from_int(60));
        let one_sixtieth = Fixed::from_int(1).div(Fixed::from_int(60));
        let ready = Fixed::from_int(ready_threads as i64);
        self.0 = fifty_nine_sixtieths.mul(self.0).add(one_sixtieth.mul(ready));
    }

    pub fn value(&self) -> Fixed {
        self.0
    }
}

impl Default for LoadAverage {
    fn default() -> Self {
        Self::new()
    }
}

/// `recent_cpu' = (2*load_avg)/(2*load_avg + 1) * recent_cpu + nice`.
pub fn decay_recent_cpu(stats: &MlfqsStats, load_avg: Fixed) -> Fixed {
    let two_load = load_avg.mul(Fixed::from_int(2));
    let coefficient = two_load.div(two_load.add(Fixed::from_int(1)));
    coefficient
        .mul(stats.recent_cpu)
        .add(Fixed::from_int(stats.nice as i64))
}

/// `priority = PRI_MAX - (recent_cpu / 4) - (nice * 2)`, clamped to range.
pub fn recompute_priority(stats: &MlfqsStats) -> u8 {
    let term = Fixed::from_int(PRI_MAX as i64)
        .sub(Fixed(stats.recent_cpu.0 / 4))
        .sub(Fixed::from_int(stats.nice as i64 * 2));
    let raw = term.to_int_round();
    raw.clamp(PRI_MIN as i64, PRI_MAX as i64) as u8
}

/// Increments `recent_cpu` by one for the running thread, once per tick.
pub fn tick_running(stats: &mut MlfqsStats) {
    stats.recent_cpu = stats.recent_cpu.add(Fixed::from_int(1));
}

/// Recomputes priority for every thread in `ids`, to be run once every
/// fourth tick (`TIMER_FREQ / 4` in the original cadence).
pub fn recompute_all(ids: &[ThreadId], stats_of: impl Fn(ThreadId) -> MlfqsStats) -> Vec<(ThreadId, u8)> {
    ids.iter()
        .map(|&tid| (tid, recompute_priority(&stats_of(tid))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_point_round_trip() {
        let f = Fixed::from_int(31);
        assert_eq!(f.to_int_round(), 31);
    }

    #[test]
    fn priority_decreases_as_recent_cpu_grows() {
        let mut stats = MlfqsStats::default();
        let base = recompute_priority(&stats);
        stats.recent_cpu = Fixed::from_int(80);
        let after = recompute_priority(&stats);
        assert!(after < base);
    }

    #[test]
    fn nice_value_lowers_priority() {
        let mut low_nice = MlfqsStats::default();
        low_nice.nice = 0;
        let mut high_nice = MlfqsStats::default();
        high_nice.nice = 10;
        assert!(recompute_priority(&high_nice) < recompute_priority(&low_nice));
    }
}
