//! Scheduling policy: the ready/sleep queue disciplines and, optionally,
//! the MLFQS alternate policy.

pub mod priority;
pub mod ready_queue;
pub mod sleep_queue;

#[cfg(feature = "mlfqs")]
pub mod mlfqs;

pub use ready_queue::ReadyQueue;
pub use sleep_queue::SleepQueue;
