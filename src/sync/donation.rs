//! Transitive priority-donation propagation and withdrawal.
//!
//! Kept separate from `Lock` because both directions need to walk other
//! threads' control blocks through the thread table, not just the lock
//! being acquired or released. Callers hold the intr-gate for the whole
//! operation, so plain `&mut` access to table slots is sound despite the
//! apparent aliasing between `current`/`holder` steps.

extern crate alloc;

use alloc::vec::Vec;
use spin::Mutex;

use crate::arch::Arch;
use crate::sched::ReadyQueue;
use crate::sync::lock::Lock;
use crate::thread::{ThreadId, ThreadStatus, ThreadTable};

/// Walks the `wait_on_lock` chain starting at `acquirer`, raising each
/// holder's effective priority to `acquirer`'s where it is exceeded.
///
/// Stops as soon as a step makes no change, since further holders up the
/// chain are already dominated (spec 4.8 step 2). Depth is unbounded by
/// design — only as long as the live lock-chain actually is.
///
/// A holder found sitting in `ready` gets repositioned there too: the
/// queue snapshots priority at insertion time, so a Ready holder's stale,
/// lower entry would otherwise keep it sorted behind threads it now
/// outranks.
pub fn propagate<A: Arch>(table: &ThreadTable<A>, ready: &Mutex<ReadyQueue>, acquirer: ThreadId) {
    let mut donor_priority = table.get(acquirer).map(|t| t.priority).unwrap_or(0);
    let mut current = acquirer;

    loop {
        let wait_lock = match table.get(current) {
            Some(t) => t.wait_on_lock,
            None => break,
        };
        let lock = match wait_lock {
            Some(ptr) => unsafe { &*ptr },
            None => break,
        };
        let holder = match lock.holder() {
            Some(h) => h,
            None => break,
        };

        let raised = match table.get_mut(holder) {
            Some(h) if donor_priority > h.priority => {
                h.priority = donor_priority;
                Some(h.status)
            }
            _ => None,
        };

        let raised = match raised {
            Some(status) => {
                if status == ThreadStatus::Ready {
                    let mut ready = ready.lock();
                    ready.remove(holder);
                    ready.insert(holder, donor_priority);
                }
                true
            }
            None => false,
        };

        if !raised {
            break;
        }

        #[cfg(feature = "trace")]
        crate::pl011_println!(
            "donate: {} -> {} (priority {})",
            current.index(),
            holder.index(),
            donor_priority
        );
        current = holder;
        donor_priority = table.get(holder).map(|t| t.priority).unwrap_or(donor_priority);
    }
}

/// Removes, from `releaser`'s donor set, every donor whose `wait_on_lock`
/// is `lock` (they were donating specifically to get past this lock), then
/// recomputes `releaser`'s effective priority from its base and the
/// remaining donors, per the "recompute, don't patch" design rationale.
pub fn withdraw<A: Arch>(table: &ThreadTable<A>, releaser: ThreadId, lock: *const Lock) {
    let donor_ids: Vec<ThreadId> = match table.get(releaser) {
        Some(t) => t.donors.clone(),
        None => return,
    };

    let remaining: Vec<ThreadId> = donor_ids
        .into_iter()
        .filter(|&donor| {
            let still_blocked_on_lock = table
                .get(donor)
                .and_then(|t| t.wait_on_lock)
                .map(|ptr| core::ptr::eq(ptr, lock))
                .unwrap_or(false);
            !still_blocked_on_lock
        })
        .collect();

    let max_donor = remaining
        .iter()
        .filter_map(|&d| table.get(d).map(|t| t.priority))
        .max()
        .unwrap_or(0);

    if let Some(owner) = table.get_mut(releaser) {
        owner.donors = remaining;
        owner.priority = core::cmp::max(owner.base_priority, max_donor);
        #[cfg(feature = "trace")]
        crate::pl011_println!(
            "withdraw: {} settles at priority {}",
            releaser.index(),
            owner.priority
        );
    }
}
