//! The concrete testable-property scenarios: FIFO ordering, strict
//! preemption, single and transitive priority donation, multiple donors,
//! condvar wake order, and sleep-queue ordering.
//!
//! `NoOpArch::context_switch` never actually suspends a call stack, so these
//! tests can't get two thread bodies genuinely interleaved the way real
//! hardware would. Where a scenario needs to set up or inspect several
//! threads' state directly, it uses the `#[cfg(test)]` scaffolding on
//! `Kernel` rather than relying on real concurrent execution, and the
//! donation scenarios drive `sync::donation` against a bare `ThreadTable`
//! rather than `Kernel::lock_acquire`'s blocking path.

extern crate alloc;

use alloc::vec;
use spin::Mutex;

use crate::arch::NoOpArch;
use crate::kernel::Kernel;
use crate::sched::ReadyQueue;
use crate::sync::{donation, Condvar, Lock};
use crate::thread::table::ThreadTable;
use crate::thread::{ThreadId, ThreadStatus};

fn noop_entry(_arg: *mut u8) {}

fn new_kernel() -> Kernel<NoOpArch> {
    let kernel = Kernel::new();
    kernel.init(b"main");
    kernel
}

fn spawn(kernel: &Kernel<NoOpArch>, name: &[u8], priority: u8) -> ThreadId {
    kernel
        .create(name, priority, noop_entry, core::ptr::null_mut())
        .expect("thread creation must succeed in a fresh kernel")
}

// Scenario 1: three equal-priority threads created in order run, and are
// observed, strictly FIFO.
#[test]
fn fifo_ordering_at_equal_priority() {
    let kernel = new_kernel();
    let a = spawn(&kernel, b"a", 31);
    let b = spawn(&kernel, b"b", 31);
    let c = spawn(&kernel, b"c", 31);

    assert_eq!(kernel.ready_order(), vec![a, b, c]);
}

// Scenario 2: creating a strictly higher-priority thread preempts the
// creator immediately, rather than waiting for its next yield.
#[test]
fn strict_preemption_on_thread_creation() {
    let kernel = new_kernel();
    let main_tid = kernel.thread_tid();
    assert_eq!(kernel.status_of(main_tid), Some(ThreadStatus::Running));

    let high = spawn(&kernel, b"high", 40);

    assert_eq!(kernel.thread_tid(), high);
    assert_eq!(kernel.status_of(high), Some(ThreadStatus::Running));
    assert_eq!(kernel.status_of(main_tid), Some(ThreadStatus::Ready));
}

// Scenario 2b: a thread created at or below the running thread's priority
// does not preempt it.
#[test]
fn equal_or_lower_priority_creation_does_not_preempt() {
    let kernel = new_kernel();
    let main_tid = kernel.thread_tid();
    let _peer = spawn(&kernel, b"peer", 31);
    let _low = spawn(&kernel, b"low", 10);

    assert_eq!(kernel.thread_tid(), main_tid);
    assert_eq!(kernel.status_of(main_tid), Some(ThreadStatus::Running));
}

// Scenario 3: a single lock holder's priority rises to its waiter's.
#[test]
fn single_lock_donation_raises_holder_to_waiters_priority() {
    let table = ThreadTable::<NoOpArch>::new();
    let low = table
        .create(b"low", 20, noop_entry, core::ptr::null_mut())
        .unwrap();
    let high = table
        .create(b"high", 50, noop_entry, core::ptr::null_mut())
        .unwrap();
    let lock = Lock::new();
    lock.set_holder(Some(low));
    let ready = Mutex::new(ReadyQueue::new());

    table.get_mut(high).unwrap().wait_on_lock = Some(&lock as *const Lock);
    table.get_mut(low).unwrap().donors.push(high);

    donation::propagate(&table, &ready, high);

    assert_eq!(table.get(low).unwrap().priority, 50);
}

// Scenario 4: donation propagates transitively through a chain of locks —
// raising M's priority reaches all the way to the bottom holder, not just
// the thread it is directly blocked on.
#[test]
fn nested_donation_propagates_through_a_chain_of_locks() {
    let table = ThreadTable::<NoOpArch>::new();
    let l1 = table
        .create(b"l1", 10, noop_entry, core::ptr::null_mut())
        .unwrap();
    let l2 = table
        .create(b"l2", 20, noop_entry, core::ptr::null_mut())
        .unwrap();
    let m = table
        .create(b"m", 50, noop_entry, core::ptr::null_mut())
        .unwrap();
    let lock_x = Lock::new();
    let lock_y = Lock::new();
    lock_x.set_holder(Some(l1));
    lock_y.set_holder(Some(l2));
    let ready = Mutex::new(ReadyQueue::new());

    // l2 holds Y but blocks acquiring X (held by l1); m blocks acquiring Y.
    table.get_mut(l2).unwrap().wait_on_lock = Some(&lock_x as *const Lock);
    table.get_mut(l1).unwrap().donors.push(l2);
    table.get_mut(m).unwrap().wait_on_lock = Some(&lock_y as *const Lock);
    table.get_mut(l2).unwrap().donors.push(m);

    donation::propagate(&table, &ready, m);

    assert_eq!(table.get(l2).unwrap().priority, 50);
    assert_eq!(table.get(l1).unwrap().priority, 50);
}

// Scenario 5: a holder with multiple donors runs at the maximum of their
// priorities, and reverts to its base priority once the lock is released
// (withdrawing every donor still waiting on it).
#[test]
fn multiple_donors_take_the_max_and_release_reverts_to_base() {
    let table = ThreadTable::<NoOpArch>::new();
    let holder = table
        .create(b"holder", 10, noop_entry, core::ptr::null_mut())
        .unwrap();
    let mid = table
        .create(b"mid", 30, noop_entry, core::ptr::null_mut())
        .unwrap();
    let top = table
        .create(b"top", 50, noop_entry, core::ptr::null_mut())
        .unwrap();
    let lock = Lock::new();
    lock.set_holder(Some(holder));
    let ready = Mutex::new(ReadyQueue::new());

    table.get_mut(mid).unwrap().wait_on_lock = Some(&lock as *const Lock);
    table.get_mut(holder).unwrap().donors.push(mid);
    donation::propagate(&table, &ready, mid);
    assert_eq!(table.get(holder).unwrap().priority, 30);

    table.get_mut(top).unwrap().wait_on_lock = Some(&lock as *const Lock);
    table.get_mut(holder).unwrap().donors.push(top);
    donation::propagate(&table, &ready, top);
    assert_eq!(table.get(holder).unwrap().priority, 50);

    donation::withdraw(&table, holder, &lock as *const Lock);
    assert_eq!(table.get(holder).unwrap().priority, 10);
}

// A donation target already sitting in the ready queue (e.g. a lock holder
// that lost the CPU to strict preemption) must be repositioned there, not
// just have its priority field bumped — `schedule` only ever looks at the
// queue's insertion-time snapshot.
#[test]
fn donation_to_a_ready_holder_repositions_it_in_the_ready_queue() {
    let table = ThreadTable::<NoOpArch>::new();
    let holder = table
        .create(b"holder", 10, noop_entry, core::ptr::null_mut())
        .unwrap();
    let waiter = table
        .create(b"waiter", 50, noop_entry, core::ptr::null_mut())
        .unwrap();
    let peer = table
        .create(b"peer", 30, noop_entry, core::ptr::null_mut())
        .unwrap();
    let lock = Lock::new();
    lock.set_holder(Some(holder));
    let ready = Mutex::new(ReadyQueue::new());

    table.get_mut(holder).unwrap().status = ThreadStatus::Ready;
    table.get_mut(peer).unwrap().status = ThreadStatus::Ready;
    ready.lock().insert(holder, 10);
    ready.lock().insert(peer, 30);
    assert_eq!(ready.lock().pop_front(), Some(peer));
    ready.lock().insert(peer, 30);

    table.get_mut(waiter).unwrap().wait_on_lock = Some(&lock as *const Lock);
    table.get_mut(holder).unwrap().donors.push(waiter);
    donation::propagate(&table, &ready, waiter);

    assert_eq!(table.get(holder).unwrap().priority, 50);
    assert_eq!(ready.lock().pop_front(), Some(holder));
    assert_eq!(ready.lock().pop_front(), Some(peer));
}

// Scenario 6: signaling a condition variable wakes the highest-priority
// waiter first, regardless of wait order.
#[test]
fn condvar_signal_wakes_highest_priority_waiter_first() {
    let kernel = new_kernel();
    let cond = Condvar::new();

    let low = spawn(&kernel, b"low", 10);
    let high = spawn(&kernel, b"high", 30);
    let mid = spawn(&kernel, b"mid", 20);

    for &tid in &[low, high, mid] {
        cond.register(tid);
        kernel.mark_blocked_for_test(tid);
    }

    let lock = Lock::new();
    assert!(kernel.lock_try_acquire(&lock));

    kernel.cond_signal(&cond, &lock);
    assert_eq!(kernel.status_of(high), Some(ThreadStatus::Ready));
    assert_eq!(kernel.status_of(mid), Some(ThreadStatus::Blocked));
    assert_eq!(kernel.status_of(low), Some(ThreadStatus::Blocked));

    kernel.cond_signal(&cond, &lock);
    assert_eq!(kernel.status_of(mid), Some(ThreadStatus::Ready));
    assert_eq!(kernel.status_of(low), Some(ThreadStatus::Blocked));

    kernel.cond_signal(&cond, &lock);
    assert_eq!(kernel.status_of(low), Some(ThreadStatus::Ready));
}

// Scenario 7: sleeping threads wake in ascending wakeup-tick order,
// independent of the order they went to sleep in.
#[test]
fn sleepers_wake_in_ascending_tick_order() {
    let kernel = new_kernel();
    let a = spawn(&kernel, b"a", 31);
    let b = spawn(&kernel, b"b", 31);
    let c = spawn(&kernel, b"c", 31);

    kernel.sleep_until_for_test(a, 30);
    kernel.sleep_until_for_test(b, 10);
    kernel.sleep_until_for_test(c, 20);

    assert!(kernel.ready_order().is_empty());

    kernel.awake(9);
    assert!(kernel.ready_order().is_empty());

    kernel.awake(10);
    assert_eq!(kernel.ready_order(), vec![b]);

    kernel.awake(20);
    assert_eq!(kernel.ready_order(), vec![b, c]);

    kernel.awake(30);
    assert_eq!(kernel.ready_order(), vec![b, c, a]);
}
