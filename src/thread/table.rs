//! Fixed-capacity table mapping `ThreadId` to its control block, which
//! lives at offset 0 of its own backing page.

extern crate alloc;

use alloc::vec::Vec;
use core::marker::PhantomData;
use spin::Mutex;

use crate::arch::Arch;
use crate::mem::page_pool::{PagePool, ThreadPage, MAX_THREADS};
use crate::thread::control::{ThreadControl, ThreadEntry};
use crate::thread::id::ThreadId;

struct Slot {
    page: ThreadPage,
}

/// Owns every live thread's backing page and hands out raw-pointer access
/// to the control block inside it.
///
/// Field access through the returned references is sound under the
/// crate-wide discipline that all scheduler-visible mutation happens with
/// interrupts disabled (the single global critical section described in
/// the concurrency model) — there is never a second call-in-flight to
/// alias against.
pub struct ThreadTable<A: Arch> {
    pages: PagePool,
    slots: Mutex<Vec<Option<Slot>>>,
    _marker: PhantomData<A>,
}

impl<A: Arch> ThreadTable<A> {
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(MAX_THREADS);
        slots.resize_with(MAX_THREADS, || None);
        Self {
            pages: PagePool::new(),
            slots: Mutex::new(slots),
            _marker: PhantomData,
        }
    }

    /// Allocates a page, places a new control block at offset 0, and
    /// returns its id.
    pub fn create(
        &self,
        name: &[u8],
        priority: u8,
        entry: ThreadEntry,
        arg: *mut u8,
    ) -> Result<ThreadId, crate::errors::SpawnError> {
        use crate::errors::SpawnError;

        let mut slots = self.slots.lock();
        let index = slots
            .iter()
            .position(|slot| slot.is_none())
            .ok_or(SpawnError::TooManyThreads)?;
        let page = self.pages.allocate().ok_or(SpawnError::OutOfMemory)?;

        let tid = ThreadId::from_index(index);
        let control = ThreadControl::<A>::new(tid, name, priority, entry, arg);
        unsafe {
            (page.base() as *mut ThreadControl<A>).write(control);
        }
        slots[index] = Some(Slot { page });
        Ok(tid)
    }

    fn slot_ptr(&self, tid: ThreadId) -> Option<*mut ThreadControl<A>> {
        let slots = self.slots.lock();
        let slot = slots.get(tid.index())?.as_ref()?;
        Some(slot.page.base() as *mut ThreadControl<A>)
    }

    pub fn get(&self, tid: ThreadId) -> Option<&ThreadControl<A>> {
        self.slot_ptr(tid).map(|p| unsafe { &*p })
    }

    pub fn get_mut(&self, tid: ThreadId) -> Option<&mut ThreadControl<A>> {
        self.slot_ptr(tid).map(|p| unsafe { &mut *p })
    }

    /// Initial stack pointer for a freshly created thread: the top of its
    /// page, since the stack grows down from there.
    pub fn stack_top(&self, tid: ThreadId) -> Option<*mut u8> {
        let slots = self.slots.lock();
        let slot = slots.get(tid.index())?.as_ref()?;
        Some(slot.page.stack_top())
    }

    /// Runs the control block's destructor in place and hands its page to
    /// the deferred-destroy queue rather than freeing it immediately: the
    /// outgoing thread may still be executing on that very stack.
    pub fn retire(&self, tid: ThreadId) {
        let mut slots = self.slots.lock();
        if let Some(entry) = slots.get_mut(tid.index()) {
            if let Some(slot) = entry.take() {
                unsafe {
                    core::ptr::drop_in_place(slot.page.base() as *mut ThreadControl<A>);
                }
                self.pages.defer_destroy(slot.page);
            }
        }
    }

    /// Recycles any pages queued by a prior `retire`, once it is safe to do
    /// so (after the context switch away from the dying thread completes).
    pub fn reap_deferred(&self) {
        self.pages.reap_deferred();
    }
}

impl<A: Arch> Default for ThreadTable<A> {
    fn default() -> Self {
        Self::new()
    }
}
