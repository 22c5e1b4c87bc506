//! Lock (mutex): an ownership wrapper over a binary semaphore.
//!
//! The donation propagation itself lives in [`crate::sync::donation`] and is
//! driven by [`crate::kernel::Kernel::acquire`]/`release`, since it needs
//! read/write access to other threads' control blocks; this type only
//! carries the holder and the inner semaphore, per the data model.

use spin::Mutex;

use crate::sync::semaphore::Semaphore;
use crate::thread::ThreadId;

pub struct Lock {
    holder: Mutex<Option<ThreadId>>,
    pub(crate) semaphore: Semaphore,
}

impl Lock {
    pub const fn new() -> Self {
        Self {
            holder: Mutex::new(None),
            semaphore: Semaphore::new(1),
        }
    }

    pub fn holder(&self) -> Option<ThreadId> {
        *self.holder.lock()
    }

    pub(crate) fn set_holder(&self, holder: Option<ThreadId>) {
        *self.holder.lock() = holder;
    }

    pub fn held_by(&self, tid: ThreadId) -> bool {
        self.holder() == Some(tid)
    }
}

impl Default for Lock {
    fn default() -> Self {
        Self::new()
    }
}
