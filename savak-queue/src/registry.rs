use crossbeam_utils::Backoff;
use std::sync::atomic::{AtomicBool, Ordering};

/// Maximum number of live queues per process, both engines combined.
pub const MAX_QUEUES: usize = 1024;

/// Process-wide id table. The spin-exchange gate serializes the slot
/// scan; it is only contended at queue construction and destruction.
static TABLE_LOCK: AtomicBool = AtomicBool::new(false);
static SLOTS: [AtomicBool; MAX_QUEUES] = [const { AtomicBool::new(false) }; MAX_QUEUES];

fn lock() {
    let backoff = Backoff::new();
    while TABLE_LOCK.swap(true, Ordering::Acquire) {
        backoff.snooze();
    }
}

fn unlock() {
    TABLE_LOCK.store(false, Ordering::Release);
}

/// RAII handle on a queue-id slot.
///
/// The index keys the per-thread pool and sub-queue tables. The slot is
/// released when the owning queue drops.
pub(crate) struct QueueId(usize);

impl QueueId {
    /// Claim the lowest free slot, or `None` when the table is full.
    pub(crate) fn acquire() -> Option<QueueId> {
        lock();
        let found = SLOTS.iter().position(|slot| !slot.load(Ordering::Relaxed));
        if let Some(index) = found {
            SLOTS[index].store(true, Ordering::Relaxed);
        }
        unlock();
        found.map(QueueId)
    }

    #[inline]
    pub(crate) fn index(&self) -> usize {
        self.0
    }
}

impl Drop for QueueId {
    fn drop(&mut self) {
        lock();
        SLOTS[self.0].store(false, Ordering::Relaxed);
        unlock();
    }
}
