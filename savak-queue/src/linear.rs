//! Strict-FIFO engine: a shared linked list with a gate-managed head
//!
//! Producers append with a single atomic exchange on the tail. Consumers
//! pin the published head span, walk the list, and claim nodes by
//! exchanging their state. The head is advanced by publishing a new span
//! through the gate; superseded spans form a chain whose node ranges are
//! freed only once every older span has been released, which is what
//! makes the traversal safe without per-node reference counts.

use crate::node::{self, Node};
use crate::pool::{self, HUGE_PAGE_COUNT};
use crate::registry::QueueId;
use crate::utils::CacheAligned;
use crate::{MpmcQueue, QueueError};
use savak::{Gate, Snapshot, VersionCore};
use std::ptr;
use std::sync::atomic::{fence, AtomicBool, AtomicPtr, AtomicU64, Ordering};

/// Top bit of a span's `prev` link: set once the span's last reader has
/// released. The remaining bits are the predecessor pointer.
const RELEASED: u64 = 1 << 63;

/// One epoch of head traversal.
///
/// A span covers the node range `head_node ..= tail_node`. While the span
/// is current, `tail_node` is null and the range is open-ended; when the
/// span is superseded, `tail_node` is set exactly once to the last node
/// it covers. Retired spans stay chained through `prev`/`next` so ranges
/// are freed strictly oldest-first.
#[repr(C, align(64))]
struct HeadSpan {
    core: VersionCore,
    prev: AtomicU64,
    next: AtomicPtr<HeadSpan>,
    tail_node: AtomicPtr<Node>,
    head_node: *mut Node,
}

// SAFETY: spans are shared across threads through the gate; every
// cross-thread field is atomic and head_node is immutable after publish.
unsafe impl Send for HeadSpan {}
unsafe impl Sync for HeadSpan {}

impl HeadSpan {
    fn boxed(head_node: *mut Node, prev: *mut HeadSpan) -> *mut HeadSpan {
        Box::into_raw(Box::new(HeadSpan {
            core: VersionCore::new(),
            prev: AtomicU64::new(prev as u64),
            next: AtomicPtr::new(ptr::null_mut()),
            tail_node: AtomicPtr::new(ptr::null_mut()),
            head_node,
        }))
    }
}

unsafe impl Snapshot for HeadSpan {
    fn core(&self) -> &VersionCore {
        &self.core
    }

    /// Runs when the last reader of a retired span releases it.
    ///
    /// Only the span at the tail of the retirement chain may free nodes;
    /// anything younger is drained transitively once its turn comes.
    unsafe fn finalize(ptr: *mut Self) {
        // SAFETY: the gate guarantees no reader still pins this span.
        let prev = unsafe { (*ptr).prev.fetch_or(RELEASED, Ordering::AcqRel) };
        if prev & !RELEASED != 0 {
            // An older span still owns the end of the list; it frees us.
            return;
        }

        fence(Ordering::SeqCst);

        let mut span = ptr;
        loop {
            unsafe {
                // Free the covered range in insertion order. A null
                // tail_node means the span was still current (gate
                // teardown): the range runs to the end of the list.
                let stop = (*span).tail_node.load(Ordering::Acquire);
                let mut cur = (*span).head_node;
                while cur != stop {
                    let next = (*cur).next.load(Ordering::Acquire);
                    Node::release(cur);
                    cur = next;
                }
                if !stop.is_null() {
                    Node::release(stop);
                }

                let successor = (*span).next.load(Ordering::Acquire);
                drop(Box::from_raw(span));
                if successor.is_null() {
                    return;
                }

                // Detach the successor from the span just freed. A strong
                // exchange failure can only mean its release flag went up
                // concurrently; either way a raised flag makes it ours.
                let seen = (*successor).prev.load(Ordering::Acquire);
                let released = seen & RELEASED != 0
                    || (*successor)
                        .prev
                        .compare_exchange(seen, 0, Ordering::AcqRel, Ordering::Acquire)
                        .is_err();
                if !released {
                    return;
                }
                span = successor;
            }
        }
    }
}

/// A linearizable MPMC queue for 64-bit payloads.
///
/// Enqueue is one atomic exchange; dequeue walks the current head span
/// and claims a node by state exchange, never blocking. Strict global
/// FIFO: see the crate docs for the relaxed alternative.
///
/// # Examples
///
/// ```ignore
/// let q = LinearQueue::new()?;
/// q.enqueue(7);
/// assert_eq!(q.dequeue(), Some(7));
/// assert_eq!(q.dequeue(), None);
/// ```
pub struct LinearQueue {
    tail: CacheAligned<AtomicPtr<Node>>,
    head: Gate<HeadSpan>,
    head_ready: AtomicBool,
    id: QueueId,
}

impl LinearQueue {
    /// Creates a queue, claiming a process-wide id slot.
    pub fn new() -> Result<Self, QueueError> {
        let id = QueueId::acquire().ok_or(QueueError::RegistryFull)?;
        Ok(Self {
            tail: CacheAligned::new(AtomicPtr::new(ptr::null_mut())),
            head: Gate::new(),
            head_ready: AtomicBool::new(false),
            id,
        })
    }

    /// Appends `datum`. Always succeeds; allocation failure aborts, as
    /// the global allocator does.
    pub fn enqueue(&self, datum: u64) {
        let node = pool::alloc_node(self.id.index(), datum);
        let prev_tail = self.tail.swap(node, Ordering::AcqRel);

        if prev_tail.is_null() {
            // First enqueue since init: install the initial span.
            let span = HeadSpan::boxed(node, ptr::null_mut());
            self.head.publish(span);
            self.head_ready.store(true, Ordering::Release);
        } else {
            // SAFETY: prev_tail stays alive: it is covered by a span that
            // cannot be drained past it until it gains this successor.
            unsafe { (*prev_tail).next.store(node, Ordering::Release) };
        }
    }

    /// Removes the oldest available item, or `None` when the queue is
    /// empty. Non-blocking.
    pub fn dequeue(&self) -> Option<u64> {
        if !self.head_ready.load(Ordering::Acquire) {
            return None;
        }

        loop {
            let guard = self.head.acquire();
            let mut cur = guard.head_node;
            let mut claimed = None;

            // A non-null tail_node means the span was superseded while we
            // walked; its range may be freed behind us, so restart on the
            // new head.
            while !cur.is_null() && guard.tail_node.load(Ordering::Acquire).is_null() {
                // SAFETY: the pinned span keeps every node from its
                // head_node to the live end of the list alive.
                unsafe {
                    if (*cur).state.load(Ordering::Acquire) == node::ENQUEUED
                        && (*cur).state.swap(node::DEQUEUED, Ordering::AcqRel) == node::ENQUEUED
                    {
                        claimed = Some((*cur).datum);
                        break;
                    }
                    cur = (*cur).next.load(Ordering::Acquire);
                }
            }

            if cur.is_null() {
                // Walked off the end: nothing enqueued that we can claim.
                return None;
            }

            let Some(datum) = claimed else {
                drop(guard);
                continue;
            };

            // SAFETY: cur is the claimed node, pinned via the guard.
            let next = unsafe { (*cur).next.load(Ordering::Acquire) };
            if !next.is_null() {
                self.adjust_head(guard.as_ptr(), next, cur);
            }
            return Some(datum);
        }
    }

    /// Try to advance the published head past a claimed node.
    ///
    /// The caller still pins `prev` (its guard is live), so linking the
    /// retired span happens strictly before `prev` can be finalized.
    fn adjust_head(&self, prev: *mut HeadSpan, new_head: *mut Node, last_covered: *mut Node) {
        let span = HeadSpan::boxed(new_head, prev);

        if !self.head.compare_publish(prev, span) {
            // Lost to a concurrent advance; the span was never visible.
            unsafe { drop(Box::from_raw(span)) };
            return;
        }

        unsafe {
            (*prev).next.store(span, Ordering::Release);
            // Setting tail_node closes prev's range and signals walkers
            // to restart; it must come after the chain link above.
            (*prev).tail_node.store(last_covered, Ordering::Release);
        }
    }

    /// Opt the calling thread into pooled node allocation for this queue,
    /// with the default reservation.
    pub fn create_tls_node_pool(&self) -> Result<(), QueueError> {
        pool::create(self.id.index(), HUGE_PAGE_COUNT)
    }

    /// Like [`create_tls_node_pool`](Self::create_tls_node_pool) with an
    /// explicit page budget; the pool falls back to the general allocator
    /// once `pages` huge pages are saturated.
    pub fn create_tls_node_pool_sized(&self, pages: usize) -> Result<(), QueueError> {
        pool::create(self.id.index(), pages)
    }

    /// Tear down the calling thread's pool for this queue.
    ///
    /// The mapping is unmapped once every cell the pool handed out has
    /// been reclaimed; with cells still queued it is leaked instead, so
    /// calling this before the queue drains is safe but wasteful.
    pub fn destroy_tls_node_pool(&self) {
        pool::destroy(self.id.index());
    }
}

// No Drop impl: field order does the work. Dropping the gate retires the
// current span, whose open-ended range drains every remaining node; the
// id slot is released after.

impl MpmcQueue for LinearQueue {
    fn enqueue(&self, datum: u64) {
        LinearQueue::enqueue(self, datum)
    }

    fn dequeue(&self) -> Option<u64> {
        LinearQueue::dequeue(self)
    }
}
