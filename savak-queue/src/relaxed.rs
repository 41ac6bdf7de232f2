//! Relaxed engine: per-producer sub-queues harvested in bulk
//!
//! Every thread owns a private sub-queue it appends to with a single
//! atomic exchange; consumers steal whole batches with two exchanges
//! (detach the list head, rebase the producer's tail onto its sentinel)
//! and then pop locally. Per-producer FIFO holds; global FIFO does not,
//! which is the price for removing the single tail hot spot.

use crate::node::Node;
use crate::registry::{QueueId, MAX_QUEUES};
use crate::{MpmcQueue, QueueError};
use crossbeam_utils::Backoff;
use std::cell::Cell;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU64, AtomicUsize, Ordering};

/// Maximum number of threads that may touch one relaxed queue.
pub const MAX_THREADS: usize = 1024;

/// Process-unique queue serials validate thread-local sub-queue slots:
/// a queue id recycled after destroy must not resurrect a freed
/// sub-queue. Serial zero is never assigned.
static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// One thread's lane through the queue.
///
/// `sentinel`/`tail` are the cross-thread half (owner appends, any
/// consumer steals). The drained list and cursor are owner-only; the
/// `Cell`s are never touched from two threads at once. Queue drop also
/// reads them, but holds `&mut` and therefore exclusivity.
#[repr(C)]
struct SubQueue {
    sentinel: Node,
    tail: AtomicPtr<Node>,
    drained_head: Cell<*mut Node>,
    drained_tail: Cell<*mut Node>,
    cursor: Cell<usize>,
}

// SAFETY: see the access protocol above.
unsafe impl Send for SubQueue {}
unsafe impl Sync for SubQueue {}

impl SubQueue {
    fn boxed() -> *mut SubQueue {
        let sub = Box::into_raw(Box::new(SubQueue {
            sentinel: Node::placeholder(),
            tail: AtomicPtr::new(ptr::null_mut()),
            drained_head: Cell::new(ptr::null_mut()),
            drained_tail: Cell::new(ptr::null_mut()),
            cursor: Cell::new(0),
        }));
        // The tail must point at the embedded sentinel; fix it up after
        // the box has its final address. Published by the registration
        // table store.
        unsafe {
            let sentinel = ptr::addr_of_mut!((*sub).sentinel);
            (*sub).tail.store(sentinel, Ordering::Relaxed);
        }
        sub
    }
}

#[derive(Clone, Copy)]
struct TlsSub {
    serial: u64,
    sub: *mut SubQueue,
}

thread_local! {
    static SUBQUEUES: [Cell<TlsSub>; MAX_QUEUES] = const {
        [const {
            Cell::new(TlsSub {
                serial: 0,
                sub: ptr::null_mut(),
            })
        }; MAX_QUEUES]
    };
}

/// A relaxed MPMC queue for 64-bit payloads.
///
/// Not linearizable: items from different producers may be reordered.
/// Within one producer's items, FIFO order is preserved. Enqueue is one
/// atomic exchange on a producer-private tail; dequeue steals whole
/// batches round-robin.
///
/// The sub-queue table is fixed at [`MAX_THREADS`] entries and every
/// thread that touches the queue claims one on first use; the first
/// operation by a thread beyond that panics.
///
/// # Examples
///
/// ```ignore
/// let q = RelaxedQueue::new()?;
/// q.enqueue(7);
/// assert_eq!(q.dequeue(), Some(7));
/// ```
pub struct RelaxedQueue {
    subs: Box<[AtomicPtr<SubQueue>; MAX_THREADS]>,
    reg_lock: AtomicBool,
    thread_num: AtomicUsize,
    serial: u64,
    id: QueueId,
}

impl RelaxedQueue {
    /// Creates a queue, claiming a process-wide id slot.
    pub fn new() -> Result<Self, QueueError> {
        let id = QueueId::acquire().ok_or(QueueError::RegistryFull)?;
        Ok(Self {
            subs: Box::new([const { AtomicPtr::new(ptr::null_mut()) }; MAX_THREADS]),
            reg_lock: AtomicBool::new(false),
            thread_num: AtomicUsize::new(0),
            serial: NEXT_SERIAL.fetch_add(1, Ordering::Relaxed),
            id,
        })
    }

    /// The calling thread's sub-queue, registering it on first use.
    fn local_sub(&self) -> *mut SubQueue {
        SUBQUEUES.with(|slots| {
            let slot = &slots[self.id.index()];
            let entry = slot.get();
            if entry.serial == self.serial {
                return entry.sub;
            }
            let sub = SubQueue::boxed();
            self.register(sub);
            slot.set(TlsSub {
                serial: self.serial,
                sub,
            });
            sub
        })
    }

    /// Append to the registration table. The spin window covers only the
    /// table insert; stealers read the table lock-free.
    fn register(&self, sub: *mut SubQueue) {
        let backoff = Backoff::new();
        while self.reg_lock.swap(true, Ordering::Acquire) {
            backoff.snooze();
        }
        let n = self.thread_num.load(Ordering::Relaxed);
        if n >= MAX_THREADS {
            self.reg_lock.store(false, Ordering::Release);
            panic!("relaxed queue sub-queue table is full ({} threads)", MAX_THREADS);
        }
        // Table entry before the count bump, so a stealer that reads the
        // new count always finds an initialized entry.
        self.subs[n].store(sub, Ordering::Release);
        self.thread_num.store(n + 1, Ordering::Release);
        self.reg_lock.store(false, Ordering::Release);
    }

    /// Appends `datum` to the calling thread's sub-queue.
    ///
    /// # Panics
    ///
    /// Panics if this is the first operation by a thread beyond the
    /// [`MAX_THREADS`]-entry sub-queue table.
    pub fn enqueue(&self, datum: u64) {
        let sub = self.local_sub();
        let node = Node::heap(datum);
        // SAFETY: the sub-queue lives until the queue drops; the sentinel
        // keeps prev_tail non-null.
        unsafe {
            let prev_tail = (*sub).tail.swap(node, Ordering::AcqRel);
            (*prev_tail).next.store(node, Ordering::Release);
        }
    }

    /// Removes one item, or `None` when every sub-queue is empty.
    /// Non-blocking apart from a bounded spin on an in-flight link store.
    ///
    /// # Panics
    ///
    /// Panics if this is the first operation by a thread beyond the
    /// [`MAX_THREADS`]-entry sub-queue table.
    pub fn dequeue(&self) -> Option<u64> {
        let sub = self.local_sub();
        // SAFETY: sub is the caller's own lane; drained fields are
        // owner-only.
        unsafe {
            if !(*sub).drained_head.get().is_null() {
                return Some(Self::pop_drained(&*sub));
            }

            let n = self.thread_num.load(Ordering::Acquire);
            let start = (*sub).cursor.get();
            for i in 0..n {
                let idx = (start + i) % n;
                let target = self.subs[idx].load(Ordering::Acquire);
                if target.is_null() {
                    continue;
                }
                let target = &*target;

                if target.sentinel.next.load(Ordering::Acquire).is_null() {
                    continue;
                }
                // First exchange: detach the whole published list.
                let head = target.sentinel.next.swap(ptr::null_mut(), Ordering::AcqRel);
                if head.is_null() {
                    continue;
                }
                // Second exchange: rebase the producer's tail onto the
                // sentinel so new appends start a fresh list. An enqueue
                // landing between the two exchanges extends the detached
                // batch; pop_drained bridges its pending link store.
                let sentinel = ptr::addr_of!(target.sentinel) as *mut Node;
                let tail = target.tail.swap(sentinel, Ordering::AcqRel);

                (*sub).drained_head.set(head);
                (*sub).drained_tail.set(tail);
                (*sub).cursor.set(idx);
                return Some(Self::pop_drained(&*sub));
            }
        }
        None
    }

    /// Pop the head of the caller's drained batch.
    ///
    /// # Safety
    ///
    /// `sub` must be the calling thread's sub-queue with a non-empty
    /// drained list.
    unsafe fn pop_drained(sub: &SubQueue) -> u64 {
        let node = sub.drained_head.get();
        // SAFETY: nodes in the drained batch are owned by this consumer.
        unsafe {
            let datum = (*node).datum;
            if node == sub.drained_tail.get() {
                sub.drained_head.set(ptr::null_mut());
                sub.drained_tail.set(ptr::null_mut());
            } else {
                // The enqueuer has swapped the tail but may not have
                // linked its predecessor yet.
                let backoff = Backoff::new();
                let mut next = (*node).next.load(Ordering::Acquire);
                while next.is_null() {
                    backoff.snooze();
                    next = (*node).next.load(Ordering::Acquire);
                }
                sub.drained_head.set(next);
            }
            Node::release(node);
            datum
        }
    }
}

impl Drop for RelaxedQueue {
    fn drop(&mut self) {
        let n = *self.thread_num.get_mut();
        for i in 0..n {
            let sub = *self.subs[i].get_mut();
            if sub.is_null() {
                continue;
            }
            // Exclusive access: free the published list, the drained
            // batch, then the sub-queue itself. Stale thread-local slots
            // keep the dead serial and are never followed.
            unsafe {
                let mut cur = (*sub).sentinel.next.load(Ordering::Relaxed);
                while !cur.is_null() {
                    let next = (*cur).next.load(Ordering::Relaxed);
                    Node::release(cur);
                    cur = next;
                }
                let mut cur = (*sub).drained_head.get();
                while !cur.is_null() {
                    let next = (*cur).next.load(Ordering::Relaxed);
                    Node::release(cur);
                    cur = next;
                }
                drop(Box::from_raw(sub));
            }
        }
    }
}

impl MpmcQueue for RelaxedQueue {
    fn enqueue(&self, datum: u64) {
        RelaxedQueue::enqueue(self, datum)
    }

    fn dequeue(&self) -> Option<u64> {
        RelaxedQueue::dequeue(self)
    }
}
