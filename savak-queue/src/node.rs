use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU8, Ordering};

/// Node state: unused or recycled pool cell.
///
/// Zero on purpose: freshly mapped pool pages are zero-filled and must
/// read as recyclable.
pub(crate) const FREE: u8 = 0;
/// Node state: published, visible to consumers.
pub(crate) const ENQUEUED: u8 = 1;
/// Node state: claimed by exactly one consumer, awaiting reclamation.
pub(crate) const DEQUEUED: u8 = 2;

/// Intrusive list node shared by both engines.
///
/// `state` is only exchanged by the linear engine; the relaxed engine
/// frees nodes directly on pop. `pooled` routes the free.
#[repr(C)]
pub(crate) struct Node {
    pub(crate) next: AtomicPtr<Node>,
    pub(crate) datum: u64,
    pub(crate) state: AtomicU8,
    pooled: bool,
}

impl Node {
    pub(crate) fn heap(datum: u64) -> *mut Node {
        Box::into_raw(Box::new(Node {
            next: AtomicPtr::new(ptr::null_mut()),
            datum,
            state: AtomicU8::new(ENQUEUED),
            pooled: false,
        }))
    }

    /// Sub-queue sentinel; never carries a datum and is never freed
    /// through [`Node::release`].
    pub(crate) fn placeholder() -> Node {
        Node {
            next: AtomicPtr::new(ptr::null_mut()),
            datum: 0,
            state: AtomicU8::new(FREE),
            pooled: false,
        }
    }

    /// Write a node into a freshly handed-out pool cell.
    ///
    /// # Safety
    ///
    /// `cell` must point into a live pool mapping and must not hold a
    /// live node.
    pub(crate) unsafe fn init_cell(cell: *mut Node, datum: u64) {
        // SAFETY: caller guarantees the cell is dead; plain write installs
        // the node before it becomes reachable.
        unsafe {
            ptr::write(
                cell,
                Node {
                    next: AtomicPtr::new(ptr::null_mut()),
                    datum,
                    state: AtomicU8::new(ENQUEUED),
                    pooled: true,
                },
            );
        }
    }

    /// Free a node exactly once: pool cells are recycled in place, heap
    /// nodes go back to the allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must no longer be reachable by any walker, and must not be
    /// released twice.
    pub(crate) unsafe fn release(ptr: *mut Node) {
        unsafe {
            if (*ptr).pooled {
                // The owning pool's recycle scan reads this with acquire.
                (*ptr).state.store(FREE, Ordering::Release);
            } else {
                drop(Box::from_raw(ptr));
            }
        }
    }
}
