//! Thread-local node arenas over huge-page-backed mappings
//!
//! A pool is strictly per-thread and per-queue: only the owning thread
//! allocates from it, so the cursor needs no synchronization. The one
//! cross-thread interaction is the `state` byte of a cell, stored FREE by
//! whichever thread releases the node and read by the owner's recycle
//! scan.

use crate::error::QueueError;
use crate::node::{self, Node};
use crate::registry::MAX_QUEUES;
use std::cell::Cell;
use std::io;
use std::mem;
use std::ptr;
use std::sync::atomic::Ordering;

/// Size of one pool page. Matches the transparent-huge-page size the
/// mapping is hinted toward.
pub const HUGE_PAGE_SIZE: usize = 2 * 1024 * 1024;

/// Default number of pages reserved per pool (1 GiB of virtual space;
/// physical pages are committed lazily).
pub const HUGE_PAGE_COUNT: usize = 512;

const fn cells_per_page() -> usize {
    HUGE_PAGE_SIZE / mem::size_of::<Node>()
}

thread_local! {
    static POOLS: [Cell<*mut NodePool>; MAX_QUEUES] =
        const { [const { Cell::new(ptr::null_mut()) }; MAX_QUEUES] };
}

pub(crate) struct NodePool {
    base: *mut u8,
    reserved_pages: usize,
    /// Pages handed out at least once. Commit order is reservation order.
    committed: usize,
    page: usize,
    cell: usize,
}

impl NodePool {
    fn map(pages: usize) -> Result<NodePool, QueueError> {
        let len = pages * HUGE_PAGE_SIZE;
        let base = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE,
                -1,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(QueueError::PoolMapFailed(
                io::Error::last_os_error().to_string(),
            ));
        }
        #[cfg(target_os = "linux")]
        unsafe {
            // Huge-page hint; best effort.
            libc::madvise(base, len, libc::MADV_HUGEPAGE);
        }
        Ok(NodePool {
            base: base as *mut u8,
            reserved_pages: pages,
            committed: 0,
            page: 0,
            // Exhausted cursor: the first alloc goes through rewind and
            // commits page zero.
            cell: cells_per_page(),
        })
    }

    #[inline]
    fn cell_ptr(&self, page: usize, cell: usize) -> *mut Node {
        unsafe { self.base.add(page * HUGE_PAGE_SIZE).cast::<Node>().add(cell) }
    }

    /// Hand out the next cell, or `None` when the reservation is
    /// exhausted and no page has cycled through.
    fn alloc(&mut self) -> Option<*mut Node> {
        if self.cell == cells_per_page() {
            self.rewind()?;
        }
        let cell = self.cell_ptr(self.page, self.cell);
        self.cell += 1;
        Some(cell)
    }

    /// Reposition the cursor after exhausting a page: prefer a committed
    /// page whose final cell has been recycled, else commit the next page.
    ///
    /// The final-cell probe is sound because this thread's nodes leave the
    /// queue in insertion order: once the last cell of a page reads FREE,
    /// every cell of that page is free.
    fn rewind(&mut self) -> Option<()> {
        for page in 0..self.committed {
            let last = self.cell_ptr(page, cells_per_page() - 1);
            if unsafe { (*last).state.load(Ordering::Acquire) } == node::FREE {
                self.page = page;
                self.cell = 0;
                return Some(());
            }
        }
        if self.committed < self.reserved_pages {
            self.page = self.committed;
            self.cell = 0;
            self.committed += 1;
            return Some(());
        }
        None
    }

    /// True while any handed-out cell has not been released back.
    ///
    /// Never-touched cells read FREE (pages are zero-filled), so one pass
    /// over the committed pages is exact.
    fn has_live_cells(&self) -> bool {
        for page in 0..self.committed {
            for cell in 0..cells_per_page() {
                let node = self.cell_ptr(page, cell);
                if unsafe { (*node).state.load(Ordering::Acquire) } != node::FREE {
                    return true;
                }
            }
        }
        false
    }
}

impl Drop for NodePool {
    fn drop(&mut self) {
        // Bulk release of the whole reservation.
        unsafe {
            libc::munmap(self.base.cast(), self.reserved_pages * HUGE_PAGE_SIZE);
        }
    }
}

/// Opt the calling thread into pooled allocation for `queue`. Idempotent.
pub(crate) fn create(queue: usize, pages: usize) -> Result<(), QueueError> {
    POOLS.with(|slots| {
        let slot = &slots[queue];
        if !slot.get().is_null() {
            return Ok(());
        }
        let pool = Box::into_raw(Box::new(NodePool::map(pages)?));
        slot.set(pool);
        Ok(())
    })
}

/// Tear down the calling thread's pool for `queue`.
///
/// The mapping is released in bulk when every handed-out cell has been
/// recycled. While any cell is still queued (with a non-empty linear
/// queue that is always at least the newest node), the mapping is leaked
/// instead: the lingering cells keep their recycle protocol valid and the
/// memory goes back at process exit.
pub(crate) fn destroy(queue: usize) {
    POOLS.with(|slots| {
        let pool = slots[queue].replace(ptr::null_mut());
        if pool.is_null() {
            return;
        }
        let pool = unsafe { Box::from_raw(pool) };
        if pool.has_live_cells() {
            mem::forget(pool);
        }
    })
}

/// Allocate a node for `queue`: from the calling thread's pool when one
/// is installed and has space, falling back to the general allocator.
pub(crate) fn alloc_node(queue: usize, datum: u64) -> *mut Node {
    let cell = POOLS.with(|slots| {
        let pool = slots[queue].get();
        if pool.is_null() {
            None
        } else {
            unsafe { (*pool).alloc() }
        }
    });
    match cell {
        Some(cell) => unsafe {
            Node::init_cell(cell, datum);
            cell
        },
        None => Node::heap(datum),
    }
}
