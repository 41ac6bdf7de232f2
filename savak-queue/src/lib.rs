//! MPMC queues for 64-bit payloads, built on the savak gate.
//!
//! ## Features
//!
//! - [`LinearQueue`]: strict global FIFO. A lock-free linked list whose
//!   head is reclaimed RCU-style through a [`savak::Gate`].
//! - [`RelaxedQueue`]: per-producer sub-queues stolen in batches. Keeps
//!   per-producer FIFO only, in exchange for a contention-free tail.
//! - Opt-in thread-local node pools over huge-page mappings for the
//!   linear enqueue fast path.
//!
//! Both engines carry opaque `u64` payloads (a scalar or a pointer the
//! caller owns) and share one non-blocking surface: enqueue always
//! succeeds, dequeue returns `None` immediately when nothing is
//! available.
//!
//! ## Usage
//!
//! ```rust
//! use savak_queue::LinearQueue;
//!
//! let q = LinearQueue::new().unwrap();
//! q.enqueue(10);
//! q.enqueue(20);
//! assert_eq!(q.dequeue(), Some(10));
//! assert_eq!(q.dequeue(), Some(20));
//! assert_eq!(q.dequeue(), None);
//! ```

pub mod linear;
pub mod relaxed;
pub mod utils;

mod error;
mod node;
mod pool;
mod registry;

pub use error::QueueError;
pub use linear::LinearQueue;
pub use pool::{HUGE_PAGE_COUNT, HUGE_PAGE_SIZE};
pub use registry::MAX_QUEUES;
pub use relaxed::{RelaxedQueue, MAX_THREADS};

// Common interface for both queue engines.
pub trait MpmcQueue: Send + Sync {
    // Appends a 64-bit datum. Always succeeds (allocation failure aborts).
    fn enqueue(&self, datum: u64);

    // Removes the oldest available datum, or `None` when empty.
    // Non-blocking; the datum is only produced on success.
    fn dequeue(&self) -> Option<u64>;
}
