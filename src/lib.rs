//! Savak: versioned-snapshot reclamation for lock-free data structures
//!
//! Savak publishes a single current *version* object behind a gate and
//! gives readers wait-free pins on it. A version that is replaced is not
//! freed until every reader that pinned it has released, which makes the
//! gate a minimal grace-period primitive for RCU-style head management.
//!
//! # Key Features
//!
//! - **Wait-Free Acquire**: pinning the current version is one `fetch_add`
//! - **Lock-Free Publish**: unconditional swap, or compare-exchange
//!   against an expected version
//! - **Packed Gate Word**: pointer and reader count share one atomic word,
//!   so acquire and publish cannot tear against each other
//! - **Exactly-Once Finalize**: the last release of a retired version runs
//!   its free callback, on whichever thread that happens to be
//!
//! # Example
//!
//! ```rust,ignore
//! use savak::{Gate, Snapshot, VersionCore};
//!
//! let gate: Gate<MyVersion> = Gate::new();
//! gate.publish(Box::into_raw(Box::new(MyVersion::first())));
//!
//! let guard = gate.acquire();
//! // *guard is safe to dereference until the guard drops
//! drop(guard);
//! ```

#![warn(missing_docs)]

extern crate alloc;

mod gate;
mod version;

pub use gate::{Gate, VersionGuard, VERSION_ALIGN};
pub use version::{Snapshot, VersionCore};
