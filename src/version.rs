//! Version bookkeeping embedded in user-defined snapshot types

use core::sync::atomic::AtomicI64;

/// Bookkeeping embedded in every version object published through a gate.
///
/// Users must embed this at the start of their version type (`#[repr(C)]`)
/// so the gate can balance reader pins against retirement.
#[repr(C)]
pub struct VersionCore {
    /// Pending-release balance.
    ///
    /// Readers add one on release; the publisher that retires the version
    /// subtracts the number of pins it migrated off the gate word. The
    /// operation that lands the balance on zero owns finalization.
    pub(crate) pending: AtomicI64,
}

impl VersionCore {
    /// Create a new core with a balanced counter.
    pub const fn new() -> Self {
        Self {
            pending: AtomicI64::new(0),
        }
    }
}

impl Default for VersionCore {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait for types that can be published through a [`Gate`](crate::Gate).
///
/// The gate parameterises reclamation over this trait: `finalize` is the
/// free callback, invoked exactly once per retired version after the last
/// reader that pinned it has released.
///
/// # Safety
///
/// - `core` must return the [`VersionCore`] embedded in `self`, and the
///   same one for the whole lifetime of the object.
/// - Version objects must be aligned to at least
///   [`VERSION_ALIGN`](crate::VERSION_ALIGN) bytes; the gate folds the low
///   pointer bits into its reader counter.
/// - `finalize` must free `ptr` (and anything it owns) and must tolerate
///   being called from any thread.
pub unsafe trait Snapshot: Sized {
    /// The embedded gate bookkeeping.
    fn core(&self) -> &VersionCore;

    /// Free a retired version.
    ///
    /// # Safety
    ///
    /// Called at most once per version, only after every reader that
    /// acquired it has released. `ptr` is the pointer that was handed to
    /// `publish`/`compare_publish`.
    unsafe fn finalize(ptr: *mut Self) {
        // SAFETY: caller guarantees ptr came from Box::into_raw and is
        // called exactly once.
        unsafe {
            drop(alloc::boxed::Box::from_raw(ptr));
        }
    }
}
