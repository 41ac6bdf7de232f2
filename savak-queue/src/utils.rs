//! Cache-line padding for the engines' hot atomics
//!
//! The linear queue takes one atomic exchange on `tail` per enqueue and
//! one `fetch_add` on the gate word per dequeue. Without padding those
//! two words land on the same cache line of the queue struct and every
//! enqueue/dequeue pair turns into cross-core line bouncing; aligning
//! the producer-side `tail` to its own line keeps the two hot paths off
//! each other. Gate version objects get the same treatment through
//! their own alignment requirement.

use std::ops::{Deref, DerefMut};

/// Pads `T` to the platform cache-line size.
///
/// Line sizes per architecture: x86_64 64B, aarch64 128B (Apple M-series
/// and Neoverse prefetch pairs of lines), s390x 256B. Anything else gets
/// the common 64B.
#[cfg_attr(target_arch = "aarch64", repr(align(128)))]
#[cfg_attr(target_arch = "s390x", repr(align(256)))]
#[cfg_attr(
    not(any(target_arch = "aarch64", target_arch = "s390x")),
    repr(align(64))
)]
pub struct CacheAligned<T> {
    data: T,
}

impl<T> CacheAligned<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

impl<T> Deref for CacheAligned<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

impl<T> DerefMut for CacheAligned<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.data
    }
}
