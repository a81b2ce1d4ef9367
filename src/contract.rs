//! Work-item capability contract.
//!
//! The selection tree holds items only transiently: callers own the item's
//! lifetime and may flip its cancellation flag at any moment, including while
//! the item sits in a leaf bag. All the tree requires of an item is that the
//! flag is readable at any time; that is the whole [`WorkItem`] contract.
//!
//! [`Cancellable`] is the reference implementation: a payload plus a one-way
//! atomic flag. The flag uses `Relaxed` ordering because it is a filter, not
//! a synchronization edge. The tree's own locks establish all the
//! happens-before relationships selection needs.

#[cfg(loom)]
use loom::sync::atomic::{AtomicBool, Ordering};
#[cfg(not(loom))]
use std::sync::atomic::{AtomicBool, Ordering};

/// A unit of work with a readable cancellation flag.
///
/// The composite selector checks the flag after every successful delegated
/// removal and silently discards cancelled items; leaf bags return items
/// regardless of the flag, so filtering happens exactly once per level that
/// returns items up the chain.
pub trait WorkItem {
    /// Returns whether this item has been cancelled.
    fn is_cancelled(&self) -> bool;
}

/// Shared handles are work items in their own right: callers typically insert
/// `Arc<Cancellable<P>>` and keep a clone so they can cancel after insertion.
impl<W: WorkItem + ?Sized> WorkItem for std::sync::Arc<W> {
    #[inline]
    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }
}

/// A payload with a one-way cancellation flag.
#[derive(Debug)]
pub struct Cancellable<T> {
    payload: T,
    cancelled: AtomicBool,
}

impl<T> Cancellable<T> {
    /// Wraps `payload` in a live (non-cancelled) item.
    pub fn new(payload: T) -> Self {
        Self {
            payload,
            cancelled: AtomicBool::new(false),
        }
    }

    /// Marks the item cancelled. There is no way back: a cancelled item is
    /// dropped by the next selection pass that draws it.
    #[inline]
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Borrows the payload.
    #[inline]
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Consumes the item, returning the payload.
    pub fn into_inner(self) -> T {
        self.payload
    }
}

impl<T> WorkItem for Cancellable<T> {
    #[inline]
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}
