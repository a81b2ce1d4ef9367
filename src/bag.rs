//! Leaf of the selection tree: one client's pending items.
//!
//! A [`GrabBag`] holds the raw work items belonging to exactly one client and
//! serves uniformly random removal among them. It deliberately does **not**
//! look at cancellation flags (filtering is the composite's job, applied once
//! per level that returns items up the chain) and it makes no ordering
//! promise whatsoever: removal uses `swap_remove`, so insertion order carries
//! no meaning.
//!
//! Bags carry their own mutex rather than relying on an enclosing selector's
//! critical section, because selectors hand out shared `Arc` handles that
//! make a bag reachable outside any parent lock.

#[cfg(loom)]
use loom::sync::Mutex;
#[cfg(not(loom))]
use std::sync::Mutex;

use crate::rng::{RandomSource, XorShift64};

/// Uniform-random queue for a single client's pending work.
///
/// The owning client is fixed at construction and lives outside the lock; all
/// item state lives behind one per-bag mutex, held only for the duration of a
/// call.
#[derive(Debug)]
pub struct GrabBag<C, T, R = XorShift64> {
    client: C,
    inner: Mutex<BagInner<T, R>>,
}

#[derive(Debug)]
struct BagInner<T, R> {
    items: Vec<T>,
    rng: R,
}

impl<C, T, R> GrabBag<C, T, R> {
    /// Creates an empty bag for `client`, drawing from `rng`.
    pub fn new(client: C, rng: R) -> Self {
        Self {
            client,
            inner: Mutex::new(BagInner {
                items: Vec::new(),
                rng,
            }),
        }
    }

    /// Appends `item`. Duplicates are allowed; the bag is a multiset.
    pub fn add(&self, item: T) {
        let mut inner = self.inner.lock().expect("grab bag lock poisoned");
        inner.items.push(item);
    }

    /// Returns whether the bag currently holds no items.
    ///
    /// May be stale as soon as it returns if other threads hold handles.
    pub fn is_empty(&self) -> bool {
        let inner = self.inner.lock().expect("grab bag lock poisoned");
        inner.items.is_empty()
    }

    /// Number of items currently held, cancelled ones included.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().expect("grab bag lock poisoned");
        inner.items.len()
    }

    /// The owning client. Immutable for the bag's lifetime.
    #[inline]
    pub fn client(&self) -> &C {
        &self.client
    }
}

impl<C, T, R: RandomSource> GrabBag<C, T, R> {
    /// Removes and returns one item chosen uniformly at random, or `None` if
    /// the bag is empty.
    ///
    /// The item is returned regardless of its cancellation flag; callers that
    /// must not see cancelled items go through a composite selector, which
    /// filters after every delegated removal.
    pub fn remove_random(&self) -> Option<T> {
        let mut inner = self.inner.lock().expect("grab bag lock poisoned");
        if inner.items.is_empty() {
            return None;
        }
        let len = inner.items.len();
        let idx = inner.rng.next_usize(len);
        Some(inner.items.swap_remove(idx))
    }
}

impl<C, T: PartialEq, R> GrabBag<C, T, R> {
    /// Membership probe: whether an item equal to `item` is currently held.
    /// O(n); intended for tests and diagnostics, not the selection hot path.
    pub fn contains(&self, item: &T) -> bool {
        let inner = self.inner.lock().expect("grab bag lock poisoned");
        inner.items.contains(item)
    }
}

impl<C, T> GrabBag<C, T, XorShift64> {
    /// Convenience constructor with the default generator.
    pub fn with_seed(client: C, seed: u64) -> Self {
        Self::new(client, XorShift64::new(seed))
    }
}



#[cfg(loom)]
mod loom_tests {
    use super::*;
    use loom::thread;
    use std::sync::Arc;

    /// Add racing remove: the removal sees zero, one, or two items, and the
    /// final drain accounts for everything exactly once.
    #[test]
    fn loom_add_vs_remove() {
        loom::model(|| {
            let bag: Arc<GrabBag<&str, u32>> = Arc::new(GrabBag::with_seed("c", 1));
            bag.add(1);

            let adder = {
                let bag = Arc::clone(&bag);
                thread::spawn(move || bag.add(2))
            };

            let removed = bag.remove_random();
            adder.join().unwrap();

            let mut got: Vec<u32> = removed.into_iter().collect();
            while let Some(v) = bag.remove_random() {
                got.push(v);
            }
            got.sort_unstable();
            assert_eq!(got, vec![1, 2]);
        });
    }
}
