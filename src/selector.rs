//! Composite selection: uniform choice among clients, then delegation.
//!
//! A [`FairSelector`] maps each registered client to a child node (a leaf
//! [`GrabBag`] or a nested selector) and keeps those children in two views
//! that must never diverge: a hash map for lookup and a dense vector for O(1)
//! uniform random indexing. Fairness comes from indexing the dense view: one
//! draw per attempt, uniform over clients, blind to how many items each child
//! holds.
//!
//! # Cleanup discipline
//!
//! Registration never removes anything. A child leaves the tree only when a
//! selection pass picks it and finds it has nothing usable (it reports empty,
//! or yields `None`). The pass detaches it from both views in place
//! (`swap_remove`; child order carries no meaning) and re-draws. An item
//! drawn with its cancel flag set is discarded and the draw repeated; it is
//! never returned and never re-inserted.
//!
//! # Locking
//!
//! One `Mutex` per tree node. Every public operation takes its own node's
//! lock once for the whole call, and `remove_random` keeps it across the
//! entire retry loop. Delegating into a child takes the child's lock while
//! the parent's is held, so locks are only ever acquired parent to child
//! along a single path, never between siblings. The ownership graph is a
//! tree, so no cycle of waits can form.

#[cfg(loom)]
use loom::sync::Mutex;
#[cfg(not(loom))]
use std::sync::Mutex;

use std::hash::Hash;
use std::sync::Arc;

use ahash::AHashMap;

use crate::bag::GrabBag;
use crate::contract::WorkItem;
use crate::rng::{RandomSource, XorShift64};

// ============================================================================
// Grabber: the two shapes a tree node can take
// ============================================================================

/// A node in the selection tree: one client's leaf bag, or a nested selector
/// standing in for a whole subtree.
///
/// Parents hold children as `Arc<Grabber>` and dispatch by pattern match, so
/// selectors nest to any depth without caring about a child's shape.
#[derive(Debug)]
pub enum Grabber<C, T, R = XorShift64> {
    /// Leaf: the pending items of a single client.
    Bag(GrabBag<C, T, R>),
    /// Interior node: a subtree selected as if it were one client.
    Selector(FairSelector<C, T, R>),
}

impl<C, T, R> Grabber<C, T, R> {
    /// The client this node selects on behalf of.
    pub fn client(&self) -> &C {
        match self {
            Grabber::Bag(bag) => bag.client(),
            Grabber::Selector(selector) => selector.client(),
        }
    }

    /// Whether the node currently has nothing registered or held.
    ///
    /// For a selector this reports registration emptiness: exhausted children
    /// still awaiting lazy detachment keep it `false`.
    pub fn is_empty(&self) -> bool {
        match self {
            Grabber::Bag(bag) => bag.is_empty(),
            Grabber::Selector(selector) => selector.is_empty(),
        }
    }

    /// Leaf accessor; `None` if this node is a nested selector.
    pub fn as_bag(&self) -> Option<&GrabBag<C, T, R>> {
        match self {
            Grabber::Bag(bag) => Some(bag),
            Grabber::Selector(_) => None,
        }
    }

    /// Interior accessor; `None` if this node is a leaf.
    pub fn as_selector(&self) -> Option<&FairSelector<C, T, R>> {
        match self {
            Grabber::Bag(_) => None,
            Grabber::Selector(selector) => Some(selector),
        }
    }
}

impl<C: Eq + Hash, T: WorkItem, R: RandomSource> Grabber<C, T, R> {
    /// Removes one random item from whichever shape this node is.
    ///
    /// Leaf removals are unfiltered; selector removals apply the full retry
    /// and cancellation discipline of [`FairSelector::remove_random`].
    pub fn remove_random(&self) -> Option<T> {
        match self {
            Grabber::Bag(bag) => bag.remove_random(),
            Grabber::Selector(selector) => selector.remove_random(),
        }
    }
}

impl<C, T, R> From<GrabBag<C, T, R>> for Grabber<C, T, R> {
    fn from(bag: GrabBag<C, T, R>) -> Self {
        Grabber::Bag(bag)
    }
}

impl<C, T, R> From<FairSelector<C, T, R>> for Grabber<C, T, R> {
    fn from(selector: FairSelector<C, T, R>) -> Self {
        Grabber::Selector(selector)
    }
}

// ============================================================================
// SelectorStats
// ============================================================================

/// Monotonic selection counters for one selector node.
///
/// Maintained as plain integer bumps on state the node's lock already owns,
/// so they cost nothing beyond the lock the operation holds anyway. Snapshot
/// with [`FairSelector::stats`]; nested selectors keep their own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectorStats {
    /// Selection iterations that drew a child (one RNG draw each).
    pub attempts: u64,
    /// Items handed back to the caller.
    pub returned: u64,
    /// Items drawn but discarded because their cancel flag was set.
    pub cancelled_dropped: u64,
    /// Children detached after reporting empty or yielding nothing.
    pub detached: u64,
}

// ============================================================================
// FairSelector
// ============================================================================

/// Client-fair random selector over a set of sub-selectors.
///
/// Fairness is per client, not per item: every selection picks uniformly
/// among the currently registered clients first, and only the chosen child
/// then picks among its own items. A client with one pending item and a
/// client with a thousand are equally likely to be served next.
///
/// Items arrive through [`add`](Self::add), which lazily creates a leaf bag
/// per client, or through [`add_grabber`](Self::add_grabber), which registers
/// a pre-built child and is how selectors nest. Children are never removed on
/// insertion; an exhausted child stays registered until a selection pass
/// picks it and finds it has nothing left.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use fairgrab_rs::{Cancellable, FairSelector};
///
/// let selector: FairSelector<&str, Arc<Cancellable<u32>>> =
///     FairSelector::with_seed("root", 42);
/// selector.add("alice", Arc::new(Cancellable::new(1)));
/// selector.add("bob", Arc::new(Cancellable::new(2)));
///
/// let first = selector.remove_random().unwrap();
/// let second = selector.remove_random().unwrap();
/// assert_ne!(first.payload(), second.payload());
///
/// assert!(selector.remove_random().is_none());
/// assert!(selector.is_empty());
/// ```
#[derive(Debug)]
pub struct FairSelector<C, T, R = XorShift64> {
    client: C,
    inner: Mutex<SelectorInner<C, T, R>>,
}

/// Lock-guarded node state: the two same-membership views, the node RNG, and
/// the counters.
#[derive(Debug)]
struct SelectorInner<C, T, R> {
    /// Lookup view. Keys are exactly the clients of `grabbers`.
    by_client: AHashMap<C, Arc<Grabber<C, T, R>>>,
    /// Dense view for O(1) uniform indexing. No gaps, no duplicates; order is
    /// meaningless and changes on detach.
    grabbers: Vec<Arc<Grabber<C, T, R>>>,
    rng: R,
    stats: SelectorStats,
}

impl<C, T, R> FairSelector<C, T, R> {
    /// Creates an empty selector owned by `client`, drawing from `rng`.
    ///
    /// Leaf bags created later by [`add`](Self::add) fork their own
    /// generators from `rng`, so every node draws inside its own lock.
    pub fn new(client: C, rng: R) -> Self {
        Self {
            client,
            inner: Mutex::new(SelectorInner {
                by_client: AHashMap::new(),
                grabbers: Vec::new(),
                rng,
                stats: SelectorStats::default(),
            }),
        }
    }

    /// Whether any clients are registered.
    ///
    /// `false` only means clients are still registered; it includes exhausted
    /// children not yet visited by a selection pass. May be stale as soon as
    /// it returns if other threads hold handles.
    pub fn is_empty(&self) -> bool {
        let inner = self.inner.lock().expect("fair selector lock poisoned");
        inner.grabbers.is_empty()
    }

    /// Number of currently registered clients, lazily detached ones included
    /// until a selection pass removes them.
    pub fn client_count(&self) -> usize {
        let inner = self.inner.lock().expect("fair selector lock poisoned");
        inner.grabbers.len()
    }

    /// The client this selector selects on behalf of, fixed at construction.
    /// Meaningful when the selector is nested under a parent.
    #[inline]
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Snapshot of this node's selection counters.
    pub fn stats(&self) -> SelectorStats {
        let inner = self.inner.lock().expect("fair selector lock poisoned");
        inner.stats
    }
}

impl<C, T> FairSelector<C, T, XorShift64> {
    /// Convenience constructor with the default generator.
    pub fn with_seed(client: C, seed: u64) -> Self {
        Self::new(client, XorShift64::new(seed))
    }
}

impl<C: Eq + Hash, T, R> FairSelector<C, T, R> {
    /// Looks up the registered grabber for `client`, if any.
    ///
    /// The returned handle stays valid after the grabber is detached, but a
    /// detached grabber no longer receives selection: items added through a
    /// stale handle are unreachable from this selector.
    pub fn grabber(&self, client: &C) -> Option<Arc<Grabber<C, T, R>>> {
        let inner = self.inner.lock().expect("fair selector lock poisoned");
        inner.by_client.get(client).cloned()
    }

    /// Registers a pre-built child under `client`. This is the explicit
    /// registration path, used to nest one selector under another.
    ///
    /// # Panics
    ///
    /// Panics if `client` already has a registered grabber (a double
    /// registration would strand the earlier entry in the dense view), or if
    /// `client` differs from `grabber.client()` (a mismatched key would
    /// desynchronize the two views when the child is detached).
    pub fn add_grabber(&self, client: C, grabber: Arc<Grabber<C, T, R>>) {
        assert!(
            *grabber.client() == client,
            "client does not match the grabber's owning client"
        );
        let mut inner = self.inner.lock().expect("fair selector lock poisoned");
        assert!(
            !inner.by_client.contains_key(&client),
            "client already has a registered grabber"
        );
        inner.by_client.insert(client, Arc::clone(&grabber));
        inner.grabbers.push(grabber);
        debug_assert_eq!(inner.by_client.len(), inner.grabbers.len());
    }
}

impl<C: Clone + Eq + Hash, T, R: RandomSource> FairSelector<C, T, R> {
    /// Inserts `item` for `client`, registering the client on first use.
    ///
    /// The first insertion for an unregistered client forks this node's
    /// generator, creates a leaf bag owned by `client`, registers it in both
    /// views, and appends the item; later insertions append to the existing
    /// bag. A client detached by an earlier selection pass counts as
    /// unregistered again and gets a fresh bag.
    ///
    /// # Panics
    ///
    /// Panics if `client` was registered through
    /// [`add_grabber`](Self::add_grabber) with a nested selector: items must
    /// then be inserted through that selector directly, and mixing the two
    /// registration paths is a caller bug.
    pub fn add(&self, client: C, item: T) {
        let mut guard = self.inner.lock().expect("fair selector lock poisoned");
        let inner = &mut *guard;

        let grabber = if let Some(existing) = inner.by_client.get(&client) {
            Arc::clone(existing)
        } else {
            let bag = GrabBag::new(client.clone(), inner.rng.fork());
            let grabber: Arc<Grabber<C, T, R>> = Arc::new(Grabber::Bag(bag));
            inner.by_client.insert(client, Arc::clone(&grabber));
            inner.grabbers.push(Arc::clone(&grabber));
            debug_assert_eq!(inner.by_client.len(), inner.grabbers.len());
            grabber
        };

        let Grabber::Bag(bag) = &*grabber else {
            panic!("client is registered with a nested selector, not a leaf bag");
        };
        bag.add(item);
    }
}

impl<C: Eq + Hash, T: WorkItem, R: RandomSource> FairSelector<C, T, R> {
    /// Removes and returns one non-cancelled item, or `None` once no
    /// registered child can produce one.
    ///
    /// Each iteration draws one child uniformly among the registered clients
    /// and delegates to it. A child that reports empty or yields nothing is
    /// detached on the spot; an item that arrives with its cancel flag set is
    /// discarded without being returned or re-inserted. Both outcomes re-draw
    /// against the updated child set.
    ///
    /// The node's lock is held across all iterations (one acquisition per
    /// call); the drawn child's own lock is taken only inside the delegation.
    pub fn remove_random(&self) -> Option<T> {
        let mut guard = self.inner.lock().expect("fair selector lock poisoned");
        let inner = &mut *guard;

        // Each pass returns, shrinks the child set, or consumes one cancelled
        // item, so the loop terminates.
        loop {
            if inner.grabbers.is_empty() {
                return None;
            }
            inner.stats.attempts += 1;

            let idx = inner.rng.next_usize(inner.grabbers.len());
            let picked = Arc::clone(&inner.grabbers[idx]);
            let item = picked.remove_random();

            if item.is_none() || picked.is_empty() {
                inner.detach_at(idx);
            }
            let Some(item) = item else { continue };
            if item.is_cancelled() {
                inner.stats.cancelled_dropped += 1;
                continue;
            }
            inner.stats.returned += 1;
            return Some(item);
        }
    }
}

impl<C: Eq + Hash, T, R> SelectorInner<C, T, R> {
    /// Drops the child at `idx` from both views.
    fn detach_at(&mut self, idx: usize) {
        let grabber = self.grabbers.swap_remove(idx);
        let removed = self.by_client.remove(grabber.client());
        debug_assert!(
            removed.is_some(),
            "FairSelector invariant broken; map/dense views diverged"
        );
        debug_assert_eq!(self.by_client.len(), self.grabbers.len());
        self.stats.detached += 1;
    }
}

// ----------------------------------------------------------------------------
// Unit tests
// ----------------------------------------------------------------------------


// ----------------------------------------------------------------------------
// Concurrent smoke tests
// ----------------------------------------------------------------------------


// ----------------------------------------------------------------------------
// Loom model tests
// ----------------------------------------------------------------------------

#[cfg(loom)]
mod loom_tests {
    use super::*;
    use crate::contract::Cancellable;
    use loom::thread;
    use std::sync::Arc;

    type Item = Arc<Cancellable<u32>>;

    fn item(v: u32) -> Item {
        Arc::new(Cancellable::new(v))
    }

    /// Add racing remove: whatever the interleaving, both items are
    /// eventually drained exactly once.
    #[test]
    fn loom_add_vs_remove() {
        loom::model(|| {
            let selector: Arc<FairSelector<&str, Item>> =
                Arc::new(FairSelector::with_seed("root", 1));
            selector.add("a", item(1));

            let adder = {
                let selector = selector.clone();
                thread::spawn(move || selector.add("b", item(2)))
            };

            let first = selector.remove_random();
            adder.join().unwrap();

            let mut got: Vec<u32> = first.iter().map(|it| *it.payload()).collect();
            while let Some(it) = selector.remove_random() {
                got.push(*it.payload());
            }
            got.sort_unstable();
            assert_eq!(got, vec![1, 2]);
            assert!(selector.is_empty());
        });
    }

    /// Two concurrent removals over two one-item clients: each draw gets a
    /// distinct item, nothing is lost or duplicated.
    #[test]
    fn loom_remove_vs_remove() {
        loom::model(|| {
            let selector: Arc<FairSelector<&str, Item>> =
                Arc::new(FairSelector::with_seed("root", 2));
            selector.add("a", item(1));
            selector.add("b", item(2));

            let other = {
                let selector = selector.clone();
                thread::spawn(move || selector.remove_random().map(|it| *it.payload()))
            };

            let mine = selector.remove_random().map(|it| *it.payload());
            let theirs = other.join().unwrap();

            let mut got = vec![mine.unwrap(), theirs.unwrap()];
            got.sort_unstable();
            assert_eq!(got, vec![1, 2]);
            assert!(selector.is_empty());
            assert_eq!(selector.client_count(), 0);
        });
    }
}
