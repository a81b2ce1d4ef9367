//! Client-fair random selection over per-client work queues.
//!
//! ## Scope
//! This crate picks the next unit of work from a population of per-client
//! queues without letting any client dominate. Queues compose into a tree:
//! leaves ([`GrabBag`]) hold one client's pending items, interior nodes
//! ([`FairSelector`]) pick uniformly among their registered clients and
//! delegate downward. Nesting is arbitrary; a subtree is selected exactly as
//! if it were a single client.
//!
//! ## Key invariants
//! - Selection is uniform over *clients*, never over items: a client with one
//!   pending item and a client with a thousand are equally likely to be
//!   served next.
//! - Every composite keeps two views of its children (a lookup map and a
//!   dense vector for O(1) random indexing) that never diverge.
//! - Cleanup is lazy: exhausted children are detached only when a selection
//!   pass picks them and finds nothing, never on insertion.
//! - Items flagged cancelled are discarded during selection and never
//!   returned; leaves do not filter, composites do.
//! - One mutex per tree node, acquired parent to child along a single path,
//!   so lock cycles cannot form.
//!
//! ## Selection flow (single call)
//! 1) Draw one child uniformly among the registered clients.
//! 2) Delegate removal to it, recursing through nested selectors.
//! 3) Detach the child if it reported empty or yielded nothing.
//! 4) Discard the drawn item and redraw if its cancel flag is set.
//! 5) Return the item.
//!
//! ## Notable entry points
//! - [`FairSelector`]: the composite selector, usually the tree root.
//! - [`GrabBag`]: the per-client leaf queue.
//! - [`Grabber`]: the two-shape node type used to nest subtrees.
//! - [`WorkItem`] / [`Cancellable`]: the work-item capability contract.
//! - [`RandomSource`] / [`XorShift64`]: the pluggable randomness seam.
//!
//! ## Design trade-offs
//! Per-client uniformity means a large backlog buys a client nothing, which
//! is the point; it also means starved-looking clients are simply clients
//! whose queue is empty. Lazy cleanup keeps insertion O(1) and pushes the
//! cost of forgetting exhausted clients onto the selection passes that would
//! have visited them anyway.

pub mod bag;
pub mod contract;
pub mod rng;
pub mod selector;

pub use bag::GrabBag;
pub use contract::{Cancellable, WorkItem};
pub use rng::{RandomSource, XorShift64};
pub use selector::{FairSelector, Grabber, SelectorStats};
