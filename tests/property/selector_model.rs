//! Shadow-model test: random op sequences against a naive per-client map.
//!
//! Cancelled items are consumed invisibly during selection passes, so the
//! model keeps them apart ("ghosts") and checks registration as a bounds pair
//! instead of an exact count until the final drain settles everything.

use std::collections::HashMap;
use std::sync::Arc;

use proptest::prelude::*;

use fairgrab_rs::{Cancellable, FairSelector, WorkItem};

type Item = Arc<Cancellable<u32>>;

#[derive(Clone, Debug)]
enum Op {
    Add { client: u8 },
    Cancel { handle: usize },
    Remove,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u8..6).prop_map(|client| Op::Add { client }),
        1 => (0usize..256).prop_map(|handle| Op::Cancel { handle }),
        2 => Just(Op::Remove),
    ]
}

#[derive(Default)]
struct ClientModel {
    /// Payloads the selector still owes us.
    pending: Vec<u32>,
    /// Cancelled payloads that may or may not still sit in the bag.
    ghosts: Vec<u32>,
}

proptest! {
    #[test]
    fn random_ops_match_model(
        ops in prop::collection::vec(op_strategy(), 0..200),
        seed in 1u64..u64::MAX,
    ) {
        let selector: FairSelector<u8, Item> = FairSelector::with_seed(0, seed);
        let mut model: HashMap<u8, ClientModel> = HashMap::new();
        let mut handles: Vec<(u8, Item)> = Vec::new();
        let mut next_payload = 0u32;

        for op in ops {
            match op {
                Op::Add { client } => {
                    let payload = next_payload;
                    next_payload += 1;
                    let item = Arc::new(Cancellable::new(payload));
                    selector.add(client, Arc::clone(&item));
                    model.entry(client).or_default().pending.push(payload);
                    handles.push((client, item));
                }
                Op::Cancel { handle } => {
                    if handles.is_empty() {
                        continue;
                    }
                    let (client, item) = &handles[handle % handles.len()];
                    item.cancel();
                    // Cancelling an already-returned item changes nothing.
                    let entry = model.entry(*client).or_default();
                    if let Some(pos) = entry.pending.iter().position(|p| p == item.payload()) {
                        let payload = entry.pending.swap_remove(pos);
                        entry.ghosts.push(payload);
                    }
                }
                Op::Remove => match selector.remove_random() {
                    Some(item) => {
                        prop_assert!(!item.is_cancelled());
                        let payload = *item.payload();
                        let client = handles
                            .iter()
                            .find(|(_, h)| *h.payload() == payload)
                            .map(|(c, _)| *c)
                            .expect("returned item was inserted");
                        let entry = model.get_mut(&client).expect("client was inserted");
                        let pos = entry.pending.iter().position(|p| *p == payload);
                        prop_assert!(
                            pos.is_some(),
                            "selector returned payload {} the model no longer expects",
                            payload
                        );
                        entry.pending.swap_remove(pos.unwrap());
                    }
                    None => {
                        // `None` is only legal once nothing non-cancelled remains.
                        let outstanding: usize = model.values().map(|m| m.pending.len()).sum();
                        prop_assert_eq!(outstanding, 0);
                    }
                },
            }

            // Registration bounds: a client holding non-cancelled items must
            // be registered; a registered client must still hold something,
            // live or ghost.
            let lower = model.values().filter(|m| !m.pending.is_empty()).count();
            let upper = model
                .values()
                .filter(|m| !m.pending.is_empty() || !m.ghosts.is_empty())
                .count();
            let count = selector.client_count();
            prop_assert!(count >= lower, "client_count {} below live floor {}", count, lower);
            prop_assert!(count <= upper, "client_count {} above ceiling {}", count, upper);

            for (client, m) in &model {
                if !m.pending.is_empty() {
                    prop_assert!(selector.grabber(client).is_some());
                }
                // Fully settled clients (nothing live, nothing cancelled
                // outstanding) must have been detached by the pass that
                // returned their last item.
                if m.pending.is_empty() && m.ghosts.is_empty() {
                    prop_assert!(selector.grabber(client).is_none());
                }
            }
        }

        // A final drain settles the bounds into equalities.
        let mut drained = Vec::new();
        while let Some(item) = selector.remove_random() {
            drained.push(*item.payload());
        }
        let mut outstanding: Vec<u32> = model
            .values()
            .flat_map(|m| m.pending.iter().copied())
            .collect();
        drained.sort_unstable();
        outstanding.sort_unstable();
        prop_assert_eq!(drained, outstanding);
        prop_assert!(selector.is_empty());
        prop_assert_eq!(selector.client_count(), 0);
    }
}
