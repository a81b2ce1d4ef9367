#![no_main]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use libfuzzer_sys::fuzz_target;

use fairgrab_rs::{Cancellable, FairSelector, Grabber, WorkItem};

type Item = Arc<Cancellable<u32>>;

const ROOT: u8 = 255;
const NESTED: u8 = 200;

// Interprets a byte stream as an operation sequence against a `FairSelector`
// with eight leaf clients plus one nested selector, checking every outcome
// against a pending/ghost ground-truth model. Cancelled items are "ghosts":
// still in the structure until a draw consumes them, but never returnable,
// so the model tracks them separately and only bounds what it cannot pin.
//
// Byte layout:
// - Byte 0 → selection seed
// - Remaining bytes as `(opcode, operand)` pairs:
//   - 0 → `add(operand % 8, fresh item)`
//   - 1 → cancel a previously added item (operand picks which)
//   - 2 → `remove_random()`
//   - 3 → add a fresh item under the nested selector (client NESTED)
//   - 4 → check `client_count()` / `is_empty()` against the model
fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let seed = u64::from(data[0]);
    let root: FairSelector<u8, Item> = FairSelector::with_seed(ROOT, seed);

    // payload → root-level client, for items that must still come out.
    let mut pending: HashMap<u32, u8> = HashMap::new();
    // payload → root-level client, for cancelled items not yet consumed.
    // Overapproximates: draws consume ghosts without telling us which.
    let mut ghosts: HashMap<u32, u8> = HashMap::new();
    let mut added: Vec<Item> = Vec::new();
    let mut next_payload: u32 = 0;

    let ops = &data[1..];
    let mut i = 0;
    while i + 1 < ops.len() {
        let opcode = ops[i];
        let operand = ops[i + 1];
        i += 2;

        match opcode % 5 {
            // add to a leaf client
            0 => {
                let client = operand % 8;
                let item = Arc::new(Cancellable::new(next_payload));
                root.add(client, Arc::clone(&item));
                pending.insert(next_payload, client);
                added.push(item);
                next_payload += 1;
            }
            // cancel
            1 => {
                if added.is_empty() {
                    continue;
                }
                let item = &added[operand as usize % added.len()];
                item.cancel();
                let payload = *item.payload();
                if let Some(client) = pending.remove(&payload) {
                    ghosts.insert(payload, client);
                }
            }
            // remove_random
            2 => match root.remove_random() {
                Some(item) => {
                    assert!(!item.is_cancelled(), "draw returned a cancelled item");
                    let payload = *item.payload();
                    assert!(
                        pending.remove(&payload).is_some(),
                        "draw returned item {payload} that was not pending"
                    );
                }
                None => {
                    assert!(
                        pending.is_empty(),
                        "draw returned None with {} items still pending",
                        pending.len()
                    );
                    assert_eq!(root.client_count(), 0, "None draw left clients attached");
                    assert!(root.is_empty(), "None draw left the selector non-empty");
                }
            },
            // add under the nested selector (re-registering it if a
            // previous drain detached it)
            3 => {
                let grabber = match root.grabber(&NESTED) {
                    Some(grabber) => grabber,
                    None => {
                        let fresh: FairSelector<u8, Item> =
                            FairSelector::with_seed(NESTED, seed ^ u64::from(next_payload));
                        let grabber = Arc::new(Grabber::from(fresh));
                        root.add_grabber(NESTED, Arc::clone(&grabber));
                        grabber
                    }
                };
                let nested = grabber
                    .as_selector()
                    .expect("client NESTED is always a selector");
                let item = Arc::new(Cancellable::new(next_payload));
                nested.add(operand % 4, Arc::clone(&item));
                pending.insert(next_payload, NESTED);
                added.push(item);
                next_payload += 1;
            }
            // invariant check
            _ => {
                let count = root.client_count();
                assert_eq!(
                    root.is_empty(),
                    count == 0,
                    "is_empty disagrees with client_count ({count})"
                );
                // Clients holding a pending item are always attached; the
                // only clients that may be attached beyond those still hold
                // unconsumed ghosts.
                let lower: HashSet<u8> = pending.values().copied().collect();
                let upper: HashSet<u8> =
                    pending.values().chain(ghosts.values()).copied().collect();
                assert!(
                    lower.len() <= count && count <= upper.len(),
                    "client_count {count} outside model bounds [{}, {}]",
                    lower.len(),
                    upper.len()
                );
            }
        }
    }

    // Final consistency check: drain to exhaustion and account for every
    // non-cancelled item exactly once.
    while let Some(item) = root.remove_random() {
        assert!(!item.is_cancelled(), "final drain returned a cancelled item");
        let payload = *item.payload();
        assert!(
            pending.remove(&payload).is_some(),
            "final drain returned item {payload} that was not pending"
        );
    }
    assert!(
        pending.is_empty(),
        "selector exhausted with {} items still pending",
        pending.len()
    );
    assert_eq!(root.client_count(), 0, "exhausted selector still has clients");
});
