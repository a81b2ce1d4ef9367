//! Statistical fairness checks with fixed seeds and generous tolerances.
//!
//! The property under test is a probability, so these are plain tests rather
//! than proptest blocks: each runs many fresh selectors over a fixed seed
//! range and checks the empirical fraction. Deterministic run to run.

use std::sync::Arc;

use fairgrab_rs::{Cancellable, FairSelector};

type Item = Arc<Cancellable<u32>>;

fn item(v: u32) -> Item {
    Arc::new(Cancellable::new(v))
}

/// Clients holding 1 and 1000 pending items win the first draw equally often:
/// the winning probability is 1/2 per client, not 1/1001 per item.
#[test]
fn backlog_size_does_not_buy_selection_share() {
    let trials = 2_000u32;
    let mut few_first = 0u32;
    for t in 0..trials {
        let selector: FairSelector<&str, Item> =
            FairSelector::with_seed("root", u64::from(t) + 1);
        selector.add("few", item(0));
        for v in 0..1_000 {
            selector.add("many", item(v + 1));
        }
        if *selector.remove_random().unwrap().payload() == 0 {
            few_first += 1;
        }
    }

    let fraction = f64::from(few_first) / f64::from(trials);
    assert!(
        (fraction - 0.5).abs() < 0.08,
        "one-item client won the first draw at {fraction}"
    );
}

/// The two-client scenario: each item wins the first draw about half the
/// time, and both always come out.
#[test]
fn two_clients_split_the_first_draw() {
    let trials = 4_000u32;
    let mut x_first = 0u32;
    for t in 0..trials {
        let selector: FairSelector<&str, Item> =
            FairSelector::with_seed("root", u64::from(t) + 1);
        selector.add("x", item(1));
        selector.add("y", item(2));

        let first = *selector.remove_random().unwrap().payload();
        if first == 1 {
            x_first += 1;
        }
        let second = *selector.remove_random().unwrap().payload();
        assert_eq!(first + second, 3);
        assert!(selector.is_empty());
    }

    let fraction = f64::from(x_first) / f64::from(trials);
    assert!(
        (fraction - 0.5).abs() < 0.06,
        "first-draw split was {fraction}"
    );
}

/// Four clients with equal backlogs each win about a quarter of first draws.
#[test]
fn four_equal_clients_share_evenly() {
    let trials = 4_000u32;
    let mut wins = [0u32; 4];
    for t in 0..trials {
        let selector: FairSelector<u8, Item> = FairSelector::with_seed(0, u64::from(t) + 1);
        for client in 0u8..4 {
            for v in 0..5 {
                selector.add(client, item(u32::from(client) * 10 + v));
            }
        }
        let first = *selector.remove_random().unwrap().payload();
        wins[(first / 10) as usize] += 1;
    }

    for (client, &count) in wins.iter().enumerate() {
        let fraction = f64::from(count) / f64::from(trials);
        assert!(
            (fraction - 0.25).abs() < 0.05,
            "client {client} won {fraction} of first draws"
        );
    }
}
