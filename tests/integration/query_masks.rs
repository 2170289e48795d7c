#![allow(missing_docs)]

use std::collections::BTreeSet;

use proptest::prelude::*;
use symatem::query::Binding;
use symatem::storage::{Backend, MemoryBackend, StoreOptions};
use symatem::{QueryMask, Symbol, Triple};

fn symbol() -> impl Strategy<Value = Symbol> {
    (0u64..2, 0u64..4).prop_map(|(ns, id)| Symbol::new(ns + 5, id))
}

fn triple() -> impl Strategy<Value = Triple> {
    (symbol(), symbol(), symbol()).prop_map(|(e, a, v)| Triple::new(e, a, v))
}

fn expected(linked: &BTreeSet<Triple>, mask: QueryMask, query: Triple) -> BTreeSet<Triple> {
    let bindings = mask.bindings();
    linked
        .iter()
        .filter(|t| (0..3).all(|pos| bindings[pos] != Binding::Match || t.position(pos) == query.position(pos)))
        .map(|t| {
            let mut slots = [t.entity, t.attribute, t.value];
            for (pos, slot) in slots.iter_mut().enumerate() {
                if bindings[pos] == Binding::Ignore {
                    *slot = query.position(pos);
                }
            }
            Triple::from(slots)
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn counts_match_a_brute_force_scan(
        links in prop::collection::vec((triple(), any::<bool>()), 0..60),
        probes in prop::collection::vec(triple(), 1..6),
    ) {
        let mut store = MemoryBackend::with_options(StoreOptions::new().seed_predefined(false));
        let mut linked = BTreeSet::new();
        for (t, link) in links {
            let changed = store.set_triple(t, link);
            let expected = if link { linked.insert(t) } else { linked.remove(&t) };
            prop_assert_eq!(changed, expected);
        }
        prop_assert!(store.verify_integrity().is_ok());
        for query in probes {
            for mask in QueryMask::ALL {
                let want = expected(&linked, mask, query);
                let mut stream = store.query_triples(mask, query);
                let got: Vec<Triple> = stream.by_ref().collect();
                prop_assert_eq!(stream.matched(), Some(want.len()), "{:?} {}", mask, query);
                let distinct: BTreeSet<Triple> = got.iter().copied().collect();
                prop_assert_eq!(distinct.len(), got.len());
                prop_assert_eq!(distinct, want);
            }
        }
    }
}
