#![allow(missing_docs)]

use std::collections::BTreeSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use proptest::prelude::*;
use symatem::storage::json::{export_json, import_json};
use symatem::storage::predefined::{self, BINARY_NUMBER, ENCODING};
use symatem::storage::{
    Backend, CounterMetrics, DataReplacement, IdentityPool, MemoryBackend, StoreOptions,
};
use symatem::{Error, QueryMask, Result, Symbol, Triple};

fn bare() -> MemoryBackend {
    MemoryBackend::with_options(StoreOptions::new().seed_predefined(false))
}

#[test]
fn written_bytes_read_back() -> Result<()> {
    let mut store = MemoryBackend::new();
    let s = store.create_symbol(3)?;
    assert_eq!(store.get_length(s)?, 0);
    store.crease_length(s, 0, 32)?;
    store.write_data(s, 0, 32, &[0xDE, 0xAD, 0xBE, 0xEF])?;
    assert_eq!(store.get_length(s)?, 32);
    assert_eq!(store.read_data(s, 0, 32)?, vec![0xDE, 0xAD, 0xBE, 0xEF]);
    assert_eq!(store.read_data(s, 4, 8)?, vec![0xDD]);
    store.verify_integrity()
}

#[test]
fn linking_twice_reports_a_conflict() {
    let mut store = bare();
    let [a, b, c] = [Symbol::new(3, 0), Symbol::new(3, 1), Symbol::new(3, 2)];
    let t = Triple::new(a, b, c);
    assert!(store.set_triple(t, true));
    assert!(!store.set_triple(t, true));
    assert_eq!(store.query_triples(QueryMask::MMM, t).finish(), 1);
    assert!(store.has_symbol(b));
    assert!(!store.release_symbol(b));
    assert!(store.set_triple(t, false));
    assert!(store.release_symbol(b));
    assert!(store.verify_integrity().is_ok());
}

#[test]
fn range_errors_change_nothing() {
    let mut store = bare();
    let s = store.create_symbol(3).unwrap();
    store.crease_length(s, 0, 8).unwrap();
    store.write_data(s, 0, 8, &[0x5A]).unwrap();
    assert!(matches!(
        store.read_data(s, 4, 5),
        Err(Error::OutOfRange { available: 8, .. })
    ));
    assert!(store.write_data(s, 1, 8, &[0xFF, 0xFF]).is_err());
    assert!(store.crease_length(s, 9, 1).is_err());
    assert!(store.crease_length(s, 2, -7).is_err());
    assert!(store.replace_data(s, 0, s, 1, 8).is_err());
    assert_eq!(store.read_data(s, 0, 8).unwrap(), vec![0x5A]);
    assert!(matches!(
        store.get_length(Symbol::new(3, 99)),
        Err(Error::UnknownSymbol(_))
    ));
}

#[test]
fn overlapping_destinations_fail_the_whole_batch() {
    let mut store = bare();
    let s = store.create_symbol(3).unwrap();
    store.crease_length(s, 0, 32).unwrap();
    store.write_data(s, 0, 32, &[0x01, 0x02, 0x03, 0x04]).unwrap();
    let batch = [
        DataReplacement {
            dst: s,
            dst_offset: 24,
            src: s,
            src_offset: 0,
            length: 8,
        },
        DataReplacement {
            dst: s,
            dst_offset: 20,
            src: s,
            src_offset: 8,
            length: 8,
        },
    ];
    assert_eq!(
        store.replace_data_simultaneously(&batch),
        Err(Error::OverlappingDestinations(s))
    );
    assert_eq!(store.read_data(s, 0, 32).unwrap(), vec![0x01, 0x02, 0x03, 0x04]);
}

#[test]
fn overlapping_sources_use_pre_image_reads() {
    let mut store = bare();
    let s = store.create_symbol(3).unwrap();
    store.crease_length(s, 0, 32).unwrap();
    store.write_data(s, 0, 32, &[0x01, 0x02, 0x03, 0x04]).unwrap();
    // Swap the first two bytes and copy the first 12 bits to offset 16.
    let batch = [
        DataReplacement {
            dst: s,
            dst_offset: 0,
            src: s,
            src_offset: 8,
            length: 8,
        },
        DataReplacement {
            dst: s,
            dst_offset: 8,
            src: s,
            src_offset: 0,
            length: 8,
        },
        DataReplacement {
            dst: s,
            dst_offset: 16,
            src: s,
            src_offset: 0,
            length: 12,
        },
    ];
    store.replace_data_simultaneously(&batch).unwrap();
    assert_eq!(store.read_data(s, 0, 32).unwrap(), vec![0x02, 0x01, 0x01, 0x02]);
}

#[test]
fn metrics_count_store_events() {
    let metrics = Arc::new(CounterMetrics::default());
    let mut store = MemoryBackend::with_options(
        StoreOptions::new()
            .seed_predefined(false)
            .metrics(metrics.clone()),
    );
    let s = store.create_symbol(3).unwrap();
    store.crease_length(s, 0, 16).unwrap();
    store.crease_length(s, 4, -4).unwrap();
    store.set_triple(Triple::new(s, s, s), true);
    store.query_triples(QueryMask::VII, Triple::new(s, s, s)).finish();
    assert_eq!(metrics.symbols_manifested.load(Ordering::Relaxed), 1);
    assert_eq!(metrics.bits_inserted.load(Ordering::Relaxed), 16);
    assert_eq!(metrics.bits_deleted.load(Ordering::Relaxed), 4);
    assert_eq!(metrics.triples_linked.load(Ordering::Relaxed), 1);
    assert_eq!(metrics.scans.load(Ordering::Relaxed), 1);
}

#[test]
fn namespace_json_survives_export_and_import() -> Result<()> {
    let mut store = MemoryBackend::new();
    let names = predefined::register_namespace(&mut store, &["left", "right"])?;
    let ns = names.identity();
    let left = names.get("left").unwrap_or(Symbol::new(ns, 0));
    let number = store.create_symbol(ns)?;
    store.crease_length(number, 0, 16)?;
    store.write_data(number, 0, 16, &[0x39, 0x05])?;
    store.set_triple(Triple::new(number, ENCODING, BINARY_NUMBER), true);
    let blob = store.create_symbol(ns)?;
    store.crease_length(blob, 0, 12)?;
    store.write_data(blob, 0, 12, &[0xA1, 0x0B])?;
    store.set_triple(Triple::new(left, blob, number), true);

    let text = export_json(&store, [ns])?;
    assert!(text.contains("\"\\\"left\\\"\""), "{text}");
    assert!(text.contains(",16,1337,"), "{text}");
    assert!(text.contains("\"hex:1AB0\""), "{text}");

    let mut other = MemoryBackend::new();
    assert_eq!(import_json(&mut other, &text)?, 4);
    assert_eq!(export_json(&other, [ns])?, text);
    assert!(other.get_triple(Triple::new(left, blob, number)));
    other.verify_integrity()
}

proptest! {
    #[test]
    fn identity_pool_tracks_the_complement(ops in prop::collection::vec((any::<bool>(), 0u64..48), 0..200)) {
        let mut pool = IdentityPool::new();
        let mut claimed = BTreeSet::new();
        for (claim, id) in ops {
            if claim {
                prop_assert_eq!(pool.remove(id), claimed.insert(id));
            } else {
                prop_assert_eq!(pool.insert(id), claimed.remove(&id));
            }
            let first_free = (0..).find(|id| !claimed.contains(id));
            prop_assert_eq!(pool.get(), first_free);
            for id in 0..50 {
                prop_assert_eq!(pool.contains(id), !claimed.contains(&id));
            }
        }
    }

    #[test]
    fn crease_out_and_back_keeps_the_surroundings(
        bytes in prop::collection::vec(any::<u8>(), 1..12),
        start in 0u64..96,
        span in 1u64..40,
    ) {
        let mut store = bare();
        let s = store.create_symbol(3).unwrap();
        let length = bytes.len() as u64 * 8;
        let start = start % length;
        let span = span.min(length - start) as i64;
        store.crease_length(s, 0, length as i64).unwrap();
        store.write_data(s, 0, length, &bytes).unwrap();
        store.crease_length(s, start, -span).unwrap();
        store.crease_length(s, start, span).unwrap();
        prop_assert_eq!(store.get_length(s).unwrap(), length);
        prop_assert_eq!(store.read_data(s, 0, start).unwrap(), store_prefix(&bytes, start));
        let tail = start + span as u64;
        let expected = bits_of(&bytes, tail, length - tail);
        prop_assert_eq!(store.read_data(s, tail, length - tail).unwrap(), expected);
        prop_assert_eq!(store.read_data(s, start, span as u64).unwrap(), vec![0; (span as usize).div_ceil(8)]);
        prop_assert!(store.verify_integrity().is_ok());
    }
}

fn store_prefix(bytes: &[u8], bits: u64) -> Vec<u8> {
    bits_of(bytes, 0, bits)
}

fn bits_of(bytes: &[u8], offset: u64, length: u64) -> Vec<u8> {
    let mut out = vec![0u8; length.div_ceil(8) as usize];
    for k in 0..length {
        let src = offset + k;
        if bytes[(src / 8) as usize] >> (src % 8) & 1 == 1 {
            out[(k / 8) as usize] |= 1 << (k % 8);
        }
    }
    out
}
