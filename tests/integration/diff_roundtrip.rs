#![allow(missing_docs)]

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use symatem::diff::{Diff, Recorder, RelocationTable};
use symatem::storage::json::export_json;
use symatem::storage::{signed_length, Backend, DataReplacement, MemoryBackend, StoreOptions};
use symatem::{Result, Symbol, Triple};

const NS: u64 = 5;

fn bare() -> MemoryBackend {
    MemoryBackend::with_options(StoreOptions::new().seed_predefined(false))
}

fn snapshot(store: &MemoryBackend) -> String {
    export_json(store, [NS]).expect("export")
}

fn random_bytes(rng: &mut ChaCha8Rng, bits: u64) -> Vec<u8> {
    (0..bits.div_ceil(8)).map(|_| rng.gen()).collect()
}

fn seeded_store(rng: &mut ChaCha8Rng) -> Result<MemoryBackend> {
    let mut store = bare();
    for _ in 0..3 {
        let s = store.create_symbol(NS)?;
        let bits: u64 = rng.gen_range(0..48);
        store.crease_length(s, 0, bits as i64)?;
        let data = random_bytes(rng, bits);
        store.write_data(s, 0, bits, &data)?;
    }
    let symbols = store.namespace_symbols(NS);
    for _ in 0..4 {
        let any = |rng: &mut ChaCha8Rng| symbols[rng.gen_range(0..symbols.len())];
        let t = Triple::new(any(rng), any(rng), any(rng));
        store.set_triple(t, true);
    }
    Ok(store)
}

fn pick<B: Backend>(rng: &mut ChaCha8Rng, target: &B) -> Option<Symbol> {
    let symbols = target.namespace_symbols(NS);
    (!symbols.is_empty()).then(|| symbols[rng.gen_range(0..symbols.len())])
}

fn random_range<B: Backend>(rng: &mut ChaCha8Rng, target: &B, symbol: Symbol) -> (u64, u64) {
    let length = target.get_length(symbol).unwrap_or(0);
    let offset = rng.gen_range(0..=length);
    let span = rng.gen_range(0..=length - offset);
    (offset, span)
}

/// Up to three replacements with disjoint destinations; sources may overlap
/// each other and the destinations.
fn random_batch<B: Backend>(rng: &mut ChaCha8Rng, target: &B) -> Result<Vec<DataReplacement>> {
    let mut batch: Vec<DataReplacement> = Vec::new();
    for _ in 0..rng.gen_range(1..=3) {
        let (Some(dst), Some(src)) = (pick(rng, target), pick(rng, target)) else {
            break;
        };
        let (src_offset, span) = random_range(rng, target, src);
        let dst_length = target.get_length(dst)?;
        let length = span.min(dst_length);
        let dst_offset = rng.gen_range(0..=dst_length - length);
        let clashes = batch.iter().any(|op| {
            op.dst == dst
                && op.dst_offset < dst_offset + length
                && dst_offset < op.dst_offset + op.length
        });
        if !clashes {
            batch.push(DataReplacement {
                dst,
                dst_offset,
                src,
                src_offset,
                length,
            });
        }
    }
    Ok(batch)
}

fn random_step<B: Backend>(rng: &mut ChaCha8Rng, target: &mut B) -> Result<()> {
    let Some(s) = pick(rng, target) else {
        target.create_symbol(NS)?;
        return Ok(());
    };
    match rng.gen_range(0..8) {
        0 => {
            target.create_symbol(NS)?;
        }
        1 => {
            if rng.gen_bool(0.3) {
                target.unlink_symbol(s)?;
            }
        }
        2 => {
            let length = target.get_length(s)?;
            let offset = rng.gen_range(0..=length);
            target.crease_length(s, offset, rng.gen_range(1..24))?;
        }
        3 => {
            let (offset, span) = random_range(rng, target, s);
            target.crease_length(s, offset, -signed_length(span)?)?;
        }
        4 => {
            let (offset, span) = random_range(rng, target, s);
            let data = random_bytes(rng, span);
            target.write_data(s, offset, span, &data)?;
        }
        5 => {
            let batch = random_batch(rng, target)?;
            target.replace_data_simultaneously(&batch)?;
        }
        _ => {
            let (Some(a), Some(v)) = (pick(rng, target), pick(rng, target)) else {
                return Ok(());
            };
            let t = Triple::new(s, a, v);
            let linked = target.get_triple(t);
            target.set_triple(t, !linked);
        }
    }
    Ok(())
}

#[test]
fn random_recordings_replay_both_ways() -> Result<()> {
    for seed in 0..64 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut store = seeded_store(&mut rng)?;
        let before = snapshot(&store);
        let mut recorder = Recorder::new(&mut store);
        for _ in 0..rng.gen_range(1..40) {
            random_step(&mut rng, &mut recorder)?;
        }
        let diff = recorder.commit();
        let after = snapshot(&store);
        store.verify_integrity()?;

        diff.apply(true, &RelocationTable::new(), &mut store)?;
        assert_eq!(snapshot(&store), before, "seed {seed}: reverse");
        store.verify_integrity()?;

        let decoded = Diff::from_json(&diff.to_json()?)?;
        decoded.apply(false, &RelocationTable::new(), &mut store)?;
        assert_eq!(snapshot(&store), after, "seed {seed}: forward");
        store.verify_integrity()?;
    }
    Ok(())
}

#[test]
fn reverse_then_forward_is_stable_over_repeats() -> Result<()> {
    let mut rng = ChaCha8Rng::seed_from_u64(0x5EED);
    let mut store = seeded_store(&mut rng)?;
    let before = snapshot(&store);
    let mut recorder = Recorder::new(&mut store);
    for _ in 0..60 {
        random_step(&mut rng, &mut recorder)?;
    }
    let diff = recorder.commit();
    let after = snapshot(&store);
    for _ in 0..3 {
        diff.apply(true, &RelocationTable::new(), &mut store)?;
        assert_eq!(snapshot(&store), before);
        diff.apply(false, &RelocationTable::new(), &mut store)?;
        assert_eq!(snapshot(&store), after);
    }
    Ok(())
}

#[test]
fn deleted_nibble_comes_back() -> Result<()> {
    let mut store = bare();
    let s = store.create_symbol(NS)?;
    store.crease_length(s, 0, 8)?;
    store.write_data(s, 0, 8, &[0b0101_0101])?;
    let mut recorder = Recorder::new(&mut store);
    recorder.crease_length(s, 4, -4)?;
    let diff = Diff::from_json(&recorder.commit().to_json()?)?;
    assert_eq!(store.get_length(s)?, 4);
    diff.apply(true, &RelocationTable::new(), &mut store)?;
    assert_eq!(store.read_data(s, 0, 8)?, vec![0b0101_0101]);
    Ok(())
}

#[test]
fn applying_twice_forward_is_refused() -> Result<()> {
    let mut store = bare();
    let s = store.create_symbol(NS)?;
    let mut recorder = Recorder::new(&mut store);
    recorder.set_triple(Triple::new(s, s, s), true);
    recorder.crease_length(s, 0, 4)?;
    let diff = recorder.commit();
    let snapshot_after = snapshot(&store);
    assert!(diff.apply(false, &RelocationTable::new(), &mut store).is_err());
    assert_eq!(snapshot(&store), snapshot_after);
    Ok(())
}
