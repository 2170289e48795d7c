#![allow(missing_docs)]

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use symatem::diff::RelocationTable;
use symatem::storage::json::export_json;
use symatem::storage::{Backend, MemoryBackend};
use symatem::{Error, Repository, Result, Symbol, Triple};

const MODAL: [u64; 2] = [20, 21];

fn version(id: u64) -> Symbol {
    Symbol::new(30, id)
}

fn snapshot(store: &MemoryBackend, table: &RelocationTable) -> String {
    let namespaces: Vec<u64> = table.iter().map(|(_, concrete)| concrete).collect();
    export_json(store, namespaces).expect("export")
}

fn edit<B: Backend>(rng: &mut ChaCha8Rng, target: &mut B, table: &RelocationTable) -> Result<()> {
    let namespaces: Vec<u64> = MODAL.iter().filter_map(|&m| table.get(m)).collect();
    for _ in 0..rng.gen_range(1..8) {
        let ns = namespaces[rng.gen_range(0..namespaces.len())];
        let symbols = target.namespace_symbols(ns);
        if symbols.is_empty() || rng.gen_bool(0.2) {
            let s = target.create_symbol(ns)?;
            let bits: u64 = rng.gen_range(0..40);
            target.crease_length(s, 0, bits as i64)?;
            let data: Vec<u8> = (0..bits.div_ceil(8)).map(|_| rng.gen()).collect();
            target.write_data(s, 0, bits, &data)?;
            continue;
        }
        let s = symbols[rng.gen_range(0..symbols.len())];
        let length = target.get_length(s)?;
        match rng.gen_range(0..4) {
            0 => {
                let offset = rng.gen_range(0..=length);
                target.crease_length(s, offset, rng.gen_range(1..16))?;
            }
            1 if length > 0 => {
                let offset = rng.gen_range(0..length);
                let span = rng.gen_range(1..=length - offset);
                target.crease_length(s, offset, -(span as i64))?;
            }
            2 => {
                let other = symbols[rng.gen_range(0..symbols.len())];
                let t = Triple::new(s, other, s);
                let linked = target.get_triple(t);
                target.set_triple(t, !linked);
            }
            _ => {
                if rng.gen_bool(0.3) {
                    target.unlink_symbol(s)?;
                }
            }
        }
    }
    Ok(())
}

#[test]
fn every_version_materializes_to_its_recorded_state() -> Result<()> {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut store = MemoryBackend::new();
    let mut repo = Repository::new(MODAL.to_vec());
    repo.manifest_version(version(0));
    let root_table = repo.materialize_version(&mut store, version(0))?;
    let mut states = BTreeMap::new();
    states.insert(0, snapshot(&store, &root_table));

    for id in 1..12u64 {
        let parent = rng.gen_range(0..id);
        let table = repo.record_version(&mut store, version(parent), version(id), |rec, table| {
            edit(&mut rng, rec, table)
        })?;
        assert_eq!(table, root_table);
        states.insert(id, snapshot(&store, &table));
        store.verify_integrity()?;
    }

    let mut order: Vec<u64> = (0..12).collect();
    for round in 0..3 {
        for i in (1..order.len()).rev() {
            order.swap(i, rng.gen_range(0..=i));
        }
        for &id in &order {
            let table = repo.materialize_version(&mut store, version(id))?;
            assert_eq!(snapshot(&store, &table), states[&id], "round {round} version {id}");
        }
        store.verify_integrity()?;
    }
    Ok(())
}

#[test]
fn fresh_checkouts_start_from_a_root() -> Result<()> {
    let mut store = MemoryBackend::new();
    let mut repo = Repository::new(MODAL.to_vec());
    repo.manifest_version(version(0));
    repo.record_version(&mut store, version(0), version(1), |rec, table| {
        let s = rec.create_symbol(table.get(MODAL[0]).unwrap_or(MODAL[0]))?;
        rec.crease_length(s, 0, 8)?;
        rec.write_data(s, 0, 8, &[0x42])
    })?;
    assert!(repo.dematerialize_version(&mut store, version(1))?);
    assert!(!repo.dematerialize_version(&mut store, version(1))?);

    let hops = repo.find_path_to(version(1), None).unwrap_or_default();
    assert_eq!(hops.len(), 1);
    assert_eq!(hops[0].from, version(0));
    assert!(!hops[0].reverse);

    let table = repo.materialize_version(&mut store, version(1))?;
    let s = Symbol::new(table.get(MODAL[0]).unwrap_or(MODAL[0]), 0);
    assert_eq!(store.read_data(s, 0, 8)?, vec![0x42]);
    assert_eq!(
        repo.materialize_version(&mut store, version(9)),
        Err(Error::VersionNotFound(version(9)))
    );
    Ok(())
}

#[test]
fn diffs_are_stored_in_modal_namespaces() -> Result<()> {
    let mut store = MemoryBackend::new();
    let mut repo = Repository::new(vec![MODAL[0]]);
    repo.manifest_version(version(0));
    let table = repo.record_version(&mut store, version(0), version(1), |rec, table| {
        rec.create_symbol(table.get(MODAL[0]).unwrap_or(MODAL[0])).map(|_| ())
    })?;
    assert_ne!(table.get(MODAL[0]), Some(MODAL[0]));
    let diff = repo.diff(version(0), version(1)).cloned().unwrap_or_default();
    assert_eq!(diff.manifest_symbols(), &[Symbol::new(MODAL[0], 0)]);
    Ok(())
}
