#![allow(missing_docs)]

use symatem::diff::{Diff, Recorder, RelocationTable};
use symatem::storage::json::export_json;
use symatem::storage::predefined::{DIFF, TYPE};
use symatem::storage::{Backend, MemoryBackend};
use symatem::{Result, Symbol, Triple};

const WORK: u64 = 6;
const ARCHIVE: u64 = 9;

fn recorded(store: &mut MemoryBackend) -> Result<(Diff, Symbol)> {
    let s = store.create_symbol(WORK)?;
    store.crease_length(s, 0, 24)?;
    store.write_data(s, 0, 24, &[0x10, 0x20, 0x30])?;
    let mut recorder = Recorder::new(store);
    let t = recorder.create_symbol(WORK)?;
    recorder.crease_length(t, 0, 8)?;
    recorder.replace_data(t, 0, s, 8, 8)?;
    recorder.crease_length(s, 4, -12)?;
    recorder.set_triple(Triple::new(s, t, s), true);
    Ok((recorder.commit(), s))
}

#[test]
fn stored_diff_replays_after_reload() -> Result<()> {
    let mut store = MemoryBackend::new();
    let (diff, s) = recorded(&mut store)?;
    let after = export_json(&store, [WORK])?;
    let stored = diff.link(&mut store, ARCHIVE)?;
    assert!(store.get_triple(Triple::new(stored, TYPE, DIFF)));

    let loaded = Diff::load(&store, stored)?;
    loaded.apply(true, &RelocationTable::new(), &mut store)?;
    assert_eq!(store.get_length(s)?, 24);
    assert_eq!(store.read_data(s, 0, 24)?, vec![0x10, 0x20, 0x30]);
    assert_eq!(store.namespace_symbols(WORK), vec![s]);

    loaded.apply(false, &RelocationTable::new(), &mut store)?;
    assert_eq!(export_json(&store, [WORK])?, after);
    assert!(Diff::unlink(&mut store, stored)?);
    assert!(store.namespace_symbols(ARCHIVE).is_empty());
    store.verify_integrity()
}

#[test]
fn relocation_replays_into_another_namespace() -> Result<()> {
    let mut store = MemoryBackend::new();
    let before_copy = store.clone();
    let (diff, _) = recorded(&mut store)?;

    let mut copy = before_copy;
    let s = copy.create_symbol(WORK + 1)?;
    copy.crease_length(s, 0, 24)?;
    copy.write_data(s, 0, 24, &[0x10, 0x20, 0x30])?;
    let table: RelocationTable = [(WORK, WORK + 1)].into_iter().collect();
    diff.apply(false, &table, &mut copy)?;
    let t = Symbol::new(WORK + 1, 1);
    assert_eq!(copy.read_data(t, 0, 8)?, vec![0x20]);
    assert!(copy.get_triple(Triple::new(s, t, s)));
    assert_eq!(copy.read_data(s, 0, 12)?, vec![0x00, 0x03]);
    copy.verify_integrity()
}

#[test]
fn composing_into_a_recorder_yields_the_combined_diff() -> Result<()> {
    let mut store = MemoryBackend::new();
    let (first, s) = recorded(&mut store)?;
    let middle = export_json(&store, [WORK])?;
    let mut recorder = Recorder::new(&mut store);
    recorder.write_data(s, 0, 4, &[0x0F])?;
    let second = recorder.commit();
    let after = export_json(&store, [WORK])?;

    second.apply(true, &RelocationTable::new(), &mut store)?;
    assert_eq!(export_json(&store, [WORK])?, middle);
    let mut composer = Recorder::new(&mut store);
    first.apply(true, &RelocationTable::new(), &mut composer)?;
    let combined = composer.commit();
    assert_eq!(store.read_data(s, 0, 24)?, vec![0x10, 0x20, 0x30]);

    combined.apply(true, &RelocationTable::new(), &mut store)?;
    assert_eq!(export_json(&store, [WORK])?, middle);
    second.apply(false, &RelocationTable::new(), &mut store)?;
    assert_eq!(export_json(&store, [WORK])?, after);
    store.verify_integrity()
}
