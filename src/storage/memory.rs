use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::{error, trace};

use crate::primitives::bits::copy::bytes_for;
use crate::query::{dispatch, QueryMask, TripleQuery};
use crate::types::{Error, Identity, Result, Symbol, Triple};

use super::backend::{validate_replacements, Backend, DataReplacement};
use super::handle::{Handle, SubIndex};
use super::metrics::{default_metrics, StoreMetrics};
use super::options::StoreOptions;
use super::pool::IdentityPool;
use super::predefined;
use super::symbol_map::SymbolMap;

/// In-memory triple store with bit-granular symbol data.
///
/// Every manifest symbol owns a [`Handle`]; every namespace that ever had a
/// symbol claimed owns an [`IdentityPool`] until it is empty again.
#[derive(Clone)]
pub struct MemoryBackend {
    handles: SymbolMap<Handle>,
    pools: BTreeMap<Identity, IdentityPool>,
    metrics: Arc<dyn StoreMetrics>,
}

impl MemoryBackend {
    /// A store seeded with the meta namespace and the predefined symbols.
    pub fn new() -> Self {
        Self::with_options(StoreOptions::default())
    }

    /// A store configured by `options`.
    pub fn with_options(options: StoreOptions) -> Self {
        let mut store = Self {
            handles: SymbolMap::new(),
            pools: BTreeMap::new(),
            metrics: options.metrics.unwrap_or_else(default_metrics),
        };
        if options.seed_predefined {
            // Every predefined symbol is manifested empty right before its
            // name is written over `[0, name bits)`, so no range can miss.
            if let Err(err) = predefined::seed(&mut store) {
                error!(%err, "store.seed_failed");
            }
        }
        store
    }

    /// The handle of a manifest symbol.
    pub fn handle(&self, symbol: Symbol) -> Option<&Handle> {
        self.handles.get(symbol)
    }

    /// Every handle in symbol order.
    pub fn handles(&self) -> &SymbolMap<Handle> {
        &self.handles
    }

    /// The free-identity pool of `namespace`, if any identity of it is claimed.
    pub fn pool(&self, namespace: Identity) -> Option<&IdentityPool> {
        self.pools.get(&namespace)
    }

    /// Namespaces with at least one claimed identity, ascending.
    pub fn namespaces(&self) -> Vec<Identity> {
        self.pools.keys().copied().collect()
    }

    /// Handles of `namespace` in identity order.
    pub fn symbols_in(&self, namespace: Identity) -> impl Iterator<Item = (Symbol, &Handle)> + '_ {
        self.handles.namespace(namespace)
    }

    fn handle_ref(&self, symbol: Symbol) -> Result<&Handle> {
        self.handles
            .get(symbol)
            .ok_or(Error::UnknownSymbol(symbol))
    }

    fn handle_mut(&mut self, symbol: Symbol) -> Result<&mut Handle> {
        self.handles
            .get_mut(symbol)
            .ok_or(Error::UnknownSymbol(symbol))
    }

    fn indexed(&self, which: SubIndex, triple: &Triple) -> bool {
        let (owner, key, member) = which.split(triple);
        self.handles
            .get(owner)
            .and_then(|handle| handle.index(which).get(key))
            .is_some_and(|set| set.contains(&member))
    }

    /// Checks the structural invariants of the store.
    ///
    /// Verifies clear padding bits, that every handle's identity is claimed
    /// in its pool, that every pool claims exactly the manifest identities,
    /// and that each triple is present in all six sub-indices.
    pub fn verify_integrity(&self) -> Result<()> {
        for (symbol, handle) in self.handles.iter() {
            if !handle.data().padding_is_clear() {
                return Err(Error::Corruption(format!("{symbol} has dirty padding bits")));
            }
            match self.pools.get(&symbol.namespace) {
                Some(pool) if !pool.contains(symbol.identity) => {}
                _ => {
                    return Err(Error::Corruption(format!(
                        "{symbol} is manifest but its identity is free"
                    )))
                }
            }
            for which in SubIndex::ALL {
                for (key, set) in handle.index(which).iter() {
                    if set.is_empty() {
                        return Err(Error::Corruption(format!(
                            "{symbol} keeps an empty {which:?} set under {key}"
                        )));
                    }
                    for &member in set {
                        let triple = which.arrange(symbol, key, member);
                        if let Some(missing) =
                            SubIndex::ALL.into_iter().find(|&other| !self.indexed(other, &triple))
                        {
                            return Err(Error::Corruption(format!(
                                "{triple} is missing from {missing:?}"
                            )));
                        }
                    }
                }
            }
        }
        for (&namespace, pool) in &self.pools {
            let free: u128 = pool
                .ranges()
                .iter()
                .map(|range| match range.count {
                    Some(count) => u128::from(count),
                    None => (1u128 << 64) - u128::from(range.start),
                })
                .sum();
            let claimed = (1u128 << 64) - free;
            let manifest = self.handles.namespace(namespace).count() as u128;
            if claimed != manifest {
                return Err(Error::Corruption(format!(
                    "namespace {namespace} claims {claimed} identities but has {manifest} symbols"
                )));
            }
        }
        Ok(())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("symbols", &self.handles.len())
            .field("namespaces", &self.pools.len())
            .finish()
    }
}

impl Backend for MemoryBackend {
    fn manifest_symbol(&mut self, symbol: Symbol) -> bool {
        if self.handles.contains_key(symbol) {
            return false;
        }
        self.pools
            .entry(symbol.namespace)
            .or_default()
            .remove(symbol.identity);
        self.handles.insert(symbol, Handle::new());
        self.metrics.symbol_manifested();
        trace!(symbol = %symbol, "store.manifest");
        true
    }

    fn create_symbol(&mut self, namespace: Identity) -> Result<Symbol> {
        let identity = self
            .pools
            .get(&namespace)
            .map_or(Some(0), IdentityPool::get)
            .ok_or_else(|| Error::Precondition(format!("namespace {namespace} is exhausted")))?;
        let symbol = Symbol::new(namespace, identity);
        self.manifest_symbol(symbol);
        Ok(symbol)
    }

    fn release_symbol(&mut self, symbol: Symbol) -> bool {
        match self.handles.get(symbol) {
            Some(handle) if handle.is_releasable() => {}
            _ => return false,
        }
        self.handles.remove(symbol);
        if let Some(pool) = self.pools.get_mut(&symbol.namespace) {
            pool.insert(symbol.identity);
            if *pool == IdentityPool::default() {
                self.pools.remove(&symbol.namespace);
            }
        }
        self.metrics.symbol_released();
        trace!(symbol = %symbol, "store.release");
        true
    }

    fn has_symbol(&self, symbol: Symbol) -> bool {
        self.handles.contains_key(symbol)
    }

    fn namespace_symbols(&self, namespace: Identity) -> Vec<Symbol> {
        self.handles
            .namespace(namespace)
            .map(|(symbol, _)| symbol)
            .collect()
    }

    fn get_length(&self, symbol: Symbol) -> Result<u64> {
        Ok(self.handle_ref(symbol)?.len())
    }

    fn crease_length(&mut self, symbol: Symbol, offset: u64, length: i64) -> Result<()> {
        let handle = self.handle_mut(symbol)?;
        let available = handle.len();
        let magnitude = length.unsigned_abs();
        let done = if length >= 0 {
            handle.data.insert_zeros(offset, magnitude)
        } else {
            handle.data.remove(offset, magnitude)
        };
        if !done {
            return Err(Error::OutOfRange {
                symbol,
                offset,
                length: magnitude,
                available,
            });
        }
        if length != 0 {
            self.metrics.crease(length);
            trace!(symbol = %symbol, offset, length, "store.crease");
        }
        Ok(())
    }

    fn read_data(&self, symbol: Symbol, offset: u64, length: u64) -> Result<Vec<u8>> {
        let handle = self.handle_ref(symbol)?;
        handle.data().read(offset, length).ok_or(Error::OutOfRange {
            symbol,
            offset,
            length,
            available: handle.len(),
        })
    }

    fn write_data(&mut self, symbol: Symbol, offset: u64, length: u64, data: &[u8]) -> Result<()> {
        if data.len() < bytes_for(length) {
            return Err(Error::Precondition(format!(
                "{} bytes cannot hold {length} bits",
                data.len()
            )));
        }
        let handle = self.handle_mut(symbol)?;
        let available = handle.len();
        if !handle.data.write(offset, length, data) {
            return Err(Error::OutOfRange {
                symbol,
                offset,
                length,
                available,
            });
        }
        trace!(symbol = %symbol, offset, length, "store.write");
        Ok(())
    }

    fn replace_data_simultaneously(&mut self, replacements: &[DataReplacement]) -> Result<()> {
        validate_replacements(self, replacements)?;
        let sources = replacements
            .iter()
            .map(|op| self.read_data(op.src, op.src_offset, op.length))
            .collect::<Result<Vec<_>>>()?;
        for (op, bits) in replacements.iter().zip(&sources) {
            self.handle_mut(op.dst)?
                .data
                .write(op.dst_offset, op.length, bits);
        }
        trace!(count = replacements.len(), "store.replace");
        Ok(())
    }

    fn set_triple(&mut self, triple: Triple, linked: bool) -> bool {
        if linked {
            for pos in 0..3 {
                self.manifest_symbol(triple.position(pos));
            }
        } else if !self.handles.contains_key(triple.entity) {
            return false;
        }
        if self.get_triple(triple) == linked {
            return false;
        }
        for which in SubIndex::ALL {
            let (owner, key, member) = which.split(&triple);
            if let Some(handle) = self.handles.get_mut(owner) {
                if linked {
                    handle.link(which, key, member);
                } else {
                    handle.unlink(which, key, member);
                }
            }
        }
        if linked {
            self.metrics.triple_linked();
        } else {
            self.metrics.triple_unlinked();
        }
        trace!(triple = %triple, linked, "store.set_triple");
        true
    }

    fn query_triples(&self, mask: QueryMask, triple: Triple) -> TripleQuery<'_> {
        self.metrics.query(mask.code());
        dispatch::query(&self.handles, mask, triple)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::metrics::CounterMetrics;
    use std::sync::atomic::Ordering;

    fn bare() -> MemoryBackend {
        MemoryBackend::with_options(StoreOptions::new().seed_predefined(false))
    }

    #[test]
    fn manifest_and_release_track_pool() {
        let mut store = bare();
        let sym = Symbol::new(5, 3);
        assert!(store.manifest_symbol(sym));
        assert!(!store.manifest_symbol(sym));
        assert!(!store.pool(5).unwrap().contains(3));
        assert_eq!(store.create_symbol(5).unwrap(), Symbol::new(5, 0));
        assert!(store.release_symbol(sym));
        assert!(!store.release_symbol(sym));
        assert!(store.release_symbol(Symbol::new(5, 0)));
        assert!(store.pool(5).is_none());
        store.verify_integrity().unwrap();
    }

    #[test]
    fn release_refuses_data_or_triples() {
        let mut store = bare();
        let s = store.create_symbol(2).unwrap();
        store.crease_length(s, 0, 3).unwrap();
        assert!(!store.release_symbol(s));
        store.crease_length(s, 0, -3).unwrap();
        let t = Triple::new(s, Symbol::new(2, 10), Symbol::new(2, 11));
        assert!(store.set_triple(t, true));
        assert!(!store.release_symbol(Symbol::new(2, 11)));
        assert!(store.unlink_symbol(s).unwrap());
        assert!(!store.has_symbol(s));
        assert!(store.release_symbol(Symbol::new(2, 11)));
        store.verify_integrity().unwrap();
    }

    #[test]
    fn crease_preserves_unaligned_bits() {
        let mut store = bare();
        let s = store.create_symbol(2).unwrap();
        store.crease_length(s, 0, 16).unwrap();
        store.write_data(s, 0, 16, &[0b1011_0110, 0b1100_0011]).unwrap();
        store.crease_length(s, 3, 5).unwrap();
        assert_eq!(store.get_length(s).unwrap(), 21);
        assert_eq!(store.read_data(s, 0, 3).unwrap(), vec![0b110]);
        assert_eq!(store.read_data(s, 3, 5).unwrap(), vec![0]);
        assert_eq!(store.read_data(s, 8, 13).unwrap(), store_bits(&[0b1011_0110, 0b1100_0011], 3, 13));
        store.crease_length(s, 3, -5).unwrap();
        assert_eq!(store.read_data(s, 0, 16).unwrap(), vec![0b1011_0110, 0b1100_0011]);
        store.verify_integrity().unwrap();
    }

    fn store_bits(src: &[u8], off: u64, len: u64) -> Vec<u8> {
        crate::primitives::bits::copy::extract(src, off, len)
    }

    #[test]
    fn range_errors_do_not_mutate() {
        let mut store = bare();
        let s = store.create_symbol(2).unwrap();
        store.crease_length(s, 0, 8).unwrap();
        assert_eq!(
            store.crease_length(s, 9, 3),
            Err(Error::OutOfRange {
                symbol: s,
                offset: 9,
                length: 3,
                available: 8,
            })
        );
        assert!(store.crease_length(s, 4, -5).is_err());
        assert!(store.read_data(s, 4, 5).is_err());
        assert!(store.write_data(s, 1, 8, &[0xFF]).is_err());
        assert!(store.write_data(s, 0, 8, &[]).is_err());
        assert_eq!(store.get_length(s).unwrap(), 8);
        assert_eq!(store.read_data(s, 0, 8).unwrap(), vec![0]);
        assert_eq!(
            store.get_length(Symbol::new(9, 9)),
            Err(Error::UnknownSymbol(Symbol::new(9, 9)))
        );
    }

    #[test]
    fn unlink_of_missing_entity_is_noop() {
        let mut store = bare();
        let t = Triple::new(Symbol::new(3, 0), Symbol::new(3, 1), Symbol::new(3, 2));
        assert!(!store.set_triple(t, false));
        assert!(!store.has_symbol(t.entity));
    }

    #[test]
    fn triples_land_in_all_six_indices() {
        let mut store = bare();
        let t = Triple::new(Symbol::new(3, 0), Symbol::new(3, 1), Symbol::new(3, 2));
        assert!(store.set_triple(t, true));
        for which in SubIndex::ALL {
            assert!(store.indexed(which, &t), "{which:?}");
        }
        store.verify_integrity().unwrap();
        assert!(store.set_triple(t, false));
        for which in SubIndex::ALL {
            assert!(!store.indexed(which, &t), "{which:?}");
        }
        store.verify_integrity().unwrap();
    }

    #[test]
    fn self_referencing_triple_keeps_integrity() {
        let mut store = bare();
        let s = Symbol::new(4, 4);
        let t = Triple::new(s, s, s);
        assert!(store.set_triple(t, true));
        store.verify_integrity().unwrap();
        assert_eq!(store.triples_of(s).len(), 1);
        assert!(store.unlink_symbol(s).unwrap());
        store.verify_integrity().unwrap();
    }

    #[test]
    fn replace_reads_pre_image() {
        let mut store = bare();
        let s = store.create_symbol(2).unwrap();
        store.crease_length(s, 0, 16).unwrap();
        store.write_data(s, 0, 16, &[0xAB, 0xCD]).unwrap();
        store
            .replace_data_simultaneously(&[
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
            ])
            .unwrap();
        assert_eq!(store.read_data(s, 0, 16).unwrap(), vec![0xCD, 0xAB]);
    }

    #[test]
    fn metrics_observe_mutations() {
        let metrics = Arc::new(CounterMetrics::default());
        let mut store =
            MemoryBackend::with_options(StoreOptions::new().seed_predefined(false).metrics(metrics.clone()));
        let t = Triple::new(Symbol::new(3, 0), Symbol::new(3, 1), Symbol::new(3, 2));
        store.set_triple(t, true);
        store.set_triple(t, false);
        store.crease_length(t.entity, 0, 7).unwrap();
        assert_eq!(metrics.symbols_manifested.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.triples_linked.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.triples_unlinked.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.bits_inserted.load(Ordering::Relaxed), 7);
    }
}
