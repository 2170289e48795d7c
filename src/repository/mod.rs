#![forbid(unsafe_code)]
//! Versions connected by diffs.
//!
//! Diffs stored in a [`Repository`] are written against its modal
//! namespaces. Materializing a version gives it a checkout: one concrete
//! namespace per modal namespace, described by a [`RelocationTable`]. A
//! checkout moves between versions by replaying the diffs along the shortest
//! path, forward along parent → child edges and reversed against them.

use std::collections::{BTreeMap, VecDeque};

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

use crate::diff::{Diff, Recorder, RelocationTable};
use crate::storage::predefined::META_NAMESPACE;
use crate::storage::{Backend, SymbolMap, SymbolSet};
use crate::types::{Error, Identity, Result, Symbol};

/// One step of a path between versions.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Hop {
    /// Version the checkout leaves.
    pub from: Symbol,
    /// Version the checkout reaches.
    pub to: Symbol,
    /// True if the edge runs child → parent, so its diff is applied reversed.
    pub reverse: bool,
}

/// A version DAG with the checkouts currently held in a backend.
#[derive(Clone, Debug, Default)]
pub struct Repository {
    modal_namespaces: Vec<Identity>,
    versions: SymbolSet,
    parents: SymbolMap<SymbolSet>,
    children: SymbolMap<SymbolSet>,
    edges: BTreeMap<(Symbol, Symbol), Diff>,
    checkouts: SymbolMap<RelocationTable>,
}

impl Repository {
    /// Creates an empty repository whose diffs address `modal_namespaces`.
    pub fn new(modal_namespaces: Vec<Identity>) -> Self {
        Self {
            modal_namespaces,
            ..Self::default()
        }
    }

    /// Namespaces the stored diffs are written against.
    pub fn modal_namespaces(&self) -> &[Identity] {
        &self.modal_namespaces
    }

    /// Every known version.
    pub fn versions(&self) -> &SymbolSet {
        &self.versions
    }

    /// Direct parents of `version`.
    pub fn parents(&self, version: Symbol) -> impl Iterator<Item = Symbol> + '_ {
        self.parents.get(version).into_iter().flatten().copied()
    }

    /// Direct children of `version`.
    pub fn children(&self, version: Symbol) -> impl Iterator<Item = Symbol> + '_ {
        self.children.get(version).into_iter().flatten().copied()
    }

    /// The diff leading from `parent` to `child`.
    pub fn diff(&self, parent: Symbol, child: Symbol) -> Option<&Diff> {
        self.edges.get(&(parent, child))
    }

    /// Checkout of `version`, if it is materialized.
    pub fn checkout(&self, version: Symbol) -> Option<&RelocationTable> {
        self.checkouts.get(version)
    }

    /// Registers a version. False if it is already known.
    pub fn manifest_version(&mut self, version: Symbol) -> bool {
        self.versions.insert(version)
    }

    fn require(&self, version: Symbol) -> Result<()> {
        if self.versions.contains(&version) {
            Ok(())
        } else {
            Err(Error::VersionNotFound(version))
        }
    }

    fn descends_from(&self, version: Symbol, ancestor: Symbol) -> bool {
        let mut stack = vec![version];
        let mut seen = FxHashSet::default();
        while let Some(current) = stack.pop() {
            if current == ancestor {
                return true;
            }
            if seen.insert(current) {
                stack.extend(self.parents(current));
            }
        }
        false
    }

    /// Connects `parent` to `child` with `diff`, which must lead from the
    /// state of `parent` to the state of `child` in modal namespaces.
    pub fn add_diff(&mut self, parent: Symbol, child: Symbol, diff: Diff) -> Result<()> {
        self.require(parent)?;
        self.require(child)?;
        if parent == child {
            return Err(Error::Precondition(format!("{parent} cannot be its own parent")));
        }
        if self.edges.contains_key(&(parent, child)) {
            return Err(Error::Precondition(format!("{parent} → {child} already exists")));
        }
        if self.descends_from(parent, child) {
            return Err(Error::Precondition(format!(
                "{parent} → {child} would close a cycle"
            )));
        }
        self.parents.get_or_insert_with(child, SymbolSet::new).insert(parent);
        self.children.get_or_insert_with(parent, SymbolSet::new).insert(child);
        self.edges.insert((parent, child), diff);
        debug!(parent = %parent, child = %child, "repository.add_diff");
        Ok(())
    }

    /// Shortest path leading to `dst`.
    ///
    /// With `src` the path starts there. Without it the path starts at the
    /// nearest materialized version, or at the nearest version without
    /// parents if nothing reachable is materialized.
    pub fn find_path_to(&self, dst: Symbol, src: Option<Symbol>) -> Option<Vec<Hop>> {
        if !self.versions.contains(&dst) {
            return None;
        }
        let is_goal = |version: Symbol| match src {
            Some(src) => version == src,
            None => self.checkouts.contains_key(version),
        };
        let mut toward_dst: FxHashMap<Symbol, Symbol> = FxHashMap::default();
        let mut seen = FxHashSet::default();
        let mut queue = VecDeque::from([dst]);
        seen.insert(dst);
        let mut root = None;
        let mut goal = None;
        while let Some(current) = queue.pop_front() {
            if is_goal(current) {
                goal = Some(current);
                break;
            }
            if root.is_none() && self.parents(current).next().is_none() {
                root = Some(current);
            }
            for next in self.parents(current).chain(self.children(current)) {
                if seen.insert(next) {
                    toward_dst.insert(next, current);
                    queue.push_back(next);
                }
            }
        }
        let start = match (goal, src) {
            (Some(goal), _) => goal,
            (None, None) => root?,
            (None, Some(_)) => return None,
        };
        let mut hops = Vec::new();
        let mut current = start;
        while current != dst {
            let next = toward_dst[&current];
            let reverse = !self.edges.contains_key(&(current, next));
            hops.push(Hop {
                from: current,
                to: next,
                reverse,
            });
            current = next;
        }
        Some(hops)
    }

    fn fresh_checkout<B: Backend + ?Sized>(&self, backend: &mut B) -> Result<RelocationTable> {
        let mut table = RelocationTable::new();
        for &modal in &self.modal_namespaces {
            let meta = backend.create_symbol(META_NAMESPACE)?;
            table.insert(modal, meta.identity);
        }
        Ok(table)
    }

    /// Gives `version` a checkout in `backend` and returns it.
    ///
    /// An existing checkout is moved along the path; if none is reachable a
    /// fresh one is created at a root and moved from there. When a diff
    /// fails to apply the checkout stays at the last version it reached,
    /// unless the target was left half-mutated, in which case it is dropped.
    pub fn materialize_version<B: Backend + ?Sized>(
        &mut self,
        backend: &mut B,
        version: Symbol,
    ) -> Result<RelocationTable> {
        self.require(version)?;
        if let Some(table) = self.checkouts.get(version) {
            return Ok(table.clone());
        }
        let hops = self.find_path_to(version, None).ok_or(Error::NoPath(version))?;
        let start = hops.first().map_or(version, |hop| hop.from);
        let table = match self.checkouts.remove(start) {
            Some(table) => table,
            None => self.fresh_checkout(backend)?,
        };
        let mut reached = start;
        for hop in &hops {
            let edge = if hop.reverse {
                (hop.to, hop.from)
            } else {
                (hop.from, hop.to)
            };
            let Some(diff) = self.edges.get(&edge) else {
                return Err(Error::Corruption(format!("missing diff {} → {}", edge.0, edge.1)));
            };
            if let Err(err) = diff.apply(hop.reverse, &table, backend) {
                if matches!(err, Error::PartialApply(_)) {
                    warn!(version = %reached, "repository.checkout_lost");
                } else {
                    self.checkouts.set(reached, table);
                }
                return Err(err);
            }
            reached = hop.to;
        }
        debug!(version = %version, hops = hops.len(), "repository.materialize");
        self.checkouts.set(version, table.clone());
        Ok(table)
    }

    /// Removes the checkout of `version` from `backend`. False if it has none.
    pub fn dematerialize_version<B: Backend + ?Sized>(
        &mut self,
        backend: &mut B,
        version: Symbol,
    ) -> Result<bool> {
        let Some(table) = self.checkouts.remove(version) else {
            return Ok(false);
        };
        for (_, namespace) in table.iter() {
            for symbol in backend.namespace_symbols(namespace) {
                backend.unlink_symbol(symbol)?;
            }
            backend.unlink_symbol(Symbol::new(META_NAMESPACE, namespace))?;
        }
        debug!(version = %version, "repository.dematerialize");
        Ok(true)
    }

    /// Records `edit` on top of `parent` as the new version `child`.
    ///
    /// `edit` receives a recorder over `backend` and the parent checkout; the
    /// recorded diff is stored in modal namespaces and the checkout moves on
    /// to `child`. If `edit` fails its changes are rolled back.
    pub fn record_version<B, F>(
        &mut self,
        backend: &mut B,
        parent: Symbol,
        child: Symbol,
        edit: F,
    ) -> Result<RelocationTable>
    where
        B: Backend + ?Sized,
        F: FnOnce(&mut Recorder<'_, B>, &RelocationTable) -> Result<()>,
    {
        self.require(parent)?;
        if self.versions.contains(&child) {
            return Err(Error::Precondition(format!("version {child} already exists")));
        }
        let table = self.materialize_version(backend, parent)?;
        let mut recorder = Recorder::new(backend);
        let outcome = edit(&mut recorder, &table);
        let diff = recorder.commit();
        if let Err(err) = outcome {
            if let Err(undo) = diff.apply(true, &RelocationTable::new(), backend) {
                warn!(%undo, version = %parent, "repository.rollback_failed");
                self.checkouts.remove(parent);
            }
            return Err(err);
        }
        let modal = diff.relocated(&table.inverse());
        self.manifest_version(child);
        self.add_diff(parent, child, modal)?;
        self.checkouts.remove(parent);
        self.checkouts.set(child, table.clone());
        debug!(parent = %parent, child = %child, "repository.record");
        Ok(table)
    }
}
