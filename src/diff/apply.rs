use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::primitives::bits::BitBuffer;
use crate::storage::{signed_length, Backend};
use crate::types::{Error, Result, Symbol, Triple};

use super::commit::{CreaseOperation, DataOperation, Diff};
use super::relocation::RelocationTable;

/// The lists a replay walks in one direction.
struct Direction<'d> {
    manifest: &'d [Symbol],
    release: &'d [Symbol],
    link: &'d [Triple],
    unlink: &'d [Triple],
}

impl Diff {
    fn direction(&self, reverse: bool) -> Direction<'_> {
        if reverse {
            Direction {
                manifest: &self.release_symbols,
                release: &self.manifest_symbols,
                link: &self.unlink_triples,
                unlink: &self.link_triples,
            }
        } else {
            Direction {
                manifest: &self.manifest_symbols,
                release: &self.release_symbols,
                link: &self.link_triples,
                unlink: &self.unlink_triples,
            }
        }
    }

    /// Replays the diff against `target`, forward or in reverse.
    ///
    /// Unless `target` is itself recording, every precondition is checked
    /// before anything is mutated: symbols to manifest must be absent,
    /// symbols to release must hold exactly their minimum length and no
    /// triples besides the ones being unlinked, every other touched symbol
    /// must be at least its minimum length, and every triple must be in the
    /// opposite of its requested state. A failure while mutating is reported
    /// as [`Error::PartialApply`].
    pub fn apply<T: Backend + ?Sized>(
        &self,
        reverse: bool,
        relocation: &RelocationTable,
        target: &mut T,
    ) -> Result<()> {
        if !target.is_recording() {
            self.preflight(reverse, relocation, target)?;
        }
        if let Err(err) = self.mutate(reverse, relocation, target) {
            warn!(%err, reverse, "diff.apply.partial");
            return Err(Error::PartialApply(Box::new(err)));
        }
        debug!(reverse, "diff.apply");
        Ok(())
    }

    fn preflight<T: Backend + ?Sized>(
        &self,
        reverse: bool,
        relocation: &RelocationTable,
        target: &T,
    ) -> Result<()> {
        let plan = self.direction(reverse);
        let manifesting: BTreeSet<Symbol> = plan
            .manifest
            .iter()
            .map(|&symbol| relocation.relocate(symbol))
            .collect();
        let unlinking: BTreeSet<Triple> = plan
            .unlink
            .iter()
            .map(|&triple| relocation.relocate_triple(triple))
            .collect();
        for &symbol in &manifesting {
            if target.has_symbol(symbol) {
                return Err(Error::Precondition(format!("{symbol} already exists")));
            }
        }
        for entry in &self.minimum_lengths {
            let symbol = relocation.relocate(entry.symbol);
            if manifesting.contains(&symbol) {
                continue;
            }
            let needed = if reverse { entry.reverse } else { entry.forward };
            let length = target.get_length(symbol)?;
            if length < needed {
                return Err(Error::Precondition(format!(
                    "{symbol} has {length} bits, needs at least {needed}"
                )));
            }
        }
        for &recorded in plan.release {
            let symbol = relocation.relocate(recorded);
            let needed = self.minimum_length(recorded, reverse);
            let length = target.get_length(symbol)?;
            if length != needed {
                return Err(Error::Precondition(format!(
                    "{symbol} has {length} bits, release needs exactly {needed}"
                )));
            }
            if let Some(stray) = target
                .triples_of(symbol)
                .into_iter()
                .find(|triple| !unlinking.contains(triple))
            {
                return Err(Error::Precondition(format!(
                    "{symbol} is still referenced by {stray}"
                )));
            }
        }
        for &triple in plan.link {
            let triple = relocation.relocate_triple(triple);
            if target.get_triple(triple) {
                return Err(Error::Precondition(format!("{triple} is already linked")));
            }
        }
        for &triple in &unlinking {
            if !target.get_triple(triple) {
                return Err(Error::Precondition(format!("{triple} is not linked")));
            }
        }
        Ok(())
    }

    fn mutate<T: Backend + ?Sized>(
        &self,
        reverse: bool,
        relocation: &RelocationTable,
        target: &mut T,
    ) -> Result<()> {
        let plan = self.direction(reverse);
        for &symbol in plan.manifest {
            let symbol = relocation.relocate(symbol);
            if !target.manifest_symbol(symbol) {
                return Err(Error::Precondition(format!("{symbol} already exists")));
            }
        }
        if reverse {
            for op in self.decreases.iter().rev() {
                crease(target, relocation, op, true)?;
            }
            write_pool(target, relocation, &self.restores, &self.data_restore, "dataRestore")?;
            for op in self.increases.iter().rev() {
                crease(target, relocation, op, false)?;
            }
        } else {
            for op in &self.increases {
                crease(target, relocation, op, true)?;
            }
            write_pool(target, relocation, &self.replaces, &self.data_source, "dataSource")?;
            for op in &self.decreases {
                crease(target, relocation, op, false)?;
            }
        }
        for &triple in plan.unlink {
            let triple = relocation.relocate_triple(triple);
            if !target.set_triple(triple, false) {
                return Err(Error::Precondition(format!("{triple} is not linked")));
            }
        }
        for &triple in plan.link {
            let triple = relocation.relocate_triple(triple);
            if !target.set_triple(triple, true) {
                return Err(Error::Precondition(format!("{triple} is already linked")));
            }
        }
        for &symbol in plan.release {
            let symbol = relocation.relocate(symbol);
            if !target.release_symbol(symbol) {
                return Err(Error::Precondition(format!("{symbol} cannot be released")));
            }
        }
        Ok(())
    }
}

fn crease<T: Backend + ?Sized>(
    target: &mut T,
    relocation: &RelocationTable,
    op: &CreaseOperation,
    grow: bool,
) -> Result<()> {
    let amount = signed_length(op.length)?;
    let amount = if grow { amount } else { -amount };
    target.crease_length(relocation.relocate(op.symbol), op.offset, amount)
}

fn write_pool<T: Backend + ?Sized>(
    target: &mut T,
    relocation: &RelocationTable,
    ops: &[DataOperation],
    pool: &BitBuffer,
    name: &'static str,
) -> Result<()> {
    for op in ops {
        let bits = pool
            .read(op.src_offset, op.length)
            .ok_or(Error::UninitializedSlice {
                pool: name,
                offset: op.src_offset,
                length: op.length,
            })?;
        target.write_data(relocation.relocate(op.symbol), op.dst_offset, op.length, &bits)?;
    }
    Ok(())
}
