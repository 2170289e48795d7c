//! Index walks answering each binding pattern.
//!
//! Every mask is served by exactly one sub-index: bound positions pick the
//! owning handle and first-level key, so no walk is deeper than needed.
//! Patterns without a bound position scan all handles in key order.

use crate::storage::{Handle, IndexLevel, SubIndex, SymbolMap};
use crate::types::{Symbol, Triple};

use super::{QueryMask, TripleQuery};

type Handles = SymbolMap<Handle>;

/// Runs `mask` against `handles` with the bound and pass-through positions
/// taken from `query`.
pub(crate) fn query<'a>(handles: &'a Handles, mask: QueryMask, query: Triple) -> TripleQuery<'a> {
    let Triple {
        entity: e,
        attribute: a,
        value: v,
    } = query;
    match mask {
        QueryMask::MMM => probe(member_exists(handles, e, SubIndex::Eav, a, v), query),
        QueryMask::VMM => members(handles, a, SubIndex::Ave, v),
        QueryMask::IMM => probe(key_exists(handles, a, SubIndex::Ave, v), query),
        QueryMask::MVM => members(handles, e, SubIndex::Eva, v),
        QueryMask::VVM => pairs(handles, v, SubIndex::Vea),
        QueryMask::IVM => keys(handles, v, SubIndex::Vae, query),
        QueryMask::MIM => probe(key_exists(handles, e, SubIndex::Eva, v), query),
        QueryMask::VIM => keys(handles, v, SubIndex::Vea, query),
        QueryMask::IIM => probe(owner_indexed(handles, v, SubIndex::Vea), query),
        QueryMask::MMV => members(handles, e, SubIndex::Eav, a),
        QueryMask::VMV => pairs(handles, a, SubIndex::Aev),
        QueryMask::IMV => keys(handles, a, SubIndex::Ave, query),
        QueryMask::MVV => pairs(handles, e, SubIndex::Eav),
        QueryMask::VVV => all_pairs(handles, SubIndex::Eav),
        QueryMask::IVV => all_keys(handles, SubIndex::Ave, query),
        QueryMask::MIV => keys(handles, e, SubIndex::Eva, query),
        QueryMask::VIV => all_keys(handles, SubIndex::Eva, query),
        QueryMask::IIV => all_owners(handles, SubIndex::Vea, query),
        QueryMask::MMI => probe(key_exists(handles, e, SubIndex::Eav, a), query),
        QueryMask::VMI => keys(handles, a, SubIndex::Aev, query),
        QueryMask::IMI => probe(owner_indexed(handles, a, SubIndex::Ave), query),
        QueryMask::MVI => keys(handles, e, SubIndex::Eav, query),
        QueryMask::VVI => all_keys(handles, SubIndex::Eav, query),
        QueryMask::IVI => all_owners(handles, SubIndex::Ave, query),
        QueryMask::MII => probe(owner_indexed(handles, e, SubIndex::Eav), query),
        QueryMask::VII => all_owners(handles, SubIndex::Eav, query),
        QueryMask::III => probe(
            handles
                .values()
                .any(|handle| !handle.index(SubIndex::Eav).is_empty()),
            query,
        ),
    }
}

fn level(handles: &Handles, owner: Symbol, which: SubIndex) -> Option<&IndexLevel> {
    handles.get(owner).map(|handle| handle.index(which))
}

fn member_exists(handles: &Handles, owner: Symbol, which: SubIndex, key: Symbol, member: Symbol) -> bool {
    level(handles, owner, which)
        .and_then(|level| level.get(key))
        .is_some_and(|set| set.contains(&member))
}

fn key_exists(handles: &Handles, owner: Symbol, which: SubIndex, key: Symbol) -> bool {
    level(handles, owner, which).is_some_and(|level| level.contains_key(key))
}

fn owner_indexed(handles: &Handles, owner: Symbol, which: SubIndex) -> bool {
    level(handles, owner, which).is_some_and(|level| !level.is_empty())
}

fn probe<'a>(found: bool, query: Triple) -> TripleQuery<'a> {
    TripleQuery::new(found.then_some(query).into_iter())
}

/// Second-level members under a bound owner and key.
fn members(handles: &Handles, owner: Symbol, which: SubIndex, key: Symbol) -> TripleQuery<'_> {
    let set = level(handles, owner, which).and_then(|level| level.get(key));
    TripleQuery::new(
        set.into_iter()
            .flatten()
            .map(move |&member| which.arrange(owner, key, member)),
    )
}

/// Every (key, member) pair under a bound owner.
fn pairs(handles: &Handles, owner: Symbol, which: SubIndex) -> TripleQuery<'_> {
    let walk = level(handles, owner, which).into_iter().flat_map(move |level| {
        level.iter().flat_map(move |(key, set)| {
            set.iter()
                .map(move |&member| which.arrange(owner, key, member))
        })
    });
    TripleQuery::new(walk)
}

/// First-level keys under a bound owner; the member position is ignored.
fn keys(handles: &Handles, owner: Symbol, which: SubIndex, query: Triple) -> TripleQuery<'_> {
    let filler = query.position(which.positions()[2]);
    let walk = level(handles, owner, which)
        .into_iter()
        .flat_map(move |level| level.keys().map(move |key| which.arrange(owner, key, filler)));
    TripleQuery::new(walk)
}

fn all_pairs(handles: &Handles, which: SubIndex) -> TripleQuery<'_> {
    let walk = handles.iter().flat_map(move |(owner, handle)| {
        handle.index(which).iter().flat_map(move |(key, set)| {
            set.iter()
                .map(move |&member| which.arrange(owner, key, member))
        })
    });
    TripleQuery::new(walk)
}

fn all_keys(handles: &Handles, which: SubIndex, query: Triple) -> TripleQuery<'_> {
    let filler = query.position(which.positions()[2]);
    let walk = handles.iter().flat_map(move |(owner, handle)| {
        handle
            .index(which)
            .keys()
            .map(move |key| which.arrange(owner, key, filler))
    });
    TripleQuery::new(walk)
}

/// Handles occupying the owner position of at least one triple.
fn all_owners(handles: &Handles, which: SubIndex, query: Triple) -> TripleQuery<'_> {
    let owner_pos = which.positions()[0];
    let walk = handles
        .iter()
        .filter(move |(_, handle)| !handle.index(which).is_empty())
        .map(move |(owner, _)| {
            let mut slots = [query.entity, query.attribute, query.value];
            slots[owner_pos] = owner;
            Triple::from(slots)
        });
    TripleQuery::new(walk)
}
