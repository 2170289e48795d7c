//! Immutable table of predefined symbols and registration of named namespaces.
//!
//! Namespace [`META_NAMESPACE`] holds one symbol per namespace: `0:n` stands
//! for namespace `n`. Namespace [`PREDEFINED_NAMESPACE`] holds the symbols
//! below, whose identities never change.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use tracing::debug;

use crate::types::{Identity, Result, Symbol, Triple};

use super::backend::Backend;

/// Namespace whose symbols stand for namespaces.
pub const META_NAMESPACE: Identity = 0;
/// Namespace of the predefined symbols.
pub const PREDEFINED_NAMESPACE: Identity = 1;

const fn predefined(identity: Identity) -> Symbol {
    Symbol::new(PREDEFINED_NAMESPACE, identity)
}

/// The empty value.
pub const VOID: Symbol = predefined(0);
/// Attribute naming a symbol.
pub const NAME: Symbol = predefined(1);
/// Attribute giving a symbol's type.
pub const TYPE: Symbol = predefined(2);
/// Attribute giving the encoding of a symbol's data.
pub const ENCODING: Symbol = predefined(3);
/// Encoding: unsigned binary number, least significant bit first.
pub const BINARY_NUMBER: Symbol = predefined(4);
/// Encoding: two's complement integer.
pub const TWOS_COMPLEMENT: Symbol = predefined(5);
/// Encoding: IEEE 754 floating point.
pub const IEEE754: Symbol = predefined(6);
/// Encoding: UTF-8 text.
pub const UTF8: Symbol = predefined(7);
/// Type of a symbol holding a serialized diff.
pub const DIFF: Symbol = predefined(8);

/// Predefined symbols and their names, in identity order.
pub const TABLE: [(Symbol, &str); 9] = [
    (VOID, "Void"),
    (NAME, "Name"),
    (TYPE, "Type"),
    (ENCODING, "Encoding"),
    (BINARY_NUMBER, "BinaryNumber"),
    (TWOS_COMPLEMENT, "TwosComplement"),
    (IEEE754, "IEEE754"),
    (UTF8, "UTF8"),
    (DIFF, "Diff"),
];

fn by_name() -> &'static BTreeMap<&'static str, Symbol> {
    static INDEX: OnceLock<BTreeMap<&'static str, Symbol>> = OnceLock::new();
    INDEX.get_or_init(|| TABLE.iter().map(|&(symbol, name)| (name, symbol)).collect())
}

/// Looks up a predefined symbol by name.
pub fn symbol_by_name(name: &str) -> Option<Symbol> {
    by_name().get(name).copied()
}

/// Name of a predefined symbol.
pub fn name_of(symbol: Symbol) -> Option<&'static str> {
    if symbol.namespace != PREDEFINED_NAMESPACE {
        return None;
    }
    TABLE
        .get(usize::try_from(symbol.identity).ok()?)
        .map(|&(_, name)| name)
}

/// Stores `text` as the data of `symbol` and tags it `Encoding → UTF8`.
pub fn set_text<B: Backend + ?Sized>(backend: &mut B, symbol: Symbol, text: &str) -> Result<()> {
    let bits = text.len() as u64 * 8;
    let length = backend.get_length(symbol)?;
    if length > 0 {
        backend.crease_length(symbol, 0, -super::backend::signed_length(length)?)?;
    }
    backend.crease_length(symbol, 0, super::backend::signed_length(bits)?)?;
    backend.write_data(symbol, 0, bits, text.as_bytes())?;
    backend.set_triple(Triple::new(symbol, ENCODING, UTF8), true);
    Ok(())
}

/// Reads the data of `symbol` as UTF-8 text, `None` if it is not valid text.
pub fn get_text<B: Backend + ?Sized>(backend: &B, symbol: Symbol) -> Result<Option<String>> {
    let length = backend.get_length(symbol)?;
    if length % 8 != 0 {
        return Ok(None);
    }
    let bytes = backend.read_data(symbol, 0, length)?;
    Ok(String::from_utf8(bytes).ok())
}

/// Seeds the meta namespace and the predefined symbols.
pub(crate) fn seed<B: Backend + ?Sized>(backend: &mut B) -> Result<()> {
    backend.manifest_symbol(Symbol::new(META_NAMESPACE, META_NAMESPACE));
    backend.manifest_symbol(Symbol::new(META_NAMESPACE, PREDEFINED_NAMESPACE));
    for (symbol, _) in TABLE {
        backend.manifest_symbol(symbol);
    }
    for (symbol, name) in TABLE {
        set_text(backend, symbol, name)?;
    }
    debug!(count = TABLE.len(), "predefined.seed");
    Ok(())
}

/// A namespace created by [`register_namespace`] with its named symbols.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedNamespace {
    /// The meta symbol standing for the namespace.
    pub meta: Symbol,
    /// Symbols in registration order with their names.
    pub symbols: Vec<(String, Symbol)>,
}

impl NamedNamespace {
    /// Identity of the namespace.
    pub fn identity(&self) -> Identity {
        self.meta.identity
    }

    /// Looks up a registered symbol by name.
    pub fn get(&self, name: &str) -> Option<Symbol> {
        self.symbols
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|&(_, symbol)| symbol)
    }
}

/// Creates a fresh namespace holding one UTF-8 named symbol per entry of `names`.
///
/// The predefined table itself is never touched.
pub fn register_namespace<B: Backend + ?Sized>(
    backend: &mut B,
    names: &[&str],
) -> Result<NamedNamespace> {
    let meta = backend.create_symbol(META_NAMESPACE)?;
    let mut symbols = Vec::with_capacity(names.len());
    for name in names {
        let symbol = backend.create_symbol(meta.identity)?;
        set_text(backend, symbol, name)?;
        symbols.push(((*name).to_owned(), symbol));
    }
    debug!(namespace = meta.identity, count = symbols.len(), "predefined.register_namespace");
    Ok(NamedNamespace { meta, symbols })
}
