//! Namespace snapshots as JSON.
//!
//! A snapshot is `{"symbols": [[symbol, bitLength, data, [attribute, value, ...]], ...]}`
//! sorted by symbol. `data` is a quoted string for symbols tagged
//! `Encoding → UTF8`, a bare number for `Encoding → BinaryNumber` up to 64
//! bits and `"hex:<nibble-swapped hex>"` otherwise. The attribute/value list
//! holds every triple the symbol is the entity of.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::primitives::bits::{copy::bytes_for, hex};
use crate::query::QueryMask;
use crate::types::{Error, Identity, Result, Symbol, Triple};

use super::backend::{signed_length, Backend};
use super::predefined::{BINARY_NUMBER, ENCODING, UTF8};

const HEX_PREFIX: &str = "hex:";

/// One exported symbol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SymbolEntry(pub String, pub u64, pub Value, pub Vec<String>);

/// A snapshot of one or more namespaces.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NamespaceDump {
    /// Exported symbols in ascending order.
    pub symbols: Vec<SymbolEntry>,
}

fn encode_data<B: Backend + ?Sized>(backend: &B, symbol: Symbol, length: u64) -> Result<Value> {
    let bytes = backend.read_data(symbol, 0, length)?;
    if backend.get_triple(Triple::new(symbol, ENCODING, UTF8)) && length % 8 == 0 {
        if let Ok(text) = String::from_utf8(bytes.clone()) {
            return Ok(Value::String(format!("\"{text}\"")));
        }
    }
    if backend.get_triple(Triple::new(symbol, ENCODING, BINARY_NUMBER)) && length <= 64 {
        let mut word = [0u8; 8];
        word[..bytes.len()].copy_from_slice(&bytes);
        return Ok(Value::from(u64::from_le_bytes(word)));
    }
    Ok(Value::String(format!("{HEX_PREFIX}{}", hex::encode(&bytes))))
}

fn decode_data(symbol: Symbol, length: u64, data: &Value) -> Result<Vec<u8>> {
    let malformed = |why: &str| Error::Serialization(format!("data of {symbol}: {why}"));
    let bytes = match data {
        Value::Number(number) => {
            let value = number.as_u64().ok_or_else(|| malformed("not an unsigned number"))?;
            if length > 64 || (length < 64 && value >> length != 0) {
                return Err(malformed("number does not fit the bit length"));
            }
            value.to_le_bytes()[..bytes_for(length)].to_vec()
        }
        Value::String(text) => {
            if let Some(digits) = text.strip_prefix(HEX_PREFIX) {
                hex::decode(digits)?
            } else if let Some(inner) = text
                .strip_prefix('"')
                .and_then(|rest| rest.strip_suffix('"'))
            {
                if inner.len() as u64 * 8 != length {
                    return Err(malformed("text does not match the bit length"));
                }
                inner.as_bytes().to_vec()
            } else {
                return Err(malformed("unrecognized string form"));
            }
        }
        _ => return Err(malformed("expected a string or a number")),
    };
    if bytes.len() < bytes_for(length) {
        return Err(malformed("fewer bits than the bit length"));
    }
    Ok(bytes)
}

/// Snapshots every symbol of `namespaces`.
pub fn export_namespaces<B: Backend + ?Sized>(
    backend: &B,
    namespaces: impl IntoIterator<Item = Identity>,
) -> Result<NamespaceDump> {
    let mut namespaces: Vec<Identity> = namespaces.into_iter().collect();
    namespaces.sort_unstable();
    namespaces.dedup();
    let mut dump = NamespaceDump::default();
    for namespace in namespaces {
        for symbol in backend.namespace_symbols(namespace) {
            let length = backend.get_length(symbol)?;
            let data = encode_data(backend, symbol, length)?;
            let mut pairs: Vec<(Symbol, Symbol)> = backend
                .query_triples(QueryMask::MVV, Triple::new(symbol, symbol, symbol))
                .map(|triple| (triple.attribute, triple.value))
                .collect();
            pairs.sort_unstable();
            let flat = pairs
                .into_iter()
                .flat_map(|(attribute, value)| [attribute.to_string(), value.to_string()])
                .collect();
            dump.symbols
                .push(SymbolEntry(symbol.to_string(), length, data, flat));
        }
    }
    debug!(symbols = dump.symbols.len(), "json.export");
    Ok(dump)
}

/// Snapshots `namespaces` as JSON text.
pub fn export_json<B: Backend + ?Sized>(
    backend: &B,
    namespaces: impl IntoIterator<Item = Identity>,
) -> Result<String> {
    Ok(serde_json::to_string(&export_namespaces(backend, namespaces)?)?)
}

/// Recreates the symbols, data and triples of `dump` in `backend`.
///
/// Every symbol of the dump must be absent from `backend`. Returns the
/// number of symbols created.
pub fn import_namespaces<B: Backend + ?Sized>(backend: &mut B, dump: &NamespaceDump) -> Result<usize> {
    let mut decoded = Vec::with_capacity(dump.symbols.len());
    for SymbolEntry(name, length, data, flat) in &dump.symbols {
        let symbol: Symbol = name.parse()?;
        if backend.has_symbol(symbol) {
            return Err(Error::Precondition(format!("{symbol} already exists")));
        }
        if flat.len() % 2 != 0 {
            return Err(Error::Serialization(format!(
                "triples of {symbol} are not attribute/value pairs"
            )));
        }
        let bytes = decode_data(symbol, *length, data)?;
        let pairs = flat
            .chunks_exact(2)
            .map(|pair| Ok((pair[0].parse::<Symbol>()?, pair[1].parse::<Symbol>()?)))
            .collect::<Result<Vec<_>>>()?;
        decoded.push((symbol, *length, bytes, pairs));
    }
    for (symbol, length, bytes, _) in &decoded {
        backend.manifest_symbol(*symbol);
        if *length > 0 {
            backend.crease_length(*symbol, 0, signed_length(*length)?)?;
            backend.write_data(*symbol, 0, *length, bytes)?;
        }
    }
    for (symbol, _, _, pairs) in &decoded {
        for &(attribute, value) in pairs {
            backend.set_triple(Triple::new(*symbol, attribute, value), true);
        }
    }
    debug!(symbols = decoded.len(), "json.import");
    Ok(decoded.len())
}

/// Parses JSON text produced by [`export_json`] into `backend`.
pub fn import_json<B: Backend + ?Sized>(backend: &mut B, text: &str) -> Result<usize> {
    let dump: NamespaceDump = serde_json::from_str(text)?;
    import_namespaces(backend, &dump)
}
