//! Canonical binary encoding of values.
//!
//! A value is lowered to an [`Encoded`] tree and written with bincode's
//! fixed-width little-endian format. Map and set members are written in
//! ascending order and numbers in canonical form, so the bytes (and
//! therefore the ref) depend only on content. Refs are the
//! [`ContentHasher::VALUE`] hash of these bytes.

use std::sync::Arc;

use bincode::Options;
use bytes::Bytes;
use cairn_crypto::ContentHasher;
use cairn_types::Ref;
use serde::{Deserialize, Serialize};

use crate::error::{ValueError, ValueResult};
use crate::list::List;
use crate::map::Map;
use crate::package::Package;
use crate::set::Set;
use crate::structs::Struct;
use crate::typeref::TypeRef;
use crate::value::{canonical_number, RefValue, Value};

#[derive(Serialize, Deserialize)]
enum Encoded {
    Bool(bool),
    /// Bit pattern of the canonical `f64`.
    Number(u64),
    String(String),
    Blob(Vec<u8>),
    List(Vec<Encoded>),
    Set(Vec<Encoded>),
    Map(Vec<(Encoded, Encoded)>),
    Struct {
        type_ref: TypeRef,
        fields: Vec<(Encoded, Encoded)>,
        choice: Option<(u32, Box<Encoded>)>,
    },
    Type(TypeRef),
    Package(Package),
    Ref {
        target: Ref,
        target_type: TypeRef,
    },
}

fn lower(value: &Value) -> Encoded {
    match value {
        Value::Bool(b) => Encoded::Bool(*b),
        Value::Number(n) => Encoded::Number(canonical_number(*n).to_bits()),
        Value::String(s) => Encoded::String(s.to_string()),
        Value::Blob(b) => Encoded::Blob(b.to_vec()),
        Value::List(l) => lower_list(l),
        Value::Set(s) => lower_set(s),
        Value::Map(m) => lower_map(m),
        Value::Struct(s) => lower_struct(s),
        Value::Type(t) => Encoded::Type(TypeRef::clone(t)),
        Value::Package(p) => Encoded::Package(Package::clone(p)),
        Value::Ref(r) => Encoded::Ref {
            target: r.target(),
            target_type: r.target_type().clone(),
        },
    }
}

fn lower_list(list: &List) -> Encoded {
    Encoded::List(list.iter().map(lower).collect())
}

fn lower_set(set: &Set) -> Encoded {
    Encoded::Set(set.values().map(lower).collect())
}

fn lower_entries(map: &Map) -> Vec<(Encoded, Encoded)> {
    map.entries().map(|(k, v)| (lower(k), lower(v))).collect()
}

fn lower_map(map: &Map) -> Encoded {
    Encoded::Map(lower_entries(map))
}

fn lower_struct(s: &Struct) -> Encoded {
    Encoded::Struct {
        type_ref: s.type_ref().clone(),
        fields: lower_entries(s.fields()),
        choice: s.choice().map(|(i, v)| (i, Box::new(lower(v)))),
    }
}

fn lift(encoded: Encoded) -> ValueResult<Value> {
    Ok(match encoded {
        Encoded::Bool(b) => Value::Bool(b),
        Encoded::Number(bits) => Value::Number(f64::from_bits(bits)),
        Encoded::String(s) => Value::String(Arc::from(s)),
        Encoded::Blob(b) => Value::Blob(Bytes::from(b)),
        Encoded::List(items) => Value::List(List::from_items(
            items.into_iter().map(lift).collect::<ValueResult<Vec<_>>>()?,
        )),
        Encoded::Set(items) => Value::Set(Set::from_items(
            items.into_iter().map(lift).collect::<ValueResult<Vec<_>>>()?,
        )),
        Encoded::Map(entries) => Value::Map(lift_entries(entries)?),
        Encoded::Struct {
            type_ref,
            fields,
            choice,
        } => {
            let s = Struct::from_map(type_ref, lift_entries(fields)?)?;
            match choice {
                Some((index, value)) => Value::Struct(s.with_choice(index, lift(*value)?)),
                None => Value::Struct(s),
            }
        }
        Encoded::Type(t) => Value::Type(Arc::new(t)),
        Encoded::Package(p) => Value::Package(Arc::new(p)),
        Encoded::Ref {
            target,
            target_type,
        } => Value::Ref(RefValue::new(target, target_type)),
    })
}

fn lift_entries(entries: Vec<(Encoded, Encoded)>) -> ValueResult<Map> {
    entries
        .into_iter()
        .map(|(k, v)| Ok((lift(k)?, lift(v)?)))
        .collect::<ValueResult<Vec<(Value, Value)>>>()
        .map(Map::from_entries)
}

/// Canonical bytes of `value`.
pub fn encode(value: &Value) -> ValueResult<Vec<u8>> {
    bincode::serialize(&lower(value)).map_err(|e| ValueError::Codec(e.to_string()))
}

/// Decode bytes produced by [`encode`].
///
/// Only canonical encodings are accepted: the bytes must be exactly what
/// [`encode`] writes for the decoded value, so the value's ref is always the
/// hash of `bytes`. Trailing bytes, unordered or repeated members and
/// non-canonical numbers are rejected.
pub fn decode(bytes: &[u8]) -> ValueResult<Value> {
    let encoded: Encoded = bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
        .deserialize(bytes)
        .map_err(|e| ValueError::Codec(e.to_string()))?;
    let value = lift(encoded)?;
    if encode(&value)? != bytes {
        return Err(ValueError::Codec("non-canonical encoding".to_string()));
    }
    Ok(value)
}

fn hash_encoded(encoded: &Encoded) -> Ref {
    // Serializing an in-memory tree into a hasher has no failure path.
    ContentHasher::VALUE
        .hash_bincode(encoded)
        .expect("canonical encoding of an in-memory value is infallible")
}

pub(crate) fn hash_value(value: &Value) -> Ref {
    hash_encoded(&lower(value))
}

pub(crate) fn hash_list(list: &List) -> Ref {
    hash_encoded(&lower_list(list))
}

pub(crate) fn hash_set(set: &Set) -> Ref {
    hash_encoded(&lower_set(set))
}

pub(crate) fn hash_map(map: &Map) -> Ref {
    hash_encoded(&lower_map(map))
}

pub(crate) fn hash_struct(s: &Struct) -> Ref {
    hash_encoded(&lower_struct(s))
}

/// A type descriptor hashes like the `Type` value wrapping it.
pub(crate) fn hash_type(t: &TypeRef) -> Ref {
    hash_encoded(&Encoded::Type(t.clone()))
}

pub(crate) fn hash_package(p: &Package) -> Ref {
    hash_encoded(&Encoded::Package(p.clone()))
}
