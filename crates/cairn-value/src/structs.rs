//! Struct values: named fields plus an optional union choice.

use std::fmt;
use std::sync::Arc;

use cairn_types::{Ref, RefCache};

use crate::chunk::Future;
use crate::codec;
use crate::error::{ValueError, ValueResult};
use crate::map::Map;
use crate::typeref::TypeRef;
use crate::value::Value;

/// An instance of a struct type.
///
/// The type is normally an [`TypeRef::Unresolved`] pointing into a
/// registered package. Fields are held in a persistent [`Map`] keyed by
/// field name, so setters share structure with the original struct.
#[derive(Clone)]
pub struct Struct {
    type_ref: TypeRef,
    fields: Map,
    choice: Option<Arc<(u32, Value)>>,
    cache: RefCache,
}

impl Struct {
    pub fn new<N, V>(type_ref: TypeRef, fields: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<Value>,
    {
        let fields = fields
            .into_iter()
            .map(|(name, value)| (Value::from(name.into()), value.into()))
            .collect();
        Self::with_parts(type_ref, fields, None)
    }

    /// Build a struct from a map whose keys must all be strings.
    pub fn from_map(type_ref: TypeRef, fields: Map) -> ValueResult<Self> {
        if let Some(key) = fields.keys().find(|k| k.as_str().is_none()) {
            return Err(ValueError::mismatch(
                &type_ref,
                format!("field names must be strings, found {}", key.kind()),
            ));
        }
        Ok(Self::with_parts(type_ref, fields, None))
    }

    fn with_parts(type_ref: TypeRef, fields: Map, choice: Option<Arc<(u32, Value)>>) -> Self {
        Self {
            type_ref,
            fields,
            choice,
            cache: RefCache::new(),
        }
    }

    /// A copy of this struct holding union alternative `index`.
    pub fn with_choice(&self, index: u32, value: impl Into<Value>) -> Struct {
        Self::with_parts(
            self.type_ref.clone(),
            self.fields.clone(),
            Some(Arc::new((index, value.into()))),
        )
    }

    pub fn type_ref(&self) -> &TypeRef {
        &self.type_ref
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.maybe_get(&Value::from(name))
    }

    pub fn has(&self, name: &str) -> bool {
        self.fields.has(&Value::from(name))
    }

    /// A copy of this struct with field `name` set to `value`.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Struct {
        Self::with_parts(
            self.type_ref.clone(),
            self.fields.set(name, value),
            self.choice.clone(),
        )
    }

    /// A copy of this struct without field `name`.
    pub fn remove(&self, name: &str) -> Struct {
        Self::with_parts(
            self.type_ref.clone(),
            self.fields.remove(&Value::from(name)),
            self.choice.clone(),
        )
    }

    /// The field map, keyed by field name.
    pub fn fields(&self) -> &Map {
        &self.fields
    }

    /// The union alternative held by this struct, as `(index, value)`.
    pub fn choice(&self) -> Option<(u32, &Value)> {
        self.choice.as_deref().map(|(i, v)| (*i, v))
    }

    pub fn content_ref(&self) -> Ref {
        self.cache.ensure(|| codec::hash_struct(self))
    }

    /// Packages referenced by the struct type, plus the chunks of every
    /// field and of the choice.
    pub fn chunks(&self) -> Vec<Future> {
        let mut chunks = self.type_ref.chunks();
        chunks.extend(self.fields.values().flat_map(Value::chunks));
        if let Some((_, v)) = self.choice() {
            chunks.extend(v.chunks());
        }
        chunks
    }
}

impl PartialEq for Struct {
    fn eq(&self, other: &Self) -> bool {
        self.content_ref() == other.content_ref()
    }
}

impl Eq for Struct {}

impl fmt::Debug for Struct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(&self.type_ref.to_string());
        for (k, v) in self.fields.entries() {
            s.field(k.as_str().unwrap_or("?"), v);
        }
        if let Some((i, v)) = self.choice() {
            s.field(&format!("${i}"), v);
        }
        s.finish()
    }
}
