//! The universal value type.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use bytes::Bytes;
use cairn_types::Ref;

use crate::chunk::{Future, ValueReader};
use crate::codec;
use crate::error::{ValueError, ValueResult};
use crate::kind::Kind;
use crate::list::List;
use crate::map::Map;
use crate::package::Package;
use crate::registry::TypeRegistry;
use crate::set::Set;
use crate::structs::Struct;
use crate::typeref::TypeRef;

/// Any unit of data in the content-addressed model.
///
/// Values are immutable. Cloning is cheap (containers are reference
/// counted), and every "update" on a container returns a new value that
/// shares unchanged structure with the original.
///
/// Equality is content equality: two values are equal exactly when their
/// [`content_ref`](Value::content_ref)s are equal.
#[derive(Clone)]
pub enum Value {
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    Blob(Bytes),
    List(List),
    Set(Set),
    Map(Map),
    Struct(Struct),
    Type(Arc<TypeRef>),
    Package(Arc<Package>),
    /// A typed pointer to a value stored separately.
    Ref(RefValue),
}

/// A typed pointer to another stored value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RefValue {
    target: Ref,
    target_type: TypeRef,
}

impl RefValue {
    pub fn new(target: Ref, target_type: TypeRef) -> Self {
        Self {
            target,
            target_type,
        }
    }

    /// A ref to `value`, typed with the value's own type descriptor.
    pub fn to(value: &Value) -> Self {
        Self::new(value.content_ref(), value.type_ref())
    }

    pub fn target(&self) -> Ref {
        self.target
    }

    pub fn target_type(&self) -> &TypeRef {
        &self.target_type
    }

    pub fn future(&self) -> Future {
        Future::unresolved(self.target)
    }

    /// Load the target value through `reader`.
    pub fn resolve<R: ValueReader + ?Sized>(&self, reader: &R) -> Result<Value, R::Error> {
        reader.read_value(&self.target)
    }
}

/// `-0.0` and `0.0` are the same number, and every NaN is the same NaN.
pub(crate) fn canonical_number(n: f64) -> f64 {
    if n == 0.0 {
        0.0
    } else if n.is_nan() {
        f64::NAN
    } else {
        n
    }
}

impl Value {
    /// Build a string value.
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Self::String(s.into())
    }

    pub fn kind(&self) -> Kind {
        match self {
            Self::Bool(_) => Kind::Bool,
            Self::Number(_) => Kind::Number,
            Self::String(_) => Kind::String,
            Self::Blob(_) => Kind::Blob,
            Self::List(_) => Kind::List,
            Self::Set(_) => Kind::Set,
            Self::Map(_) => Kind::Map,
            Self::Struct(_) => Kind::Struct,
            Self::Type(_) => Kind::Type,
            Self::Package(_) => Kind::Package,
            Self::Ref(_) => Kind::Ref,
        }
    }

    /// The structural type of this value.
    ///
    /// Untyped containers report `Value` element types; structs report the
    /// type they were built with.
    pub fn type_ref(&self) -> TypeRef {
        match self {
            Self::List(l) => l.type_ref(),
            Self::Set(s) => s.type_ref(),
            Self::Map(m) => m.type_ref(),
            Self::Struct(s) => s.type_ref().clone(),
            Self::Ref(r) => TypeRef::ref_of(r.target_type.clone()),
            other => TypeRef::primitive(other.kind()),
        }
    }

    /// Content hash of this value. Memoized for containers and structs.
    pub fn content_ref(&self) -> Ref {
        match self {
            Self::List(l) => l.content_ref(),
            Self::Set(s) => s.content_ref(),
            Self::Map(m) => m.content_ref(),
            Self::Struct(s) => s.content_ref(),
            other => codec::hash_value(other),
        }
    }

    /// Futures for every value this value references but does not hold
    /// inline, including the packages its type descriptors refer to.
    pub fn chunks(&self) -> Vec<Future> {
        match self {
            Self::Bool(_) | Self::Number(_) | Self::String(_) | Self::Blob(_) => Vec::new(),
            Self::List(l) => l.chunks(),
            Self::Set(s) => s.chunks(),
            Self::Map(m) => m.chunks(),
            Self::Struct(s) => s.chunks(),
            Self::Type(t) => t.chunks(),
            Self::Package(p) => p.chunks(),
            Self::Ref(r) => {
                let mut chunks = vec![r.future()];
                chunks.extend(r.target_type.chunks());
                chunks
            }
        }
    }

    /// Convert to a typed wrapper, validating against its structural type.
    pub fn cast<T: FromValue>(&self, registry: &TypeRegistry) -> ValueResult<T> {
        T::from_value(self, registry)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&Bytes> {
        match self {
            Self::Blob(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&Set> {
        match self {
            Self::Set(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&Struct> {
        match self {
            Self::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<&TypeRef> {
        match self {
            Self::Type(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_package(&self) -> Option<&Package> {
        match self {
            Self::Package(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_ref_value(&self) -> Option<&RefValue> {
        match self {
            Self::Ref(r) => Some(r),
            _ => None,
        }
    }
}

impl Ord for Value {
    /// Booleans, numbers and strings order by their natural value; every
    /// other value orders by kind, then by content ref.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Number(a), Self::Number(b)) => {
                canonical_number(*a).total_cmp(&canonical_number(*b))
            }
            (Self::String(a), Self::String(b)) => a.cmp(b),
            _ => self
                .kind()
                .cmp(&other.kind())
                .then_with(|| self.content_ref().cmp(&other.content_ref())),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.content_ref().hash(state);
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Blob(b) => write!(f, "Blob({} bytes)", b.len()),
            Self::List(l) => fmt::Debug::fmt(l, f),
            Self::Set(s) => fmt::Debug::fmt(s, f),
            Self::Map(m) => fmt::Debug::fmt(m, f),
            Self::Struct(s) => fmt::Debug::fmt(s, f),
            Self::Type(t) => write!(f, "Type({t})"),
            Self::Package(p) => write!(f, "Package({})", p.content_ref().short_hex()),
            Self::Ref(r) => write!(f, "Ref({})", r.target.short_hex()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(Arc::from(s))
    }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self {
        Self::Blob(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Blob(Bytes::from(b))
    }
}

impl From<List> for Value {
    fn from(l: List) -> Self {
        Self::List(l)
    }
}

impl From<Set> for Value {
    fn from(s: Set) -> Self {
        Self::Set(s)
    }
}

impl From<Map> for Value {
    fn from(m: Map) -> Self {
        Self::Map(m)
    }
}

impl From<Struct> for Value {
    fn from(s: Struct) -> Self {
        Self::Struct(s)
    }
}

impl From<TypeRef> for Value {
    fn from(t: TypeRef) -> Self {
        Self::Type(Arc::new(t))
    }
}

impl From<Package> for Value {
    fn from(p: Package) -> Self {
        Self::Package(Arc::new(p))
    }
}

impl From<RefValue> for Value {
    fn from(r: RefValue) -> Self {
        Self::Ref(r)
    }
}

/// Checked conversion from a generic [`Value`] into a typed wrapper.
pub trait FromValue: Sized {
    fn from_value(value: &Value, registry: &TypeRegistry) -> ValueResult<Self>;
}

impl FromValue for Value {
    fn from_value(value: &Value, _registry: &TypeRegistry) -> ValueResult<Self> {
        Ok(value.clone())
    }
}

macro_rules! from_value_via {
    ($ty:ty, $accessor:ident, $kind:expr) => {
        impl FromValue for $ty {
            fn from_value(value: &Value, _registry: &TypeRegistry) -> ValueResult<Self> {
                value.$accessor().map(Into::into).ok_or_else(|| {
                    ValueError::mismatch($kind, format!("found {}", value.kind()))
                })
            }
        }
    };
}

from_value_via!(bool, as_bool, Kind::Bool);
from_value_via!(f64, as_number, Kind::Number);
from_value_via!(String, as_str, Kind::String);

impl FromValue for List {
    fn from_value(value: &Value, _registry: &TypeRegistry) -> ValueResult<Self> {
        value
            .as_list()
            .cloned()
            .ok_or_else(|| ValueError::mismatch(Kind::List, format!("found {}", value.kind())))
    }
}

impl FromValue for Set {
    fn from_value(value: &Value, _registry: &TypeRegistry) -> ValueResult<Self> {
        value
            .as_set()
            .cloned()
            .ok_or_else(|| ValueError::mismatch(Kind::Set, format!("found {}", value.kind())))
    }
}

impl FromValue for Map {
    fn from_value(value: &Value, _registry: &TypeRegistry) -> ValueResult<Self> {
        value
            .as_map()
            .cloned()
            .ok_or_else(|| ValueError::mismatch(Kind::Map, format!("found {}", value.kind())))
    }
}

impl FromValue for Struct {
    fn from_value(value: &Value, _registry: &TypeRegistry) -> ValueResult<Self> {
        value
            .as_struct()
            .cloned()
            .ok_or_else(|| ValueError::mismatch(Kind::Struct, format!("found {}", value.kind())))
    }
}
