//! Structural type descriptors.
//!
//! A [`TypeRef`] describes the shape of a value. Named struct types live in a
//! [`Package`](crate::Package) and are referred to by `(package, ordinal)`
//! through [`TypeRef::Unresolved`], which lets type definitions refer to each
//! other (and to themselves) without building pointer cycles. A null package
//! ref means "the package this definition is declared in".

use std::fmt;

use cairn_types::Ref;
use serde::{Deserialize, Serialize};

use crate::chunk::Future;
use crate::codec;
use crate::kind::Kind;

/// A structural type descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeRef {
    /// A type without parameters (`Bool`, `String`, `Value`, ...).
    Primitive(Kind),
    /// `List<T>`, `Set<T>`, `Map<K, V>` or `Ref<T>`.
    Compound { kind: Kind, elems: Vec<TypeRef> },
    /// An inline struct definition.
    Struct(StructDesc),
    /// A reference to the type at `ordinal` in `package`.
    Unresolved { package: Ref, ordinal: u16 },
}

/// Definition of a struct type: named fields plus optional union choices.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructDesc {
    pub name: String,
    pub fields: Vec<Field>,
    /// Alternatives of a sum-typed struct. Empty for plain structs.
    pub choices: Vec<Field>,
}

/// A named, typed struct field.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub ty: TypeRef,
    pub optional: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: TypeRef, optional: bool) -> Self {
        Self {
            name: name.into(),
            ty,
            optional,
        }
    }

    /// A field that must be present.
    pub fn required(name: impl Into<String>, ty: TypeRef) -> Self {
        Self::new(name, ty, false)
    }
}

impl StructDesc {
    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns `true` if this struct is a sum type.
    pub fn is_union(&self) -> bool {
        !self.choices.is_empty()
    }
}

impl TypeRef {
    pub fn primitive(kind: Kind) -> Self {
        Self::Primitive(kind)
    }

    /// The top type, matching any value.
    pub fn value() -> Self {
        Self::Primitive(Kind::Value)
    }

    pub fn list_of(elem: TypeRef) -> Self {
        Self::Compound {
            kind: Kind::List,
            elems: vec![elem],
        }
    }

    pub fn set_of(elem: TypeRef) -> Self {
        Self::Compound {
            kind: Kind::Set,
            elems: vec![elem],
        }
    }

    pub fn map_of(key: TypeRef, value: TypeRef) -> Self {
        Self::Compound {
            kind: Kind::Map,
            elems: vec![key, value],
        }
    }

    pub fn ref_of(target: TypeRef) -> Self {
        Self::Compound {
            kind: Kind::Ref,
            elems: vec![target],
        }
    }

    /// An inline struct type.
    pub fn structure(name: impl Into<String>, fields: Vec<Field>, choices: Vec<Field>) -> Self {
        Self::Struct(StructDesc {
            name: name.into(),
            fields,
            choices,
        })
    }

    /// A reference to the type at `ordinal` in `package`.
    pub fn unresolved(package: Ref, ordinal: u16) -> Self {
        Self::Unresolved { package, ordinal }
    }

    /// A reference to the type at `ordinal` in the enclosing package.
    pub fn local(ordinal: u16) -> Self {
        Self::Unresolved {
            package: Ref::null(),
            ordinal,
        }
    }

    pub fn kind(&self) -> Kind {
        match self {
            Self::Primitive(kind) => *kind,
            Self::Compound { kind, .. } => *kind,
            Self::Struct(_) => Kind::Struct,
            Self::Unresolved { .. } => Kind::Unresolved,
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, Self::Unresolved { .. })
    }

    /// Element type `index` of a compound type, or the top type if absent.
    pub fn elem(&self, index: usize) -> TypeRef {
        match self {
            Self::Compound { elems, .. } => elems.get(index).cloned().unwrap_or_else(Self::value),
            _ => Self::value(),
        }
    }

    /// Rewrite every local reference (null package) to point at `package`.
    ///
    /// Used when a definition is lifted out of its package, so the result is
    /// meaningful without knowing where it came from.
    pub fn with_package(&self, package: Ref) -> TypeRef {
        match self {
            Self::Unresolved { package: p, ordinal } if p.is_null() => Self::Unresolved {
                package,
                ordinal: *ordinal,
            },
            Self::Compound { kind, elems } => Self::Compound {
                kind: *kind,
                elems: elems.iter().map(|e| e.with_package(package)).collect(),
            },
            Self::Struct(desc) => Self::Struct(StructDesc {
                name: desc.name.clone(),
                fields: desc.fields.iter().map(|f| f.with_package(package)).collect(),
                choices: desc.choices.iter().map(|f| f.with_package(package)).collect(),
            }),
            other => other.clone(),
        }
    }

    /// Content hash of this descriptor.
    pub fn content_ref(&self) -> Ref {
        codec::hash_type(self)
    }

    /// Futures for every package this descriptor references.
    pub fn chunks(&self) -> Vec<Future> {
        let mut packages = Vec::new();
        self.collect_packages(&mut packages);
        packages.into_iter().map(Future::unresolved).collect()
    }

    fn collect_packages(&self, out: &mut Vec<Ref>) {
        match self {
            Self::Primitive(_) => {}
            Self::Compound { elems, .. } => elems.iter().for_each(|e| e.collect_packages(out)),
            Self::Struct(desc) => desc
                .fields
                .iter()
                .chain(desc.choices.iter())
                .for_each(|f| f.ty.collect_packages(out)),
            Self::Unresolved { package, .. } => {
                if !package.is_null() && !out.contains(package) {
                    out.push(*package);
                }
            }
        }
    }
}

impl Field {
    fn with_package(&self, package: Ref) -> Field {
        Field {
            name: self.name.clone(),
            ty: self.ty.with_package(package),
            optional: self.optional,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(kind) => write!(f, "{kind}"),
            Self::Compound { kind, elems } => {
                write!(f, "{kind}<")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{e}")?;
                }
                f.write_str(">")
            }
            Self::Struct(desc) => write!(f, "struct {}", desc.name),
            Self::Unresolved { package, ordinal } if package.is_null() => {
                write!(f, "#{ordinal}")
            }
            Self::Unresolved { package, ordinal } => {
                write!(f, "{}#{ordinal}", package.short_hex())
            }
        }
    }
}
