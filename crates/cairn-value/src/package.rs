use cairn_types::Ref;
use serde::{Deserialize, Serialize};

use crate::chunk::Future;
use crate::codec;
use crate::typeref::TypeRef;

/// An ordered collection of type definitions, addressed by its content.
///
/// Types inside a package refer to one another by ordinal
/// ([`TypeRef::local`]), and to types of other packages by
/// `(package ref, ordinal)`. Those other packages are listed as
/// dependencies.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Package {
    types: Vec<TypeRef>,
    dependencies: Vec<Ref>,
}

impl Package {
    /// Create a package. Dependencies are sorted and deduplicated so the
    /// package ref does not depend on the order they were listed in.
    pub fn new(types: Vec<TypeRef>, mut dependencies: Vec<Ref>) -> Self {
        dependencies.sort();
        dependencies.dedup();
        Self {
            types,
            dependencies,
        }
    }

    pub fn types(&self) -> &[TypeRef] {
        &self.types
    }

    pub fn dependencies(&self) -> &[Ref] {
        &self.dependencies
    }

    /// The definition at `ordinal`.
    pub fn get(&self, ordinal: u16) -> Option<&TypeRef> {
        self.types.get(usize::from(ordinal))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn content_ref(&self) -> Ref {
        codec::hash_package(self)
    }

    /// Futures for the dependency packages and any packages referenced by
    /// the definitions.
    pub fn chunks(&self) -> Vec<Future> {
        let mut refs: Vec<Ref> = self.dependencies.clone();
        for ty in &self.types {
            for future in ty.chunks() {
                if !refs.contains(&future.target()) {
                    refs.push(future.target());
                }
            }
        }
        refs.into_iter().map(Future::unresolved).collect()
    }
}
