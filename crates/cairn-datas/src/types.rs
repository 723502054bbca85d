//! The type package describing commits.

use cairn_types::Ref;
use cairn_value::{Field, Kind, Package, TypeRef, TypeRegistry};

/// Ordinal of the `Commit` struct within the package.
const COMMIT_ORDINAL: u16 = 0;

/// The package defining
/// `struct Commit { value: Value, parents: Set<Ref<Commit>> }`.
pub fn commit_package() -> Package {
    Package::new(
        vec![TypeRef::structure(
            "Commit",
            vec![
                Field::required("value", TypeRef::primitive(Kind::Value)),
                Field::required(
                    "parents",
                    TypeRef::set_of(TypeRef::ref_of(TypeRef::local(COMMIT_ORDINAL))),
                ),
            ],
            vec![],
        )],
        vec![],
    )
}

/// Handle on the registered commit package.
///
/// Obtained from [`DatasTypes::register`], so holding one proves the
/// package is known to the registry it came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasTypes {
    package: Ref,
    commit: TypeRef,
}

impl DatasTypes {
    /// Register the commit package with `registry`. Idempotent.
    pub fn register(registry: &TypeRegistry) -> Self {
        let package = registry.register_package(commit_package());
        Self {
            package,
            commit: TypeRef::unresolved(package, COMMIT_ORDINAL),
        }
    }

    /// Ref of the commit package.
    pub fn package_ref(&self) -> Ref {
        self.package
    }

    /// `Commit`
    pub fn commit_type(&self) -> &TypeRef {
        &self.commit
    }

    /// `Ref<Commit>`
    pub fn ref_of_commit_type(&self) -> TypeRef {
        TypeRef::ref_of(self.commit.clone())
    }

    /// `Set<Ref<Commit>>`, the type of a commit's parents.
    pub fn set_of_ref_of_commit_type(&self) -> TypeRef {
        TypeRef::set_of(self.ref_of_commit_type())
    }

    /// `Map<String, Commit>`
    pub fn map_of_string_to_commit_type(&self) -> TypeRef {
        TypeRef::map_of(TypeRef::primitive(Kind::String), self.commit.clone())
    }
}
