//! Package and conversion registry.
//!
//! [`TypeRegistry`] is an explicit, shareable object rather than process
//! global state: callers create one, register the packages their values use,
//! and pass it wherever types must be resolved or values converted. It is
//! append-only, so a lookup that succeeded once keeps succeeding.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use cairn_types::Ref;
use tracing::debug;

use crate::error::{ValueError, ValueResult};
use crate::kind::Kind;
use crate::map::Map;
use crate::package::Package;
use crate::structs::Struct;
use crate::typeref::{StructDesc, TypeRef};
use crate::value::Value;

/// Reserved map key naming the union alternative during default conversion.
pub const CHOICE_KEY: &str = "$choice";
/// Reserved map key holding the union alternative's value.
pub const CHOICE_VALUE_KEY: &str = "$value";

/// Upper bound on alias chains followed by [`TypeRegistry::resolve`].
const MAX_ALIAS_DEPTH: usize = 64;

/// A function converting a generic value into a value of a specific type.
pub type Conversion = Arc<dyn Fn(&Value, &TypeRegistry) -> ValueResult<Value> + Send + Sync>;

/// Registry of packages (by ref) and typed conversions (by target type).
#[derive(Default)]
pub struct TypeRegistry {
    packages: RwLock<HashMap<Ref, Arc<Package>>>,
    conversions: RwLock<HashMap<Ref, Conversion>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `package` and return its ref. Registering a package twice is
    /// a no-op.
    pub fn register_package(&self, package: Package) -> Ref {
        let r = package.content_ref();
        let mut packages = self.packages.write().expect("lock poisoned");
        if !packages.contains_key(&r) {
            debug!(package = %r.short_hex(), types = package.len(), "registered package");
            packages.insert(r, Arc::new(package));
        }
        r
    }

    pub fn package(&self, r: &Ref) -> ValueResult<Arc<Package>> {
        self.packages
            .read()
            .expect("lock poisoned")
            .get(r)
            .cloned()
            .ok_or(ValueError::UnknownPackage(*r))
    }

    pub fn has_package(&self, r: &Ref) -> bool {
        self.packages.read().expect("lock poisoned").contains_key(r)
    }

    pub fn package_count(&self) -> usize {
        self.packages.read().expect("lock poisoned").len()
    }

    /// Resolve `ty` to its definition.
    ///
    /// Only [`TypeRef::Unresolved`] descriptors are looked up; anything else
    /// is returned as is. A null package ref refers to `context`. The
    /// returned definition has its own local references rewritten to point
    /// at the package it came from.
    pub fn resolve(&self, ty: &TypeRef, context: &Ref) -> ValueResult<TypeRef> {
        let mut current = ty.clone();
        let mut context = *context;
        for _ in 0..MAX_ALIAS_DEPTH {
            let (package, ordinal) = match current {
                TypeRef::Unresolved { package, ordinal } => (package, ordinal),
                other => return Ok(other),
            };
            let package_ref = if package.is_null() { context } else { package };
            let pkg = self.package(&package_ref)?;
            let def = pkg.get(ordinal).ok_or(ValueError::OrdinalOutOfRange {
                package: package_ref,
                ordinal,
            })?;
            current = def.with_package(package_ref);
            context = package_ref;
        }
        Err(ValueError::mismatch(ty, "alias chain too long"))
    }

    /// Register the conversion used by [`convert`](Self::convert) for
    /// values targeting `target`.
    ///
    /// The first registration for a type stays in force. Returns `false`,
    /// leaving the registry unchanged, if `target` already has one.
    pub fn register_conversion<F>(&self, target: &TypeRef, conversion: F) -> bool
    where
        F: Fn(&Value, &TypeRegistry) -> ValueResult<Value> + Send + Sync + 'static,
    {
        let mut conversions = self.conversions.write().expect("lock poisoned");
        match conversions.entry(target.content_ref()) {
            Entry::Occupied(_) => {
                debug!(target = %target, "conversion already registered, keeping the first");
                false
            }
            Entry::Vacant(slot) => {
                debug!(target = %target, "registered conversion");
                slot.insert(Arc::new(conversion));
                true
            }
        }
    }

    pub fn has_conversion(&self, target: &TypeRef) -> bool {
        self.conversions
            .read()
            .expect("lock poisoned")
            .contains_key(&target.content_ref())
    }

    /// Convert a generic value into a value of type `target`.
    ///
    /// A registered conversion for `target` takes precedence. Otherwise a
    /// value that already conforms is returned unchanged, and a map with
    /// string keys is turned into a struct when `target` names a struct
    /// type. The result is always checked against `target`.
    pub fn convert(&self, value: &Value, target: &TypeRef) -> ValueResult<Value> {
        let registered = self
            .conversions
            .read()
            .expect("lock poisoned")
            .get(&target.content_ref())
            .cloned();
        if let Some(conversion) = registered {
            let converted = conversion(value, self)?;
            self.check(&converted, target, &Ref::null())?;
            return Ok(converted);
        }

        if self.check(value, target, &Ref::null()).is_ok() {
            return Ok(value.clone());
        }
        match (value, self.resolve(target, &Ref::null())?) {
            (Value::Map(map), TypeRef::Struct(desc)) => {
                let s = struct_from_map(map, &desc, target)?;
                let v = Value::Struct(s);
                self.check(&v, target, &Ref::null())?;
                Ok(v)
            }
            _ => self
                .check(value, target, &Ref::null())
                .map(|()| value.clone()),
        }
    }

    /// Check that `value` conforms to `ty`.
    ///
    /// Struct fields are validated against the definition of the value's
    /// own type. Values nested inside fields or containers whose declared
    /// type is a named struct are checked by type identity only.
    pub fn check(&self, value: &Value, ty: &TypeRef, context: &Ref) -> ValueResult<()> {
        self.check_at(value, ty, context, true)
    }

    fn check_at(&self, value: &Value, ty: &TypeRef, context: &Ref, deep: bool) -> ValueResult<()> {
        if let TypeRef::Unresolved { package, .. } = ty {
            let named = ty.with_package(*context);
            let owner = if package.is_null() { *context } else { *package };
            let Value::Struct(s) = value else {
                // Named non-struct definitions are aliases; check structurally.
                let def = self.resolve(ty, context)?;
                return self.check_at(value, &def, &owner, deep);
            };
            if s.type_ref().with_package(owner) != named {
                return Err(ValueError::mismatch(
                    &named,
                    format!("found struct of type {}", s.type_ref()),
                ));
            }
            if !deep {
                return Ok(());
            }
            return match self.resolve(ty, context)? {
                TypeRef::Struct(desc) => self.check_struct(s, &desc, &owner),
                other => Err(ValueError::mismatch(&other, "named type is not a struct")),
            };
        }

        match ty {
            TypeRef::Primitive(Kind::Value) => Ok(()),
            TypeRef::Primitive(kind) => expect_kind(value, *kind, ty),
            TypeRef::Compound { kind, .. } => {
                expect_kind(value, *kind, ty)?;
                match value {
                    Value::List(l) => l
                        .iter()
                        .try_for_each(|v| self.check_at(v, &ty.elem(0), context, false)),
                    Value::Set(s) => s
                        .values()
                        .try_for_each(|v| self.check_at(v, &ty.elem(0), context, false)),
                    Value::Map(m) => m.entries().try_for_each(|(k, v)| {
                        self.check_at(k, &ty.elem(0), context, false)?;
                        self.check_at(v, &ty.elem(1), context, false)
                    }),
                    Value::Ref(r) => {
                        let wanted = ty.elem(0).with_package(*context);
                        let found = r.target_type().with_package(*context);
                        if wanted == TypeRef::value() || wanted == found {
                            Ok(())
                        } else {
                            Err(ValueError::mismatch(ty, format!("ref targets {found}")))
                        }
                    }
                    _ => Ok(()),
                }
            }
            TypeRef::Struct(desc) => match value {
                Value::Struct(s) => self.check_struct(s, desc, context),
                other => Err(ValueError::mismatch(ty, format!("found {}", other.kind()))),
            },
            TypeRef::Unresolved { .. } => Ok(()),
        }
    }

    fn check_struct(&self, s: &Struct, desc: &StructDesc, context: &Ref) -> ValueResult<()> {
        for field in &desc.fields {
            match s.get(&field.name) {
                Some(v) => self.check_at(v, &field.ty, context, false).map_err(|e| {
                    ValueError::mismatch(
                        format!("struct {}", desc.name),
                        format!("field {:?}: {e}", field.name),
                    )
                })?,
                None if field.optional => {}
                None => {
                    return Err(ValueError::mismatch(
                        format!("struct {}", desc.name),
                        format!("missing required field {:?}", field.name),
                    ))
                }
            }
        }
        if let Some(extra) = s
            .fields()
            .keys()
            .filter_map(Value::as_str)
            .find(|name| desc.field(name).is_none())
        {
            return Err(ValueError::mismatch(
                format!("struct {}", desc.name),
                format!("unknown field {extra:?}"),
            ));
        }

        match (s.choice(), desc.is_union()) {
            (None, false) => Ok(()),
            (Some(_), false) => Err(ValueError::mismatch(
                format!("struct {}", desc.name),
                "choice set on a struct without choices",
            )),
            (None, true) => Err(ValueError::mismatch(
                format!("struct {}", desc.name),
                "union struct holds no choice",
            )),
            (Some((index, v)), true) => {
                let choice = desc.choices.get(index as usize).ok_or_else(|| {
                    ValueError::mismatch(
                        format!("struct {}", desc.name),
                        format!("choice {index} out of range"),
                    )
                })?;
                self.check_at(v, &choice.ty, context, false)
            }
        }
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("packages", &self.package_count())
            .field(
                "conversions",
                &self.conversions.read().map(|c| c.len()).unwrap_or(0),
            )
            .finish()
    }
}

fn expect_kind(value: &Value, kind: Kind, ty: &TypeRef) -> ValueResult<()> {
    if value.kind() == kind {
        Ok(())
    } else {
        Err(ValueError::mismatch(ty, format!("found {}", value.kind())))
    }
}

/// Build a struct of type `type_ref` from a map keyed by field name.
///
/// For union structs the alternative is given by the reserved
/// [`CHOICE_KEY`] (its index) and [`CHOICE_VALUE_KEY`] entries.
fn struct_from_map(map: &Map, desc: &StructDesc, type_ref: &TypeRef) -> ValueResult<Struct> {
    let choice_key = Value::from(CHOICE_KEY);
    let value_key = Value::from(CHOICE_VALUE_KEY);
    let fields = map.remove(&choice_key).remove(&value_key);
    let s = Struct::from_map(type_ref.clone(), fields)?;

    match (map.maybe_get(&choice_key), map.maybe_get(&value_key)) {
        (None, None) => Ok(s),
        (Some(Value::Number(n)), Some(v)) if desc.is_union() && n.fract() == 0.0 && *n >= 0.0 => {
            Ok(s.with_choice(*n as u32, v.clone()))
        }
        _ => Err(ValueError::mismatch(
            format!("struct {}", desc.name),
            format!("{CHOICE_KEY} must be a choice index paired with {CHOICE_VALUE_KEY}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::set::Set;
    use crate::typeref::Field;
    use crate::value::RefValue;

    fn number() -> TypeRef {
        TypeRef::primitive(Kind::Number)
    }

    /// Package with `Node { label: String, children: Set<Node> }` at 0 and
    /// `Shape { name: String | circle: Number, square: Number }` at 1.
    fn register_fixture(registry: &TypeRegistry) -> Ref {
        let node = TypeRef::structure(
            "Node",
            vec![
                Field::required("label", TypeRef::primitive(Kind::String)),
                Field::required("children", TypeRef::set_of(TypeRef::local(0))),
                Field::new("weight", number(), true),
            ],
            vec![],
        );
        let shape = TypeRef::structure(
            "Shape",
            vec![Field::required("name", TypeRef::primitive(Kind::String))],
            vec![Field::required("circle", number()), Field::required("square", number())],
        );
        registry.register_package(Package::new(vec![node, shape], vec![]))
    }

    fn node(pkg: Ref, label: &str, children: Set) -> Struct {
        Struct::new(
            TypeRef::unresolved(pkg, 0),
            [("label", Value::from(label)), ("children", Value::from(children))],
        )
    }

    // -----------------------------------------------------------------------
    // Packages and resolution
    // -----------------------------------------------------------------------

    #[test]
    fn register_is_idempotent() {
        let registry = TypeRegistry::new();
        let a = register_fixture(&registry);
        let b = register_fixture(&registry);
        assert_eq!(a, b);
        assert_eq!(registry.package_count(), 1);
        assert!(registry.has_package(&a));
    }

    #[test]
    fn resolve_lifts_local_refs() {
        let registry = TypeRegistry::new();
        let pkg = register_fixture(&registry);
        let TypeRef::Struct(desc) = registry.resolve(&TypeRef::unresolved(pkg, 0), &Ref::null()).unwrap() else {
            panic!("expected struct");
        };
        assert_eq!(
            desc.field("children").unwrap().ty,
            TypeRef::set_of(TypeRef::unresolved(pkg, 0))
        );
    }

    #[test]
    fn resolve_local_ref_uses_context() {
        let registry = TypeRegistry::new();
        let pkg = register_fixture(&registry);
        let resolved = registry.resolve(&TypeRef::local(1), &pkg).unwrap();
        assert_eq!(resolved.kind(), Kind::Struct);
    }

    #[test]
    fn resolve_unknown_package() {
        let registry = TypeRegistry::new();
        let missing = Ref::from_hash([9; 32]);
        assert_eq!(
            registry.resolve(&TypeRef::unresolved(missing, 0), &Ref::null()),
            Err(ValueError::UnknownPackage(missing))
        );
        assert!(matches!(
            registry.resolve(&TypeRef::local(0), &Ref::null()),
            Err(ValueError::UnknownPackage(_))
        ));
    }

    #[test]
    fn resolve_ordinal_out_of_range() {
        let registry = TypeRegistry::new();
        let pkg = register_fixture(&registry);
        assert_eq!(
            registry.resolve(&TypeRef::unresolved(pkg, 7), &Ref::null()),
            Err(ValueError::OrdinalOutOfRange {
                package: pkg,
                ordinal: 7
            })
        );
    }

    #[test]
    fn resolve_passes_through_structural_types() {
        let registry = TypeRegistry::new();
        let ty = TypeRef::list_of(number());
        assert_eq!(registry.resolve(&ty, &Ref::null()).unwrap(), ty);
    }

    // -----------------------------------------------------------------------
    // Checking
    // -----------------------------------------------------------------------

    #[test]
    fn check_primitives_and_containers() {
        let registry = TypeRegistry::new();
        let ctx = Ref::null();
        assert!(registry.check(&Value::from(1), &number(), &ctx).is_ok());
        assert!(registry.check(&Value::from("x"), &number(), &ctx).is_err());
        assert!(registry.check(&Value::from("x"), &TypeRef::value(), &ctx).is_ok());

        let nums = Value::from(Set::from_items([1, 2]));
        assert!(registry.check(&nums, &TypeRef::set_of(number()), &ctx).is_ok());
        let mixed = Value::from(Set::from_items([Value::from(1), Value::from("two")]));
        assert!(registry.check(&mixed, &TypeRef::set_of(number()), &ctx).is_err());

        let map = Value::from(Map::new().set("a", 1));
        let string_to_number = TypeRef::map_of(TypeRef::primitive(Kind::String), number());
        assert!(registry.check(&map, &string_to_number, &ctx).is_ok());
        assert!(registry.check(&map, &TypeRef::list_of(number()), &ctx).is_err());
    }

    #[test]
    fn check_recursive_struct() {
        let registry = TypeRegistry::new();
        let pkg = register_fixture(&registry);
        let leaf = node(pkg, "leaf", Set::new());
        let root = node(pkg, "root", Set::from_items([leaf]));
        let ty = TypeRef::unresolved(pkg, 0);
        assert!(registry.check(&Value::from(root), &ty, &Ref::null()).is_ok());
    }

    #[test]
    fn check_accepts_local_type_with_context() {
        let registry = TypeRegistry::new();
        let pkg = register_fixture(&registry);
        let n = Struct::new(
            TypeRef::local(0),
            [("label", Value::from("x")), ("children", Value::from(Set::new()))],
        );
        assert!(registry.check(&Value::from(n), &TypeRef::local(0), &pkg).is_ok());
    }

    #[test]
    fn check_rejects_missing_and_unknown_fields() {
        let registry = TypeRegistry::new();
        let pkg = register_fixture(&registry);
        let ty = TypeRef::unresolved(pkg, 0);

        let missing = node(pkg, "n", Set::new()).remove("children");
        let err = registry.check(&Value::from(missing), &ty, &Ref::null()).unwrap_err();
        assert!(err.to_string().contains("missing required field"));

        let extra = node(pkg, "n", Set::new()).set("colour", "red");
        let err = registry.check(&Value::from(extra), &ty, &Ref::null()).unwrap_err();
        assert!(err.to_string().contains("unknown field"));

        let optional = node(pkg, "n", Set::new()).set("weight", 3);
        assert!(registry.check(&Value::from(optional), &ty, &Ref::null()).is_ok());
    }

    #[test]
    fn check_rejects_wrong_field_kind_and_wrong_struct_type() {
        let registry = TypeRegistry::new();
        let pkg = register_fixture(&registry);
        let ty = TypeRef::unresolved(pkg, 0);

        let bad = node(pkg, "n", Set::new()).set("label", 5);
        assert!(registry.check(&Value::from(bad), &ty, &Ref::null()).is_err());

        let other = node(pkg, "n", Set::new());
        let shape_ty = TypeRef::unresolved(pkg, 1);
        assert!(registry.check(&Value::from(other), &shape_ty, &Ref::null()).is_err());
    }

    #[test]
    fn check_union_choices() {
        let registry = TypeRegistry::new();
        let pkg = register_fixture(&registry);
        let ty = TypeRef::unresolved(pkg, 1);
        let base = Struct::new(ty.clone(), [("name", "c")]);

        assert!(registry.check(&Value::from(base.clone()), &ty, &Ref::null()).is_err());
        assert!(registry
            .check(&Value::from(base.with_choice(0, 2.5)), &ty, &Ref::null())
            .is_ok());
        assert!(registry
            .check(&Value::from(base.with_choice(2, 2.5)), &ty, &Ref::null())
            .is_err());
        assert!(registry
            .check(&Value::from(base.with_choice(1, "wide")), &ty, &Ref::null())
            .is_err());
    }

    // -----------------------------------------------------------------------
    // Conversion
    // -----------------------------------------------------------------------

    #[test]
    fn default_conversion_builds_struct_from_map() {
        let registry = TypeRegistry::new();
        let pkg = register_fixture(&registry);
        let ty = TypeRef::unresolved(pkg, 0);
        let generic = Value::from(Map::new().set("label", "n").set("children", Set::new()));

        let converted = registry.convert(&generic, &ty).unwrap();
        let s = converted.as_struct().unwrap();
        assert_eq!(s.type_ref(), &ty);
        assert_eq!(s.get("label"), Some(&Value::from("n")));
    }

    #[test]
    fn default_conversion_of_union() {
        let registry = TypeRegistry::new();
        let pkg = register_fixture(&registry);
        let ty = TypeRef::unresolved(pkg, 1);
        let generic = Value::from(
            Map::new()
                .set("name", "sq")
                .set(CHOICE_KEY, 1)
                .set(CHOICE_VALUE_KEY, 4),
        );
        let converted = registry.convert(&generic, &ty).unwrap();
        assert_eq!(converted.as_struct().unwrap().choice(), Some((1, &Value::from(4))));
    }

    #[test]
    fn default_conversion_rejects_invalid_map() {
        let registry = TypeRegistry::new();
        let pkg = register_fixture(&registry);
        let ty = TypeRef::unresolved(pkg, 0);
        let generic = Value::from(Map::new().set("label", "n"));
        assert!(matches!(
            registry.convert(&generic, &ty),
            Err(ValueError::TypeMismatch { .. })
        ));
        assert!(registry.convert(&Value::from(1), &ty).is_err());
    }

    #[test]
    fn conforming_value_converts_to_itself() {
        let registry = TypeRegistry::new();
        let v = Value::from(Set::from_items([1]));
        assert_eq!(registry.convert(&v, &TypeRef::set_of(number())).unwrap(), v);
    }

    #[test]
    fn registered_conversion_takes_precedence() {
        let registry = TypeRegistry::new();
        let target = number();
        registry.register_conversion(&target, |v, _| match v.as_str() {
            Some(s) => s
                .parse::<f64>()
                .map(Value::from)
                .map_err(|e| ValueError::mismatch(Kind::Number, e.to_string())),
            None => Ok(v.clone()),
        });
        assert!(registry.has_conversion(&target));
        assert_eq!(
            registry.convert(&Value::from("2.5"), &target).unwrap(),
            Value::from(2.5)
        );
        assert!(registry.convert(&Value::from(true), &target).is_err());
    }

    #[test]
    fn first_conversion_stays_registered() {
        let registry = TypeRegistry::new();
        let target = number();
        assert!(registry.register_conversion(&target, |_, _| Ok(Value::from(1))));
        assert!(!registry.register_conversion(&target, |_, _| Ok(Value::from(2))));
        assert_eq!(
            registry.convert(&Value::from("anything"), &target).unwrap(),
            Value::from(1)
        );
    }

    #[test]
    fn check_ref_target_type() {
        let registry = TypeRegistry::new();
        let ctx = Ref::null();
        let to_number = Value::from(RefValue::to(&Value::from(3)));
        let to_string = Value::from(RefValue::to(&Value::from("s")));
        let ref_of_number = TypeRef::ref_of(number());
        assert!(registry.check(&to_number, &ref_of_number, &ctx).is_ok());
        assert!(registry.check(&to_string, &ref_of_number, &ctx).is_err());
        assert!(registry
            .check(&to_string, &TypeRef::ref_of(TypeRef::value()), &ctx)
            .is_ok());
        assert!(registry.check(&Value::from(3), &ref_of_number, &ctx).is_err());
    }

    #[test]
    fn registry_is_shareable_across_threads() {
        let registry = Arc::new(TypeRegistry::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || register_fixture(&registry))
            })
            .collect();
        let refs: Vec<Ref> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(refs.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(registry.package_count(), 1);
    }
}
