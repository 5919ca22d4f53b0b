//! Type descriptors and the registry that maps type names to them.
//!
//! Types are registered explicitly on a [`TypeRegistryBuilder`], or submitted at
//! compile time with [`inventory::submit!`] and picked up by
//! [`TypeRegistryBuilder::scan`]:
//!
//! ```ignore
//! fn weapon() -> TypeDescriptor {
//!     TypeDescriptor::prototype("WeaponDef")
//!         .namespace("Game")
//!         .field("damage", FieldType::scalar("int"))
//! }
//! inventory::submit! { TypeRegistration::new(weapon) }
//! ```

use crate::convert::{ConverterSet, ScalarConverter};
use crate::error::RegistryError;
use crate::value::{Fields, Object, Value};
use log::debug;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Which capability a type carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// Has an identity and can be a top-level definition or a reference target.
    Prototype,
    /// Serializable value type, stored inline as a sub-object.
    Composite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    Array,
    List,
    /// Drops duplicate elements, keeping the first occurrence.
    Set,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    /// Converted from text by the converter registered for this name.
    Scalar(String),
    /// A named type. Resolves to a sub-object for composite types and to a
    /// [`FieldType::Reference`] for prototype types when the registry is built.
    Object(String),
    /// The id of another prototype.
    Reference(String),
    Collection {
        kind: CollectionKind,
        element: Box<FieldType>,
    },
}

impl FieldType {
    pub fn scalar(name: impl Into<String>) -> Self {
        FieldType::Scalar(name.into())
    }

    pub fn object(name: impl Into<String>) -> Self {
        FieldType::Object(name.into())
    }

    pub fn reference(name: impl Into<String>) -> Self {
        FieldType::Reference(name.into())
    }

    pub fn list(element: FieldType) -> Self {
        Self::collection(CollectionKind::List, element)
    }

    pub fn array(element: FieldType) -> Self {
        Self::collection(CollectionKind::Array, element)
    }

    pub fn set(element: FieldType) -> Self {
        Self::collection(CollectionKind::Set, element)
    }

    fn collection(kind: CollectionKind, element: FieldType) -> Self {
        FieldType::Collection {
            kind,
            element: Box::new(element),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Scalar(name) | FieldType::Object(name) => write!(f, "{name}"),
            FieldType::Reference(name) => write!(f, "&{name}"),
            FieldType::Collection { kind, element } => match kind {
                CollectionKind::Array => write!(f, "{element}[]"),
                CollectionKind::List => write!(f, "List<{element}>"),
                CollectionKind::Set => write!(f, "Set<{element}>"),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub ty: FieldType,
    pub default: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    name: String,
    namespace: String,
    qualified: String,
    kind: TypeKind,
    base: Option<String>,
    is_abstract: bool,
    fields: Vec<FieldDescriptor>,
    // Qualified names of every base type, nearest first. Filled in by the registry.
    ancestors: Vec<String>,
}

impl TypeDescriptor {
    /// A type with the named-prototype capability.
    pub fn prototype(name: impl Into<String>) -> Self {
        Self::new(name.into(), TypeKind::Prototype)
    }

    /// A serializable composite type used for sub-object fields.
    pub fn composite(name: impl Into<String>) -> Self {
        Self::new(name.into(), TypeKind::Composite)
    }

    fn new(name: String, kind: TypeKind) -> Self {
        Self {
            qualified: name.clone(),
            name,
            namespace: String::new(),
            kind,
            base: None,
            is_abstract: false,
            fields: Vec::new(),
            ancestors: Vec::new(),
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self.qualified = if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        };
        self
    }

    /// Derives from another registered type, inheriting its fields.
    pub fn base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Marks the type as not constructible; only derived types can be instantiated.
    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.push_field(FieldDescriptor {
            name: name.into(),
            ty,
            default: None,
        });
        self
    }

    pub fn field_with_default(
        mut self,
        name: impl Into<String>,
        ty: FieldType,
        default: Value,
    ) -> Self {
        self.push_field(FieldDescriptor {
            name: name.into(),
            ty,
            default: Some(default),
        });
        self
    }

    // A later declaration of the same name replaces the earlier one in place.
    fn push_field(&mut self, field: FieldDescriptor) {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace_name(&self) -> &str {
        &self.namespace
    }

    pub fn qualified_name(&self) -> &str {
        &self.qualified
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn is_prototype(&self) -> bool {
        self.kind == TypeKind::Prototype
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn base_name(&self) -> Option<&str> {
        self.base.as_deref()
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field_descriptor(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// `true` if this type is `qualified` or derives from it.
    pub fn is_a(&self, qualified: &str) -> bool {
        self.qualified == qualified || self.ancestors.iter().any(|a| a == qualified)
    }

    /// Default field values, as a fresh instance starts out.
    pub fn default_fields(&self) -> Fields {
        self.fields
            .iter()
            .filter_map(|f| f.default.clone().map(|v| (f.name.clone(), v)))
            .collect()
    }

    pub fn construct(self: &Rc<Self>) -> Object {
        Object::new(Rc::clone(self), self.default_fields())
    }
}

/// A type submitted for [`TypeRegistryBuilder::scan`].
pub struct TypeRegistration {
    build: fn() -> TypeDescriptor,
}

impl TypeRegistration {
    pub const fn new(build: fn() -> TypeDescriptor) -> Self {
        Self { build }
    }
}

inventory::collect!(TypeRegistration);

/// Name lookup shared by the builder (over raw descriptors) and the registry.
#[derive(Debug, Default)]
struct NameIndex {
    by_qualified: HashMap<String, usize>,
    by_simple: HashMap<String, Vec<usize>>,
    namespaces: Vec<String>,
}

impl NameIndex {
    fn insert(&mut self, descriptor: &TypeDescriptor) -> Result<(), RegistryError> {
        let index = self.namespaces.len();
        if self
            .by_qualified
            .insert(descriptor.qualified.clone(), index)
            .is_some()
        {
            return Err(RegistryError::DuplicateType {
                name: descriptor.qualified.clone(),
            });
        }
        self.by_simple
            .entry(descriptor.name.clone())
            .or_default()
            .push(index);
        self.namespaces.push(descriptor.namespace.clone());
        Ok(())
    }

    fn lookup(&self, name: &str, preferred_namespace: &str) -> Option<usize> {
        if let Some(&index) = self.by_qualified.get(name) {
            if name.contains('.') || self.namespaces[index] == preferred_namespace {
                return Some(index);
            }
        }
        if name.contains('.') {
            return None;
        }
        let candidates = self.by_simple.get(name)?;
        candidates
            .iter()
            .copied()
            .find(|&i| self.namespaces[i] == preferred_namespace)
            .or_else(|| candidates.first().copied())
    }
}

#[derive(Default)]
pub struct TypeRegistryBuilder {
    descriptors: Vec<TypeDescriptor>,
    converters: Option<ConverterSet>,
    scanned: bool,
}

impl TypeRegistryBuilder {
    pub fn register(mut self, descriptor: TypeDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    pub fn converter(mut self, converter: impl ScalarConverter + 'static) -> Self {
        self.converters
            .get_or_insert_with(ConverterSet::default)
            .insert(converter);
        self
    }

    /// Replaces the converter set, built-ins included.
    pub fn converters(mut self, converters: ConverterSet) -> Self {
        self.converters = Some(converters);
        self
    }

    /// Adds every type submitted through `inventory`. Calling it again is a no-op.
    pub fn scan(mut self) -> Self {
        if !self.scanned {
            let before = self.descriptors.len();
            self.descriptors
                .extend(inventory::iter::<TypeRegistration>.into_iter().map(|r| (r.build)()));
            debug!(
                "type scan found {} registrations",
                self.descriptors.len() - before
            );
            self.scanned = true;
        }
        self
    }

    pub fn build(self) -> Result<TypeRegistry, RegistryError> {
        let mut raw = self.descriptors;
        let mut names = NameIndex::default();
        for descriptor in &raw {
            names.insert(descriptor)?;
        }

        // Resolve base names and field type names against the full set.
        let mut bases: Vec<Option<usize>> = Vec::with_capacity(raw.len());
        for descriptor in &raw {
            let base = match &descriptor.base {
                Some(base) => Some(names.lookup(base, &descriptor.namespace).ok_or_else(|| {
                    RegistryError::UnknownBaseType {
                        name: descriptor.qualified.clone(),
                        base: base.clone(),
                    }
                })?),
                None => None,
            };
            bases.push(base);
        }
        for i in 0..raw.len() {
            let mut fields = std::mem::take(&mut raw[i].fields);
            for field in &mut fields {
                field.ty = resolve_field_type(&field.ty, &raw, &names, &raw[i], &field.name)?;
            }
            raw[i].fields = fields;
        }

        let order = base_order(&raw, &bases)?;

        // Flatten base fields into derived types, bases first.
        let mut built: Vec<Option<Rc<TypeDescriptor>>> = vec![None; raw.len()];
        for &i in &order {
            let mut descriptor = raw[i].clone();
            if let Some(base) = bases[i].and_then(|b| built[b].clone()) {
                let own = std::mem::take(&mut descriptor.fields);
                descriptor.fields = base.fields.clone();
                for field in own {
                    descriptor.push_field(field);
                }
                descriptor.ancestors = std::iter::once(base.qualified.clone())
                    .chain(base.ancestors.iter().cloned())
                    .collect();
                descriptor.base = Some(base.qualified.clone());
            }
            built[i] = Some(Rc::new(descriptor));
        }

        let types: Vec<Rc<TypeDescriptor>> = built.into_iter().flatten().collect();
        debug!("type registry built with {} types", types.len());
        Ok(TypeRegistry {
            types,
            names,
            converters: self.converters.unwrap_or_default(),
        })
    }
}

fn resolve_field_type(
    ty: &FieldType,
    raw: &[TypeDescriptor],
    names: &NameIndex,
    owner: &TypeDescriptor,
    field: &str,
) -> Result<FieldType, RegistryError> {
    let unknown = |type_name: &str| RegistryError::UnknownFieldType {
        owner: owner.qualified.clone(),
        field: field.to_string(),
        type_name: type_name.to_string(),
    };
    Ok(match ty {
        FieldType::Scalar(_) => ty.clone(),
        FieldType::Object(name) => {
            let target = &raw[names.lookup(name, &owner.namespace).ok_or_else(|| unknown(name))?];
            if target.is_prototype() {
                FieldType::Reference(target.qualified.clone())
            } else {
                FieldType::Object(target.qualified.clone())
            }
        }
        FieldType::Reference(name) => {
            let target = &raw[names.lookup(name, &owner.namespace).ok_or_else(|| unknown(name))?];
            if !target.is_prototype() {
                return Err(RegistryError::InvalidReferenceType {
                    owner: owner.qualified.clone(),
                    field: field.to_string(),
                    type_name: target.qualified.clone(),
                });
            }
            FieldType::Reference(target.qualified.clone())
        }
        FieldType::Collection { kind, element } => FieldType::Collection {
            kind: *kind,
            element: Box::new(resolve_field_type(element, raw, names, owner, field)?),
        },
    })
}

/// Orders types so every base comes before the types derived from it.
fn base_order(raw: &[TypeDescriptor], bases: &[Option<usize>]) -> Result<Vec<usize>, RegistryError> {
    fn visit(
        i: usize,
        raw: &[TypeDescriptor],
        bases: &[Option<usize>],
        done: &mut [bool],
        in_stack: &mut Vec<usize>,
        order: &mut Vec<usize>,
    ) -> Result<(), RegistryError> {
        if done[i] {
            return Ok(());
        }
        if let Some(pos) = in_stack.iter().position(|&x| x == i) {
            let cycle: Vec<&str> = in_stack[pos..]
                .iter()
                .chain(std::iter::once(&i))
                .map(|&x| raw[x].qualified.as_str())
                .collect();
            return Err(RegistryError::CyclicBaseType {
                cycle: cycle.join(" \u{2192} "),
            });
        }
        in_stack.push(i);
        if let Some(base) = bases[i] {
            visit(base, raw, bases, done, in_stack, order)?;
        }
        in_stack.pop();
        done[i] = true;
        order.push(i);
        Ok(())
    }

    let mut done = vec![false; raw.len()];
    let mut in_stack = Vec::new();
    let mut order = Vec::with_capacity(raw.len());
    for i in 0..raw.len() {
        visit(i, raw, bases, &mut done, &mut in_stack, &mut order)?;
    }
    Ok(order)
}

/// Maps type names to descriptors and holds the scalar converters.
///
/// Built once and shared by reference with every parser that needs it.
pub struct TypeRegistry {
    types: Vec<Rc<TypeDescriptor>>,
    names: NameIndex,
    converters: ConverterSet,
}

impl TypeRegistry {
    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder::default()
    }

    /// Registry of every type submitted through `inventory`.
    pub fn scan() -> Result<TypeRegistry, RegistryError> {
        Self::builder().scan().build()
    }

    /// Finds a type by simple or qualified name, preferring `preferred_namespace`
    /// when several namespaces declare the same simple name.
    pub fn find(&self, name: &str, preferred_namespace: &str) -> Option<Rc<TypeDescriptor>> {
        self.names
            .lookup(name, preferred_namespace)
            .map(|i| Rc::clone(&self.types[i]))
    }

    /// Exact lookup by qualified name.
    pub fn get(&self, qualified: &str) -> Option<Rc<TypeDescriptor>> {
        self.names
            .by_qualified
            .get(qualified)
            .map(|&i| Rc::clone(&self.types[i]))
    }

    pub fn types(&self) -> impl Iterator<Item = &Rc<TypeDescriptor>> {
        self.types.iter()
    }

    pub fn converters(&self) -> &ConverterSet {
        &self.converters
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field(
                "types",
                &self.types.iter().map(|t| t.qualified_name()).collect::<Vec<_>>(),
            )
            .field("converters", &self.converters)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TypeRegistry {
        TypeRegistry::builder()
            .register(
                TypeDescriptor::prototype("ItemDef")
                    .namespace("Game")
                    .abstract_type()
                    .field("label", FieldType::scalar("string"))
                    .field_with_default("stack", FieldType::scalar("int"), Value::Int(1)),
            )
            .register(
                TypeDescriptor::prototype("WeaponDef")
                    .namespace("Game")
                    .base("ItemDef")
                    .field("stats", FieldType::object("Stats"))
                    .field("ammo", FieldType::object("ItemDef"))
                    .field_with_default("stack", FieldType::scalar("int"), Value::Int(5)),
            )
            .register(TypeDescriptor::composite("Stats").namespace("Game"))
            .register(TypeDescriptor::composite("Stats").namespace("Mod"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_find_prefers_namespace() {
        let reg = registry();
        assert_eq!(reg.find("Stats", "Mod").unwrap().qualified_name(), "Mod.Stats");
        assert_eq!(reg.find("Stats", "Game").unwrap().qualified_name(), "Game.Stats");
        assert_eq!(reg.find("Stats", "Other").unwrap().qualified_name(), "Game.Stats");
        assert_eq!(reg.find("Mod.Stats", "Game").unwrap().qualified_name(), "Mod.Stats");
        assert!(reg.find("Missing", "Game").is_none());
        assert!(reg.find("Nope.Stats", "Game").is_none());
    }

    #[test]
    fn test_base_fields_are_flattened() {
        let reg = registry();
        let weapon = reg.get("Game.WeaponDef").unwrap();
        let names: Vec<&str> = weapon.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["label", "stack", "stats", "ammo"]);
        assert!(weapon.is_a("Game.ItemDef"));
        assert!(!reg.get("Game.ItemDef").unwrap().is_a("Game.WeaponDef"));
        assert_eq!(weapon.default_fields().get("stack"), Some(&Value::Int(5)));
    }

    #[test]
    fn test_prototype_fields_become_references() {
        let reg = registry();
        let weapon = reg.get("Game.WeaponDef").unwrap();
        assert_eq!(
            weapon.field_descriptor("ammo").unwrap().ty,
            FieldType::Reference("Game.ItemDef".into())
        );
        assert_eq!(
            weapon.field_descriptor("stats").unwrap().ty,
            FieldType::Object("Game.Stats".into())
        );
    }

    #[test]
    fn test_construct_applies_defaults() {
        let reg = registry();
        let object = reg.get("Game.WeaponDef").unwrap().construct();
        assert_eq!(object.type_name(), "Game.WeaponDef");
        assert_eq!(object.get("stack"), Some(&Value::Int(5)));
        assert_eq!(object.get("label"), None);
    }

    #[test]
    fn test_build_errors() {
        let err = TypeRegistry::builder()
            .register(TypeDescriptor::prototype("A").base("Missing"))
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownBaseType { .. }));

        let err = TypeRegistry::builder()
            .register(TypeDescriptor::prototype("A").base("B"))
            .register(TypeDescriptor::prototype("B").base("A"))
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistryError::CyclicBaseType { .. }));

        let err = TypeRegistry::builder()
            .register(TypeDescriptor::prototype("A"))
            .register(TypeDescriptor::composite("A"))
            .build()
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateType { name: "A".into() });

        let err = TypeRegistry::builder()
            .register(TypeDescriptor::composite("C"))
            .register(TypeDescriptor::prototype("A").field("c", FieldType::reference("C")))
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidReferenceType { .. }));

        let err = TypeRegistry::builder()
            .register(TypeDescriptor::prototype("A").field("x", FieldType::list(FieldType::object("Nope"))))
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownFieldType { .. }));
    }

    #[test]
    fn test_custom_converter_keeps_builtins() {
        let reg = TypeRegistry::builder()
            .converter(crate::convert::EnumConverter::new("Tier", ["Low", "High"]))
            .build()
            .unwrap();
        assert!(reg.converters().contains("Tier"));
        assert!(reg.converters().contains("int"));
    }
}
