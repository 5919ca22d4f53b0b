//! Materialized prototype data.
//!
//! Sub-objects are owned by the field that holds them. References to other
//! prototypes are shared [`PrototypeRef`] handles, so a prototype can be
//! referenced before its fields are written, and reference cycles are fine.

use crate::registry::TypeDescriptor;
use std::cell::{Ref, RefCell, RefMut};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

pub type Fields = BTreeMap<String, Value>;

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Enum(String),
    Object(Object),
    Reference(PrototypeRef),
    List(Vec<Value>),
}

/// Structural equality. References compare by prototype id only, which keeps
/// comparison finite when prototypes reference each other.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Reference(a), Value::Reference(b)) => a.id() == b.id(),
            (Value::List(a), Value::List(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Text of a `String` or `Enum` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&PrototypeRef> {
        match self {
            Value::Reference(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Null and empty lists count as unset for collection merging.
    pub fn is_empty_collection(&self) -> bool {
        match self {
            Value::Null => true,
            Value::List(items) => items.is_empty(),
            _ => false,
        }
    }
}

/// An owned instance of a composite type.
#[derive(Debug, Clone)]
pub struct Object {
    descriptor: Rc<TypeDescriptor>,
    pub fields: Fields,
}

impl Object {
    pub fn new(descriptor: Rc<TypeDescriptor>, fields: Fields) -> Self {
        Self { descriptor, fields }
    }

    pub fn descriptor(&self) -> &Rc<TypeDescriptor> {
        &self.descriptor
    }

    pub fn type_name(&self) -> &str {
        self.descriptor.qualified_name()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.type_name() == other.type_name() && self.fields == other.fields
    }
}

/// A materialized prototype. Identity and type never change after allocation;
/// fields are written once the whole batch has been allocated.
pub struct Prototype {
    id: String,
    descriptor: Rc<TypeDescriptor>,
    fields: RefCell<Fields>,
}

/// Shared handle to a [`Prototype`].
///
/// Reference fields hold strong handles, so prototypes that reference
/// themselves or each other keep one another alive after every outside handle
/// is dropped. [`PrototypeRef::clear_fields`] (or [`ParseResult::release`] for
/// a whole result) breaks those cycles.
///
/// [`ParseResult::release`]: crate::ParseResult::release
#[derive(Clone)]
pub struct PrototypeRef(Rc<Prototype>);

impl PrototypeRef {
    pub fn new(id: impl Into<String>, descriptor: Rc<TypeDescriptor>, fields: Fields) -> Self {
        PrototypeRef(Rc::new(Prototype {
            id: id.into(),
            descriptor,
            fields: RefCell::new(fields),
        }))
    }

    pub fn id(&self) -> &str {
        &self.0.id
    }

    pub fn descriptor(&self) -> &Rc<TypeDescriptor> {
        &self.0.descriptor
    }

    pub fn type_name(&self) -> &str {
        self.0.descriptor.qualified_name()
    }

    pub fn fields(&self) -> Ref<'_, Fields> {
        self.0.fields.borrow()
    }

    pub(crate) fn fields_mut(&self) -> RefMut<'_, Fields> {
        self.0.fields.borrow_mut()
    }

    /// Cloned value of a field, `None` when the field is unset.
    pub fn get(&self, field: &str) -> Option<Value> {
        self.0.fields.borrow().get(field).cloned()
    }

    /// Empties the field table, dropping the references it held.
    pub fn clear_fields(&self) {
        self.0.fields.borrow_mut().clear();
    }

    /// `true` when both handles point at the same allocation.
    pub fn ptr_eq(&self, other: &PrototypeRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Deep comparison of id, type and fields. Nested references compare by id.
impl PartialEq for PrototypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
            || (self.id() == other.id()
                && self.type_name() == other.type_name()
                && *self.fields() == *other.fields())
    }
}

// Only the id: fields may lead back to this prototype.
impl fmt::Debug for PrototypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PrototypeRef").field(&self.0.id).finish()
    }
}
