//! Writes staged fields onto allocated prototypes.
//!
//! Each concrete definition is applied by walking its ancestor chain from the
//! root down to the definition itself, writing every link's own fields in turn.
//! A later link overwrites scalars, references and unrelated sub-objects,
//! merges into compatible sub-objects field by field, and replaces or extends
//! collections according to their [`OverrideAction`].

use crate::definition::{
    CollectionDef, Definition, DefinitionState, FieldValue, OverrideAction, SourceLocation,
    StagedObject,
};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::registry::{CollectionKind, FieldType, TypeDescriptor};
use crate::value::{Fields, Value};
use log::{debug, trace};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

pub struct Applier<'a> {
    batch: &'a [Definition],
    // Last non-excluded index per id within the batch; shadows `table`.
    batch_ids: HashMap<&'a str, usize>,
    table: &'a HashMap<String, Definition>,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> Applier<'a> {
    /// `table` holds the definitions of earlier parse calls.
    pub fn new(
        batch: &'a [Definition],
        table: &'a HashMap<String, Definition>,
        diagnostics: &'a mut Diagnostics,
    ) -> Self {
        let batch_ids = batch
            .iter()
            .enumerate()
            .filter(|(_, d)| d.state != DefinitionState::Excluded)
            .map(|(i, d)| (d.id.as_str(), i))
            .collect();
        Applier {
            batch,
            batch_ids,
            table,
            diagnostics,
        }
    }

    /// Applies the definitions at `order`, which must list parents before children.
    /// Returns the indices that were applied.
    pub fn apply_all(&mut self, order: &[usize]) -> Vec<usize> {
        let mut applied = Vec::new();
        let batch = self.batch;
        for &i in order {
            let definition = &batch[i];
            if definition.instance.is_some() {
                self.apply(definition);
                applied.push(i);
            }
        }
        debug!("applied {} definitions", applied.len());
        applied
    }

    pub fn apply(&mut self, definition: &Definition) {
        let Some(instance) = &definition.instance else {
            return;
        };
        let chain = self.ancestors(definition);
        trace!(
            "applying '{}' over {} ancestors",
            definition.id,
            chain.len()
        );
        let mut fields = instance.fields_mut();
        for ancestor in chain.iter().rev() {
            self.apply_object(&ancestor.body, instance.descriptor(), &mut fields);
        }
        self.apply_object(&definition.body, instance.descriptor(), &mut fields);
    }

    fn find(&self, id: &str) -> Option<&'a Definition> {
        let (batch, table) = (self.batch, self.table);
        match self.batch_ids.get(id) {
            Some(&i) => Some(&batch[i]),
            None => table.get(id),
        }
    }

    /// Ancestors of `definition`, nearest first. Recomputed on every call.
    fn ancestors(&mut self, definition: &Definition) -> Vec<&'a Definition> {
        let mut chain: Vec<&'a Definition> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        seen.insert(definition.id.as_str());
        let mut current = definition.inherits.as_deref();
        let mut child = definition;

        while let Some(parent_id) = current {
            let Some(parent) = self.find(parent_id) else {
                let location = child.location();
                self.diagnostics.error(
                    DiagnosticKind::UnresolvedInheritanceTarget,
                    &location.file,
                    location.line,
                    format!("'{}' inherits from unknown id '{parent_id}'", child.id),
                );
                break;
            };
            if !seen.insert(parent.id.as_str()) {
                let location = definition.location();
                let path: Vec<&str> = std::iter::once(definition.id.as_str())
                    .chain(chain.iter().map(|d| d.id.as_str()))
                    .chain(std::iter::once(parent.id.as_str()))
                    .collect();
                self.diagnostics.error(
                    DiagnosticKind::CyclicInheritance,
                    &location.file,
                    location.line,
                    format!(
                        "'{}' inherits in a cycle: {}",
                        definition.id,
                        path.join(" \u{2192} ")
                    ),
                );
                break;
            }
            chain.push(parent);
            child = parent;
            current = parent.inherits.as_deref();
        }
        chain
    }

    /// Writes the fields `staged` states onto `fields`, whose type is `target`.
    fn apply_object(&mut self, staged: &StagedObject, target: &TypeDescriptor, fields: &mut Fields) {
        for field in &staged.fields {
            let Some(descriptor) = target.field_descriptor(&field.name) else {
                self.mismatch(
                    &field.location,
                    format!(
                        "type '{}' has no field '{}'",
                        target.qualified_name(),
                        field.name
                    ),
                );
                continue;
            };
            trace!("  {}.{}", target.qualified_name(), field.name);
            let built = self.build_value(
                &field.value,
                &descriptor.ty,
                fields.get(&field.name),
                &field.location,
            );
            if let Some(value) = built {
                fields.insert(field.name.clone(), value);
            }
        }
    }

    /// The value to store for a staged field, or `None` after reporting a type
    /// mismatch. `existing` is what earlier links of the chain left behind.
    fn build_value(
        &mut self,
        value: &FieldValue,
        ty: &FieldType,
        existing: Option<&Value>,
        location: &SourceLocation,
    ) -> Option<Value> {
        match (value, ty) {
            (FieldValue::Scalar { type_name, value }, FieldType::Scalar(declared)) => {
                if type_name == declared {
                    Some(value.clone())
                } else {
                    self.mismatch(
                        location,
                        format!("a {type_name} value cannot be stored in a {declared} field"),
                    );
                    None
                }
            }
            (FieldValue::Reference { target, .. }, FieldType::Reference(declared)) => match target {
                None => Some(Value::Null),
                Some(target) if target.descriptor().is_a(declared) => {
                    Some(Value::Reference(target.clone()))
                }
                Some(target) => {
                    self.mismatch(
                        location,
                        format!(
                            "'{}' is a {}, not a {declared}",
                            target.id(),
                            target.type_name()
                        ),
                    );
                    None
                }
            },
            (FieldValue::SubObject(staged), FieldType::Object(declared)) => {
                if !staged.descriptor.is_a(declared) {
                    self.mismatch(
                        location,
                        format!(
                            "a {} object cannot be stored in a {declared} field",
                            staged.descriptor.qualified_name()
                        ),
                    );
                    return None;
                }
                let mut object = match existing {
                    Some(Value::Object(current))
                        if current.descriptor().is_a(staged.descriptor.qualified_name()) =>
                    {
                        current.clone()
                    }
                    _ => staged.descriptor.construct(),
                };
                let descriptor = Rc::clone(object.descriptor());
                self.apply_object(staged, &descriptor, &mut object.fields);
                Some(Value::Object(object))
            }
            (FieldValue::Collection(collection), FieldType::Collection { kind, element }) => {
                if collection.kind != *kind {
                    self.mismatch(
                        location,
                        format!(
                            "a {:?} cannot be stored in a {ty} field",
                            collection.kind
                        ),
                    );
                    return None;
                }
                Some(self.build_collection(collection, *kind, element, existing, location))
            }
            (FieldValue::UnresolvedReference(id), _) => {
                self.mismatch(location, format!("reference '{id}' was never resolved"));
                None
            }
            (value, ty) => {
                self.mismatch(
                    location,
                    format!("a staged {} cannot be stored in a {ty} field", value.kind_name()),
                );
                None
            }
        }
    }

    fn build_collection(
        &mut self,
        collection: &CollectionDef,
        kind: CollectionKind,
        element: &FieldType,
        existing: Option<&Value>,
        location: &SourceLocation,
    ) -> Value {
        let combine = collection.override_action == Some(OverrideAction::Combine);
        // Always a fresh list: an ancestor's collection is copied, never extended.
        let mut items: Vec<Value> = match existing {
            Some(current) if combine && !current.is_empty_collection() => {
                current.as_list().map(<[Value]>::to_vec).unwrap_or_default()
            }
            _ => Vec::with_capacity(collection.elements.len()),
        };
        for staged in &collection.elements {
            if let Some(value) = self.build_value(staged, element, None, location) {
                if kind == CollectionKind::Set && items.contains(&value) {
                    continue;
                }
                items.push(value);
            }
        }
        Value::List(items)
    }

    fn mismatch(&mut self, location: &SourceLocation, message: String) {
        self.diagnostics
            .error(DiagnosticKind::TypeMismatchOnApply, &location.file, location.line, message);
    }
}
