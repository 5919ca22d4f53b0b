//! Binds reference fields of staged definitions to allocated prototypes.

use crate::definition::{Definition, DefinitionState, FieldValue, SourceLocation, StagedObject};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::value::PrototypeRef;
use log::debug;

pub struct ReferenceResolver<'a> {
    // Every instance a reference may bind to: earlier batches first, then this one.
    instances: &'a [PrototypeRef],
    report_unresolved: bool,
    diagnostics: &'a mut Diagnostics,
    bound: usize,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(
        instances: &'a [PrototypeRef],
        report_unresolved: bool,
        diagnostics: &'a mut Diagnostics,
    ) -> Self {
        ReferenceResolver {
            instances,
            report_unresolved,
            diagnostics,
            bound: 0,
        }
    }

    /// Rewrites every `UnresolvedReference` in the batch, sub-objects and
    /// collections included, into a bound `Reference`.
    pub fn resolve(mut self, definitions: &mut [Definition]) {
        for definition in definitions.iter_mut() {
            if definition.state == DefinitionState::Excluded {
                continue;
            }
            self.resolve_object(&mut definition.body);
            definition.state = DefinitionState::ReferencesResolved;
        }
        debug!("bound {} references", self.bound);
    }

    fn resolve_object(&mut self, object: &mut StagedObject) {
        for field in &mut object.fields {
            self.resolve_value(&mut field.value, &field.location);
        }
    }

    fn resolve_value(&mut self, value: &mut FieldValue, location: &SourceLocation) {
        match value {
            FieldValue::Scalar { .. } | FieldValue::Reference { .. } => {}
            FieldValue::SubObject(object) => self.resolve_object(object),
            FieldValue::Collection(collection) => {
                for element in &mut collection.elements {
                    self.resolve_value(element, location);
                }
            }
            FieldValue::UnresolvedReference(name) => {
                let id = std::mem::take(name);
                let target = self.lookup(&id, location);
                *value = FieldValue::Reference { id, target };
            }
        }
    }

    fn lookup(&mut self, id: &str, location: &SourceLocation) -> Option<PrototypeRef> {
        if id.is_empty() {
            return None;
        }
        // The latest instance with an id shadows earlier ones.
        match self.instances.iter().rev().find(|p| p.id() == id) {
            Some(target) => {
                self.bound += 1;
                Some(target.clone())
            }
            None => {
                if self.report_unresolved {
                    self.diagnostics.warning(
                        DiagnosticKind::UnresolvedReference,
                        &location.file,
                        location.line,
                        format!("no prototype with id '{id}'; the reference is left empty"),
                    );
                }
                None
            }
        }
    }
}
