//! The staged form of a document: what each definition states about itself,
//! before inheritance and references are resolved.

use crate::registry::{CollectionKind, TypeDescriptor};
use crate::value::{PrototypeRef, Value};
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: Rc<str>,
    pub line: usize,
}

/// How a collection field merges with the value an ancestor left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideAction {
    Replace,
    Combine,
}

impl OverrideAction {
    pub fn parse(text: &str) -> Option<Self> {
        if text.eq_ignore_ascii_case("replace") {
            Some(OverrideAction::Replace)
        } else if text.eq_ignore_ascii_case("combine") {
            Some(OverrideAction::Combine)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionState {
    Staged,
    Allocated,
    ReferencesResolved,
    Applied,
    /// Dropped from the batch, e.g. because it inherits in a cycle.
    Excluded,
}

/// One top-level item of a document.
#[derive(Debug, Clone)]
pub struct Definition {
    pub id: String,
    pub inherits: Option<String>,
    pub is_abstract: bool,
    /// The `Type` attribute as written, when the item overrides the container type.
    pub type_override: Option<String>,
    /// Only the fields this item states itself; never merged with ancestors.
    pub body: StagedObject,
    pub state: DefinitionState,
    /// Set during allocation for concrete definitions.
    pub instance: Option<PrototypeRef>,
}

impl Definition {
    pub fn location(&self) -> &SourceLocation {
        &self.body.location
    }

    pub fn descriptor(&self) -> &Rc<TypeDescriptor> {
        &self.body.descriptor
    }
}

/// Fields stated for one object: a definition's body or a nested sub-object.
#[derive(Debug, Clone)]
pub struct StagedObject {
    pub descriptor: Rc<TypeDescriptor>,
    pub fields: Vec<StagedField>,
    pub location: SourceLocation,
}

impl StagedObject {
    pub fn field(&self, name: &str) -> Option<&StagedField> {
        self.fields.iter().rev().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct StagedField {
    pub name: String,
    pub value: FieldValue,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub enum FieldValue {
    Scalar { type_name: String, value: Value },
    SubObject(StagedObject),
    Collection(CollectionDef),
    /// A prototype id waiting for the reference pass.
    UnresolvedReference(String),
    /// Output of the reference pass; `target` is `None` when nothing matched.
    Reference {
        id: String,
        target: Option<PrototypeRef>,
    },
}

impl FieldValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Scalar { .. } => "scalar",
            FieldValue::SubObject(_) => "object",
            FieldValue::Collection(_) => "collection",
            FieldValue::UnresolvedReference(_) | FieldValue::Reference { .. } => "reference",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollectionDef {
    pub kind: CollectionKind,
    /// `None` when the element did not say; treated as [`OverrideAction::Replace`].
    pub override_action: Option<OverrideAction>,
    pub elements: Vec<FieldValue>,
}
