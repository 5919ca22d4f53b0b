//! Turns a parsed markup document into staged [`Definition`]s.
//!
//! Staging types every field against the registry but resolves neither
//! inheritance nor references. Problems are reported per node and the node is
//! skipped; staging always runs to the end of the document.

use crate::ast::{Element, MarkupDocument};
use crate::config::{ParseParams, ParserOptions};
use crate::definition::{
    CollectionDef, Definition, DefinitionState, FieldValue, OverrideAction, SourceLocation,
    StagedField, StagedObject,
};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::registry::{FieldType, TypeDescriptor, TypeRegistry};
use crate::utils::LineIndex;
use log::debug;
use std::rc::Rc;

pub const ATTR_TYPE: &str = "Type";
pub const ATTR_ID: &str = "Id";
pub const ATTR_INHERITS: &str = "Inherits";
pub const ATTR_ABSTRACT: &str = "Abstract";
pub const ATTR_OVERRIDE: &str = "OverrideAction";

pub struct StageOutput {
    pub definitions: Vec<Definition>,
    pub diagnostics: Diagnostics,
}

pub struct DocumentStager<'a> {
    registry: &'a TypeRegistry,
    options: &'a ParserOptions,
    params: &'a ParseParams,
    file: Rc<str>,
    lines: LineIndex,
    diagnostics: Diagnostics,
}

impl<'a> DocumentStager<'a> {
    pub fn new(
        registry: &'a TypeRegistry,
        options: &'a ParserOptions,
        params: &'a ParseParams,
        source_name: &str,
        source_text: &str,
    ) -> Self {
        Self {
            registry,
            options,
            params,
            file: Rc::from(source_name),
            lines: LineIndex::new(source_text),
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn stage(mut self, document: &MarkupDocument) -> StageOutput {
        let definitions = self.stage_container(&document.root);
        debug!(
            "staged {} definitions from {}",
            definitions.len(),
            self.file
        );
        StageOutput {
            definitions,
            diagnostics: self.diagnostics,
        }
    }

    fn stage_container(&mut self, root: &Element) -> Vec<Definition> {
        let Some(type_name) = root.attribute(ATTR_TYPE) else {
            self.error(
                DiagnosticKind::MalformedNode,
                root,
                format!("container <{}> has no {} attribute", root.name, ATTR_TYPE),
            );
            return Vec::new();
        };
        let container_type = match self.find_type(type_name) {
            Some(ty) if ty.is_prototype() => ty,
            Some(_) => {
                self.error(
                    DiagnosticKind::UnknownContainerType,
                    root,
                    format!("container type '{type_name}' is not a prototype type"),
                );
                return Vec::new();
            }
            None => {
                self.error(
                    DiagnosticKind::UnknownContainerType,
                    root,
                    format!("unknown container type '{type_name}'"),
                );
                return Vec::new();
            }
        };

        if let Some(text) = root.stray_text() {
            self.diagnostics.warning(
                DiagnosticKind::MalformedNode,
                &self.file,
                self.lines.line(text.pos_start),
                "text inside the container is ignored",
            );
        }

        root.elements()
            .filter_map(|item| self.stage_item(item, &container_type))
            .collect()
    }

    fn stage_item(&mut self, item: &Element, container_type: &Rc<TypeDescriptor>) -> Option<Definition> {
        if item.name != self.options.item_tag {
            let message = format!("expected <{}>, found <{}>", self.options.item_tag, item.name);
            self.error(DiagnosticKind::MalformedNode, item, message);
            return None;
        }

        let id = match item.attribute(ATTR_ID).map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                self.error(
                    DiagnosticKind::MissingIdentifier,
                    item,
                    format!("<{}> has no {} attribute", item.name, ATTR_ID),
                );
                return None;
            }
        };

        let inherits = item
            .attribute(ATTR_INHERITS)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let is_abstract = match item.attribute(ATTR_ABSTRACT).map(str::trim) {
            None => false,
            Some(v) if v.eq_ignore_ascii_case("true") => true,
            Some(v) if v.eq_ignore_ascii_case("false") => false,
            Some(v) => {
                self.diagnostics.warning(
                    DiagnosticKind::MalformedNode,
                    &self.file,
                    self.lines.line(item.pos_start),
                    format!("'{id}': {ATTR_ABSTRACT}=\"{v}\" is not True or False; treated as False"),
                );
                false
            }
        };

        for attribute in &item.attributes {
            if ![ATTR_ID, ATTR_INHERITS, ATTR_ABSTRACT, ATTR_TYPE].contains(&attribute.name.as_str()) {
                self.diagnostics.warning(
                    DiagnosticKind::MalformedNode,
                    &self.file,
                    self.lines.line(attribute.pos_start),
                    format!("'{id}': unknown attribute '{}' ignored", attribute.name),
                );
            }
        }

        let type_override = item.attribute(ATTR_TYPE).map(str::to_string);
        let descriptor = match &type_override {
            None => Rc::clone(container_type),
            Some(name) => match self.find_type(name) {
                Some(ty) if ty.is_prototype() => ty,
                Some(ty) => {
                    self.error(
                        DiagnosticKind::UnknownElementType,
                        item,
                        format!("'{id}': type '{}' is not a prototype type", ty.qualified_name()),
                    );
                    return None;
                }
                None => {
                    self.error(
                        DiagnosticKind::UnknownElementType,
                        item,
                        format!("'{id}': unknown type '{name}'"),
                    );
                    return None;
                }
            },
        };
        if descriptor.is_abstract() && !is_abstract {
            self.error(
                DiagnosticKind::UnknownElementType,
                item,
                format!(
                    "'{id}': type '{}' is abstract; mark the item Abstract or pick a concrete type",
                    descriptor.qualified_name()
                ),
            );
            return None;
        }

        let body = self.stage_object(item, descriptor);
        Some(Definition {
            id,
            inherits,
            is_abstract,
            type_override,
            body,
            state: DefinitionState::Staged,
            instance: None,
        })
    }

    /// Stages each child element as a field of `descriptor`.
    fn stage_object(&mut self, element: &Element, descriptor: Rc<TypeDescriptor>) -> StagedObject {
        if let Some(text) = element.stray_text() {
            self.diagnostics.warning(
                DiagnosticKind::MalformedNode,
                &self.file,
                self.lines.line(text.pos_start),
                format!("text inside <{}> is ignored", element.name),
            );
        }

        let mut fields = Vec::new();
        for child in element.elements() {
            let Some(field) = descriptor.field_descriptor(&child.name) else {
                self.error(
                    DiagnosticKind::UnknownField,
                    child,
                    format!(
                        "type '{}' has no field '{}'",
                        descriptor.qualified_name(),
                        child.name
                    ),
                );
                continue;
            };
            if let Some(value) = self.stage_value(child, &field.ty) {
                fields.push(StagedField {
                    name: child.name.clone(),
                    value,
                    location: self.location(child),
                });
            }
        }

        StagedObject {
            location: self.location(element),
            descriptor,
            fields,
        }
    }

    fn stage_value(&mut self, element: &Element, ty: &FieldType) -> Option<FieldValue> {
        match ty {
            FieldType::Scalar(type_name) => {
                if element.has_element_children() {
                    self.error(
                        DiagnosticKind::MalformedNode,
                        element,
                        format!("<{}> holds a {type_name} and cannot contain elements", element.name),
                    );
                    return None;
                }
                let Some(converter) = self.registry.converters().best(type_name) else {
                    self.error(
                        DiagnosticKind::MissingSerializer,
                        element,
                        format!("no converter registered for type '{type_name}'"),
                    );
                    return None;
                };
                match converter.convert(&element.text()) {
                    Ok(value) => Some(FieldValue::Scalar {
                        type_name: type_name.clone(),
                        value,
                    }),
                    Err(err) => {
                        self.error(DiagnosticKind::MalformedNode, element, format!("<{}>: {err}", element.name));
                        None
                    }
                }
            }
            FieldType::Reference(_) => {
                if element.has_element_children() {
                    self.error(
                        DiagnosticKind::MalformedNode,
                        element,
                        format!("<{}> holds a reference id and cannot contain elements", element.name),
                    );
                    return None;
                }
                Some(FieldValue::UnresolvedReference(element.text().trim().to_string()))
            }
            FieldType::Object(declared) => {
                let descriptor = self.object_type(element, declared)?;
                Some(FieldValue::SubObject(self.stage_object(element, descriptor)))
            }
            FieldType::Collection { kind, element: element_ty } => {
                let override_action = match element.attribute(ATTR_OVERRIDE) {
                    None => None,
                    Some(text) => match OverrideAction::parse(text.trim()) {
                        Some(action) => Some(action),
                        None => {
                            self.error(
                                DiagnosticKind::MalformedNode,
                                element,
                                format!(
                                    "{ATTR_OVERRIDE}=\"{text}\" on <{}> must be Replace or Combine",
                                    element.name
                                ),
                            );
                            None
                        }
                    },
                };
                if let Some(text) = element.stray_text() {
                    self.diagnostics.warning(
                        DiagnosticKind::MalformedNode,
                        &self.file,
                        self.lines.line(text.pos_start),
                        format!("text inside collection <{}> is ignored", element.name),
                    );
                }

                let mut elements = Vec::new();
                for entry in element.elements() {
                    if entry.name != self.options.list_item_tag {
                        let message = format!(
                            "collection entries must be <{}>, found <{}>",
                            self.options.list_item_tag, entry.name
                        );
                        self.error(DiagnosticKind::MalformedNode, entry, message);
                        continue;
                    }
                    if let Some(value) = self.stage_value(entry, element_ty) {
                        elements.push(value);
                    }
                }
                Some(FieldValue::Collection(CollectionDef {
                    kind: *kind,
                    override_action,
                    elements,
                }))
            }
        }
    }

    /// The concrete type of a sub-object: the declared type, or a `Type`
    /// override that derives from it.
    fn object_type(&mut self, element: &Element, declared: &str) -> Option<Rc<TypeDescriptor>> {
        let descriptor = match element.attribute(ATTR_TYPE) {
            None => self.registry.get(declared),
            Some(name) => match self.find_type(name) {
                Some(ty) if ty.is_a(declared) => Some(ty),
                Some(ty) => {
                    self.error(
                        DiagnosticKind::UnknownElementType,
                        element,
                        format!(
                            "type '{}' does not derive from '{declared}'",
                            ty.qualified_name()
                        ),
                    );
                    return None;
                }
                None => {
                    self.error(
                        DiagnosticKind::UnknownElementType,
                        element,
                        format!("unknown type '{name}'"),
                    );
                    return None;
                }
            },
        };
        let Some(descriptor) = descriptor else {
            self.error(
                DiagnosticKind::UnknownElementType,
                element,
                format!("unknown type '{declared}'"),
            );
            return None;
        };
        if descriptor.is_abstract() {
            self.error(
                DiagnosticKind::UnknownElementType,
                element,
                format!(
                    "type '{}' is abstract; give <{}> a concrete {ATTR_TYPE}",
                    descriptor.qualified_name(),
                    element.name
                ),
            );
            return None;
        }
        Some(descriptor)
    }

    fn find_type(&self, name: &str) -> Option<Rc<TypeDescriptor>> {
        self.registry.find(name.trim(), &self.params.preferred_namespace)
    }

    fn line(&self, element: &Element) -> usize {
        self.lines.line(element.pos_start)
    }

    fn location(&self, element: &Element) -> SourceLocation {
        SourceLocation {
            file: Rc::clone(&self.file),
            line: self.line(element),
        }
    }

    fn error(&mut self, kind: DiagnosticKind, element: &Element, message: String) {
        let line = self.line(element);
        self.diagnostics.error(kind, &self.file, line, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn registry() -> TypeRegistry {
        TypeRegistry::builder()
            .register(TypeDescriptor::composite("Stats").field("hp", FieldType::scalar("int")))
            .register(
                TypeDescriptor::prototype("ItemDef")
                    .field("price", FieldType::scalar("int"))
                    .field("stats", FieldType::object("Stats"))
                    .field("tags", FieldType::list(FieldType::scalar("string")))
                    .field("upgrade", FieldType::reference("ItemDef")),
            )
            .build()
            .unwrap()
    }

    fn stage(source: &str) -> StageOutput {
        let registry = registry();
        let options = ParserOptions::default();
        let params = ParseParams::default();
        let document = Parser::new(source).unwrap().parse_document().unwrap();
        DocumentStager::new(&registry, &options, &params, "stage.xml", source).stage(&document)
    }

    #[test]
    fn test_stages_field_kinds() {
        let output = stage(
            r#"<Items Type="ItemDef">
                <Item Id="A" Inherits="B">
                    <price>3</price>
                    <stats><hp>1</hp></stats>
                    <tags OverrideAction="Combine"><li>x</li></tags>
                    <upgrade> B </upgrade>
                </Item>
            </Items>"#,
        );
        assert!(output.diagnostics.is_empty());
        let a = &output.definitions[0];
        assert_eq!(a.id, "A");
        assert_eq!(a.inherits.as_deref(), Some("B"));
        assert_eq!(a.state, DefinitionState::Staged);
        assert_eq!(a.location().line, 2);

        let body = &a.body;
        assert!(matches!(
            &body.field("price").unwrap().value,
            FieldValue::Scalar { type_name, value } if type_name == "int" && value.as_int() == Some(3)
        ));
        match &body.field("stats").unwrap().value {
            FieldValue::SubObject(stats) => {
                assert_eq!(stats.descriptor.qualified_name(), "Stats");
                assert_eq!(stats.fields.len(), 1);
            }
            other => panic!("expected a sub-object, got {other:?}"),
        }
        match &body.field("tags").unwrap().value {
            FieldValue::Collection(tags) => {
                assert_eq!(tags.override_action, Some(OverrideAction::Combine));
                assert_eq!(tags.elements.len(), 1);
            }
            other => panic!("expected a collection, got {other:?}"),
        }
        assert!(matches!(
            &body.field("upgrade").unwrap().value,
            FieldValue::UnresolvedReference(id) if id == "B"
        ));
        assert_eq!(body.field("upgrade").unwrap().location.line, 6);
    }

    #[test]
    fn test_bad_items_are_skipped() {
        let output = stage(
            r#"<Items Type="ItemDef">
                <Item/>
                <Other Id="X"/>
                <Item Id="Kept"><nope>1</nope></Item>
            </Items>"#,
        );
        let kinds: Vec<DiagnosticKind> = output.diagnostics.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DiagnosticKind::MissingIdentifier,
                DiagnosticKind::MalformedNode,
                DiagnosticKind::UnknownField
            ]
        );
        assert_eq!(output.definitions.len(), 1);
        assert!(output.definitions[0].body.fields.is_empty());
    }
}
