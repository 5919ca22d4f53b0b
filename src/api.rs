use crate::applier::Applier;
use crate::config::{ParseParams, ParserOptions};
use crate::definition::{Definition, DefinitionState};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
use crate::error::ProtoError;
use crate::inheritance;
use crate::parser::Parser;
use crate::registry::TypeRegistry;
use crate::resolver::ReferenceResolver;
use crate::stager::DocumentStager;
use crate::utils::LineIndex;
use crate::value::PrototypeRef;
use log::debug;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

/// Parses prototype documents against a [`TypeRegistry`].
///
/// A parser keeps every definition it has seen, so a document parsed in a
/// later call can inherit from one parsed earlier. Diagnostics accumulate
/// across calls and are never cleared.
///
/// ```
/// use protodef_core::{FieldType, ParseParams, PrototypeParser, TypeDescriptor, TypeRegistry};
///
/// let registry = TypeRegistry::builder()
///     .register(TypeDescriptor::prototype("ItemDef").field("price", FieldType::scalar("int")))
///     .build()
///     .unwrap();
/// let mut parser = PrototypeParser::new(&registry);
/// parser.parse(
///     r#"<Items Type="ItemDef"><Item Id="Apple"><price>3</price></Item></Items>"#,
///     "items.xml",
///     &ParseParams::default(),
/// );
/// assert_eq!(parser.get("Apple").unwrap().get("price").unwrap().as_int(), Some(3));
/// ```
pub struct PrototypeParser<'r> {
    registry: &'r TypeRegistry,
    options: ParserOptions,
    definitions: HashMap<String, Definition>,
    prototypes: Vec<PrototypeRef>,
    diagnostics: Diagnostics,
}

impl<'r> PrototypeParser<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self::with_options(registry, ParserOptions::default())
    }

    pub fn with_options(registry: &'r TypeRegistry, options: ParserOptions) -> Self {
        PrototypeParser {
            registry,
            options,
            definitions: HashMap::new(),
            prototypes: Vec::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Parses one document. Returns the prototypes it produced.
    pub fn parse(&mut self, content: &str, source_name: &str, params: &ParseParams) -> Vec<PrototypeRef> {
        let mut definitions = self.stage(content, source_name, params);
        self.resolve_batch(&mut definitions)
    }

    /// Parses several documents as one batch: references and inheritance may
    /// cross documents in either direction.
    ///
    /// # Errors
    /// [`ProtoError::MismatchedBatch`] when the slices differ in length; nothing
    /// is parsed in that case.
    pub fn parse_many<C, N>(
        &mut self,
        contents: &[C],
        source_names: &[N],
        params: &ParseParams,
    ) -> Result<Vec<PrototypeRef>, ProtoError>
    where
        C: AsRef<str>,
        N: AsRef<str>,
    {
        if contents.len() != source_names.len() {
            return Err(ProtoError::MismatchedBatch {
                contents: contents.len(),
                names: source_names.len(),
            });
        }
        let mut definitions = Vec::new();
        for (content, name) in contents.iter().zip(source_names) {
            definitions.extend(self.stage(content.as_ref(), name.as_ref(), params));
        }
        Ok(self.resolve_batch(&mut definitions))
    }

    /// Reads every file as UTF-8 and parses them as one batch. Each path is
    /// used as its document's source name.
    ///
    /// # Errors
    /// [`ProtoError::Io`] for the first file that cannot be read; nothing is
    /// parsed in that case.
    pub fn parse_files<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
        params: &ParseParams,
    ) -> Result<Vec<PrototypeRef>, ProtoError> {
        let mut contents = Vec::with_capacity(paths.len());
        let mut names = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let text = std::fs::read_to_string(path).map_err(|e| ProtoError::Io {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            contents.push(text);
            names.push(path.display().to_string());
        }
        self.parse_many(&contents, &names, params)
    }

    /// Every prototype produced so far, in first-seen order.
    pub fn prototypes(&self) -> &[PrototypeRef] {
        &self.prototypes
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.diagnostics.as_slice()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }

    /// The most recently produced prototype with this id.
    pub fn get(&self, id: &str) -> Option<&PrototypeRef> {
        self.prototypes.iter().rev().find(|p| p.id() == id)
    }

    /// The staged definition registered under `id`, abstract ones included.
    pub fn definition(&self, id: &str) -> Option<&Definition> {
        self.definitions.get(id)
    }

    pub fn into_result(self) -> ParseResult {
        ParseResult {
            prototypes: self.prototypes,
            diagnostics: self.diagnostics.into_vec(),
        }
    }

    fn stage(&mut self, content: &str, source_name: &str, params: &ParseParams) -> Vec<Definition> {
        let document = match Parser::new_with_name(content, source_name.to_string())
            .and_then(|mut parser| parser.parse_document())
        {
            Ok(document) => document,
            Err(err) => {
                let (offset, message) = match &err {
                    ProtoError::Parser(e) => {
                        (e.offset(), format!("document skipped: {err}: {}", e.detail()))
                    }
                    _ => (0, format!("document skipped: {err}")),
                };
                self.diagnostics.error(
                    DiagnosticKind::MalformedNode,
                    source_name,
                    LineIndex::new(content).line(offset),
                    message,
                );
                return Vec::new();
            }
        };
        let stager = DocumentStager::new(self.registry, &self.options, params, source_name, content);
        let output = stager.stage(&document);
        self.diagnostics.extend(output.diagnostics);
        output.definitions
    }

    fn resolve_batch(&mut self, definitions: &mut Vec<Definition>) -> Vec<PrototypeRef> {
        let order = inheritance::order(definitions, &mut self.diagnostics);
        let created = inheritance::allocate(definitions);

        let mut instances = self.prototypes.clone();
        instances.extend(created.iter().cloned());
        ReferenceResolver::new(
            &instances,
            self.options.report_unresolved_references,
            &mut self.diagnostics,
        )
        .resolve(definitions);

        let applied =
            Applier::new(definitions, &self.definitions, &mut self.diagnostics).apply_all(&order);
        for i in applied {
            definitions[i].state = DefinitionState::Applied;
        }

        for definition in definitions.drain(..) {
            if definition.state == DefinitionState::Excluded {
                continue;
            }
            if let Some(previous) = self.definitions.get(&definition.id) {
                let location = definition.location();
                let message = format!(
                    "id '{}' is already defined at {}:{}; the later definition wins",
                    definition.id, previous.location().file, previous.location().line
                );
                self.diagnostics.warning(
                    DiagnosticKind::DuplicateIdentifier,
                    &location.file,
                    location.line,
                    message,
                );
            }
            self.definitions.insert(definition.id.clone(), definition);
        }

        debug!(
            "batch produced {} prototypes ({} total)",
            created.len(),
            self.prototypes.len() + created.len()
        );
        self.prototypes.extend(created.iter().cloned());
        created
    }
}

/// Prototypes and diagnostics detached from the parser that produced them.
#[derive(Debug, Serialize)]
pub struct ParseResult {
    pub prototypes: Vec<PrototypeRef>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseResult {
    pub fn get(&self, id: &str) -> Option<&PrototypeRef> {
        self.prototypes.iter().rev().find(|p| p.id() == id)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    /// Clears the fields of every prototype so reference cycles among them are
    /// freed. Handles cloned out of the result stay valid but see no fields.
    pub fn release(self) {
        for prototype in &self.prototypes {
            prototype.clear_fields();
        }
    }

    /// Serializes the prototypes and diagnostics into a pretty-printed JSON string.
    ///
    /// # Errors
    /// Returns a `serde_json::Error` if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Serializes the prototypes and diagnostics into a YAML string.
    ///
    /// # Errors
    /// Returns a `serde_yaml::Error` if serialization fails.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// Parses a single document with a throwaway parser and default options.
pub fn parse(registry: &TypeRegistry, content: &str, source_name: &str) -> ParseResult {
    let mut parser = PrototypeParser::new(registry);
    parser.parse(content, source_name, &ParseParams::default());
    parser.into_result()
}
