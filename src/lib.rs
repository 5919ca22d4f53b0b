//! Parser and inheritance resolver for declarative prototype documents.
//!
//! A document is a markup container naming a prototype type, holding items
//! that may inherit from one another, reference each other by id, and merge
//! collections with their ancestors:
//!
//! ```xml
//! <Items Type="ItemDef">
//!   <Item Id="BaseSword" Abstract="True"><damage>5</damage></Item>
//!   <Item Id="FireSword" Inherits="BaseSword">
//!     <tags OverrideAction="Combine"><li>fire</li></tags>
//!   </Item>
//! </Items>
//! ```
//!
//! Types are described in a [`TypeRegistry`]; a [`PrototypeParser`] stages,
//! orders, allocates, binds references and applies fields, collecting
//! [`Diagnostic`]s instead of failing.

pub mod api;
pub mod applier;
pub mod ast;
pub mod config;
pub mod convert;
pub mod definition;
pub mod diagnostics;
pub mod error;
pub mod inheritance;
pub mod lexer;
pub mod parser;
pub mod registry;
pub mod resolver;
pub mod stager;
pub mod utils;
pub mod value;
mod serialization;

pub use api::{parse, ParseResult, PrototypeParser};
pub use config::{ParseParams, ParserOptions};
pub use convert::{ConverterSet, EnumConverter, ScalarConverter};
pub use definition::{Definition, DefinitionState, OverrideAction};
pub use diagnostics::{Diagnostic, DiagnosticKind, Severity};
pub use error::{ConvertError, ProtoError, RegistryError};
pub use registry::{
    CollectionKind, FieldType, TypeDescriptor, TypeKind, TypeRegistration, TypeRegistry,
    TypeRegistryBuilder,
};
pub use value::{Fields, Object, PrototypeRef, Value};

pub use inventory;
