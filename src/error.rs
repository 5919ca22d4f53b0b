use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum ProtoError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parser(#[from] ParserError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Registry(#[from] RegistryError),

    #[error("Batch has {contents} documents but {names} source names")]
    #[diagnostic(
        code(api::mismatched_batch),
        help("`parse_many` needs exactly one source name per document.")
    )]
    MismatchedBatch { contents: usize, names: usize },

    #[error("Failed to read '{path}': {message}")]
    #[diagnostic(code(api::io))]
    Io { path: String, message: String },

    #[error("Invalid parser options: {message}")]
    #[diagnostic(code(config::invalid))]
    Config { message: String },
}

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum ParserError {
    #[error("Unexpected token")]
    #[diagnostic(
        code(parser::unexpected_token),
        help("The parser found a token it did not expect in this position.")
    )]
    UnexpectedToken {
        #[source_code]
        src: NamedSource<String>,
        #[label("Expected {expected}, but found this")]
        span: SourceSpan,
        expected: String,
    },

    #[error("Unexpected end of file")]
    #[diagnostic(
        code(parser::unexpected_eof),
        help("The document ended before every element was closed.")
    )]
    UnexpectedEof {
        #[source_code]
        src: NamedSource<String>,
        #[label("File ended unexpectedly here")]
        span: SourceSpan,
    },

    #[error("Closing tag does not match")]
    #[diagnostic(
        code(parser::mismatched_closing_tag),
        help("Every element must be closed with a tag of the same name.")
    )]
    MismatchedClosingTag {
        #[source_code]
        src: NamedSource<String>,
        #[label("Expected </{expected}>, found </{found}>")]
        span: SourceSpan,
        expected: String,
        found: String,
    },

    #[error("Attribute '{name}' is set twice")]
    #[diagnostic(code(parser::duplicate_attribute))]
    DuplicateAttribute {
        #[source_code]
        src: NamedSource<String>,
        #[label("Second '{name}' here")]
        span: SourceSpan,
        name: String,
    },

    #[error("Elements nest too deeply")]
    #[diagnostic(
        code(parser::nesting_too_deep),
        help("Prototype documents may nest elements at most {limit} levels deep.")
    )]
    NestingTooDeep {
        #[source_code]
        src: NamedSource<String>,
        #[label("Nesting exceeds {limit} levels here")]
        span: SourceSpan,
        limit: usize,
    },
}

impl ParserError {
    /// Byte offset of the offending span.
    pub fn offset(&self) -> usize {
        match self {
            ParserError::UnexpectedToken { span, .. }
            | ParserError::UnexpectedEof { span, .. }
            | ParserError::MismatchedClosingTag { span, .. }
            | ParserError::DuplicateAttribute { span, .. }
            | ParserError::NestingTooDeep { span, .. } => span.offset(),
        }
    }

    /// What the label says, for reports that cannot show the source.
    pub fn detail(&self) -> String {
        match self {
            ParserError::UnexpectedToken { expected, .. } => format!("expected {expected}"),
            ParserError::UnexpectedEof { .. } => "an element was never closed".to_string(),
            ParserError::MismatchedClosingTag { expected, found, .. } => {
                format!("expected </{expected}>, found </{found}>")
            }
            ParserError::DuplicateAttribute { name, .. } => format!("'{name}' appears twice"),
            ParserError::NestingTooDeep { limit, .. } => format!("more than {limit} levels"),
        }
    }
}

#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Type '{name}' is registered twice")]
    #[diagnostic(code(registry::duplicate_type))]
    DuplicateType { name: String },

    #[error("Type '{name}' derives from unknown type '{base}'")]
    #[diagnostic(code(registry::unknown_base))]
    UnknownBaseType { name: String, base: String },

    #[error("Base type cycle detected: {cycle}")]
    #[diagnostic(code(registry::base_cycle))]
    CyclicBaseType { cycle: String },

    #[error("Field '{field}' of '{owner}' has unknown type '{type_name}'")]
    #[diagnostic(code(registry::unknown_field_type))]
    UnknownFieldType {
        owner: String,
        field: String,
        type_name: String,
    },

    #[error("Field '{field}' of '{owner}' references '{type_name}', which is not a prototype type")]
    #[diagnostic(
        code(registry::invalid_reference),
        help("Reference fields must point at types registered with `TypeDescriptor::prototype`.")
    )]
    InvalidReferenceType {
        owner: String,
        field: String,
        type_name: String,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvertError {
    #[error("'{text}' is not a valid {type_name}")]
    Invalid { text: String, type_name: String },

    #[error("'{text}' is not a variant of enum '{enum_name}'")]
    UnknownVariant { text: String, enum_name: String },
}
