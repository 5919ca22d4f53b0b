//! Scalar field converters, selected by the declared field type name.

use crate::error::ConvertError;
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;

/// Turns the text content of a field element into a [`Value`].
pub trait ScalarConverter {
    /// The declared field type this converter handles, e.g. `int`.
    fn type_name(&self) -> &str;

    fn convert(&self, text: &str) -> Result<Value, ConvertError>;
}

pub struct BoolConverter;

impl ScalarConverter for BoolConverter {
    fn type_name(&self) -> &str {
        "bool"
    }

    fn convert(&self, text: &str) -> Result<Value, ConvertError> {
        match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(invalid(text, "bool")),
        }
    }
}

pub struct IntConverter;

impl ScalarConverter for IntConverter {
    fn type_name(&self) -> &str {
        "int"
    }

    fn convert(&self, text: &str) -> Result<Value, ConvertError> {
        text.trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| invalid(text, "int"))
    }
}

pub struct FloatConverter;

impl ScalarConverter for FloatConverter {
    fn type_name(&self) -> &str {
        "float"
    }

    fn convert(&self, text: &str) -> Result<Value, ConvertError> {
        text.trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| invalid(text, "float"))
    }
}

/// Keeps the text exactly as written, surrounding whitespace included.
pub struct StringConverter;

impl ScalarConverter for StringConverter {
    fn type_name(&self) -> &str {
        "string"
    }

    fn convert(&self, text: &str) -> Result<Value, ConvertError> {
        Ok(Value::String(text.to_string()))
    }
}

/// Accepts one of a fixed set of variant names.
pub struct EnumConverter {
    name: String,
    variants: Vec<String>,
}

impl EnumConverter {
    pub fn new<I, S>(name: impl Into<String>, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            variants: variants.into_iter().map(Into::into).collect(),
        }
    }
}

impl ScalarConverter for EnumConverter {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn convert(&self, text: &str) -> Result<Value, ConvertError> {
        let text = text.trim();
        if self.variants.iter().any(|v| v == text) {
            Ok(Value::Enum(text.to_string()))
        } else {
            Err(ConvertError::UnknownVariant {
                text: text.to_string(),
                enum_name: self.name.clone(),
            })
        }
    }
}

fn invalid(text: &str, type_name: &str) -> ConvertError {
    ConvertError::Invalid {
        text: text.trim().to_string(),
        type_name: type_name.to_string(),
    }
}

/// The converters known to a registry, keyed by type name.
pub struct ConverterSet {
    converters: HashMap<String, Box<dyn ScalarConverter>>,
}

impl ConverterSet {
    /// An empty set, without the built-in converters.
    pub fn empty() -> Self {
        Self {
            converters: HashMap::new(),
        }
    }

    /// Adds a converter, replacing any previous one for the same type name.
    pub fn insert(&mut self, converter: impl ScalarConverter + 'static) {
        self.converters
            .insert(converter.type_name().to_string(), Box::new(converter));
    }

    /// The converter for `type_name`: an exact match first, then the simple
    /// name of a dotted type name.
    pub fn best(&self, type_name: &str) -> Option<&dyn ScalarConverter> {
        self.converters
            .get(type_name)
            .or_else(|| {
                let (_, simple) = type_name.rsplit_once('.')?;
                self.converters.get(simple)
            })
            .map(|c| c.as_ref())
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.best(type_name).is_some()
    }
}

impl Default for ConverterSet {
    fn default() -> Self {
        let mut set = Self::empty();
        set.insert(BoolConverter);
        set.insert(IntConverter);
        set.insert(FloatConverter);
        set.insert(StringConverter);
        set
    }
}

impl fmt::Debug for ConverterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.converters.keys().collect();
        names.sort();
        f.debug_struct("ConverterSet").field("types", &names).finish()
    }
}
