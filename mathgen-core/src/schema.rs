//! Schema Model - Declarative Types and Functions
//!
//! Declarations are loaded once per run and never mutated afterwards.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Invalid {entity} declaration '{name}': {reason}")]
    Invalid {
        entity: &'static str,
        name: String,
        reason: String,
    },

    #[error("Duplicate {entity} name: {name}")]
    Duplicate { entity: &'static str, name: String },

    #[error("Ambiguous overload in function '{function}': signature ({signature}) declared more than once")]
    AmbiguousOverload { function: String, signature: String },

    #[error("Unknown type '{name}' referenced by {referenced_by}")]
    UnknownType { name: String, referenced_by: String },

    #[error("{entity} not found: {name}")]
    NotFound { entity: &'static str, name: String },

    #[error("Schema document error: {0}")]
    Document(#[from] serde_json::Error),

    #[error("Schema I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SchemaError {
    pub(crate) fn invalid(entity: &'static str, name: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            entity,
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    Float,
    Int,
    Bool,
}

impl Primitive {
    pub fn c_name(&self) -> &'static str {
        match self {
            Primitive::Float => "float",
            Primitive::Int => "int",
            Primitive::Bool => "bool",
        }
    }

    pub fn python_name(&self) -> &'static str {
        // Python spells these the same way C++ does.
        self.c_name()
    }

    /// Render `value` as a C++ literal of this primitive.
    pub fn literal(&self, value: f64) -> String {
        match self {
            Primitive::Float => float_literal(value),
            Primitive::Int => format!("{}", value as i64),
            Primitive::Bool => if value != 0.0 { "true" } else { "false" }.to_string(),
        }
    }

    pub fn zero_literal(&self) -> String {
        self.literal(0.0)
    }

    /// Render `value` as a Python literal of this primitive.
    pub fn python_literal(&self, value: f64) -> String {
        match self {
            Primitive::Float => float_literal(value).trim_end_matches('f').to_string(),
            Primitive::Int => format!("{}", value as i64),
            Primitive::Bool => if value != 0.0 { "True" } else { "False" }.to_string(),
        }
    }
}

pub fn float_literal(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.1}f")
    } else {
        format!("{value}f")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TypeCategory {
    Scalar,
    Vector,
    Range,
    Composite,
}

impl TypeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeCategory::Scalar => "scalar",
            TypeCategory::Vector => "vector",
            TypeCategory::Range => "range",
            TypeCategory::Composite => "composite",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompositeElement {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TypeSchema {
    pub name: String,
    pub category: TypeCategory,
    #[serde(default)]
    pub primitive: Option<Primitive>,
    #[serde(default)]
    pub element_type: Option<String>,
    #[serde(default)]
    pub element_size: Option<usize>,
    #[serde(default)]
    pub elements: Vec<CompositeElement>,
    #[serde(default)]
    pub extra_includes: Vec<String>,
    #[serde(default)]
    pub binding_name: Option<String>,
}

impl TypeSchema {
    pub fn scalar(name: &str, primitive: Primitive) -> Self {
        Self {
            name: name.to_string(),
            category: TypeCategory::Scalar,
            primitive: Some(primitive),
            element_type: None,
            element_size: None,
            elements: vec![],
            extra_includes: vec![],
            binding_name: None,
        }
    }

    pub fn vector(name: &str, element_type: &str, element_size: usize) -> Self {
        Self {
            category: TypeCategory::Vector,
            primitive: None,
            element_type: Some(element_type.to_string()),
            element_size: Some(element_size),
            ..Self::scalar(name, Primitive::Float)
        }
    }

    pub fn range(name: &str, element_type: &str) -> Self {
        Self {
            category: TypeCategory::Range,
            primitive: None,
            element_type: Some(element_type.to_string()),
            ..Self::scalar(name, Primitive::Float)
        }
    }

    pub fn composite(name: &str, elements: Vec<CompositeElement>) -> Self {
        Self {
            category: TypeCategory::Composite,
            primitive: None,
            elements,
            ..Self::scalar(name, Primitive::Float)
        }
    }

    /// Names of the addressable elements, in declaration order.
    pub fn element_names(&self) -> Vec<String> {
        match self.category {
            TypeCategory::Scalar => vec![],
            TypeCategory::Vector => vector_element_names(self.element_size.unwrap_or(0)),
            TypeCategory::Range => vec!["min".to_string(), "max".to_string()],
            TypeCategory::Composite => self.elements.iter().map(|e| e.name.clone()).collect(),
        }
    }

    pub fn accessor_names(&self) -> Vec<String> {
        self.element_names().iter().map(|n| upper_camel_case(n)).collect()
    }

    pub fn header_file(&self) -> String {
        format!("{}.h", lower_camel_case(&self.name))
    }

    pub fn bind_symbol(&self) -> String {
        format!("Bind{}", upper_camel_case(&self.name))
    }
}

fn vector_element_names(size: usize) -> Vec<String> {
    const NAMED: [&str; 4] = ["x", "y", "z", "w"];
    if size <= NAMED.len() {
        NAMED[..size].iter().map(|s| s.to_string()).collect()
    } else {
        (0..size).map(|i| format!("e{i}")).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub mutable: bool,
}

impl Parameter {
    pub fn new(name: &str, type_name: &str) -> Self {
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            mutable: false,
        }
    }

    pub fn output(name: &str, type_name: &str) -> Self {
        Self {
            mutable: true,
            ..Self::new(name, type_name)
        }
    }

    /// Identifier used for the argument in generated code.
    pub fn arg_name(&self) -> String {
        if self.mutable {
            format!("o_{}", self.name)
        } else {
            format!("i_{}", self.name)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Interface {
    pub parameters: Vec<Parameter>,
    /// `None` means the overload produces no value.
    #[serde(default)]
    pub return_type: Option<String>,
}

impl Interface {
    pub fn new(parameters: Vec<Parameter>, return_type: Option<&str>) -> Self {
        Self {
            parameters,
            return_type: return_type.map(str::to_string),
        }
    }

    /// Parameter-type tuple that identifies this overload.
    pub fn signature(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.type_name.as_str()).collect()
    }

    pub fn signature_text(&self) -> String {
        self.signature().join(", ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSchema {
    pub name: String,
    #[serde(default)]
    pub category: String,
    pub interfaces: Vec<Interface>,
}

impl FunctionSchema {
    pub fn new(name: &str, category: &str, interfaces: Vec<Interface>) -> Self {
        Self {
            name: name.to_string(),
            category: category.to_string(),
            interfaces,
        }
    }

    pub fn symbol(&self) -> String {
        upper_camel_case(&self.name)
    }

    pub fn header_file(&self) -> String {
        format!("{}.h", lower_camel_case(&self.name))
    }

    pub fn bind_symbol(&self) -> String {
        format!("Bind{}", self.symbol())
    }
}

/// Several functions sharing one interface list, e.g. `floor`/`ceil`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionGroup {
    pub names: Vec<String>,
    #[serde(default)]
    pub category: String,
    pub interfaces: Vec<Interface>,
}

impl FunctionGroup {
    pub fn expand(&self) -> impl Iterator<Item = FunctionSchema> + '_ {
        self.names
            .iter()
            .map(|name| FunctionSchema::new(name, &self.category, self.interfaces.clone()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDocument {
    #[serde(default)]
    pub types: Vec<TypeSchema>,
    #[serde(default)]
    pub functions: Vec<FunctionSchema>,
    #[serde(default)]
    pub function_groups: Vec<FunctionGroup>,
}

impl SchemaDocument {
    pub fn from_json(source: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn load(path: &std::path::Path) -> Result<Self, SchemaError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_json(&source)
    }

    /// Functions in registration order: plain declarations, then expanded groups.
    pub fn all_functions(&self) -> Vec<FunctionSchema> {
        self.functions
            .iter()
            .cloned()
            .chain(self.function_groups.iter().flat_map(|g| g.expand().collect::<Vec<_>>()))
            .collect()
    }
}

pub fn upper_camel_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn lower_camel_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
