//! Built-in graphics math declarations.

use crate::functions::Registries;
use crate::schema::{SchemaDocument, SchemaError};

pub const BUILTIN_SCHEMA: &str = include_str!("../schema/graphics_math.json");

pub fn builtin_document() -> Result<SchemaDocument, SchemaError> {
    SchemaDocument::from_json(BUILTIN_SCHEMA)
}

pub fn builtin_registries() -> Result<Registries, SchemaError> {
    Registries::from_document(&builtin_document()?)
}
