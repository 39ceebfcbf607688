//! Type Registry
//!
//! Registration order must already be a dependency order. A type may only
//! reference types registered before it; nothing is sorted on the caller's behalf.

use indexmap::IndexMap;
use std::collections::HashSet;

use crate::schema::{is_identifier, Primitive, SchemaError, TypeCategory, TypeSchema};

#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: IndexMap<String, TypeSchema>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self { types: IndexMap::new() }
    }

    pub fn register(&mut self, schema: TypeSchema) -> Result<(), SchemaError> {
        if !is_identifier(&schema.name) {
            return Err(SchemaError::invalid("type", &schema.name, "name is not a valid identifier"));
        }
        if self.types.contains_key(&schema.name) {
            return Err(SchemaError::Duplicate {
                entity: "type",
                name: schema.name.clone(),
            });
        }

        match schema.category {
            TypeCategory::Scalar => self.check_scalar(&schema)?,
            TypeCategory::Vector => self.check_vector(&schema)?,
            TypeCategory::Range => self.check_range(&schema)?,
            TypeCategory::Composite => self.check_composite(&schema)?,
        }
        self.check_common(&schema)?;

        tracing::debug!(name = %schema.name, category = schema.category.as_str(), "registered type");
        self.types.insert(schema.name.clone(), schema);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<&TypeSchema, SchemaError> {
        self.types.get(name).ok_or_else(|| SchemaError::NotFound {
            entity: "type",
            name: name.to_string(),
        })
    }

    pub fn get(&self, name: &str) -> Option<&TypeSchema> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// All types in registration order.
    pub fn all(&self) -> impl Iterator<Item = &TypeSchema> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Underlying primitive of a scalar, or of a vector/range's scalar elements.
    pub fn primitive_of(&self, schema: &TypeSchema) -> Option<Primitive> {
        match schema.category {
            TypeCategory::Scalar => schema.primitive,
            TypeCategory::Vector | TypeCategory::Range => schema
                .element_type
                .as_deref()
                .and_then(|name| self.types.get(name))
                .and_then(|element| self.primitive_of(element)),
            TypeCategory::Composite => None,
        }
    }

    /// Name of the type as seen from the foreign-language binding layer.
    pub fn binding_name(&self, schema: &TypeSchema) -> String {
        if let Some(name) = &schema.binding_name {
            return name.clone();
        }
        match (schema.category, schema.primitive) {
            (TypeCategory::Scalar, Some(primitive)) => primitive.python_name().to_string(),
            _ => format!("gm.{}", schema.name),
        }
    }

    fn resolve_reference(&self, name: &str, referenced_by: String) -> Result<&TypeSchema, SchemaError> {
        self.types.get(name).ok_or(SchemaError::UnknownType {
            name: name.to_string(),
            referenced_by,
        })
    }

    fn check_scalar(&self, schema: &TypeSchema) -> Result<(), SchemaError> {
        if schema.primitive.is_none() {
            return Err(SchemaError::invalid("type", &schema.name, "scalar types must declare a primitive"));
        }
        if schema.element_type.is_some() || schema.element_size.is_some() || !schema.elements.is_empty() {
            return Err(SchemaError::invalid(
                "type",
                &schema.name,
                "scalar types cannot declare elementType, elementSize or elements",
            ));
        }
        Ok(())
    }

    fn check_vector(&self, schema: &TypeSchema) -> Result<(), SchemaError> {
        let element = self.check_element_type(schema)?;
        if element.category != TypeCategory::Scalar {
            return Err(SchemaError::invalid(
                "type",
                &schema.name,
                format!("vector element type '{}' must be a scalar", element.name),
            ));
        }
        match schema.element_size {
            Some(size) if size >= 2 => Ok(()),
            Some(size) => Err(SchemaError::invalid(
                "type",
                &schema.name,
                format!("vector elementSize must be at least 2, got {size}"),
            )),
            None => Err(SchemaError::invalid("type", &schema.name, "vector types must declare elementSize")),
        }
    }

    fn check_range(&self, schema: &TypeSchema) -> Result<(), SchemaError> {
        let element = self.check_element_type(schema)?;
        if !matches!(element.category, TypeCategory::Scalar | TypeCategory::Vector) {
            return Err(SchemaError::invalid(
                "type",
                &schema.name,
                format!("range element type '{}' must be a scalar or a vector", element.name),
            ));
        }
        if schema.element_size.is_some() {
            return Err(SchemaError::invalid("type", &schema.name, "range types cannot declare elementSize"));
        }
        Ok(())
    }

    fn check_element_type(&self, schema: &TypeSchema) -> Result<&TypeSchema, SchemaError> {
        if schema.primitive.is_some() || !schema.elements.is_empty() {
            return Err(SchemaError::invalid(
                "type",
                &schema.name,
                "only scalars declare a primitive and only composites declare elements",
            ));
        }
        let element_type = schema.element_type.as_deref().ok_or_else(|| {
            SchemaError::invalid("type", &schema.name, format!("{} types must declare elementType", schema.category.as_str()))
        })?;
        self.resolve_reference(element_type, format!("type '{}'", schema.name))
    }

    fn check_composite(&self, schema: &TypeSchema) -> Result<(), SchemaError> {
        if schema.primitive.is_some() || schema.element_type.is_some() || schema.element_size.is_some() {
            return Err(SchemaError::invalid(
                "type",
                &schema.name,
                "composite types only declare elements",
            ));
        }
        if schema.elements.is_empty() {
            return Err(SchemaError::invalid("type", &schema.name, "composite types need at least one element"));
        }

        let mut names = HashSet::new();
        for element in &schema.elements {
            if !is_identifier(&element.name) {
                return Err(SchemaError::invalid(
                    "type",
                    &schema.name,
                    format!("element name '{}' is not a valid identifier", element.name),
                ));
            }
            if !names.insert(element.name.as_str()) {
                return Err(SchemaError::invalid(
                    "type",
                    &schema.name,
                    format!("duplicate element name '{}'", element.name),
                ));
            }
            self.resolve_reference(
                &element.type_name,
                format!("element '{}' of type '{}'", element.name, schema.name),
            )?;
        }
        Ok(())
    }

    fn check_common(&self, schema: &TypeSchema) -> Result<(), SchemaError> {
        let mut accessors = HashSet::new();
        for accessor in schema.accessor_names() {
            if !accessors.insert(accessor.clone()) {
                return Err(SchemaError::invalid(
                    "type",
                    &schema.name,
                    format!("accessor name '{accessor}' derived more than once"),
                ));
            }
        }

        let mut includes = HashSet::new();
        for include in &schema.extra_includes {
            if !includes.insert(include.as_str()) {
                return Err(SchemaError::invalid(
                    "type",
                    &schema.name,
                    format!("extra include {include} listed more than once"),
                ));
            }
        }

        if matches!(schema.binding_name.as_deref(), Some(name) if name.trim().is_empty()) {
            return Err(SchemaError::invalid("type", &schema.name, "bindingName cannot be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::CompositeElement;

    fn scalars() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry.register(TypeSchema::scalar("float", Primitive::Float)).unwrap();
        registry.register(TypeSchema::scalar("int", Primitive::Int)).unwrap();
        registry
    }

    fn element(name: &str, type_name: &str) -> CompositeElement {
        CompositeElement {
            name: name.to_string(),
            type_name: type_name.to_string(),
            default_value: None,
        }
    }

    #[test]
    fn test_registration_order_preserved() {
        let mut registry = scalars();
        registry.register(TypeSchema::vector("Vec3f", "float", 3)).unwrap();
        registry.register(TypeSchema::range("FloatRange", "float")).unwrap();
        let names: Vec<_> = registry.all().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["float", "int", "Vec3f", "FloatRange"]);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = scalars();
        let err = registry.register(TypeSchema::scalar("float", Primitive::Float)).unwrap_err();
        assert!(matches!(err, SchemaError::Duplicate { .. }));
    }

    #[test]
    fn test_vector_invariants() {
        let mut registry = scalars();
        assert!(registry.register(TypeSchema::vector("Vec1f", "float", 1)).is_err());

        registry.register(TypeSchema::vector("Vec2f", "float", 2)).unwrap();
        let err = registry.register(TypeSchema::vector("VecVec", "Vec2f", 2)).unwrap_err();
        assert!(err.to_string().contains("must be a scalar"));

        let err = registry.register(TypeSchema::vector("Vec2d", "double", 2)).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownType { ref name, .. } if name == "double"));
    }

    #[test]
    fn test_range_accepts_vector_elements() {
        let mut registry = scalars();
        registry.register(TypeSchema::vector("Vec3f", "float", 3)).unwrap();
        registry.register(TypeSchema::range("Vec3fRange", "Vec3f")).unwrap();
        let range = registry.resolve("Vec3fRange").unwrap();
        assert_eq!(range.accessor_names(), vec!["Min", "Max"]);
        assert_eq!(registry.primitive_of(range), Some(Primitive::Float));
    }

    #[test]
    fn test_composite_forward_reference_rejected() {
        let mut registry = scalars();
        let ray = TypeSchema::composite("Ray", vec![element("origin", "Vec3f")]);
        let err = registry.register(ray).unwrap_err();
        match err {
            SchemaError::UnknownType { name, referenced_by } => {
                assert_eq!(name, "Vec3f");
                assert!(referenced_by.contains("origin"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!registry.contains("Ray"));
    }

    #[test]
    fn test_composite_accessor_collision() {
        let mut registry = scalars();
        let schema = TypeSchema::composite("Pair", vec![element("value", "float"), element("Value", "int")]);
        let err = registry.register(schema).unwrap_err();
        assert!(err.to_string().contains("accessor name 'Value'"));
    }

    #[test]
    fn test_resolve_missing_type() {
        let registry = scalars();
        assert!(matches!(registry.resolve("Vec9z"), Err(SchemaError::NotFound { .. })));
    }

    #[test]
    fn test_binding_names() {
        let mut registry = scalars();
        registry.register(TypeSchema::vector("Vec2f", "float", 2)).unwrap();
        assert_eq!(registry.binding_name(registry.resolve("float").unwrap()), "float");
        assert_eq!(registry.binding_name(registry.resolve("Vec2f").unwrap()), "gm.Vec2f");
    }
}
