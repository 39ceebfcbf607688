//! Function Registry
//!
//! Every parameter and return type is resolved against a fully populated
//! [`TypeRegistry`] at registration time, so types must be registered first.

use indexmap::IndexMap;
use std::collections::HashSet;

use crate::schema::{is_identifier, FunctionSchema, Interface, SchemaDocument, SchemaError};
use crate::types::TypeRegistry;

#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: IndexMap<String, FunctionSchema>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self { functions: IndexMap::new() }
    }

    pub fn register(&mut self, schema: FunctionSchema, types: &TypeRegistry) -> Result<(), SchemaError> {
        if !is_identifier(&schema.name) {
            return Err(SchemaError::invalid("function", &schema.name, "name is not a valid identifier"));
        }
        if self.functions.contains_key(&schema.name) {
            return Err(SchemaError::Duplicate {
                entity: "function",
                name: schema.name.clone(),
            });
        }
        // Symbols are what land in generated code, so `floor` and `Floor` collide.
        if let Some(existing) = self.functions.values().find(|f| f.symbol() == schema.symbol()) {
            return Err(SchemaError::invalid(
                "function",
                &schema.name,
                format!("symbol '{}' already generated for function '{}'", schema.symbol(), existing.name),
            ));
        }
        if schema.interfaces.is_empty() {
            return Err(SchemaError::invalid("function", &schema.name, "at least one interface is required"));
        }

        let mut signatures = HashSet::new();
        for (index, interface) in schema.interfaces.iter().enumerate() {
            check_interface(&schema.name, index, interface, types)?;
            if !signatures.insert(interface.signature()) {
                return Err(SchemaError::AmbiguousOverload {
                    function: schema.name.clone(),
                    signature: interface.signature_text(),
                });
            }
        }

        tracing::debug!(
            name = %schema.name,
            interfaces = schema.interfaces.len(),
            "registered function"
        );
        self.functions.insert(schema.name.clone(), schema);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<&FunctionSchema, SchemaError> {
        self.functions.get(name).ok_or_else(|| SchemaError::NotFound {
            entity: "function",
            name: name.to_string(),
        })
    }

    pub fn resolve_interfaces(&self, name: &str) -> Result<&[Interface], SchemaError> {
        Ok(&self.resolve(name)?.interfaces)
    }

    pub fn all(&self) -> impl Iterator<Item = &FunctionSchema> {
        self.functions.values()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

fn check_interface(
    function: &str,
    index: usize,
    interface: &Interface,
    types: &TypeRegistry,
) -> Result<(), SchemaError> {
    let mut names = HashSet::new();
    for parameter in &interface.parameters {
        if !is_identifier(&parameter.name) {
            return Err(SchemaError::invalid(
                "function",
                function,
                format!("interface {index}: parameter name '{}' is not a valid identifier", parameter.name),
            ));
        }
        if !names.insert(parameter.name.as_str()) {
            return Err(SchemaError::invalid(
                "function",
                function,
                format!("interface {index}: duplicate parameter name '{}'", parameter.name),
            ));
        }
        if !types.contains(&parameter.type_name) {
            return Err(SchemaError::UnknownType {
                name: parameter.type_name.clone(),
                referenced_by: format!("parameter '{}' of function '{function}'", parameter.name),
            });
        }
    }

    if let Some(return_type) = &interface.return_type {
        if !types.contains(return_type) {
            return Err(SchemaError::UnknownType {
                name: return_type.clone(),
                referenced_by: format!("return type of function '{function}' (interface {index})"),
            });
        }
    }
    Ok(())
}

/// Both registries, built type-first. Passed explicitly to every component.
#[derive(Debug, Clone, Default)]
pub struct Registries {
    pub types: TypeRegistry,
    pub functions: FunctionRegistry,
}

impl Registries {
    pub fn from_document(document: &SchemaDocument) -> Result<Self, SchemaError> {
        let mut types = TypeRegistry::new();
        for schema in &document.types {
            types.register(schema.clone())?;
        }

        let mut functions = FunctionRegistry::new();
        for schema in document.all_functions() {
            functions.register(schema, &types)?;
        }

        tracing::info!(
            types = types.len(),
            functions = functions.len(),
            "loaded schema registries"
        );
        Ok(Self { types, functions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Parameter, Primitive, TypeSchema};

    fn types() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry.register(TypeSchema::scalar("float", Primitive::Float)).unwrap();
        for size in 2..=4 {
            registry.register(TypeSchema::vector(&format!("Vec{size}f"), "float", size)).unwrap();
        }
        registry
    }

    fn unary(type_name: &str, ret: Option<&str>) -> Interface {
        Interface::new(vec![Parameter::new("vector", type_name)], ret)
    }

    #[test]
    fn test_register_and_resolve_interfaces() {
        let types = types();
        let mut functions = FunctionRegistry::new();
        let length = FunctionSchema::new(
            "length",
            "linearAlgebra",
            vec![
                unary("Vec2f", Some("float")),
                unary("Vec3f", Some("float")),
                unary("Vec4f", Some("float")),
            ],
        );
        functions.register(length, &types).unwrap();

        let interfaces = functions.resolve_interfaces("length").unwrap();
        assert_eq!(interfaces.len(), 3);
        assert_eq!(interfaces[1].signature(), vec!["Vec3f"]);
        assert!(functions.resolve_interfaces("width").is_err());
    }

    #[test]
    fn test_ambiguous_overload_rejected() {
        let types = types();
        let mut functions = FunctionRegistry::new();
        let schema = FunctionSchema::new(
            "dotProduct",
            "linearAlgebra",
            vec![
                Interface::new(vec![Parameter::new("lhs", "Vec3f"), Parameter::new("rhs", "Vec3f")], Some("float")),
                Interface::new(vec![Parameter::new("a", "Vec3f"), Parameter::new("b", "Vec3f")], Some("float")),
            ],
        );
        let err = functions.register(schema, &types).unwrap_err();
        assert!(matches!(err, SchemaError::AmbiguousOverload { ref signature, .. } if signature == "Vec3f, Vec3f"));
        assert!(err.to_string().contains("Ambiguous overload"));
    }

    #[test]
    fn test_empty_interfaces_rejected() {
        let types = types();
        let mut functions = FunctionRegistry::new();
        let err = functions.register(FunctionSchema::new("nothing", "basic", vec![]), &types).unwrap_err();
        assert!(matches!(err, SchemaError::Invalid { .. }));
    }

    #[test]
    fn test_unknown_parameter_type() {
        let types = types();
        let mut functions = FunctionRegistry::new();
        let schema = FunctionSchema::new("normalize", "linearAlgebra", vec![unary("Vec5f", Some("Vec5f"))]);
        let err = functions.register(schema, &types).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownType { ref name, .. } if name == "Vec5f"));
    }

    #[test]
    fn test_symbol_collision_rejected() {
        let types = types();
        let mut functions = FunctionRegistry::new();
        functions
            .register(FunctionSchema::new("length", "basic", vec![unary("Vec2f", Some("float"))]), &types)
            .unwrap();
        let err = functions
            .register(FunctionSchema::new("Length", "basic", vec![unary("Vec2f", Some("float"))]), &types)
            .unwrap_err();
        assert!(err.to_string().contains("symbol 'Length'"));
    }

    #[test]
    fn test_void_interface_accepted() {
        let types = types();
        let mut functions = FunctionRegistry::new();
        let schema = FunctionSchema::new(
            "setZero",
            "basic",
            vec![Interface::new(vec![Parameter::output("vector", "Vec3f")], None)],
        );
        functions.register(schema, &types).unwrap();
        assert!(functions.resolve("setZero").unwrap().interfaces[0].return_type.is_none());
    }
}
