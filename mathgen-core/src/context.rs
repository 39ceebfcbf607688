//! Template Context Builder
//!
//! Turns a schema (plus an optional selected interface) into the fixed,
//! serializable shape that templates are allowed to read. Pure: every field is
//! derived from ordered data, so the same input always yields the same context.

use serde::Serialize;

use crate::artifact::type_has_binding;
use crate::functions::Registries;
use crate::schema::{
    lower_camel_case, FunctionSchema, Interface, Primitive, SchemaError, TypeCategory, TypeSchema,
};

/// Summary of a referenced type: enough to name, include and construct it.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TypeRefContext {
    pub name: String,
    pub class_name: String,
    /// Spelling outside the library namespace (`float`, `gm::Vec3f`).
    pub qualified_class: String,
    pub category: &'static str,
    pub header_file: String,
    pub binding_name: String,
    pub is_scalar: bool,
    pub is_vector: bool,
    pub is_range: bool,
    pub is_composite: bool,
    /// C name of the underlying primitive (scalars, vectors and ranges).
    pub scalar_class: Option<&'static str>,
    pub element_class: Option<String>,
    pub element_size: Option<usize>,
    pub variable_prefix: String,
    pub default_value: String,
    pub sample_values: Vec<f64>,
    pub sample_literal: String,
    /// The same sample as a Python expression (`gm.Vec3f(2.0, 4.0, 6.0)`).
    pub python_sample: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ElementContext {
    pub index: usize,
    pub name: String,
    pub accessor: String,
    pub member: String,
    pub arg_name: String,
    #[serde(rename = "type")]
    pub ty: TypeRefContext,
    pub default_value: String,
    pub python_sample: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TypeContext {
    #[serde(flatten)]
    pub base: TypeRefContext,
    pub bind_symbol: String,
    pub element_type: Option<TypeRefContext>,
    pub elements: Vec<ElementContext>,
    pub accessors: Vec<String>,
    /// Headers of non-scalar element types, first occurrence order.
    pub includes: Vec<String>,
    pub extra_includes: Vec<String>,
    pub has_binding: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ParameterContext {
    pub index: usize,
    pub name: String,
    pub arg_name: String,
    pub mutable: bool,
    pub qualifier: &'static str,
    #[serde(rename = "type")]
    pub ty: TypeRefContext,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InterfaceContext {
    pub index: usize,
    pub arity: usize,
    pub signature: String,
    pub parameters: Vec<ParameterContext>,
    pub return_type: Option<TypeRefContext>,
    pub has_return: bool,
    pub return_class: String,
    pub return_qualified_class: String,
    pub return_binding: String,
}

impl InterfaceContext {
    pub fn parameter(&self, name: &str) -> Option<&ParameterContext> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FunctionContext {
    pub name: String,
    pub symbol: String,
    pub category: String,
    pub header_file: String,
    pub bind_symbol: String,
    pub interfaces: Vec<InterfaceContext>,
    /// Every type used by any interface, first occurrence order.
    pub types: Vec<TypeRefContext>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ModuleEntry {
    pub name: String,
    pub bind_symbol: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ModuleContext {
    pub types: Vec<ModuleEntry>,
    pub functions: Vec<ModuleEntry>,
}

pub struct ContextBuilder<'a> {
    registries: &'a Registries,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(registries: &'a Registries) -> Self {
        Self { registries }
    }

    pub fn type_ref(&self, name: &str) -> Result<TypeRefContext, SchemaError> {
        let schema = self.registries.types.resolve(name)?;
        self.type_ref_of(schema)
    }

    fn type_ref_of(&self, schema: &TypeSchema) -> Result<TypeRefContext, SchemaError> {
        let types = &self.registries.types;
        let primitive = types.primitive_of(schema);
        let element_class = schema.element_type.clone();
        let sample_values = self.sample_values(schema)?;

        let default_value = match schema.category {
            TypeCategory::Scalar => primitive_or_err(schema, primitive)?.zero_literal(),
            TypeCategory::Vector => {
                let p = primitive_or_err(schema, primitive)?;
                let zeros = vec![p.zero_literal(); schema.element_size.unwrap_or(0)];
                construct(&schema.name, &zeros)
            }
            TypeCategory::Range | TypeCategory::Composite => format!("{}()", schema.name),
        };

        let sample_literal = match schema.category {
            TypeCategory::Scalar => primitive_or_err(schema, primitive)?.literal(sample_values[0]),
            TypeCategory::Vector => {
                let p = primitive_or_err(schema, primitive)?;
                let literals: Vec<_> = sample_values.iter().map(|v| p.literal(*v)).collect();
                construct(&schema.name, &literals)
            }
            TypeCategory::Range => {
                let element = types.resolve(schema.element_type.as_deref().unwrap_or_default())?;
                let min = self.type_ref_of(element)?.sample_literal;
                let max = self.scaled_literal(element, 2.0)?;
                construct(&schema.name, &[min, max])
            }
            TypeCategory::Composite => {
                let mut literals = vec![];
                for element in &schema.elements {
                    literals.push(self.type_ref(&element.type_name)?.sample_literal);
                }
                construct(&schema.name, &literals)
            }
        };

        Ok(TypeRefContext {
            name: schema.name.clone(),
            class_name: schema.name.clone(),
            qualified_class: match schema.category {
                TypeCategory::Scalar => schema.name.clone(),
                _ => format!("gm::{}", schema.name),
            },
            category: schema.category.as_str(),
            header_file: schema.header_file(),
            binding_name: types.binding_name(schema),
            is_scalar: schema.category == TypeCategory::Scalar,
            is_vector: schema.category == TypeCategory::Vector,
            is_range: schema.category == TypeCategory::Range,
            is_composite: schema.category == TypeCategory::Composite,
            scalar_class: primitive.map(|p| p.c_name()),
            element_class,
            element_size: schema.element_size,
            variable_prefix: variable_prefix(schema),
            default_value,
            python_sample: self.python_sample(schema, 1.0)?,
            sample_values,
            sample_literal,
        })
    }

    /// Python expression for the sample value scaled by `factor`.
    fn python_sample(&self, schema: &TypeSchema, factor: f64) -> Result<String, SchemaError> {
        let types = &self.registries.types;
        Ok(match schema.category {
            TypeCategory::Scalar => {
                let primitive = primitive_or_err(schema, types.primitive_of(schema))?;
                primitive.python_literal(2.0 * factor)
            }
            TypeCategory::Vector => {
                let primitive = primitive_or_err(schema, types.primitive_of(schema))?;
                let literals: Vec<_> = self
                    .sample_values(schema)?
                    .iter()
                    .map(|v| primitive.python_literal(v * factor))
                    .collect();
                python_construct(&schema.name, &literals)
            }
            TypeCategory::Range => {
                let element = types.resolve(schema.element_type.as_deref().unwrap_or_default())?;
                let min = self.python_sample(element, factor)?;
                let max = self.python_sample(element, 2.0 * factor)?;
                python_construct(&schema.name, &[min, max])
            }
            TypeCategory::Composite => {
                let mut literals = vec![];
                for field in &schema.elements {
                    literals.push(self.python_sample(types.resolve(&field.type_name)?, factor)?);
                }
                python_construct(&schema.name, &literals)
            }
        })
    }

    /// Test inputs: element `i` of a vector is `(i + 1) * 2`, scalars are `2`.
    fn sample_values(&self, schema: &TypeSchema) -> Result<Vec<f64>, SchemaError> {
        Ok(match schema.category {
            TypeCategory::Scalar => vec![2.0],
            TypeCategory::Vector => (0..schema.element_size.unwrap_or(0))
                .map(|i| ((i + 1) * 2) as f64)
                .collect(),
            TypeCategory::Range => {
                let element = self
                    .registries
                    .types
                    .resolve(schema.element_type.as_deref().unwrap_or_default())?;
                let min = self.sample_values(element)?;
                let max: Vec<f64> = min.iter().map(|v| v * 2.0).collect();
                min.into_iter().chain(max).collect()
            }
            TypeCategory::Composite => vec![],
        })
    }

    fn scaled_literal(&self, schema: &TypeSchema, factor: f64) -> Result<String, SchemaError> {
        let primitive = primitive_or_err(schema, self.registries.types.primitive_of(schema))?;
        let values = self.sample_values(schema)?;
        let literals: Vec<_> = values.iter().map(|v| primitive.literal(v * factor)).collect();
        Ok(match schema.category {
            TypeCategory::Scalar => literals.concat(),
            _ => construct(&schema.name, &literals),
        })
    }

    pub fn type_context(&self, schema: &TypeSchema) -> Result<TypeContext, SchemaError> {
        let types = &self.registries.types;
        let base = self.type_ref_of(schema)?;
        let element_type = match schema.element_type.as_deref() {
            Some(name) => Some(self.type_ref(name)?),
            None => None,
        };

        let mut elements = vec![];
        let names = schema.element_names();
        match schema.category {
            TypeCategory::Scalar => {}
            TypeCategory::Vector => {
                let element = element_type.clone().ok_or_else(|| missing_element(schema))?;
                let primitive = primitive_or_err(schema, types.primitive_of(schema))?;
                for (index, name) in names.iter().enumerate() {
                    let mut context = element_context(index, name, element.clone(), element.default_value.clone());
                    context.python_sample = primitive.python_literal(base.sample_values[index]);
                    elements.push(context);
                }
            }
            TypeCategory::Range => {
                let element = element_type.clone().ok_or_else(|| missing_element(schema))?;
                let primitive = primitive_or_err(schema, types.primitive_of(schema))?;
                let limits = [
                    format!("std::numeric_limits< {} >::max()", primitive.c_name()),
                    format!("std::numeric_limits< {} >::lowest()", primitive.c_name()),
                ];
                for (index, (name, limit)) in names.iter().zip(limits).enumerate() {
                    let default_value = if element.is_vector {
                        construct(&element.class_name, &vec![limit; element.element_size.unwrap_or(0)])
                    } else {
                        limit
                    };
                    let mut context = element_context(index, name, element.clone(), default_value);
                    // Matches the range sample: max is twice min.
                    let element_schema = types.resolve(&element.name)?;
                    context.python_sample = self.python_sample(element_schema, (index + 1) as f64)?;
                    elements.push(context);
                }
            }
            TypeCategory::Composite => {
                for (index, field) in schema.elements.iter().enumerate() {
                    let ty = self.type_ref(&field.type_name)?;
                    let default_value = field.default_value.clone().unwrap_or_else(|| ty.default_value.clone());
                    elements.push(element_context(index, &field.name, ty, default_value));
                }
            }
        }

        let mut includes: Vec<String> = vec![];
        for element in &elements {
            if !element.ty.is_scalar && !includes.contains(&element.ty.header_file) {
                includes.push(element.ty.header_file.clone());
            }
        }

        Ok(TypeContext {
            base,
            bind_symbol: schema.bind_symbol(),
            element_type,
            elements,
            accessors: schema.accessor_names(),
            includes,
            extra_includes: schema.extra_includes.clone(),
            has_binding: type_has_binding(schema),
        })
    }

    pub fn interface_context(&self, function: &FunctionSchema, index: usize) -> Result<InterfaceContext, SchemaError> {
        let interface = function.interfaces.get(index).ok_or_else(|| SchemaError::NotFound {
            entity: "interface",
            name: format!("{}[{index}]", function.name),
        })?;
        self.build_interface(index, interface)
    }

    fn build_interface(&self, index: usize, interface: &Interface) -> Result<InterfaceContext, SchemaError> {
        let mut parameters = vec![];
        for (position, parameter) in interface.parameters.iter().enumerate() {
            parameters.push(ParameterContext {
                index: position,
                name: parameter.name.clone(),
                arg_name: parameter.arg_name(),
                mutable: parameter.mutable,
                qualifier: if parameter.mutable { "" } else { "const " },
                ty: self.type_ref(&parameter.type_name)?,
            });
        }

        let return_type = match interface.return_type.as_deref() {
            Some(name) => Some(self.type_ref(name)?),
            None => None,
        };
        let return_class = return_type
            .as_ref()
            .map_or_else(|| "void".to_string(), |t| t.class_name.clone());
        let return_qualified_class = return_type
            .as_ref()
            .map_or_else(|| "void".to_string(), |t| t.qualified_class.clone());
        let return_binding = return_type
            .as_ref()
            .map_or_else(|| "None".to_string(), |t| t.binding_name.clone());

        Ok(InterfaceContext {
            index,
            arity: parameters.len(),
            signature: interface.signature_text(),
            parameters,
            has_return: return_type.is_some(),
            return_type,
            return_class,
            return_qualified_class,
            return_binding,
        })
    }

    pub fn function_context(&self, function: &FunctionSchema) -> Result<FunctionContext, SchemaError> {
        let mut interfaces = vec![];
        let mut types: Vec<TypeRefContext> = vec![];
        for (index, interface) in function.interfaces.iter().enumerate() {
            let context = self.build_interface(index, interface)?;
            let used = context
                .parameters
                .iter()
                .map(|p| &p.ty)
                .chain(context.return_type.as_ref());
            for ty in used {
                if !types.iter().any(|t| t.name == ty.name) {
                    types.push(ty.clone());
                }
            }
            interfaces.push(context);
        }

        Ok(FunctionContext {
            name: function.name.clone(),
            symbol: function.symbol(),
            category: function.category.clone(),
            header_file: function.header_file(),
            bind_symbol: function.bind_symbol(),
            interfaces,
            types,
        })
    }

    pub fn module_context(&self) -> ModuleContext {
        let types = self
            .registries
            .types
            .all()
            .filter(|t| type_has_binding(t))
            .map(|t| ModuleEntry {
                name: t.name.clone(),
                bind_symbol: t.bind_symbol(),
            })
            .collect();
        let functions = self
            .registries
            .functions
            .all()
            .map(|f| ModuleEntry {
                name: f.symbol(),
                bind_symbol: f.bind_symbol(),
            })
            .collect();
        ModuleContext { types, functions }
    }
}

fn element_context(index: usize, name: &str, ty: TypeRefContext, default_value: String) -> ElementContext {
    ElementContext {
        python_sample: ty.python_sample.clone(),
        index,
        name: name.to_string(),
        accessor: crate::schema::upper_camel_case(name),
        member: format!("m_{name}"),
        arg_name: format!("i_{name}"),
        ty,
        default_value,
    }
}

fn construct(class_name: &str, args: &[String]) -> String {
    format!("{class_name}( {} )", args.join(", "))
}

fn python_construct(class_name: &str, args: &[String]) -> String {
    format!("gm.{class_name}({})", args.join(", "))
}

fn variable_prefix(schema: &TypeSchema) -> String {
    match schema.category {
        TypeCategory::Scalar => "value".to_string(),
        TypeCategory::Vector => "vector".to_string(),
        TypeCategory::Range => "range".to_string(),
        TypeCategory::Composite => lower_camel_case(&schema.name),
    }
}

fn primitive_or_err(schema: &TypeSchema, primitive: Option<Primitive>) -> Result<Primitive, SchemaError> {
    primitive.ok_or_else(|| SchemaError::invalid("type", &schema.name, "no underlying primitive"))
}

fn missing_element(schema: &TypeSchema) -> SchemaError {
    SchemaError::invalid("type", &schema.name, "missing elementType")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;

    fn registries() -> Registries {
        catalog::builtin_registries().unwrap()
    }

    #[test]
    fn test_vector_context_accessors_and_default() {
        let registries = registries();
        let builder = ContextBuilder::new(&registries);
        let vec3 = registries.types.resolve("Vec3f").unwrap();
        let context = builder.type_context(vec3).unwrap();

        assert_eq!(context.accessors, vec!["X", "Y", "Z"]);
        assert_eq!(context.base.default_value, "Vec3f( 0.0f, 0.0f, 0.0f )");
        assert_eq!(context.base.sample_literal, "Vec3f( 2.0f, 4.0f, 6.0f )");
        assert_eq!(context.elements.len(), 3);
        assert_eq!(context.elements[2].default_value, "0.0f");
        assert!(context.includes.is_empty());
    }

    #[test]
    fn test_range_context_defaults_to_empty_range() {
        let registries = registries();
        let builder = ContextBuilder::new(&registries);
        let range = registries.types.resolve("Vec3fRange").unwrap();
        let context = builder.type_context(range).unwrap();

        assert_eq!(context.accessors, vec!["Min", "Max"]);
        assert!(context.elements[0].default_value.starts_with("Vec3f( std::numeric_limits< float >::max()"));
        assert_eq!(context.includes, vec!["vec3f.h"]);
        assert_eq!(
            context.base.sample_literal,
            "Vec3fRange( Vec3f( 2.0f, 4.0f, 6.0f ), Vec3f( 4.0f, 8.0f, 12.0f ) )"
        );
    }

    #[test]
    fn test_python_samples_agree_with_elements() {
        let registries = registries();
        let builder = ContextBuilder::new(&registries);

        let vec3 = builder.type_context(registries.types.resolve("Vec3f").unwrap()).unwrap();
        assert_eq!(vec3.base.python_sample, "gm.Vec3f(2.0, 4.0, 6.0)");
        let samples: Vec<_> = vec3.elements.iter().map(|e| e.python_sample.as_str()).collect();
        assert_eq!(samples, vec!["2.0", "4.0", "6.0"]);

        let range = builder.type_context(registries.types.resolve("Vec3fRange").unwrap()).unwrap();
        assert_eq!(
            range.base.python_sample,
            "gm.Vec3fRange(gm.Vec3f(2.0, 4.0, 6.0), gm.Vec3f(4.0, 8.0, 12.0))"
        );
        assert_eq!(range.elements[1].python_sample, "gm.Vec3f(4.0, 8.0, 12.0)");

        let ray = builder.type_context(registries.types.resolve("Ray").unwrap()).unwrap();
        assert!(ray.base.python_sample.starts_with("gm.Ray(gm.Vec3f(2.0, 4.0, 6.0), "));
        assert_eq!(ray.elements[0].python_sample, "gm.Vec3f(2.0, 4.0, 6.0)");
    }

    #[test]
    fn test_function_context_parameters_and_types() {
        let registries = registries();
        let builder = ContextBuilder::new(&registries);
        let roots = registries.functions.resolve("quadraticRoots").unwrap();
        let context = builder.function_context(roots).unwrap();

        assert_eq!(context.symbol, "QuadraticRoots");
        let interface = &context.interfaces[0];
        assert_eq!(interface.arity, 4);
        assert_eq!(interface.return_class, "int");
        let out = interface.parameter("roots").unwrap();
        assert_eq!(out.index, 3);
        assert_eq!(out.arg_name, "o_roots");
        assert_eq!(out.qualifier, "");
        let names: Vec<_> = context.types.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["float", "Vec2f", "int"]);
    }

    #[test]
    fn test_context_is_deterministic() {
        let registries = registries();
        let builder = ContextBuilder::new(&registries);
        for function in registries.functions.all() {
            let a = serde_json::to_string(&builder.function_context(function).unwrap()).unwrap();
            let b = serde_json::to_string(&builder.function_context(function).unwrap()).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_selected_interface_matches_full_context() {
        let registries = registries();
        let builder = ContextBuilder::new(&registries);
        let length = registries.functions.resolve("length").unwrap();
        let full = builder.function_context(length).unwrap();
        let selected = builder.interface_context(length, 1).unwrap();
        assert_eq!(full.interfaces[1], selected);
        assert!(builder.interface_context(length, 42).is_err());
    }
}
