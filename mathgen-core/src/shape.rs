//! Structural Shapes of Rendered Artifacts
//!
//! Regex scanners that read back what a rendered artifact actually declares:
//! overload signatures, accessors, operators, test cases and binding symbols.
//! The scanners only understand the layout the built-in templates produce.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// One overload as declared in generated code, with `gm::` stripped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverloadShape {
    pub symbol: String,
    pub parameter_types: Vec<String>,
    /// `None` for `void`.
    pub return_type: Option<String>,
}

impl OverloadShape {
    pub fn signature_text(&self) -> String {
        self.parameter_types.join(", ")
    }
}

/// A bound overload: the C++ lambda plus the Python signature docstring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingOverload {
    pub lambda: OverloadShape,
    pub python_symbol: String,
    pub python_parameter_types: Vec<String>,
    pub python_return: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperatorShape {
    pub symbol: String,
    pub unary: bool,
}

impl OperatorShape {
    /// Suffix of the `TEST_CASE( "<Class>_<Suffix>" )` exercising this operator.
    pub fn test_case_suffix(&self) -> Option<&'static str> {
        Some(match (self.symbol.as_str(), self.unary) {
            ("+", _) => "Addition",
            ("+=", _) => "AdditionAssignment",
            ("-", true) => "Negation",
            ("-", false) => "Subtraction",
            ("-=", _) => "SubtractionAssignment",
            ("*", _) => "ScalarMultiplication",
            ("*=", _) => "ScalarMultiplicationAssignment",
            ("/", _) => "ScalarDivision",
            ("/=", _) => "ScalarDivisionAssignment",
            ("==", _) => "Equality",
            ("!=", _) => "Inequality",
            ("[]", _) => "ElementAccess",
            ("<", _) => "LessThan",
            (">", _) => "GreaterThan",
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TypeShape {
    pub accessors: Vec<String>,
    pub operators: Vec<OperatorShape>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestShape {
    pub test_cases: Vec<String>,
    pub accessor_calls: Vec<String>,
}

impl TestShape {
    pub fn has_case(&self, name: &str) -> bool {
        self.test_cases.iter().any(|c| c == name)
    }

    pub fn calls(&self, accessor: &str) -> bool {
        self.accessor_calls.iter().any(|c| c == accessor)
    }
}

/// What a generated Python test touches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PythonTestShape {
    pub test_functions: Vec<String>,
    pub attribute_accesses: Vec<String>,
}

impl PythonTestShape {
    pub fn accesses(&self, attribute: &str) -> bool {
        self.attribute_accesses.iter().any(|a| a == attribute)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModuleShape {
    pub declarations: Vec<String>,
    pub invocations: Vec<String>,
}

fn definition_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^GM_HOST_DEVICE inline (\w+) (\w+)\( ?(.*?) ?\)$")
            .expect("definition regex must compile")
    })
}

fn parameter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:const )?([\w:]+)& (\w+)$").expect("parameter regex must compile")
    })
}

fn lambda_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)^\s*o_module\.def\( "(\w+)", \[\]\( ?(.*?) ?\) -> ([\w:]+) \{"#)
            .expect("lambda regex must compile")
    })
}

fn python_signature_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)^\s*"(\w+)\((.*?)\) -> ([\w.]+)" \);$"#)
            .expect("python signature regex must compile")
    })
}

fn python_parameter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\w+): ([\w.]+)$").expect("python parameter regex must compile"))
}

fn accessor_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*GM_HOST_DEVICE inline (?:const )?[\w:]+&? (\w+)\(\)(?: const)?$")
            .expect("accessor regex must compile")
    })
}

fn operator_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*GM_HOST_DEVICE inline (?:const )?[\w:]+&? operator(\[\]|[-+*/=!<>]+)\((.*?)\)(?: const)?$")
            .expect("operator regex must compile")
    })
}

fn test_case_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"TEST_CASE\( "(\w+)" \)"#).expect("test case regex must compile"))
}

fn accessor_call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.(\w+)\(\)").expect("accessor call regex must compile"))
}

fn property_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\.def_property\(\s*"(\w+)""#).expect("property regex must compile"))
}

fn python_test_function_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^def (test\w+)\(\):$").expect("python test regex must compile"))
}

// `gm.Vec3f(...)` is a constructor, not an attribute: lowercase names only.
fn python_attribute_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b[a-z_]\w*\.([a-z_]\w*)\b").expect("python attribute regex must compile")
    })
}

fn bind_declaration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^void (Bind\w+)\( pybind11::module& \);$").expect("declaration regex must compile")
    })
}

fn bind_invocation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s+(Bind\w+)\( module \);$").expect("invocation regex must compile")
    })
}

fn bind_definition_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^void (Bind\w+)\( pybind11::module& o_module \)$")
            .expect("bind definition regex must compile")
    })
}

fn unqualified(name: &str) -> String {
    name.strip_prefix("gm::").unwrap_or(name).to_string()
}

fn return_of(class: &str) -> Option<String> {
    match class {
        "void" => None,
        other => Some(unqualified(other)),
    }
}

/// Parameter types of a `const T& i_a, T& o_b` list. Unparseable entries are
/// kept verbatim so they show up as mismatches instead of vanishing.
fn parameter_types(list: &str) -> Vec<String> {
    split_list(list)
        .map(|parameter| match parameter_re().captures(parameter) {
            Some(caps) => unqualified(&caps[1]),
            None => parameter.to_string(),
        })
        .collect()
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|p| !p.is_empty())
}

fn push_unique(values: &mut Vec<String>, value: &str) {
    if !values.iter().any(|v| v == value) {
        values.push(value.to_string());
    }
}

/// Free-function overloads declared at column zero of a definition artifact.
pub fn definition_overloads(text: &str) -> Vec<OverloadShape> {
    definition_re()
        .captures_iter(text)
        .map(|caps| OverloadShape {
            symbol: caps[2].to_string(),
            parameter_types: parameter_types(&caps[3]),
            return_type: return_of(&caps[1]),
        })
        .collect()
}

/// Lambdas and Python signatures are paired in order of appearance.
/// Returns the pairs plus the counts of each, which differ when a
/// binding is malformed.
pub fn binding_overloads(text: &str) -> (Vec<BindingOverload>, usize, usize) {
    let lambdas: Vec<OverloadShape> = lambda_re()
        .captures_iter(text)
        .map(|caps| OverloadShape {
            symbol: caps[1].to_string(),
            parameter_types: parameter_types(&caps[2]),
            return_type: return_of(&caps[3]),
        })
        .collect();
    let signatures: Vec<(String, Vec<String>, String)> = python_signature_re()
        .captures_iter(text)
        .map(|caps| {
            let types = split_list(&caps[2])
                .map(|parameter| match python_parameter_re().captures(parameter) {
                    Some(p) => p[2].to_string(),
                    None => parameter.to_string(),
                })
                .collect();
            (caps[1].to_string(), types, caps[3].to_string())
        })
        .collect();

    let (lambda_count, signature_count) = (lambdas.len(), signatures.len());
    let pairs = lambdas
        .into_iter()
        .zip(signatures)
        .map(|(lambda, (python_symbol, python_parameter_types, python_return))| BindingOverload {
            lambda,
            python_symbol,
            python_parameter_types,
            python_return,
        })
        .collect();
    (pairs, lambda_count, signature_count)
}

pub fn type_shape(text: &str) -> TypeShape {
    let mut shape = TypeShape::default();
    for caps in accessor_re().captures_iter(text) {
        push_unique(&mut shape.accessors, &caps[1]);
    }
    for caps in operator_re().captures_iter(text) {
        let operator = OperatorShape {
            symbol: caps[1].to_string(),
            unary: caps[2].trim().is_empty(),
        };
        if !shape.operators.contains(&operator) {
            shape.operators.push(operator);
        }
    }
    shape
}

pub fn test_shape(text: &str) -> TestShape {
    let mut shape = TestShape::default();
    for caps in test_case_re().captures_iter(text) {
        push_unique(&mut shape.test_cases, &caps[1]);
    }
    for caps in accessor_call_re().captures_iter(text) {
        push_unique(&mut shape.accessor_calls, &caps[1]);
    }
    shape
}

/// Property names a type binding exposes through `def_property`, in order.
pub fn binding_properties(text: &str) -> Vec<String> {
    property_re().captures_iter(text).map(|c| c[1].to_string()).collect()
}

pub fn python_test_shape(text: &str) -> PythonTestShape {
    let mut shape = PythonTestShape::default();
    for caps in python_test_function_re().captures_iter(text) {
        push_unique(&mut shape.test_functions, &caps[1]);
    }
    for caps in python_attribute_re().captures_iter(text) {
        push_unique(&mut shape.attribute_accesses, &caps[1]);
    }
    shape
}

pub fn module_shape(text: &str) -> ModuleShape {
    ModuleShape {
        declarations: bind_declaration_re().captures_iter(text).map(|c| c[1].to_string()).collect(),
        invocations: bind_invocation_re().captures_iter(text).map(|c| c[1].to_string()).collect(),
    }
}

/// `Bind<X>` symbols defined by a binding artifact.
pub fn bind_definitions(text: &str) -> Vec<String> {
    bind_definition_re().captures_iter(text).map(|c| c[1].to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFINITION: &str = "\
GM_NS_OPEN

/// Roots.
GM_HOST_DEVICE inline int QuadraticRoots( const float& i_a, const float& i_b, const float& i_c, Vec2f& o_roots )
{
    return 0;
}

GM_HOST_DEVICE inline void Reset( Vec3f& o_vector )
{
}

GM_NS_CLOSE
";

    const BINDING: &str = r#"
void BindLength( pybind11::module& o_module )
{
    o_module.def( "Length", []( const gm::Vec2f& i_vector ) -> float { return gm::Length( i_vector ); },
                  "Length(vector: gm.Vec2f) -> float" );
    o_module.def( "Length", []( const gm::Vec3f& i_vector ) -> float { return gm::Length( i_vector ); },
                  "Length(vector: gm.Vec3f) -> float" );
}
"#;

    #[test]
    fn test_definition_overloads() {
        let overloads = definition_overloads(DEFINITION);
        assert_eq!(overloads.len(), 2);
        assert_eq!(overloads[0].symbol, "QuadraticRoots");
        assert_eq!(overloads[0].parameter_types, vec!["float", "float", "float", "Vec2f"]);
        assert_eq!(overloads[0].return_type.as_deref(), Some("int"));
        assert_eq!(overloads[1].return_type, None);
    }

    #[test]
    fn test_binding_overloads_pair_lambda_and_signature() {
        let (pairs, lambdas, signatures) = binding_overloads(BINDING);
        assert_eq!((lambdas, signatures), (2, 2));
        assert_eq!(pairs[1].lambda.parameter_types, vec!["Vec3f"]);
        assert_eq!(pairs[1].python_parameter_types, vec!["gm.Vec3f"]);
        assert_eq!(pairs[1].python_return, "float");
        assert_eq!(bind_definitions(BINDING), vec!["BindLength"]);
    }

    #[test]
    fn test_type_shape_dedupes_const_overloads() {
        let text = "
    GM_HOST_DEVICE inline ElementType& X()
    GM_HOST_DEVICE inline const ElementType& X() const
    GM_HOST_DEVICE inline static size_t GetElementSize()
    GM_HOST_DEVICE inline Vec2f operator-( const Vec2f& i_vector ) const
    GM_HOST_DEVICE inline Vec2f operator-() const
    GM_HOST_DEVICE inline ElementType& operator[]( size_t i_index )
    GM_HOST_DEVICE inline const ElementType& operator[]( size_t i_index ) const
";
        let shape = type_shape(text);
        assert_eq!(shape.accessors, vec!["X"]);
        let suffixes: Vec<_> = shape.operators.iter().filter_map(|o| o.test_case_suffix()).collect();
        assert_eq!(suffixes, vec!["Subtraction", "Negation", "ElementAccess"]);
    }

    #[test]
    fn test_test_and_module_shapes() {
        let test = r#"TEST_CASE( "Vec2f_Addition" )
{
    CHECK( vector.X() == 2.0f );
}"#;
        let shape = test_shape(test);
        assert!(shape.has_case("Vec2f_Addition"));
        assert!(shape.calls("X"));

        let module = "void BindVec2f( pybind11::module& );\n\nPYBIND11_MODULE( gm, module )\n{\n    BindVec2f( module );\n}\n";
        let shape = module_shape(module);
        assert_eq!(shape.declarations, vec!["BindVec2f"]);
        assert_eq!(shape.invocations, vec!["BindVec2f"]);
    }

    #[test]
    fn test_binding_properties_and_python_test_shape() {
        let binding = r#"    cls.def_property(
        "min",
        []( const gm::FloatRange& i_range ) { return i_range.Min(); },
        []( gm::FloatRange& o_range, const float& i_value ) { o_range.Min() = i_value; } );
    cls.def_property(
        "max","#;
        assert_eq!(binding_properties(binding), vec!["min", "max"]);

        let test = "import gm\n\n\ndef testFloatRange_PropertySetters():\n    range = gm.FloatRange()\n    range.min = 2.0\n    assert range.min == 2.0\n";
        let shape = python_test_shape(test);
        assert_eq!(shape.test_functions, vec!["testFloatRange_PropertySetters"]);
        assert_eq!(shape.attribute_accesses, vec!["min"]);
        assert!(!shape.accesses("FloatRange"));
    }
}
