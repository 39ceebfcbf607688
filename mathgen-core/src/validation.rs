//! Consistency Validator - Rule/Policy Separation
//!
//! Rules compare the registries with the structural shape of rendered
//! artifacts and produce findings. The build mode decides whether findings
//! block emission.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::artifact::{type_has_binding, ArtifactKind, EntityKind, RenderedSet};
use crate::functions::Registries;
use crate::schema::{FunctionSchema, TypeSchema};
use crate::shape::{self, OverloadShape};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FindingSeverity {
    Error,
    /// A finding reported by a dev build. Never blocks.
    Warning,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// Findings are downgraded to warnings, emission proceeds.
    #[default]
    Dev,
    /// Any finding blocks emission.
    Release,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyFinding {
    pub rule: String,
    pub severity: FindingSeverity,
    pub entity_kind: EntityKind,
    pub entity_name: String,
    pub artifact_kinds: Vec<ArtifactKind>,
    pub message: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub remediation: Vec<String>,
}

impl ConsistencyFinding {
    fn error(rule: &str, entity_kind: EntityKind, entity_name: &str, artifact_kinds: &[ArtifactKind], message: String) -> Self {
        Self {
            rule: rule.to_string(),
            severity: FindingSeverity::Error,
            entity_kind,
            entity_name: entity_name.to_string(),
            artifact_kinds: artifact_kinds.to_vec(),
            message,
            expected: None,
            actual: None,
            remediation: vec![],
        }
    }

    /// A required artifact that cannot be compared is itself a mismatch.
    fn absent(rule: &str, entity_kind: EntityKind, entity_name: &str, kind: ArtifactKind) -> Self {
        Self::error(rule, entity_kind, entity_name, &[kind], format!("{} artifact is missing", kind.as_str()))
            .remediation("Regenerate the output directory")
    }

    fn expected(mut self, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self.actual = Some(actual.into());
        self
    }

    fn remediation(mut self, step: &str) -> Self {
        self.remediation.push(step.to_string());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyReport {
    pub mode: BuildMode,
    /// True when the findings must stop emission in this mode.
    pub blocking: bool,
    pub findings: Vec<ConsistencyFinding>,
}

impl ConsistencyReport {
    pub fn has_errors(&self) -> bool {
        self.findings.iter().any(|f| f.severity == FindingSeverity::Error)
    }

    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Consistency rule trait - produces findings
pub trait ConsistencyRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, registries: &Registries, rendered: &RenderedSet) -> Vec<ConsistencyFinding>;
}

fn expected_overloads(function: &FunctionSchema) -> Vec<OverloadShape> {
    function
        .interfaces
        .iter()
        .map(|interface| OverloadShape {
            symbol: function.symbol(),
            parameter_types: interface.signature().into_iter().map(str::to_string).collect(),
            return_type: interface.return_type.clone(),
        })
        .collect()
}

fn describe(overload: &OverloadShape) -> String {
    format!(
        "{}({}) -> {}",
        overload.symbol,
        overload.signature_text(),
        overload.return_type.as_deref().unwrap_or("void")
    )
}

fn describe_all(overloads: &[OverloadShape]) -> String {
    overloads.iter().map(describe).collect::<Vec<_>>().join("; ")
}

// --- Concrete Rules ---

/// Definition overloads must match the registered interfaces exactly.
pub struct OverloadCompletenessRule;

impl ConsistencyRule for OverloadCompletenessRule {
    fn name(&self) -> &'static str {
        "overload_completeness"
    }

    fn check(&self, registries: &Registries, rendered: &RenderedSet) -> Vec<ConsistencyFinding> {
        let mut findings = vec![];
        for function in registries.functions.all() {
            let Some(text) = rendered.get_function(&function.name, ArtifactKind::Definition) else {
                findings.push(ConsistencyFinding::absent(self.name(), EntityKind::Function, &function.name, ArtifactKind::Definition));
                continue;
            };
            let expected = expected_overloads(function);
            let actual: Vec<_> = shape::definition_overloads(text)
                .into_iter()
                .filter(|o| o.symbol == function.symbol())
                .collect();
            let finding = |message: String| {
                ConsistencyFinding::error(self.name(), EntityKind::Function, &function.name, &[ArtifactKind::Definition], message)
                    .expected(describe_all(&expected), describe_all(&actual))
            };

            for overload in &expected {
                let matching = actual.iter().filter(|a| a.parameter_types == overload.parameter_types);
                match matching.clone().count() {
                    0 => findings.push(
                        finding(format!("overload ({}) missing from definition", overload.signature_text()))
                            .remediation("Make the definition template emit one overload per interface"),
                    ),
                    1 => {
                        if let Some(found) = matching.clone().find(|a| a.return_type != overload.return_type) {
                            findings.push(finding(format!(
                                "overload ({}) returns {} instead of {}",
                                overload.signature_text(),
                                found.return_type.as_deref().unwrap_or("void"),
                                overload.return_type.as_deref().unwrap_or("void"),
                            )));
                        }
                    }
                    n => findings.push(finding(format!(
                        "overload ({}) defined {n} times",
                        overload.signature_text()
                    ))),
                }
            }

            for overload in &actual {
                if !expected.iter().any(|e| e.parameter_types == overload.parameter_types) {
                    findings.push(
                        finding(format!("overload ({}) has no registered interface", overload.signature_text()))
                            .remediation("Declare the interface in the schema or remove it from the template"),
                    );
                }
            }
        }
        findings
    }
}

/// Bindings must expose exactly the overloads the definition declares.
pub struct BindingParityRule;

impl BindingParityRule {
    /// Source type names keyed by their binding name. Ambiguous binding
    /// names are excluded; the bijection rule reports those.
    fn reverse_binding_names(registries: &Registries) -> BTreeMap<String, String> {
        let mut seen: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for schema in registries.types.all() {
            seen.entry(registries.types.binding_name(schema))
                .or_default()
                .push(schema.name.clone());
        }
        seen.into_iter()
            .filter(|(_, names)| names.len() == 1)
            .map(|(binding, mut names)| (binding, names.remove(0)))
            .collect()
    }
}

impl ConsistencyRule for BindingParityRule {
    fn name(&self) -> &'static str {
        "binding_parity"
    }

    fn check(&self, registries: &Registries, rendered: &RenderedSet) -> Vec<ConsistencyFinding> {
        let reverse = Self::reverse_binding_names(registries);
        let mut findings = vec![];

        for function in registries.functions.all() {
            let kinds = [ArtifactKind::Definition, ArtifactKind::Binding];
            let Some(binding) = rendered.get_function(&function.name, ArtifactKind::Binding) else {
                findings.push(ConsistencyFinding::absent(self.name(), EntityKind::Function, &function.name, ArtifactKind::Binding));
                continue;
            };
            let definition: Vec<_> = match rendered.get_function(&function.name, ArtifactKind::Definition) {
                Some(text) => shape::definition_overloads(text)
                    .into_iter()
                    .filter(|o| o.symbol == function.symbol())
                    .collect(),
                None => expected_overloads(function),
            };
            let (bound, lambdas, signatures) = shape::binding_overloads(binding);
            let finding = |message: String| {
                ConsistencyFinding::error(self.name(), EntityKind::Function, &function.name, &kinds, message)
            };

            if lambdas != signatures {
                findings.push(finding(format!(
                    "binding has {lambdas} overload lambdas but {signatures} python signatures"
                )));
            }
            if lambdas != definition.len() {
                findings.push(
                    finding("overload count differs between definition and binding".to_string())
                        .expected(definition.len().to_string(), lambdas.to_string()),
                );
            }

            let bound_shapes: Vec<OverloadShape> = bound.iter().map(|b| b.lambda.clone()).collect();
            for overload in &definition {
                if !bound_shapes.contains(overload) {
                    findings.push(
                        finding(format!("overload ({}) is not bound", overload.signature_text()))
                            .expected(describe(overload), describe_all(&bound_shapes))
                            .remediation("Regenerate the binding from the same registry as the definition"),
                    );
                }
            }
            for overload in &bound_shapes {
                if !definition.contains(overload) {
                    findings.push(
                        finding(format!("bound overload ({}) has no definition", overload.signature_text()))
                            .expected(describe_all(&definition), describe(overload)),
                    );
                }
            }

            for entry in &bound {
                if entry.python_symbol != entry.lambda.symbol {
                    findings.push(finding(format!(
                        "python signature names '{}' but binds '{}'",
                        entry.python_symbol, entry.lambda.symbol
                    )));
                }
                let python_types: Vec<String> = entry
                    .python_parameter_types
                    .iter()
                    .map(|t| reverse.get(t).cloned().unwrap_or_else(|| format!("<unmapped {t}>")))
                    .collect();
                let python_return = match entry.python_return.as_str() {
                    "None" => None,
                    other => Some(reverse.get(other).cloned().unwrap_or_else(|| format!("<unmapped {other}>"))),
                };
                if python_types != entry.lambda.parameter_types || python_return != entry.lambda.return_type {
                    findings.push(
                        finding(format!(
                            "python signature of overload ({}) does not map back to its C++ types",
                            entry.lambda.signature_text()
                        ))
                        .expected(entry.lambda.signature_text(), python_types.join(", ")),
                    );
                }
            }
        }
        findings
    }
}

/// No two types may share a binding name.
pub struct BindingNameBijectionRule;

impl ConsistencyRule for BindingNameBijectionRule {
    fn name(&self) -> &'static str {
        "binding_name_bijection"
    }

    fn check(&self, registries: &Registries, _rendered: &RenderedSet) -> Vec<ConsistencyFinding> {
        let mut by_binding: BTreeMap<String, Vec<&TypeSchema>> = BTreeMap::new();
        for schema in registries.types.all() {
            by_binding.entry(registries.types.binding_name(schema)).or_default().push(schema);
        }

        let mut findings = vec![];
        for (binding, schemas) in by_binding {
            if schemas.len() < 2 {
                continue;
            }
            let names: Vec<_> = schemas.iter().map(|s| s.name.as_str()).collect();
            for schema in &schemas[1..] {
                findings.push(
                    ConsistencyFinding::error(
                        self.name(),
                        EntityKind::Type,
                        &schema.name,
                        &[ArtifactKind::Binding],
                        format!("binding name '{binding}' shared by types {}", names.join(", ")),
                    )
                    .remediation("Give one of the types a distinct bindingName"),
                );
            }
        }
        findings
    }
}

/// Every accessor and operator of a type definition is exercised by its test.
pub struct TypeTestCoverageRule;

impl ConsistencyRule for TypeTestCoverageRule {
    fn name(&self) -> &'static str {
        "type_test_coverage"
    }

    fn check(&self, registries: &Registries, rendered: &RenderedSet) -> Vec<ConsistencyFinding> {
        let kinds = [ArtifactKind::Definition, ArtifactKind::Test];
        let mut findings = vec![];

        for schema in registries.types.all() {
            let Some(definition) = rendered.get_type(&schema.name, ArtifactKind::Definition) else {
                findings.push(ConsistencyFinding::absent(self.name(), EntityKind::Type, &schema.name, ArtifactKind::Definition));
                continue;
            };
            let Some(test) = rendered.get_type(&schema.name, ArtifactKind::Test) else {
                findings.push(ConsistencyFinding::absent(self.name(), EntityKind::Type, &schema.name, ArtifactKind::Test));
                continue;
            };
            let declared = shape::type_shape(definition);
            let tested = shape::test_shape(test);
            let finding = |message: String| {
                ConsistencyFinding::error(self.name(), EntityKind::Type, &schema.name, &kinds, message)
            };

            for accessor in schema.accessor_names() {
                if !declared.accessors.contains(&accessor) {
                    findings.push(
                        finding(format!("accessor {accessor}() is not declared by the definition"))
                            .expected(schema.accessor_names().join(", "), declared.accessors.join(", ")),
                    );
                }
            }
            for accessor in &declared.accessors {
                if !tested.calls(accessor) {
                    findings.push(
                        finding(format!("accessor {accessor}() is never called by the test"))
                            .remediation("Exercise every accessor in the type test template"),
                    );
                }
            }
            for operator in &declared.operators {
                match operator.test_case_suffix() {
                    Some(suffix) => {
                        let case = format!("{}_{suffix}", schema.name);
                        if !tested.has_case(&case) {
                            findings.push(
                                finding(format!("operator{} has no test case", operator.symbol))
                                    .expected(case, tested.test_cases.join(", "))
                                    .remediation("Add the test case to the type test template"),
                            );
                        }
                    }
                    None => findings.push(finding(format!(
                        "operator{} has no test case naming convention",
                        operator.symbol
                    ))),
                }
            }
        }
        findings
    }
}

/// Every property a type binding exposes is exercised by its Python test.
pub struct BindingTestCoverageRule;

impl ConsistencyRule for BindingTestCoverageRule {
    fn name(&self) -> &'static str {
        "binding_test_coverage"
    }

    fn check(&self, registries: &Registries, rendered: &RenderedSet) -> Vec<ConsistencyFinding> {
        let kinds = [ArtifactKind::Binding, ArtifactKind::BindingTest];
        let mut findings = vec![];

        for schema in registries.types.all().filter(|t| type_has_binding(t)) {
            let Some(binding) = rendered.get_type(&schema.name, ArtifactKind::Binding) else {
                findings.push(ConsistencyFinding::absent(self.name(), EntityKind::Type, &schema.name, ArtifactKind::Binding));
                continue;
            };
            let Some(test) = rendered.get_type(&schema.name, ArtifactKind::BindingTest) else {
                findings.push(ConsistencyFinding::absent(self.name(), EntityKind::Type, &schema.name, ArtifactKind::BindingTest));
                continue;
            };
            let properties = shape::binding_properties(binding);
            let tested = shape::python_test_shape(test);
            let finding = |message: String| {
                ConsistencyFinding::error(self.name(), EntityKind::Type, &schema.name, &kinds, message)
            };

            let elements = schema.element_names();
            if properties != elements {
                findings.push(
                    finding("bound properties differ from the type's elements".to_string())
                        .expected(elements.join(", "), properties.join(", ")),
                );
            }
            for property in &properties {
                if !tested.accesses(property) {
                    findings.push(
                        finding(format!("property '{property}' is never accessed by the binding test"))
                            .remediation("Exercise every property in the binding test template"),
                    );
                }
            }
            let prefix = format!("test{}_", schema.name);
            if !tested.test_functions.iter().any(|f| f.starts_with(&prefix)) {
                findings.push(
                    finding("binding test defines no test function for the type".to_string())
                        .expected(format!("{prefix}*"), tested.test_functions.join(", ")),
                );
            }
        }
        findings
    }
}

/// The module declares and invokes exactly the binding symbols that
/// binding artifacts define.
pub struct ModuleRegistrationRule;

impl ConsistencyRule for ModuleRegistrationRule {
    fn name(&self) -> &'static str {
        "module_registration"
    }

    fn check(&self, registries: &Registries, rendered: &RenderedSet) -> Vec<ConsistencyFinding> {
        let kinds = [ArtifactKind::Binding];
        let Some(module) = rendered.module() else {
            return vec![ConsistencyFinding::absent(self.name(), EntityKind::Module, crate::artifact::MODULE_ENTITY, ArtifactKind::Binding)];
        };
        let finding = |message: String| {
            ConsistencyFinding::error(self.name(), EntityKind::Module, crate::artifact::MODULE_ENTITY, &kinds, message)
        };

        let mut defined = BTreeSet::new();
        for (id, text) in rendered.iter() {
            if id.artifact_kind == ArtifactKind::Binding && id.entity_kind != EntityKind::Module {
                defined.extend(shape::bind_definitions(text));
            }
        }
        // Entities whose binding artifact is absent still have to be registered.
        for schema in registries.types.all().filter(|t| type_has_binding(t)) {
            defined.insert(schema.bind_symbol());
        }
        for function in registries.functions.all() {
            defined.insert(function.bind_symbol());
        }

        let registered = shape::module_shape(module);
        let mut findings = vec![];
        for (what, listed) in [("declared", &registered.declarations), ("invoked", &registered.invocations)] {
            let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
            for symbol in listed {
                *counts.entry(symbol.as_str()).or_default() += 1;
            }
            for symbol in &defined {
                match counts.get(symbol.as_str()) {
                    None => findings.push(
                        finding(format!("{symbol} is defined but never {what} by the module"))
                            .remediation("Regenerate the module from the current registries"),
                    ),
                    Some(n) if *n > 1 => findings.push(finding(format!("{symbol} is {what} {n} times"))),
                    Some(_) => {}
                }
            }
            for symbol in counts.keys() {
                if !defined.contains(*symbol) {
                    findings.push(finding(format!("{symbol} is {what} by the module but defined nowhere")));
                }
            }
        }
        findings
    }
}

/// Validator orchestrates rules and applies the build-mode policy
pub struct Validator {
    rules: Vec<Box<dyn ConsistencyRule>>,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(OverloadCompletenessRule),
                Box::new(BindingParityRule),
                Box::new(BindingNameBijectionRule),
                Box::new(TypeTestCoverageRule),
                Box::new(BindingTestCoverageRule),
                Box::new(ModuleRegistrationRule),
            ],
        }
    }

    pub fn check(&self, registries: &Registries, rendered: &RenderedSet, mode: BuildMode) -> ConsistencyReport {
        let mut findings = vec![];
        for rule in &self.rules {
            let found = rule.check(registries, rendered);
            tracing::debug!(rule = rule.name(), findings = found.len(), "consistency rule checked");
            findings.extend(found);
        }

        // Release keeps every finding an error. Dev reports the same list as warnings.
        if mode == BuildMode::Dev {
            for finding in &mut findings {
                finding.severity = FindingSeverity::Warning;
            }
        }
        for finding in &findings {
            tracing::warn!(
                rule = %finding.rule,
                entity = %finding.entity_name,
                severity = ?finding.severity,
                "{}",
                finding.message
            );
        }

        ConsistencyReport {
            mode,
            blocking: mode == BuildMode::Release && !findings.is_empty(),
            findings,
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactId;
    use crate::schema::{Interface, Parameter, Primitive};
    use crate::types::TypeRegistry;
    use crate::functions::FunctionRegistry;

    fn registries() -> Registries {
        let mut types = TypeRegistry::new();
        types.register(TypeSchema::scalar("float", Primitive::Float)).unwrap();
        types.register(TypeSchema::vector("Vec2f", "float", 2)).unwrap();
        types.register(TypeSchema::vector("Vec3f", "float", 3)).unwrap();
        let mut functions = FunctionRegistry::new();
        let interfaces = ["Vec2f", "Vec3f"]
            .iter()
            .map(|t| Interface::new(vec![Parameter::new("vector", t)], Some("float")))
            .collect();
        functions
            .register(FunctionSchema::new("length", "linearAlgebra", interfaces), &types)
            .unwrap();
        Registries { types, functions }
    }

    const DEFINITION: &str = "\
GM_HOST_DEVICE inline float Length( const Vec2f& i_vector )
{
}

GM_HOST_DEVICE inline float Length( const Vec3f& i_vector )
{
}
";

    const BINDING: &str = r#"void BindLength( pybind11::module& o_module )
{
    o_module.def( "Length", []( const gm::Vec2f& i_vector ) -> float { return gm::Length( i_vector ); },
                  "Length(vector: gm.Vec2f) -> float" );
    o_module.def( "Length", []( const gm::Vec3f& i_vector ) -> float { return gm::Length( i_vector ); },
                  "Length(vector: gm.Vec3f) -> float" );
}
"#;

    fn rendered(definition: &str, binding: &str) -> RenderedSet {
        let mut set = RenderedSet::new();
        set.insert(ArtifactId::of_function("length", ArtifactKind::Definition), definition.to_string());
        set.insert(ArtifactId::of_function("length", ArtifactKind::Binding), binding.to_string());
        set
    }

    #[test]
    fn test_consistent_function_has_no_findings() {
        let registries = registries();
        let set = rendered(DEFINITION, BINDING);
        assert!(OverloadCompletenessRule.check(&registries, &set).is_empty());
        assert!(BindingParityRule.check(&registries, &set).is_empty());
    }

    #[test]
    fn test_dropped_binding_overload_detected() {
        let registries = registries();
        let truncated: String = BINDING.lines().take(4).chain(["}"]).collect::<Vec<_>>().join("\n");
        let findings = BindingParityRule.check(&registries, &rendered(DEFINITION, &truncated));
        assert!(findings.iter().any(|f| f.message.contains("(Vec3f) is not bound")));
        assert!(findings.iter().all(|f| f.entity_name == "length"));
    }

    #[test]
    fn test_orphan_definition_overload_detected() {
        let registries = registries();
        let extra = format!("{DEFINITION}\nGM_HOST_DEVICE inline float Length( const Vec4f& i_vector )\n");
        let findings = OverloadCompletenessRule.check(&registries, &rendered(&extra, BINDING));
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("no registered interface"));
    }

    #[test]
    fn test_return_type_mismatch_detected() {
        let registries = registries();
        let wrong = DEFINITION.replacen("float Length( const Vec2f", "int Length( const Vec2f", 1);
        let findings = OverloadCompletenessRule.check(&registries, &rendered(&wrong, BINDING));
        assert!(findings[0].message.contains("returns int instead of float"));
    }

    #[test]
    fn test_binding_name_collision() {
        let mut registries = registries();
        let mut clash = TypeSchema::vector("Vec4f", "float", 4);
        clash.binding_name = Some("gm.Vec3f".to_string());
        registries.types.register(clash).unwrap();
        let findings = BindingNameBijectionRule.check(&registries, &RenderedSet::new());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].entity_name, "Vec4f");
    }

    #[test]
    fn test_missing_artifacts_block_release() {
        let registries = registries();
        let validator = Validator::new();
        let report = validator.check(&registries, &RenderedSet::new(), BuildMode::Release);
        assert!(report.blocking);
        assert!(report.has_errors());
        assert!(report
            .findings
            .iter()
            .any(|f| f.rule == "binding_parity" && f.message == "binding artifact is missing"));

        let report = validator.check(&registries, &RenderedSet::new(), BuildMode::Dev);
        assert!(!report.blocking);
        assert!(!report.is_clean());
        assert!(!report.has_errors());
    }

    #[test]
    fn test_release_blocks_and_dev_downgrades() {
        let registries = registries();
        let validator = Validator::new();
        let wrong = DEFINITION.replacen("Vec3f", "Vec4f", 1);

        let release = validator.check(&registries, &rendered(&wrong, BINDING), BuildMode::Release);
        assert!(release.blocking);
        assert!(release.findings.iter().all(|f| f.severity == FindingSeverity::Error));

        let dev = validator.check(&registries, &rendered(&wrong, BINDING), BuildMode::Dev);
        assert!(!dev.blocking);
        assert_eq!(dev.findings.len(), release.findings.len());
        assert!(dev.findings.iter().all(|f| f.severity == FindingSeverity::Warning));
    }

    const VEC2F_BINDING: &str = r#"void BindVec2f( pybind11::module& o_module )
{
    pybind11::class_< gm::Vec2f > cls( o_module, "Vec2f" );
    cls.def_property(
        "x",
        []( const gm::Vec2f& i_vector ) { return i_vector.X(); },
        []( gm::Vec2f& o_vector, float i_value ) { o_vector.X() = i_value; } );
    cls.def_property(
        "y",
        []( const gm::Vec2f& i_vector ) { return i_vector.Y(); },
        []( gm::Vec2f& o_vector, float i_value ) { o_vector.Y() = i_value; } );
}
"#;

    const VEC2F_BINDING_TEST: &str = "\
import gm


def testVec2f_PropertySetters():
    vector = gm.Vec2f()
    vector.x = 2.0
    assert vector.x == 2.0
    vector.y = 4.0
    assert vector.y == 4.0
";

    fn bound_vec2f(binding: &str, test: &str) -> RenderedSet {
        let mut set = RenderedSet::new();
        set.insert(ArtifactId::of_type("Vec2f", ArtifactKind::Binding), binding.to_string());
        set.insert(ArtifactId::of_type("Vec2f", ArtifactKind::BindingTest), test.to_string());
        set
    }

    fn vec2f_findings(set: &RenderedSet) -> Vec<ConsistencyFinding> {
        BindingTestCoverageRule
            .check(&registries(), set)
            .into_iter()
            .filter(|f| f.entity_name == "Vec2f")
            .collect()
    }

    #[test]
    fn test_binding_test_covers_every_property() {
        assert!(vec2f_findings(&bound_vec2f(VEC2F_BINDING, VEC2F_BINDING_TEST)).is_empty());

        let untested: String = VEC2F_BINDING_TEST.lines().take(7).collect::<Vec<_>>().join("\n");
        let findings = vec2f_findings(&bound_vec2f(VEC2F_BINDING, &untested));
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("'y'"));
    }

    #[test]
    fn test_binding_test_missing_or_unnamed() {
        let mut set = RenderedSet::new();
        set.insert(ArtifactId::of_type("Vec2f", ArtifactKind::Binding), VEC2F_BINDING.to_string());
        let findings = vec2f_findings(&set);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].artifact_kinds, vec![ArtifactKind::BindingTest]);

        let renamed = VEC2F_BINDING_TEST.replace("testVec2f_", "testOther_");
        let findings = vec2f_findings(&bound_vec2f(VEC2F_BINDING, &renamed));
        assert!(findings.iter().any(|f| f.message.contains("no test function")));
    }
}
