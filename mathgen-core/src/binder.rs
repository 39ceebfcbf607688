//! Template Binder
//!
//! Renders one obligation: builds the context for the obligation's entity,
//! renders the template with strict undefined semantics and prefixes the
//! generated-file banner. Every failure carries the artifact identity.

use minijinja::{context, AutoEscape, Environment, Error, ErrorKind, UndefinedBehavior, Value};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::artifact::{ArtifactId, EntityKind, Obligation};
use crate::context::ContextBuilder;
use crate::functions::Registries;
use crate::schema::{float_literal, upper_camel_case, Primitive, SchemaError};
use crate::templates::TemplateSet;

#[cfg(feature = "test-hooks")]
use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "test-hooks")]
static RENDER_CALL_COUNT: AtomicU32 = AtomicU32::new(0);

#[cfg(feature = "test-hooks")]
pub fn get_render_call_count() -> u32 {
    RENDER_CALL_COUNT.load(Ordering::SeqCst)
}

#[cfg(feature = "test-hooks")]
pub fn reset_render_call_count() {
    RENDER_CALL_COUNT.store(0, Ordering::SeqCst);
}

pub const BANNER_TEXT: &str = "This file is auto-generated, please do not modify directly!";

/// Banner in the comment syntax of the destination's extension.
pub fn banner(destination: &Path) -> String {
    let prefix = match destination.extension().and_then(|e| e.to_str()) {
        Some("py") => "#",
        _ => "//",
    };
    format!("{prefix}\n{prefix} {BANNER_TEXT}\n{prefix}\n\n")
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TemplateFault {
    Syntax,
    MissingTemplate,
    UndefinedReference,
    /// The entity's context could not be built from the registries.
    Context,
    Render,
}

impl TemplateFault {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateFault::Syntax => "syntax error",
            TemplateFault::MissingTemplate => "missing template",
            TemplateFault::UndefinedReference => "undefined reference",
            TemplateFault::Context => "context error",
            TemplateFault::Render => "render error",
        }
    }

    fn from_kind(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::SyntaxError => TemplateFault::Syntax,
            ErrorKind::TemplateNotFound => TemplateFault::MissingTemplate,
            ErrorKind::UndefinedError
            | ErrorKind::UnknownFilter
            | ErrorKind::UnknownFunction
            | ErrorKind::UnknownTest => TemplateFault::UndefinedReference,
            _ => TemplateFault::Render,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TemplateError {
    pub artifact: ArtifactId,
    pub template: String,
    pub fault: TemplateFault,
    pub message: String,
    pub line: Option<usize>,
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} in template '{}'", self.artifact, self.fault.as_str(), self.template)?;
        if let Some(line) = self.line {
            write!(f, " (line {line})")?;
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for TemplateError {}

impl TemplateError {
    fn from_engine(obligation: &Obligation, err: &Error) -> Self {
        Self {
            artifact: obligation.id.clone(),
            template: err.name().unwrap_or(&obligation.template).to_string(),
            fault: TemplateFault::from_kind(err.kind()),
            message: err
                .detail()
                .map(str::to_string)
                .unwrap_or_else(|| err.kind().to_string()),
            line: err.line(),
        }
    }

    fn from_schema(obligation: &Obligation, err: SchemaError) -> Self {
        Self {
            artifact: obligation.id.clone(),
            template: obligation.template.clone(),
            fault: TemplateFault::Context,
            message: err.to_string(),
            line: None,
        }
    }
}

pub struct TemplateBinder {
    env: Environment<'static>,
}

impl TemplateBinder {
    pub fn new(templates: &TemplateSet) -> Self {
        let sources: HashMap<String, String> = templates
            .iter()
            .map(|(name, source)| (name.to_string(), source.to_string()))
            .collect();

        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_keep_trailing_newline(true);
        env.set_auto_escape_callback(|_| AutoEscape::None);
        // Templates compile lazily so syntax errors are reported per artifact.
        env.set_loader(move |name| Ok(sources.get(name).cloned()));

        env.add_function("sqrt", |x: f64| x.sqrt());
        env.add_function("sum_of_squares", sum_of_squares);
        env.add_filter("float_literal", |x: f64| float_literal(x));
        env.add_filter("literal", |value: f64, class: String| {
            Ok::<_, Error>(primitive_for(&class)?.literal(value))
        });
        env.add_filter("python_literal", |value: f64, class: String| {
            Ok::<_, Error>(primitive_for(&class)?.python_literal(value))
        });
        env.add_filter("upper_camel", |s: String| upper_camel_case(&s));

        Self { env }
    }

    pub fn render(&self, obligation: &Obligation, registries: &Registries) -> Result<String, TemplateError> {
        #[cfg(feature = "test-hooks")]
        RENDER_CALL_COUNT.fetch_add(1, Ordering::SeqCst);

        let ctx = self
            .context_for(&obligation.id, registries)
            .map_err(|e| TemplateError::from_schema(obligation, e))?;

        let template = self
            .env
            .get_template(&obligation.template)
            .map_err(|e| TemplateError::from_engine(obligation, &e))?;
        let body = template
            .render(ctx)
            .map_err(|e| TemplateError::from_engine(obligation, &e))?;

        tracing::debug!(artifact = %obligation.id, template = %obligation.template, bytes = body.len(), "rendered");
        Ok(format!("{}{body}", banner(&obligation.destination)))
    }

    fn context_for(&self, id: &ArtifactId, registries: &Registries) -> Result<Value, SchemaError> {
        let builder = ContextBuilder::new(registries);
        Ok(match id.entity_kind {
            EntityKind::Type => {
                let schema = registries.types.resolve(&id.entity_name)?;
                context! { value_type => builder.type_context(schema)? }
            }
            EntityKind::Function => {
                let schema = registries.functions.resolve(&id.entity_name)?;
                context! { function => builder.function_context(schema)? }
            }
            EntityKind::Module => context! { module => builder.module_context() },
        })
    }
}

fn sum_of_squares(values: Value) -> Result<f64, Error> {
    let mut sum = 0.0;
    for value in values.try_iter()? {
        let value = f64::try_from(value)?;
        sum += value * value;
    }
    Ok(sum)
}

/// Scalar class named by the `literal` and `python_literal` filters,
/// e.g. `{{ 2 | literal("int") }}`.
fn primitive_for(scalar_class: &str) -> Result<Primitive, Error> {
    match scalar_class {
        "float" => Ok(Primitive::Float),
        "int" => Ok(Primitive::Int),
        "bool" => Ok(Primitive::Bool),
        other => Err(Error::new(
            ErrorKind::InvalidOperation,
            format!("no literal syntax for scalar '{other}'"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{ArtifactKind, ArtifactPlan};
    use crate::catalog;
    use std::path::PathBuf;

    fn obligation(id: ArtifactId, template: &str) -> Obligation {
        Obligation {
            destination: id.destination(),
            id,
            template: template.to_string(),
        }
    }

    #[test]
    fn test_banner_follows_extension() {
        assert!(banner(Path::new("types/vec3f.h")).starts_with("//\n// This file is auto-generated"));
        assert!(banner(Path::new("gm/__init__.py")).starts_with("#\n# This file"));
    }

    #[test]
    fn test_render_vector_definition() {
        let registries = catalog::builtin_registries().unwrap();
        let binder = TemplateBinder::new(&TemplateSet::builtin().unwrap());
        let plan = ArtifactPlan::compute(&registries, &TemplateSet::builtin().unwrap());
        let ob = plan.get(&ArtifactId::of_type("Vec3f", ArtifactKind::Definition)).unwrap();

        let text = binder.render(ob, &registries).unwrap();
        assert!(text.starts_with(&banner(&ob.destination)));
        assert!(text.contains("class Vec3f final"));
        assert!(text.contains("GM_HOST_DEVICE inline ElementType& Z()"));
        assert!(!text.contains("W()"));
    }

    #[test]
    fn test_render_vector_binding_test() {
        let registries = catalog::builtin_registries().unwrap();
        let templates = TemplateSet::builtin().unwrap();
        let plan = ArtifactPlan::compute(&registries, &templates);
        let ob = plan.get(&ArtifactId::of_type("Vec3f", ArtifactKind::BindingTest)).unwrap();
        assert_eq!(ob.destination, PathBuf::from("python/types/tests/testVec3f.py"));

        let text = TemplateBinder::new(&templates).render(ob, &registries).unwrap();
        assert!(text.starts_with("#\n# This file is auto-generated"));
        assert!(text.contains("def testVec3f_DefaultConstructor():\n    vector = gm.Vec3f()\n    assert vector.x == 0.0\n"));
        assert!(text.contains("    vector = gm.Vec3f(2.0, 4.0, 6.0)\n    assert vector.z == 6.0\n"));
        assert!(text.contains("    assert vector[1] == 4.0\n"));
    }

    #[test]
    fn test_undefined_reference_reports_artifact_and_line() {
        let registries = catalog::builtin_registries().unwrap();
        let mut templates = TemplateSet::new();
        templates.insert("types/vectorType.h", "line one\n{{ value_type.no_such_field }}\n");
        let binder = TemplateBinder::new(&templates);

        let ob = obligation(ArtifactId::of_type("Vec3f", ArtifactKind::Definition), "types/vectorType.h");
        let err = binder.render(&ob, &registries).unwrap_err();
        assert_eq!(err.fault, TemplateFault::UndefinedReference);
        assert_eq!(err.artifact, ob.id);
        assert_eq!(err.line, Some(2));
    }

    #[test]
    fn test_syntax_error_and_missing_template() {
        let registries = catalog::builtin_registries().unwrap();
        let mut templates = TemplateSet::new();
        templates.insert("types/vectorType.h", "{% for x in %}");
        let binder = TemplateBinder::new(&templates);

        let ob = obligation(ArtifactId::of_type("Vec3f", ArtifactKind::Definition), "types/vectorType.h");
        assert_eq!(binder.render(&ob, &registries).unwrap_err().fault, TemplateFault::Syntax);

        let ob = obligation(ArtifactId::of_type("Vec3f", ArtifactKind::Test), "types/tests/testVectorType.cpp");
        assert_eq!(binder.render(&ob, &registries).unwrap_err().fault, TemplateFault::MissingTemplate);
    }

    #[test]
    fn test_unknown_entity_is_context_fault() {
        let registries = catalog::builtin_registries().unwrap();
        let binder = TemplateBinder::new(&TemplateSet::builtin().unwrap());
        let ob = Obligation {
            id: ArtifactId::of_type("Vec9q", ArtifactKind::Definition),
            template: "types/vectorType.h".to_string(),
            destination: PathBuf::from("types/vec9q.h"),
        };
        assert_eq!(binder.render(&ob, &registries).unwrap_err().fault, TemplateFault::Context);
    }

    #[test]
    fn test_helpers() {
        let registries = catalog::builtin_registries().unwrap();
        let mut templates = TemplateSet::new();
        templates.insert(
            "functions/length.h",
            "{{ sqrt(sum_of_squares([2, 4, 6])) | float_literal }} {{ 3 | literal('int') }} {{ 1 | python_literal('bool') }} {{ 'dot' | upper_camel }}",
        );
        let binder = TemplateBinder::new(&templates);
        let ob = obligation(ArtifactId::of_function("length", ArtifactKind::Definition), "functions/length.h");
        let text = binder.render(&ob, &registries).unwrap();
        assert!(text.ends_with("7.483314773547883f 3 True Dot"));

        templates.insert("functions/length.h", "{{ 1 | python_literal('half') }}");
        let err = TemplateBinder::new(&templates).render(&ob, &registries).unwrap_err();
        assert!(err.message.contains("no literal syntax for scalar 'half'"));
    }
}
